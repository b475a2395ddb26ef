use dapview::{
    ArrayData, AttributeTable, Credentials, DatasetAccessor, Dapview, ErrorKind, Figure,
    MemoryAccessor, MemoryDataset, MemoryVariable, PlotStyle, SelectError, Slice,
};
use ndarray::Array2;

const LOCATOR: &str = "mem://3B-HHR.MS.MRG.3IMERG.20230301-S000000-E002959.0000.V07B.HDF5";

fn precipitation(time_steps: usize) -> MemoryDataset {
    MemoryDataset::new("3B-HHR.MS.MRG.3IMERG.20230301-S000000-E002959.0000.V07B.HDF5")
        .with_global("ShortName", "GPM_3IMERGHH")
        .with_variable(
            MemoryVariable::new(
                "precipitationCal",
                &[("time", time_steps), ("lat", 10), ("lon", 10)],
                ArrayData::Float32(vec![0.0; time_steps * 100]),
            )
            .with_attributes(AttributeTable::new().with_text("units", "mm/hr")),
        )
}

fn small_style() -> PlotStyle {
    PlotStyle::builder().width(400).height(300).build()
}

#[tokio::test]
async fn selected_field_has_a_time_dimension() {
    let accessor = MemoryAccessor::new().with_dataset(LOCATOR, precipitation(3));
    let dataset = accessor.open(LOCATOR, None).await.unwrap();
    let field = dataset.variable("precipitationCal").unwrap();
    assert!(field.dim_size("time").is_some_and(|n| n >= 1));
    assert_eq!(field.shape(), vec![3, 10, 10]);
}

#[tokio::test]
async fn missing_key_is_reported_not_empty() {
    let accessor = MemoryAccessor::new().with_dataset(LOCATOR, precipitation(1));
    let dataset = accessor.open(LOCATOR, None).await.unwrap();
    assert!(matches!(
        dataset.variable("precipitation"),
        Err(SelectError::KeyNotFound { .. })
    ));
}

#[tokio::test]
async fn first_time_index_depends_on_dimension_size() {
    for n in [1, 2, 5] {
        let accessor = MemoryAccessor::new().with_dataset(LOCATOR, precipitation(n));
        let dataset = accessor.open(LOCATOR, None).await.unwrap();
        let field = dataset.variable("precipitationCal").unwrap();
        assert!(field.select("time", 0).is_ok(), "time size {}", n);
    }

    let accessor = MemoryAccessor::new().with_dataset(LOCATOR, precipitation(0));
    let dataset = accessor.open(LOCATOR, None).await.unwrap();
    let field = dataset.variable("precipitationCal").unwrap();
    assert!(matches!(
        field.select("time", 0),
        Err(SelectError::IndexOutOfRange { index: 0, size: 0, .. })
    ));
    let err = field.isel("time", 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
    assert_eq!(accessor.stats().reads(), 0);
}

#[test]
fn fixed_value_slices_render_headlessly() {
    for value in [0.0, -3.5, 250.0] {
        let slice = Slice::new("v", "lat", "lon", Array2::from_elem((7, 13), value));
        let figure = Figure::render(&slice, &small_style()).unwrap();
        assert_eq!((figure.width(), figure.height()), (400, 300));
    }
}

#[tokio::test]
async fn zeros_end_to_end_without_mutation() {
    let accessor = MemoryAccessor::new().with_dataset(LOCATOR, precipitation(1));
    let source = accessor.dataset(LOCATOR).unwrap();
    let before = source.variable_data("precipitationCal").cloned();
    let stats = accessor.stats();

    let output = Dapview::with_accessor(accessor)
        .plot()
        .url(LOCATOR)
        .field("precipitationCal")
        .dimension("time")
        .index(0)
        .style(small_style())
        .call()
        .await
        .unwrap();

    assert_eq!(output.slice.shape(), (10, 10));
    assert!(output.slice.values.iter().all(|&v| v == 0.0));
    assert_eq!(output.figure.range, (0.0, 0.0));
    assert_eq!(source.variable_data("precipitationCal").cloned(), before);
    assert_eq!(stats.reads(), 1);
    assert_eq!(stats.releases(), 1);
}

#[tokio::test]
async fn rejected_credentials_never_reach_selection() {
    let accessor = MemoryAccessor::new()
        .with_dataset(LOCATOR, precipitation(1))
        .require_credentials(Credentials::new("earthdata-user", "correct"));
    let stats = accessor.stats();
    let client = Dapview::with_accessor(accessor);

    let wrong = Credentials::new("earthdata-user", "incorrect");
    let err = client
        .plot()
        .url(LOCATOR)
        .credentials(&wrong)
        .style(small_style())
        .call()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(stats.opens(), 0);
    assert_eq!(stats.reads(), 0);
}

#[tokio::test]
async fn single_row_field_renders_end_to_end() {
    let dataset = MemoryDataset::new("row").with_variable(MemoryVariable::new(
        "precipitationCal",
        &[("time", 1), ("lat", 1), ("lon", 10)],
        ArrayData::Float32((0..10).map(|v| v as f32).collect()),
    ));
    let accessor = MemoryAccessor::new().with_dataset(LOCATOR, dataset);

    let output = Dapview::with_accessor(accessor)
        .plot()
        .url(LOCATOR)
        .style(small_style())
        .call()
        .await
        .unwrap();

    assert_eq!(output.slice.shape(), (1, 10));
    assert_eq!(output.figure.range, (0.0, 9.0));
}

#[tokio::test]
async fn truncated_data_is_a_format_error() {
    let dataset = MemoryDataset::new("short").with_variable(MemoryVariable::new(
        "precipitationCal",
        &[("time", 1), ("lat", 10), ("lon", 10)],
        ArrayData::Float32(vec![0.0; 5]),
    ));
    let accessor = MemoryAccessor::new().with_dataset(LOCATOR, dataset);

    let err = Dapview::with_accessor(accessor)
        .plot()
        .url(LOCATOR)
        .style(small_style())
        .call()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}
