use crate::dataset::slice::Slice;
use crate::render::error::RenderError;
use crate::render::figure::PlotStyle;
use crate::utils::display_available;

/// Shows the slice in an interactive viewer.
///
/// With the `viewer` feature the slice is drawn as a plotlars heatmap that
/// opens in the default browser; the call returns as soon as the browser is
/// launched and does not wait for the window to close. Fails with
/// [`RenderError::NoDisplay`] on headless machines and with
/// [`RenderError::ViewerUnavailable`] without the feature; use
/// [`crate::Figure::save_png`] there.
pub fn show(slice: &Slice, style: &PlotStyle) -> Result<(), RenderError> {
    if !display_available() {
        return Err(RenderError::NoDisplay);
    }
    if slice.values.is_empty() {
        return Err(RenderError::EmptySlice);
    }
    open_viewer(slice, style)
}

#[cfg(feature = "viewer")]
fn open_viewer(slice: &Slice, style: &PlotStyle) -> Result<(), RenderError> {
    use plotlars::{HeatMap, Plot, Text};

    let palette = heatmap_palette(style.colormap.palette);
    let df = slice.to_dataframe()?;
    HeatMap::builder()
        .data(&df)
        .x(&slice.x_dim)
        .y(&slice.y_dim)
        .z("value")
        .color_scale(palette)
        .reverse_scale(style.colormap.reversed)
        .plot_title(Text::from(style.title_for(slice)))
        .x_title(Text::from(slice.x_dim.as_str()))
        .y_title(Text::from(slice.y_dim.as_str()))
        .build()
        .plot();
    Ok(())
}

/// plotlars has no Plasma scale; it falls back to Viridis.
#[cfg(feature = "viewer")]
fn heatmap_palette(palette: crate::render::colormap::Palette) -> plotlars::Palette {
    use crate::render::colormap::Palette;
    use log::warn;

    match palette {
        Palette::Blues => plotlars::Palette::Blues,
        Palette::Greys => plotlars::Palette::Greys,
        Palette::Greens => plotlars::Palette::Greens,
        Palette::Reds => plotlars::Palette::Reds,
        Palette::YlGnBu => plotlars::Palette::YlGnBu,
        Palette::Viridis => plotlars::Palette::Viridis,
        Palette::Plasma => {
            warn!("The viewer has no Plasma colormap, showing Viridis instead");
            plotlars::Palette::Viridis
        }
    }
}

#[cfg(not(feature = "viewer"))]
fn open_viewer(_slice: &Slice, _style: &PlotStyle) -> Result<(), RenderError> {
    Err(RenderError::ViewerUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn headless_or_featureless_show_fails_cleanly() {
        let slice = Slice::new("v", "y", "x", Array2::zeros((2, 2)));
        let result = show(&slice, &PlotStyle::default());
        if !display_available() {
            assert!(matches!(result, Err(RenderError::NoDisplay)));
        } else if !cfg!(feature = "viewer") {
            assert!(matches!(result, Err(RenderError::ViewerUnavailable)));
        }
    }

    #[cfg(feature = "viewer")]
    #[test]
    fn viewer_palettes_follow_the_colormap() {
        use crate::render::colormap::Palette;

        assert!(matches!(heatmap_palette(Palette::Blues), plotlars::Palette::Blues));
        assert!(matches!(heatmap_palette(Palette::YlGnBu), plotlars::Palette::YlGnBu));
        assert!(matches!(heatmap_palette(Palette::Plasma), plotlars::Palette::Viridis));
    }
}
