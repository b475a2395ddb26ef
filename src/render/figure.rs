//! Headless rasterization of a [`Slice`] into a PNG figure: the field in
//! a framed plot area, a vertical colorbar and, when a font is available,
//! the title and axis labels.

use crate::dataset::slice::Slice;
use crate::render::colormap::Colormap;
use crate::render::error::RenderError;
use ab_glyph::{FontVec, PxScale};
use bon::Builder;
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use log::{debug, info, warn};
use std::io::Cursor;
use std::path::{Path, PathBuf};

const MARGIN_LEFT: u32 = 80;
const MARGIN_TOP: u32 = 50;
const MARGIN_BOTTOM: u32 = 50;
const COLORBAR_AREA: u32 = 110;
const COLORBAR_GAP: u32 = 20;
const COLORBAR_WIDTH: u32 = 22;
const MIN_PLOT_SIZE: u32 = 16;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);

const FONT_CANDIDATES: [&str; 6] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Presentation settings. Every field has a default, so
/// `PlotStyle::default()` reproduces the standard IMERG quick look.
///
/// # Examples
///
/// ```
/// use dapview::{Colormap, PlotStyle};
///
/// let style = PlotStyle::builder()
///     .title("Precipitación IMERG (mm/hr) - 1 Marzo 2023")
///     .colormap("Blues".parse::<Colormap>().unwrap())
///     .vmax(10.0)
///     .build();
/// assert_eq!((style.width, style.height), (1000, 600));
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct PlotStyle {
    /// Falls back to [`Slice::default_title`].
    #[builder(into)]
    pub title: Option<String>,
    #[builder(default)]
    pub colormap: Colormap,
    #[builder(default = 1000)]
    pub width: u32,
    #[builder(default = 600)]
    pub height: u32,
    pub vmin: Option<f64>,
    pub vmax: Option<f64>,
    #[builder(default = true)]
    pub colorbar: bool,
    /// TrueType font for labels; common system fonts are tried otherwise.
    #[builder(into)]
    pub font: Option<PathBuf>,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PlotStyle {
    pub fn title_for(&self, slice: &Slice) -> String {
        self.title.clone().unwrap_or_else(|| slice.default_title())
    }

    /// Colour range: explicit limits win over the data range.
    pub fn range_for(&self, slice: &Slice) -> (f64, f64) {
        let (lo, hi) = slice.finite_range().unwrap_or((0.0, 1.0));
        (self.vmin.unwrap_or(lo), self.vmax.unwrap_or(hi))
    }

    fn load_font(&self) -> Result<Option<FontVec>, RenderError> {
        if let Some(path) = &self.font {
            let data = std::fs::read(path).map_err(|e| RenderError::Io(path.clone(), e))?;
            let font =
                FontVec::try_from_vec(data).map_err(|_| RenderError::InvalidFont(path.clone()))?;
            return Ok(Some(font));
        }
        let system = FONT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .chain(dirs::font_dir().map(|d| d.join("DejaVuSans.ttf")))
            .find_map(|path| {
                let data = std::fs::read(&path).ok()?;
                let font = FontVec::try_from_vec(data).ok()?;
                debug!("Using font {:?}", path);
                Some(font)
            });
        if system.is_none() {
            warn!("No font found, drawing the figure without text");
        }
        Ok(system)
    }
}

fn is_decreasing(coords: &Option<Vec<f64>>) -> bool {
    match coords.as_deref() {
        Some([first, .., last]) => last < first,
        _ => false,
    }
}

fn format_tick(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude != 0.0 && !(0.01..100_000.0).contains(&magnitude) {
        format!("{:.2e}", value)
    } else {
        let text = format!("{:.3}", value);
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn axis_extent(coords: &Option<Vec<f64>>) -> Option<(f64, f64)> {
    let c = coords.as_deref()?;
    let (first, last) = (*c.first()?, *c.last()?);
    Some((first.min(last), first.max(last)))
}

/// A rendered figure.
#[derive(Debug, Clone)]
pub struct Figure {
    pub title: String,
    pub colormap: Colormap,
    pub range: (f64, f64),
    pub image: RgbaImage,
}

struct Layout {
    plot: Rect,
    colorbar: Option<Rect>,
}

impl Layout {
    fn new(style: &PlotStyle) -> Result<Self, RenderError> {
        let right = if style.colorbar { COLORBAR_AREA } else { 30 };
        let too_small = RenderError::CanvasTooSmall {
            width: style.width,
            height: style.height,
        };
        let plot_width = style
            .width
            .checked_sub(MARGIN_LEFT + right)
            .filter(|w| *w >= MIN_PLOT_SIZE);
        let plot_height = style
            .height
            .checked_sub(MARGIN_TOP + MARGIN_BOTTOM)
            .filter(|h| *h >= MIN_PLOT_SIZE);
        let (Some(pw), Some(ph)) = (plot_width, plot_height) else {
            return Err(too_small);
        };

        let plot = Rect::at(MARGIN_LEFT as i32, MARGIN_TOP as i32).of_size(pw, ph);
        let colorbar = style.colorbar.then(|| {
            Rect::at((MARGIN_LEFT + pw + COLORBAR_GAP) as i32, MARGIN_TOP as i32)
                .of_size(COLORBAR_WIDTH, ph)
        });
        Ok(Self { plot, colorbar })
    }
}

impl Figure {
    /// Rasterizes `slice`: rows on the vertical axis, columns on the
    /// horizontal one, oriented so coordinates grow upwards and rightwards.
    /// NaN cells stay transparent.
    pub fn render(slice: &Slice, style: &PlotStyle) -> Result<Self, RenderError> {
        let (rows, cols) = slice.shape();
        if rows == 0 || cols == 0 {
            return Err(RenderError::EmptySlice);
        }
        let layout = Layout::new(style)?;
        let title = style.title_for(slice);
        let (vmin, vmax) = style.range_for(slice);
        let span = vmax - vmin;
        let normalize = |v: f64| {
            if span == 0.0 || !span.is_finite() {
                if v.is_nan() {
                    f64::NAN
                } else {
                    0.0
                }
            } else {
                (v - vmin) / span
            }
        };

        let mut image = RgbaImage::from_pixel(style.width, style.height, BACKGROUND);

        let flip_rows = !is_decreasing(&slice.y);
        let flip_cols = is_decreasing(&slice.x);
        let (pw, ph) = (layout.plot.width(), layout.plot.height());
        let (px0, py0) = (layout.plot.left() as u32, layout.plot.top() as u32);
        for py in 0..ph {
            let display_row = (py as usize * rows) / ph as usize;
            let row = if flip_rows {
                rows - 1 - display_row
            } else {
                display_row
            };
            for px in 0..pw {
                let display_col = (px as usize * cols) / pw as usize;
                let col = if flip_cols {
                    cols - 1 - display_col
                } else {
                    display_col
                };
                let color = style.colormap.color(normalize(slice.values[[row, col]]));
                image.put_pixel(px0 + px, py0 + py, color);
            }
        }
        draw_hollow_rect_mut(&mut image, layout.plot, INK);

        if let Some(bar) = layout.colorbar {
            let height = bar.height();
            for y in 0..height {
                let t = 1.0 - f64::from(y) / f64::from((height - 1).max(1));
                let color = style.colormap.color(t);
                for x in 0..bar.width() {
                    image.put_pixel(bar.left() as u32 + x, bar.top() as u32 + y, color);
                }
            }
            draw_hollow_rect_mut(&mut image, bar, INK);
        }

        let mut figure = Figure {
            title,
            colormap: style.colormap,
            range: (vmin, vmax),
            image,
        };
        if let Some(font) = style.load_font()? {
            figure.draw_labels(&font, slice, &layout);
        }
        info!(
            "Rendered {}x{} slice of {} into {}x{} figure",
            rows, cols, slice.variable, style.width, style.height
        );
        Ok(figure)
    }

    fn draw_labels(&mut self, font: &FontVec, slice: &Slice, layout: &Layout) {
        let title_scale = PxScale::from(20.0);
        let scale = PxScale::from(14.0);
        let width = self.image.width() as i32;
        let plot = layout.plot;

        let (tw, _) = text_size(title_scale, font, &self.title);
        let tx = ((width - tw as i32) / 2).max(0);
        draw_text_mut(&mut self.image, INK, tx, 15, title_scale, font, &self.title);

        let (xw, _) = text_size(scale, font, &slice.x_dim);
        let x_center = plot.left() + plot.width() as i32 / 2;
        let below = plot.bottom() + 25;
        draw_text_mut(&mut self.image, INK, x_center - xw as i32 / 2, below, scale, font, &slice.x_dim);
        draw_text_mut(&mut self.image, INK, 8, plot.top() + plot.height() as i32 / 2, scale, font, &slice.y_dim);

        if let Some((lo, hi)) = axis_extent(&slice.x) {
            let right = format_tick(hi);
            let (rw, _) = text_size(scale, font, &right);
            draw_text_mut(&mut self.image, INK, plot.left(), plot.bottom() + 5, scale, font, &format_tick(lo));
            draw_text_mut(&mut self.image, INK, plot.right() - rw as i32, plot.bottom() + 5, scale, font, &right);
        }
        if let Some((lo, hi)) = axis_extent(&slice.y) {
            for (value, y) in [(hi, plot.top()), (lo, plot.bottom() - 14)] {
                let text = format_tick(value);
                let (w, _) = text_size(scale, font, &text);
                draw_text_mut(&mut self.image, INK, plot.left() - w as i32 - 6, y, scale, font, &text);
            }
        }

        if let Some(bar) = layout.colorbar {
            let (vmin, vmax) = self.range;
            let ticks = [
                (vmax, bar.top()),
                ((vmin + vmax) / 2.0, bar.top() + bar.height() as i32 / 2 - 7),
                (vmin, bar.bottom() - 14),
            ];
            for (value, y) in ticks {
                draw_text_mut(&mut self.image, INK, bar.right() + 6, y, scale, font, &format_tick(value));
            }
            if let Some(units) = &slice.units {
                draw_text_mut(&mut self.image, INK, bar.left(), bar.top() - 20, scale, font, units);
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn to_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut buffer = Cursor::new(Vec::new());
        self.image.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }

    pub fn save_png(&self, path: &Path) -> Result<(), RenderError> {
        let bytes = self.to_png()?;
        std::fs::write(path, bytes).map_err(|e| RenderError::Io(path.to_path_buf(), e))?;
        info!("Saved figure '{}' to {:?}", self.title, path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn headless() -> PlotStyle {
        PlotStyle::builder().width(300).height(200).build()
    }

    fn plot_pixel(figure: &Figure, fx: f64, fy: f64) -> Rgba<u8> {
        let x = MARGIN_LEFT + ((300 - MARGIN_LEFT - COLORBAR_AREA) as f64 * fx) as u32;
        let y = MARGIN_TOP + ((200 - MARGIN_TOP - MARGIN_BOTTOM) as f64 * fy) as u32;
        *figure.image.get_pixel(x, y)
    }

    #[test]
    fn renders_constant_field() {
        let slice = Slice::new("precipitationCal", "lat", "lon", Array2::zeros((10, 10)));
        let figure = Figure::render(&slice, &headless()).unwrap();
        assert_eq!((figure.width(), figure.height()), (300, 200));
        assert_eq!(figure.range, (0.0, 0.0));
        assert_eq!(plot_pixel(&figure, 0.5, 0.5), Colormap::default().color(0.0));
        assert_eq!(figure.title, "precipitationCal");
    }

    #[test]
    fn low_rows_are_drawn_at_the_bottom() {
        let slice = Slice::new("v", "lat", "lon", array![[0.0, 0.0], [1.0, 1.0]])
            .with_coordinates(vec![-10.0, 10.0], vec![0.0, 1.0]);
        let figure = Figure::render(&slice, &headless()).unwrap();
        let cmap = Colormap::default();
        assert_eq!(plot_pixel(&figure, 0.5, 0.9), cmap.color(0.0));
        assert_eq!(plot_pixel(&figure, 0.5, 0.1), cmap.color(1.0));

        let descending = slice.clone().with_coordinates(vec![10.0, -10.0], vec![0.0, 1.0]);
        let figure = Figure::render(&descending, &headless()).unwrap();
        assert_eq!(plot_pixel(&figure, 0.5, 0.1), cmap.color(0.0));
    }

    #[test]
    fn nan_cells_are_transparent_and_limits_apply() {
        let slice = Slice::new("v", "y", "x", array![[f64::NAN, 5.0], [f64::NAN, 5.0]]);
        let style = PlotStyle::builder()
            .width(300)
            .height(200)
            .vmin(0.0)
            .vmax(10.0)
            .build();
        let figure = Figure::render(&slice, &style).unwrap();
        assert_eq!(plot_pixel(&figure, 0.25, 0.5)[3], 0);
        assert_eq!(plot_pixel(&figure, 0.75, 0.5), Colormap::default().color(0.5));
        assert_eq!(figure.range, (0.0, 10.0));
    }

    #[test]
    fn rejects_empty_slices_and_tiny_canvases() {
        let empty = Slice::new("v", "y", "x", Array2::zeros((0, 3)));
        assert!(matches!(
            Figure::render(&empty, &PlotStyle::default()),
            Err(RenderError::EmptySlice)
        ));
        let slice = Slice::new("v", "y", "x", Array2::zeros((2, 2)));
        let tiny = PlotStyle::builder().width(100).height(80).build();
        assert!(matches!(
            Figure::render(&slice, &tiny),
            Err(RenderError::CanvasTooSmall { .. })
        ));
    }

    #[test]
    fn encodes_png() {
        let slice = Slice::new("v", "y", "x", Array2::from_elem((3, 4), 1.0));
        let png = Figure::render(&slice, &headless()).unwrap().to_png().unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn formats_ticks_compactly() {
        assert_eq!(format_tick(0.0), "0");
        assert_eq!(format_tick(2.5), "2.5");
        assert_eq!(format_tick(1_000_000.0), "1.00e6");
    }
}
