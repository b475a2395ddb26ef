//! Sequential colormaps sampled at nine stops and interpolated linearly.

use crate::render::error::RenderError;
use image::Rgba;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Palette {
    Blues,
    Greys,
    Greens,
    Reds,
    YlGnBu,
    Viridis,
    Plasma,
}

impl Palette {
    pub const ALL: [Palette; 7] = [
        Palette::Blues,
        Palette::Greys,
        Palette::Greens,
        Palette::Reds,
        Palette::YlGnBu,
        Palette::Viridis,
        Palette::Plasma,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Palette::Blues => "Blues",
            Palette::Greys => "Greys",
            Palette::Greens => "Greens",
            Palette::Reds => "Reds",
            Palette::YlGnBu => "YlGnBu",
            Palette::Viridis => "viridis",
            Palette::Plasma => "plasma",
        }
    }

    fn stops(&self) -> &'static [u32; 9] {
        match self {
            Palette::Blues => &[
                0xf7fbff, 0xdeebf7, 0xc6dbef, 0x9ecae1, 0x6baed6, 0x4292c6, 0x2171b5, 0x08519c,
                0x08306b,
            ],
            Palette::Greys => &[
                0xffffff, 0xf0f0f0, 0xd9d9d9, 0xbdbdbd, 0x969696, 0x737373, 0x525252, 0x252525,
                0x000000,
            ],
            Palette::Greens => &[
                0xf7fcf5, 0xe5f5e0, 0xc7e9c0, 0xa1d99b, 0x74c476, 0x41ab5d, 0x238b45, 0x006d2c,
                0x00441b,
            ],
            Palette::Reds => &[
                0xfff5f0, 0xfee0d2, 0xfcbba1, 0xfc9272, 0xfb6a4a, 0xef3b2c, 0xcb181d, 0xa50f15,
                0x67000d,
            ],
            Palette::YlGnBu => &[
                0xffffd9, 0xedf8b1, 0xc7e9b4, 0x7fcdbb, 0x41b6c4, 0x1d91c0, 0x225ea8, 0x253494,
                0x081d58,
            ],
            Palette::Viridis => &[
                0x440154, 0x472c7a, 0x3b518b, 0x2c718e, 0x21908d, 0x27ad81, 0x5cc863, 0xaadc32,
                0xfde725,
            ],
            Palette::Plasma => &[
                0x0d0887, 0x46039f, 0x7201a8, 0x9c179e, 0xbd3786, 0xd8576b, 0xed7953, 0xfb9f3a,
                0xf0f921,
            ],
        }
    }
}

fn channels(hex: u32) -> [f64; 3] {
    [
        f64::from((hex >> 16) & 0xff),
        f64::from((hex >> 8) & 0xff),
        f64::from(hex & 0xff),
    ]
}

/// A palette, optionally reversed (`Blues_r`).
///
/// ```
/// use dapview::Colormap;
///
/// let cmap: Colormap = "blues_r".parse().unwrap();
/// assert!(cmap.reversed);
/// assert_eq!(cmap.to_string(), "Blues_r");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Colormap {
    pub palette: Palette,
    pub reversed: bool,
}

impl Default for Colormap {
    fn default() -> Self {
        Self {
            palette: Palette::Blues,
            reversed: false,
        }
    }
}

impl Colormap {
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            reversed: false,
        }
    }

    /// Colour at `t` in `[0, 1]`. Values outside are clamped, NaN is
    /// transparent.
    pub fn color(&self, t: f64) -> Rgba<u8> {
        if t.is_nan() {
            return Rgba([0, 0, 0, 0]);
        }
        let t = t.clamp(0.0, 1.0);
        let t = if self.reversed { 1.0 - t } else { t };

        let stops = self.palette.stops();
        let pos = t * (stops.len() - 1) as f64;
        let lower = (pos.floor() as usize).min(stops.len() - 2);
        let frac = pos - lower as f64;
        let (a, b) = (channels(stops[lower]), channels(stops[lower + 1]));
        let mix = |i: usize| (a[i] + (b[i] - a[i]) * frac).round() as u8;
        Rgba([mix(0), mix(1), mix(2), 255])
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.palette.name(),
            if self.reversed { "_r" } else { "" }
        )
    }
}

impl FromStr for Colormap {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, reversed) = match s.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (s, false),
        };
        Palette::ALL
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(base))
            .map(|&palette| Colormap { palette, reversed })
            .ok_or_else(|| RenderError::UnknownColormap(s.to_string()))
    }
}
