//! Turning a slice into pixels: colormaps, the PNG figure and the
//! interactive viewer.

pub mod colormap;
pub mod error;
pub mod figure;
pub mod viewer;
