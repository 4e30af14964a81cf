pub mod colormap;
pub mod figure;
pub mod plot;
pub mod text;
