// Turns detection outcomes into a replaceable overlay drawing.

pub mod raster;
pub mod renderer;
