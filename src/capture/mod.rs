// Frame sampling, encoding and the single-flight detection loop.

pub mod compress;
pub mod frame;
pub mod scheduler;
