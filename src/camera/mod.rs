// Camera domain: acquisition, lifecycle, and the simulated backend.

pub mod backend;
pub mod controller;
pub mod dummy;
pub mod error;
pub mod types;
