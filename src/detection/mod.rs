// Client for the remote face-detection service.

pub mod client;
pub mod error;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;
