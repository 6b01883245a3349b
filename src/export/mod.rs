// Write-only exports: JSON roster snapshots and annotated frames.

pub mod frame;
pub mod snapshot;
