// Load diagnostics — per-asset tracking and transfer timing aggregation.

pub mod assets;
pub mod timing;
