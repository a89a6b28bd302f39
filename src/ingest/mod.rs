// src/ingest/mod.rs
pub mod dexcom;
pub mod types;

pub use dexcom::{DexcomClient, Region};
pub use types::{Reading, ReadingSource, Trend};
