//! Batch relighting worker: ingests a directory of product photos, runs
//! them through the studio queue and writes the results to disk.

pub mod config;
pub mod export;
pub mod ingest;
