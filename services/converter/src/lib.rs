//! GeoFLOW to Zarr conversion job.
//!
//! A job is described by a JSON [`ConverterConfig`]; [`Converter::run`]
//! builds the layered mesh once and then streams every field file into the
//! output store.

pub mod config;
pub mod pipeline;

pub use config::{ConverterConfig, GridFiles, MissingFilePolicy, TimestepSelection};
pub use pipeline::{ConversionSummary, Converter};
