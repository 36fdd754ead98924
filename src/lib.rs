//! # Survey Geo
//!
//! Converts road-survey Excel workbooks into GIS layers.
//!
//! Field teams record road furniture (signs, lighting poles, guardrails, road
//! markings) in workbooks with loosely structured multi-row headers and
//! coordinates in whatever notation the surveyor happened to use. This crate
//! turns those sheets into georeferenced features.
//!
//! ## Features
//!
//! - **Header reconciliation**: locates the header block by its `NO` column,
//!   merges two-row headers and guarantees unique column names
//! - **Coordinate normalization**: decimal degrees, scaled integers
//!   (`-6448977` -> `-6.448977`), comma-grouped numbers and DMS strings,
//!   validated against Indonesian bounds
//! - **Geometry synthesis**: points, guardrail segments and marking point sets
//!   chosen per sheet
//! - **Image extraction**: pictures embedded in `.xlsx` cells are saved as PNG
//!   and linked from the features of the same row
//! - **Region partitioning**: optional administrative boundaries split the
//!   output per region
//! - **Outputs**: pretty-printed GeoJSON, ESRI Shapefile (`.shp/.shx/.dbf/.prj`)
//!   and a coordinate error log workbook
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::atomic::AtomicBool;
//! use survey_geo::batch::collect_inputs;
//! use survey_geo::batch::listener::TracingListener;
//! use survey_geo::batch::run_batch;
//! use survey_geo::config::Config;
//!
//! let inputs = collect_inputs(Path::new("survey")).unwrap();
//! let config = Config::default();
//! let report = run_batch(&inputs, Path::new("Conversion Result"), &config, &TracingListener, &AtomicBool::new(false)).unwrap();
//! println!("{}", report.summary());
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod helpers;
pub mod images;
pub mod output;
pub mod spreadsheet;
pub mod survey;
