//! Trend charts and dashboard reports over monitor viewer data.
//!
//! Rows come from a [`source::RowSource`]; [`trend`] turns them into
//! day-bucketed chart series and [`dashboard`] loads every panel at once.

pub mod config;
pub mod dashboard;
pub mod dates;
pub mod db;
pub mod error;
pub mod models;
pub mod progress;
pub mod report;
pub mod source;
pub mod trend;

pub use error::{Result, TrendError};
