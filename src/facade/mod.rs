mod database;
mod dml;
pub mod requests;
mod streams;
mod timeseries;

pub use database::WideColumnDB;
pub use dml::RangeScanner;
pub use requests::*;
