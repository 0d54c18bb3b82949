// Main library entry point for Constable.

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ports;
pub mod rt;

pub use application::{expand_attribute, InstrumentedSource, TraceUsecase};
pub use domain::options::{OptionValue, TraceOptions, WatchSet};
pub use error::{Error, Result};
