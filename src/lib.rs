//! Library crate for local-port-prober exposing reusable modules.
pub mod banner;
pub mod config;
pub mod error;
pub mod latest;
pub mod logging;
pub mod output;
pub mod ports;
pub mod prober;
pub mod scanner;
pub mod summary;
pub mod target;
pub mod types;

pub use error::{ProbeError, Result};
