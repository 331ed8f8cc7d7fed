pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::cli::LocalStorage;
#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use crate::core::{cleaner::Cleaner, etl::EtlEngine, pipeline::CovidPipeline};
pub use domain::model::{Table, Value};
pub use utils::error::{EtlError, Result};
