pub mod cleaner;
pub mod etl;
pub mod loader;
pub mod pipeline;

pub use crate::domain::model::{Record, Table, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
