pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, FileConfig, ModelsConfig, PipelineConfig, Provider};
pub use error::StanceGraphError;
pub use types::*;
