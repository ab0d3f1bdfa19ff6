pub mod config;
pub mod error;
pub mod record;

pub use config::{AnalysisConfig, InitMethod};
pub use error::*;
pub use record::*;
