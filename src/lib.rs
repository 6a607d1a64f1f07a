pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::config::{cli::LocalStorage, toml_config::TomlConfig};
pub use crate::core::{
    engine::ConversionEngine,
    pipeline::{convert_bytes, convert_str, GedcomPipeline},
};
pub use domain::settings::ConversionSettings;
pub use utils::error::{Ged2DotError, Result};
