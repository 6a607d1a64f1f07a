pub mod builder;
pub mod emitter;
pub mod encoding;
pub mod engine;
pub mod parser;
pub mod pipeline;
pub mod selector;

pub use crate::domain::model::ConversionResult;
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
