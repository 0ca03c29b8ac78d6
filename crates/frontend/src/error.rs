//! Browser binding errors

use thiserror::Error;
use wasm_bindgen::JsValue;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("No window available")]
    NoWindow,

    #[error("No document available")]
    NoDocument,

    /// A DOM call threw
    #[error("JavaScript error: {0}")]
    Js(String),

    #[error(transparent)]
    Session(#[from] keeper_core::SessionError),

    #[error("Configuration error: {0}")]
    Config(#[from] keeper_core::config::ConfigError),
}

impl From<JsValue> for FrontendError {
    fn from(value: JsValue) -> Self {
        Self::Js(
            value
                .as_string()
                .unwrap_or_else(|| format!("{value:?}")),
        )
    }
}

pub type Result<T> = std::result::Result<T, FrontendError>;
