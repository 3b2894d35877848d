//! Optional JSON settings file.
//!
//! ```json
//! { "rootName": "Row", "useTypeAlias": true, "maxDepth": 64,
//!   "literals": { "date": "string", "recordId": "string" }, "bottom": "unknown" }
//! ```
//!
//! Every key is optional; CLI flags win over file values.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::codegen::{CodegenOptions, SentinelLiterals};
use crate::error::ConfigError;
use crate::inference::InferenceConfig;
use crate::types::SimpleKind;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Settings {
    pub root_name: Option<String>,
    pub use_type_alias: Option<bool>,
    pub root_as_tuple: Option<bool>,
    pub max_depth: Option<usize>,
    /// Sentinel kind (`string`, `date`, `recordId`, ...) → literal.
    #[serde(default)]
    pub literals: BTreeMap<String, String>,
    pub bottom: Option<String>,
}

impl Settings {
    pub fn parse(src: &str) -> Result<Self, ConfigError> {
        from_str_with_path(src)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&src)
    }

    pub fn inference_config(&self) -> InferenceConfig {
        let mut config = InferenceConfig::default();
        if let Some(depth) = self.max_depth {
            config.max_depth = depth;
        }
        config
    }

    pub fn codegen_options(&self) -> Result<CodegenOptions, ConfigError> {
        let mut literals = SentinelLiterals::default();
        for (key, literal) in &self.literals {
            let kind = literal_kind(key).ok_or_else(|| ConfigError::Invalid {
                path: format!("literals.{key}"),
                message: format!("unknown sentinel kind `{key}`"),
            })?;
            literals.set(kind, literal.clone());
        }
        if let Some(bottom) = &self.bottom {
            literals.set_bottom(bottom.clone());
        }
        Ok(CodegenOptions {
            use_type_alias: self.use_type_alias.unwrap_or(false),
            root_as_tuple: self.root_as_tuple.unwrap_or(false),
            literals,
        })
    }
}

fn literal_kind(key: &str) -> Option<SimpleKind> {
    Some(match key {
        "string" => SimpleKind::String,
        "number" => SimpleKind::Number,
        "boolean" => SimpleKind::Boolean,
        "null" => SimpleKind::Null,
        "undefined" => SimpleKind::Undefined,
        "date" => SimpleKind::Date,
        "recordId" => SimpleKind::RecordId,
        "uuid" => SimpleKind::Uuid,
        _ => return None,
    })
}

/// Deserialize with JSON-path context in error messages.
fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, ConfigError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| ConfigError::Invalid {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}
