//! Structural type inference over JSON query samples, with a TypeScript
//! declaration emitter on top.
pub mod cli;
pub mod codegen;
pub mod config;
pub mod error;
pub mod inference;
pub mod logging;
pub mod optimize;
pub mod registry;
pub mod sample;
pub mod types;

pub use codegen::{Codegen, CodegenOptions, SentinelLiterals};
pub use config::Settings;
pub use error::{CodegenError, ConfigError, InferenceError};
pub use inference::{Inference, InferenceConfig, infer_from_values, infer_query_results, infer_type_structure};
pub use registry::Registry;
pub use types::{Descriptor, Field, NodeId, SimpleKind, TypeId, TypeStructure};
