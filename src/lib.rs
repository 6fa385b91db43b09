//! Confold: Declarative Configuration Composition
//!
//! Resolves a root fragment's imports into an ordered fragment set, merges
//! their option assignments under per-option strategies, validates the result
//! against a schema and materializes a deterministic settings object.

pub mod cli;
pub mod config;
pub mod error;
pub mod fragment;
pub mod key;
pub mod logging;
pub mod materialize;
pub mod merge;
pub mod pipeline;
pub mod resolve;
pub mod schema;
pub mod validate;
pub mod value;

pub use error::{EngineError, ParseError, SchemaError};
pub use fragment::{Fragment, FragmentId, FragmentSource, FsLoader, MemorySource};
pub use key::OptionKey;
pub use materialize::ResolvedSettings;
pub use pipeline::{Pipeline, PipelineState};
pub use schema::Schema;
pub use value::OptionValue;
