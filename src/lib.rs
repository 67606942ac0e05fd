// xarf-schema-tools/src/lib.rs

pub mod config;
pub mod definitions;
pub mod error;
pub mod files;
pub mod generator;
pub mod patcher;
pub mod report;
pub mod resolver;
pub mod validator;

pub use config::{ConfigManager, ToolConfig, Scope};
pub use definitions::{TypeDefinition, TypeEntry, TypeTable};
pub use error::{ConfigError, FileError, PatchError, SchemaError, ValidateError};
pub use generator::{Generator, GenerateReport};
pub use patcher::{Patcher, PatchReport};
pub use report::{BufferReporter, ConsoleReporter, Reporter, Status};
pub use resolver::RefResolver;
pub use validator::{SampleReport, ValidationSummary, ValidatorSettings};
