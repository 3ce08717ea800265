pub mod config;
pub mod document;
pub mod error;
pub mod property;
pub mod registry;
pub mod schema;
pub mod store;
pub mod utils;
pub mod validation;
pub mod value;

pub use config::{Aggregation, Config, ConfigOverrides};
pub use document::Document;
pub use error::{ModelError, Result, ValidationError, ValidationKind, ValidatorError};
pub use property::{FieldDescriptor, FieldType, PropertyBuilder};
pub use registry::{Model, ModelRegistry};
pub use schema::{CompiledSchema, IndexSpec, ModelDefinition, SchemaOptions, Trigger, Virtual};
pub use store::{connect, DocumentStore, MemoryStore, SqliteStore, StoredDocument};
pub use value::{Bound, Value};
