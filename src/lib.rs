//! Avro binary codec for host data models
//!
//! This library converts between the Avro binary encoding and host model
//! objects. Schemas are compiled once per definition and cached on it;
//! decoding can resolve data written with a different schema; encoding
//! validates the model and reports every missing attribute at once.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use avro_model_codec::{Decoder, Encoder, Model, ModelDefinition, SchemaCache, SchemaDefinition, SchemaRole};
//!
//! let schema = Arc::new(SchemaDefinition::from_json(r#"{
//!     "type": "record",
//!     "name": "User",
//!     "fields": [{"name": "name", "type": "string"}]
//! }"#));
//! let definition = Arc::new(
//!     ModelDefinition::from_schemas(Arc::clone(&schema), None, &SchemaCache::new()).unwrap(),
//! );
//! let user = Model::new(definition).with("name", "ada").unwrap();
//!
//! let bytes = Encoder::default().encode(&user, SchemaRole::Value).unwrap();
//! let decoded = Decoder::default().decode(&bytes, &schema, &schema, false).unwrap();
//! assert_eq!(decoded.get("name"), Some(&"ada".into()));
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod logical;
pub mod model;
pub mod reader;
pub mod schema;
pub mod union;
pub mod value;
pub mod writer;

// Re-export main types
pub use config::CodecConfig;
pub use error::{
    CodecError, DecodeError, EncodeError, LogicalTypeError, SchemaCompilationError, SchemaError,
    UnknownAttributeError, ValidationError,
};
pub use host::{
    AttributeType, CustomType, HostKind, HostModel, HostValue, PlainType, SchemaRole, Serializer,
    UnionMember, UnionType,
};
pub use logical::LogicalTypeCodec;
pub use model::{AttributeDefinition, Model, ModelDefinition};
pub use reader::Decoder;
pub use schema::{
    parse_schema, AvroSchema, CompiledSchema, EnumSchema, FieldSchema, FixedSchema, LogicalType,
    LogicalTypeName, RecordSchema, SchemaCache, SchemaDefinition, SchemaSource,
};
pub use union::{default_union_wrapper, UnionDatum, UnionResolver, UnionWrapper};
pub use value::AvroValue;
pub use writer::Encoder;
