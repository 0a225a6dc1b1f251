//! Avro schema types, parsing and compilation.
//!
//! This module defines the schema tree the codec walks, JSON parsing, named
//! type resolution, reader/writer schema resolution, and the cache that
//! attaches compiled trees to host schema definitions.

mod cache;
mod parser;
mod reader_writer_resolution;
mod resolution;
mod types;

pub use cache::{CompiledSchema, SchemaCache, SchemaDefinition, SchemaSource};
pub use parser::{parse_schema, parse_schema_with_options, SchemaParser};
pub use reader_writer_resolution::{
    apply_promotion, json_to_avro_value, ReaderWriterResolution, ResolvedField, ResolvingDecoder,
    TypePromotion,
};
pub use resolution::{resolve_schema, SchemaResolutionContext};
pub use types::*;
