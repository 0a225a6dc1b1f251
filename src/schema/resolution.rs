//! Named type resolution.
//!
//! Parsed schemas refer to previously defined records, enums and fixed types
//! by name. Compilation inlines those references so the codec can walk the
//! tree directly; only references that would recurse into an enclosing
//! record stay `Named`, and are followed through the context at runtime.

use std::collections::HashMap;

use crate::error::SchemaError;
use crate::schema::{AvroSchema, FieldSchema, LogicalType, RecordSchema};

/// A registry of named types, keyed by fully qualified name.
#[derive(Debug, Clone, Default)]
pub struct SchemaResolutionContext {
    named_types: HashMap<String, AvroSchema>,
}

impl SchemaResolutionContext {
    /// Create a new empty resolution context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a named type from the context.
    pub fn get(&self, name: &str) -> Option<&AvroSchema> {
        self.named_types.get(name)
    }

    /// Check if a named type exists in the context.
    pub fn contains(&self, name: &str) -> bool {
        self.named_types.contains_key(name)
    }

    /// Number of registered named types.
    pub fn len(&self) -> usize {
        self.named_types.len()
    }

    /// Whether no named types are registered.
    pub fn is_empty(&self) -> bool {
        self.named_types.is_empty()
    }

    /// Iterate over all registered named types.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AvroSchema)> {
        self.named_types.iter()
    }

    /// Build a resolution context by extracting all named types from a schema.
    pub fn build_from_schema(schema: &AvroSchema) -> Self {
        let mut context = Self::new();
        context.extract_named_types(schema);
        context
    }

    fn extract_named_types(&mut self, schema: &AvroSchema) {
        match schema {
            AvroSchema::Record(record) => {
                self.named_types.insert(record.fullname(), schema.clone());
                for field in &record.fields {
                    self.extract_named_types(&field.schema);
                }
            }
            AvroSchema::Enum(enum_schema) => {
                self.named_types
                    .insert(enum_schema.fullname(), schema.clone());
            }
            AvroSchema::Fixed(fixed_schema) => {
                self.named_types
                    .insert(fixed_schema.fullname(), schema.clone());
            }
            AvroSchema::Array(inner) | AvroSchema::Map(inner) => {
                self.extract_named_types(inner);
            }
            AvroSchema::Union(variants) => {
                for variant in variants {
                    self.extract_named_types(variant);
                }
            }
            AvroSchema::Logical(logical) => {
                self.extract_named_types(&logical.base);
            }
            _ => {}
        }
    }

    /// Follow a `Named` reference to its definition.
    ///
    /// Any other schema is returned unchanged.
    pub fn resolve_ref<'a>(&'a self, schema: &'a AvroSchema) -> Result<&'a AvroSchema, SchemaError> {
        match schema {
            AvroSchema::Named(name) => self.get(name).ok_or_else(|| {
                SchemaError::InvalidSchema(format!("Unresolved named type reference: '{}'", name))
            }),
            other => Ok(other),
        }
    }

    /// Inline all `Named` references in a schema.
    ///
    /// A reference to a record that encloses it is kept as `Named`, since
    /// inlining it would never terminate.
    pub fn resolve(&self, schema: &AvroSchema) -> Result<AvroSchema, SchemaError> {
        self.resolve_with_path(schema, &mut Vec::new())
    }

    fn resolve_with_path(
        &self,
        schema: &AvroSchema,
        path: &mut Vec<String>,
    ) -> Result<AvroSchema, SchemaError> {
        match schema {
            AvroSchema::Named(name) => {
                if path.contains(name) {
                    return Ok(schema.clone());
                }

                let resolved = self.resolve_ref(schema)?;
                path.push(name.clone());
                let result = self.resolve_with_path(resolved, path);
                path.pop();
                result
            }
            AvroSchema::Record(record) => {
                path.push(record.fullname());

                let fields = record
                    .fields
                    .iter()
                    .map(|field| {
                        Ok(FieldSchema {
                            schema: self.resolve_with_path(&field.schema, path)?,
                            ..field.clone()
                        })
                    })
                    .collect::<Result<Vec<_>, SchemaError>>();

                path.pop();

                Ok(AvroSchema::Record(RecordSchema {
                    fields: fields?,
                    ..record.clone()
                }))
            }
            AvroSchema::Array(items) => Ok(AvroSchema::Array(Box::new(
                self.resolve_with_path(items, path)?,
            ))),
            AvroSchema::Map(values) => Ok(AvroSchema::Map(Box::new(
                self.resolve_with_path(values, path)?,
            ))),
            AvroSchema::Union(variants) => Ok(AvroSchema::Union(
                variants
                    .iter()
                    .map(|v| self.resolve_with_path(v, path))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            AvroSchema::Logical(logical) => Ok(AvroSchema::Logical(LogicalType::new(
                self.resolve_with_path(&logical.base, path)?,
                logical.logical_type,
            ))),
            _ => Ok(schema.clone()),
        }
    }
}

/// Inline all named references of a schema using the types it defines.
pub fn resolve_schema(schema: &AvroSchema) -> Result<AvroSchema, SchemaError> {
    let context = SchemaResolutionContext::build_from_schema(schema);
    context.resolve(schema)
}
