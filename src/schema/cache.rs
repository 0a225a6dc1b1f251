//! Compiled schema cache.
//!
//! A [`SchemaDefinition`] is the host's handle on a schema. The first time
//! the codec needs its tree, the text is rendered, parsed and resolved, and
//! the result is attached to the definition itself. Later lookups on the same
//! definition return the attached tree without parsing again. Strict and
//! permissive compilations are attached separately, so a definition first
//! compiled permissively is still checked by a strict cache. Definitions
//! own their compiled trees, so they are freed with them.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tracing::debug;

use crate::error::{SchemaCompilationError, SchemaError};
use crate::schema::{parse_schema_with_options, AvroSchema, RecordSchema, SchemaResolutionContext};

/// Anything that can render itself as Avro schema JSON.
pub trait SchemaSource: Send + Sync {
    /// The schema as JSON text.
    fn schema_json(&self) -> String;
}

impl SchemaSource for String {
    fn schema_json(&self) -> String {
        self.clone()
    }
}

impl SchemaSource for &'static str {
    fn schema_json(&self) -> String {
        (*self).to_string()
    }
}

impl SchemaSource for Value {
    fn schema_json(&self) -> String {
        self.to_string()
    }
}

impl SchemaSource for AvroSchema {
    fn schema_json(&self) -> String {
        self.to_json()
    }
}

/// A host schema definition with its lazily compiled tree.
pub struct SchemaDefinition {
    source: Box<dyn SchemaSource>,
    permissive: OnceLock<Arc<CompiledSchema>>,
    strict: OnceLock<Arc<CompiledSchema>>,
}

impl SchemaDefinition {
    /// Wrap a schema source. Nothing is parsed until first use.
    pub fn new(source: impl SchemaSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            permissive: OnceLock::new(),
            strict: OnceLock::new(),
        }
    }

    /// Shorthand for a definition backed by JSON text.
    pub fn from_json(json: impl Into<String>) -> Self {
        Self::new(json.into())
    }

    /// Whether a compiled tree is already attached.
    pub fn is_compiled(&self) -> bool {
        self.permissive.get().is_some() || self.strict.get().is_some()
    }

    fn slot(&self, strict: bool) -> &OnceLock<Arc<CompiledSchema>> {
        if strict {
            &self.strict
        } else {
            &self.permissive
        }
    }

    /// Render the schema text.
    pub fn schema_json(&self) -> String {
        self.source.schema_json()
    }
}

impl fmt::Debug for SchemaDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaDefinition")
            .field("compiled", &self.is_compiled())
            .finish_non_exhaustive()
    }
}

/// A parsed and resolved schema, ready for encoding and decoding.
#[derive(Debug)]
pub struct CompiledSchema {
    root: AvroSchema,
    context: SchemaResolutionContext,
    field_slots: HashMap<String, HashMap<String, usize>>,
    text: String,
}

impl CompiledSchema {
    fn compile(text: String, strict: bool) -> Result<Self, SchemaError> {
        let parsed = parse_schema_with_options(&text, strict)?;
        let context = SchemaResolutionContext::build_from_schema(&parsed);
        let root = context.resolve(&parsed)?;

        let mut field_slots = HashMap::new();
        for (fullname, schema) in context.iter() {
            if let AvroSchema::Record(record) = schema {
                let slots = record
                    .fields
                    .iter()
                    .enumerate()
                    .map(|(index, field)| (field.name.clone(), index))
                    .collect();
                field_slots.insert(fullname.clone(), slots);
            }
        }

        Ok(Self {
            root,
            context,
            field_slots,
            text,
        })
    }

    /// The root of the schema tree.
    pub fn root(&self) -> &AvroSchema {
        &self.root
    }

    /// Named types defined anywhere in the schema.
    pub fn context(&self) -> &SchemaResolutionContext {
        &self.context
    }

    /// Look up a named type by its full name.
    pub fn named(&self, fullname: &str) -> Option<&AvroSchema> {
        self.context.get(fullname)
    }

    /// Position of `field` within the record `record_fullname`.
    pub fn field_slot(&self, record_fullname: &str, field: &str) -> Option<usize> {
        self.field_slots.get(record_fullname)?.get(field).copied()
    }

    /// The root record, if the schema is a record.
    pub fn record(&self) -> Option<&RecordSchema> {
        match &self.root {
            AvroSchema::Record(record) => Some(record),
            _ => None,
        }
    }

    /// The schema text this tree was compiled from.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Compiles schema definitions once and hands out the shared tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaCache {
    strict: bool,
}

impl SchemaCache {
    /// Create a cache using permissive schema parsing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether schema rule violations fail compilation.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Get the compiled tree for `definition`, compiling it on first use
    /// with this cache's strictness.
    ///
    /// Racing first calls may both compile; only the first result is kept
    /// and every caller gets that one.
    pub fn compile(
        &self,
        definition: &SchemaDefinition,
    ) -> Result<Arc<CompiledSchema>, SchemaCompilationError> {
        let slot = definition.slot(self.strict);
        if let Some(compiled) = slot.get() {
            return Ok(Arc::clone(compiled));
        }

        let text = definition.schema_json();
        let compiled = CompiledSchema::compile(text.clone(), self.strict)
            .map_err(|source| SchemaCompilationError { schema: text, source })?;
        debug!(
            root = %compiled.root.type_name(),
            named_types = compiled.context.len(),
            strict = self.strict,
            "Compiled schema on cache miss"
        );

        Ok(Arc::clone(
            slot.get_or_init(|| Arc::new(compiled)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PERSON: &str = r#"{
        "type": "record",
        "name": "Person",
        "namespace": "com.acme",
        "fields": [
            {"name": "name", "type": "string"},
            {"name": "age", "type": "int"}
        ]
    }"#;

    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    impl SchemaSource for CountingSource {
        fn schema_json(&self) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            PERSON.to_string()
        }
    }

    #[test]
    fn test_compile_is_cached_per_definition() {
        let calls = Arc::new(AtomicUsize::new(0));
        let definition = SchemaDefinition::new(CountingSource {
            calls: Arc::clone(&calls),
        });
        let cache = SchemaCache::new();

        assert!(!definition.is_compiled());
        let first = cache.compile(&definition).unwrap();
        let second = cache.compile(&definition).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(definition.is_compiled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_distinct_definitions_compile_separately() {
        let cache = SchemaCache::new();
        let a = SchemaDefinition::from_json(PERSON);
        let b = SchemaDefinition::from_json(PERSON);
        let first = cache.compile(&a).unwrap();
        let second = cache.compile(&b).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.root(), second.root());
    }

    #[test]
    fn test_field_slots() {
        let compiled = SchemaCache::new()
            .compile(&SchemaDefinition::from_json(PERSON))
            .unwrap();
        assert_eq!(compiled.field_slot("com.acme.Person", "name"), Some(0));
        assert_eq!(compiled.field_slot("com.acme.Person", "age"), Some(1));
        assert_eq!(compiled.field_slot("com.acme.Person", "email"), None);
        assert_eq!(compiled.record().map(|r| r.name.as_str()), Some("Person"));
        assert!(compiled.named("com.acme.Person").is_some());
    }

    #[test]
    fn test_json_value_source() {
        let definition = SchemaDefinition::new(serde_json::json!({
            "type": "array",
            "items": "long"
        }));
        let compiled = SchemaCache::new().compile(&definition).unwrap();
        assert_eq!(compiled.root(), &AvroSchema::Array(Box::new(AvroSchema::Long)));
    }

    #[test]
    fn test_compilation_error_carries_text() {
        let definition = SchemaDefinition::from_json(r#"{"type": "record"}"#);
        let err = SchemaCache::new().compile(&definition).unwrap_err();
        assert_eq!(err.schema, r#"{"type": "record"}"#);
        assert!(!definition.is_compiled());
    }

    #[test]
    fn test_null_after_first_branch_rejected() {
        let definition = SchemaDefinition::from_json(r#"["string", "null"]"#);
        assert!(SchemaCache::new().compile(&definition).is_err());
    }

    #[test]
    fn test_strict_cache_checks_permissively_compiled_definition() {
        let definition = SchemaDefinition::from_json(r#"["int", "int"]"#);
        assert!(SchemaCache::new().compile(&definition).is_ok());
        assert!(definition.is_compiled());

        let err = SchemaCache::new().with_strict(true).compile(&definition).unwrap_err();
        assert!(err.schema.contains("int"));
        assert!(SchemaCache::new().compile(&definition).is_ok());
    }
}
