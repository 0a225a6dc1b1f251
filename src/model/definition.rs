//! Model definitions derived from Avro record schemas.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CodecError, SchemaCompilationError, SchemaError, UnknownAttributeError};
use crate::host::{AttributeType, CustomType, HostKind, HostValue, SchemaRole, UnionMember, UnionType};
use crate::logical::LogicalTypeCodec;
use crate::reader::HostProjection;
use crate::schema::{
    json_to_avro_value, AvroSchema, CompiledSchema, FieldSchema, LogicalTypeName, RecordSchema,
    SchemaCache, SchemaDefinition, SchemaResolutionContext,
};
use crate::union::UnionResolver;

/// One attribute of a model.
#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    /// Field name
    pub name: String,
    /// Declared type, used to pick union branches and custom serializers
    pub attribute_type: AttributeType,
    /// Whether an absent value is a validation failure
    pub required: bool,
    /// Initial value from the schema default
    pub default: Option<HostValue>,
}

/// The shape of a model: its schemas, field lists and attributes.
///
/// Built from a value schema and an optional key schema. Attributes are
/// the union of both schemas' fields; a field in both must have the same
/// type in each.
#[derive(Debug)]
pub struct ModelDefinition {
    name: String,
    value_schema: Arc<SchemaDefinition>,
    key_schema: Option<Arc<SchemaDefinition>>,
    value_fields: Vec<String>,
    key_fields: Vec<String>,
    attributes: Vec<AttributeDefinition>,
    index: HashMap<String, usize>,
    nested: HashMap<String, Arc<ModelDefinition>>,
}

impl ModelDefinition {
    /// Derive a model from its schemas.
    ///
    /// Every other record reachable from either schema gets a nested
    /// definition, available through [`ModelDefinition::nested_model`].
    ///
    /// # Errors
    /// Fails if a schema does not compile, is not a record, has a default
    /// that does not match its field, or if the key and value schemas
    /// disagree on a shared field.
    pub fn from_schemas(
        value: Arc<SchemaDefinition>,
        key: Option<Arc<SchemaDefinition>>,
        cache: &SchemaCache,
    ) -> Result<Self, CodecError> {
        let value_compiled = cache.compile(&value)?;
        let value_record = root_record(&value_compiled)?;

        let mut definition = Self::empty(value_record.fullname(), Arc::clone(&value));
        definition.value_fields = field_names(value_record);
        definition.add_fields(value_record, value_compiled.context(), &value_compiled)?;

        let mut contexts = vec![(Arc::clone(&value_compiled), value_record.fullname())];

        if let Some(key) = key {
            let key_compiled = cache.compile(&key)?;
            let key_record = root_record(&key_compiled)?;

            for field in &key_record.fields {
                if let Some(value_field) = value_record.field(&field.name) {
                    if value_field.schema != field.schema {
                        return Err(compilation_error(
                            &key_compiled,
                            SchemaError::IncompatibleSchemas(format!(
                                "Field '{}' has a different type in each schema: value {}, key {}",
                                field.name,
                                value_field.schema.type_name(),
                                field.schema.type_name()
                            )),
                        ));
                    }
                }
            }

            definition.key_fields = field_names(key_record);
            definition.add_fields(key_record, key_compiled.context(), &key_compiled)?;
            contexts.push((Arc::clone(&key_compiled), key_record.fullname()));
            definition.key_schema = Some(key);
        }

        for (compiled, root_name) in &contexts {
            for (fullname, schema) in compiled.context().iter() {
                let AvroSchema::Record(record) = schema else {
                    continue;
                };
                if fullname == root_name || definition.nested.contains_key(fullname) {
                    continue;
                }
                let nested = Self::nested(record, compiled)?;
                definition.nested.insert(fullname.clone(), Arc::new(nested));
            }
        }

        Ok(definition)
    }

    fn empty(name: String, value_schema: Arc<SchemaDefinition>) -> Self {
        Self {
            name,
            value_schema,
            key_schema: None,
            value_fields: Vec::new(),
            key_fields: Vec::new(),
            attributes: Vec::new(),
            index: HashMap::new(),
            nested: HashMap::new(),
        }
    }

    fn nested(record: &RecordSchema, compiled: &CompiledSchema) -> Result<Self, CodecError> {
        // named types declared elsewhere in the parent are inlined so the
        // nested schema compiles on its own
        let standalone = compiled
            .context()
            .resolve(&AvroSchema::Record(record.clone()))
            .map_err(|e| compilation_error(compiled, e))?;
        let schema = SchemaDefinition::new(standalone);
        let mut definition = Self::empty(record.fullname(), Arc::new(schema));
        definition.value_fields = field_names(record);
        definition.add_fields(record, compiled.context(), compiled)?;
        Ok(definition)
    }

    fn add_fields(
        &mut self,
        record: &RecordSchema,
        context: &SchemaResolutionContext,
        compiled: &CompiledSchema,
    ) -> Result<(), CodecError> {
        for field in &record.fields {
            if self.index.contains_key(&field.name) {
                continue;
            }
            let default = default_value(field, context).map_err(|e| compilation_error(compiled, e))?;
            self.index.insert(field.name.clone(), self.attributes.len());
            self.attributes.push(AttributeDefinition {
                name: field.name.clone(),
                attribute_type: attribute_type(&field.schema, context),
                required: is_required(&field.schema, context),
                default,
            });
        }
        Ok(())
    }

    /// Install a custom serializer for an attribute.
    pub fn with_custom_type(
        mut self,
        attribute: &str,
        custom: CustomType,
    ) -> Result<Self, UnknownAttributeError> {
        let index = self.attribute_index(attribute)?;
        self.attributes[index].attribute_type = AttributeType::Custom(custom);
        Ok(self)
    }

    pub(crate) fn attribute_index(&self, attribute: &str) -> Result<usize, UnknownAttributeError> {
        self.index
            .get(attribute)
            .copied()
            .ok_or_else(|| UnknownAttributeError {
                model: self.name.clone(),
                attribute: attribute.to_string(),
                allowed: self.attributes.iter().map(|a| a.name.clone()).collect(),
            })
    }

    /// Full name of the value record.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema definition for `role`.
    pub fn schema(&self, role: SchemaRole) -> Option<&Arc<SchemaDefinition>> {
        match role {
            SchemaRole::Value => Some(&self.value_schema),
            SchemaRole::Key => self.key_schema.as_ref(),
        }
    }

    /// Ordered field names of the `role` schema.
    pub fn fields(&self, role: SchemaRole) -> &[String] {
        match role {
            SchemaRole::Value => &self.value_fields,
            SchemaRole::Key => &self.key_fields,
        }
    }

    /// All attributes, value schema fields first.
    pub fn attributes(&self) -> &[AttributeDefinition] {
        &self.attributes
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.index.get(name).map(|i| &self.attributes[*i])
    }

    /// Definition of a nested record, by full name.
    pub fn nested_model(&self, fullname: &str) -> Option<&Arc<ModelDefinition>> {
        self.nested.get(fullname)
    }
}

fn root_record(compiled: &CompiledSchema) -> Result<&RecordSchema, CodecError> {
    compiled.record().ok_or_else(|| {
        compilation_error(
            compiled,
            SchemaError::UnsupportedType(format!(
                "Unsupported schema type '{}', only 'record' schemas are supported",
                compiled.root().type_name()
            )),
        )
    })
}

fn compilation_error(compiled: &CompiledSchema, source: SchemaError) -> CodecError {
    SchemaCompilationError {
        schema: compiled.text().to_string(),
        source,
    }
    .into()
}

fn field_names(record: &RecordSchema) -> Vec<String> {
    record.fields.iter().map(|f| f.name.clone()).collect()
}

fn is_required(schema: &AvroSchema, context: &SchemaResolutionContext) -> bool {
    match context.resolve_ref(schema) {
        Ok(AvroSchema::Null) => false,
        Ok(resolved) => !resolved.is_null_first_union(),
        Err(_) => true,
    }
}

fn default_value(
    field: &FieldSchema,
    context: &SchemaResolutionContext,
) -> Result<Option<HostValue>, SchemaError> {
    let Some(json) = &field.default else {
        return Ok(None);
    };
    let value = json_to_avro_value(json, &field.schema, context)?;
    let unions = UnionResolver::default();
    let logical = LogicalTypeCodec::default();
    HostProjection::new(context, &unions, &logical, true)
        .project(value, &field.schema)
        .map(Some)
        .map_err(|e| {
            SchemaError::InvalidSchema(format!("Default for field '{}': {}", field.name, e))
        })
}

/// Declared type for a schema node.
///
/// A union with a single non-null member is typed as that member. Records
/// stay plain values; their shape comes from nested definitions.
pub fn attribute_type(schema: &AvroSchema, context: &SchemaResolutionContext) -> AttributeType {
    let Ok(schema) = context.resolve_ref(schema) else {
        return AttributeType::value();
    };

    match schema {
        AvroSchema::Union(variants) => {
            let members: Vec<&AvroSchema> = variants
                .iter()
                .filter(|v| !matches!(v, AvroSchema::Null))
                .collect();
            if let [single] = members.as_slice() {
                return attribute_type(single, context);
            }
            AttributeType::Union(UnionType {
                nullable: matches!(variants.first(), Some(AvroSchema::Null)),
                members: members
                    .into_iter()
                    .map(|member| UnionMember {
                        kind: host_kind(member, context),
                        attribute_type: attribute_type(member, context),
                    })
                    .collect(),
            })
        }
        AvroSchema::Array(items) => AttributeType::array(attribute_type(items, context)),
        AvroSchema::Map(values) => AttributeType::map(attribute_type(values, context)),
        _ => AttributeType::value(),
    }
}

fn host_kind(schema: &AvroSchema, context: &SchemaResolutionContext) -> HostKind {
    let schema = match context.resolve_ref(schema) {
        Ok(resolved) => resolved,
        Err(_) => return unknown_record(schema),
    };

    match schema {
        AvroSchema::Boolean => HostKind::Boolean,
        AvroSchema::Int | AvroSchema::Long => HostKind::Int,
        AvroSchema::Float | AvroSchema::Double => HostKind::Float,
        AvroSchema::String => HostKind::String,
        AvroSchema::Bytes | AvroSchema::Fixed(_) => HostKind::Bytes,
        AvroSchema::Enum(_) => HostKind::Symbol,
        AvroSchema::Array(_) => HostKind::Array,
        AvroSchema::Map(_) => HostKind::Map,
        AvroSchema::Record(record) => HostKind::Record {
            name: record.fullname(),
            fields: record.fields.iter().map(|f| f.name.clone()).collect(),
        },
        AvroSchema::Logical(logical) => match logical.logical_type {
            LogicalTypeName::Date => HostKind::Date,
            LogicalTypeName::TimestampMillis | LogicalTypeName::TimestampMicros => {
                HostKind::Timestamp
            }
        },
        // Unions cannot nest and null is never a member kind
        AvroSchema::Union(_) | AvroSchema::Null | AvroSchema::Named(_) => unknown_record(schema),
    }
}

fn unknown_record(schema: &AvroSchema) -> HostKind {
    HostKind::Record {
        name: schema.type_name(),
        fields: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: &str = r#"{
        "type": "record",
        "name": "Order",
        "namespace": "com.acme",
        "fields": [
            {"name": "id", "type": "long"},
            {"name": "note", "type": ["null", "string"], "default": null},
            {"name": "amount", "type": ["null", "int", "double"]},
            {"name": "lines", "type": {"type": "array", "items": {
                "type": "record", "name": "Line", "fields": [
                    {"name": "sku", "type": "string"},
                    {"name": "qty", "type": "int", "default": 1}
                ]
            }}},
            {"name": "status", "type": {"type": "enum", "name": "Status", "symbols": ["NEW", "DONE"]}, "default": "NEW"}
        ]
    }"#;

    const ORDER_KEY: &str = r#"{
        "type": "record",
        "name": "OrderKey",
        "namespace": "com.acme",
        "fields": [
            {"name": "id", "type": "long"},
            {"name": "region", "type": "string"}
        ]
    }"#;

    fn order(key: Option<&str>) -> Result<ModelDefinition, CodecError> {
        ModelDefinition::from_schemas(
            Arc::new(SchemaDefinition::from_json(ORDER)),
            key.map(|k| Arc::new(SchemaDefinition::from_json(k))),
            &SchemaCache::new(),
        )
    }

    #[test]
    fn test_attributes_from_value_schema() {
        let definition = order(None).unwrap();
        assert_eq!(definition.name(), "com.acme.Order");
        assert_eq!(
            definition.fields(SchemaRole::Value),
            &["id", "note", "amount", "lines", "status"]
        );
        assert!(definition.fields(SchemaRole::Key).is_empty());
        assert!(definition.schema(SchemaRole::Key).is_none());

        assert!(definition.attribute("id").unwrap().required);
        assert!(!definition.attribute("note").unwrap().required);
        assert!(!definition.attribute("amount").unwrap().required);
        assert_eq!(
            definition.attribute("status").unwrap().default,
            Some(HostValue::Symbol("NEW".to_string()))
        );
        assert_eq!(definition.attribute("note").unwrap().default, Some(HostValue::Null));
    }

    #[test]
    fn test_type_factory() {
        let definition = order(None).unwrap();
        assert!(matches!(
            definition.attribute("note").unwrap().attribute_type,
            AttributeType::Plain(crate::host::PlainType::Value)
        ));
        let AttributeType::Union(union) = &definition.attribute("amount").unwrap().attribute_type
        else {
            panic!("expected union type");
        };
        assert!(union.nullable);
        assert_eq!(union.members.len(), 2);
        assert_eq!(union.members[0].kind, HostKind::Int);
        assert_eq!(union.members[1].kind, HostKind::Float);
        assert!(definition.attribute("lines").unwrap().attribute_type.items().is_some());
    }

    #[test]
    fn test_nested_definitions() {
        let definition = order(None).unwrap();
        let line = definition.nested_model("com.acme.Line").unwrap();
        assert_eq!(line.fields(SchemaRole::Value), &["sku", "qty"]);
        assert_eq!(line.attribute("qty").unwrap().default, Some(HostValue::Int(1)));
        assert!(definition.nested_model("com.acme.Order").is_none());
    }

    #[test]
    fn test_key_schema_attributes() {
        let definition = order(Some(ORDER_KEY)).unwrap();
        assert_eq!(definition.fields(SchemaRole::Key), &["id", "region"]);
        assert!(definition.attribute("region").is_some());
        assert_eq!(definition.attributes().len(), 6);
    }

    #[test]
    fn test_conflicting_key_field_rejected() {
        let key = r#"{"type": "record", "name": "K", "fields": [{"name": "id", "type": "string"}]}"#;
        let err = order(Some(key)).unwrap_err();
        assert!(err.to_string().contains("different type"));
    }

    #[test]
    fn test_non_record_schema_rejected() {
        let err = ModelDefinition::from_schemas(
            Arc::new(SchemaDefinition::from_json(r#""string""#)),
            None,
            &SchemaCache::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("only 'record' schemas"));
    }

    #[test]
    fn test_custom_type_unknown_attribute() {
        let err = order(None)
            .unwrap()
            .with_custom_type("missing", CustomType::new(|v, _| v.clone()))
            .unwrap_err();
        assert_eq!(err.attribute, "missing");
        assert!(err.allowed.contains(&"id".to_string()));
    }
}
