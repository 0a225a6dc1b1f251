//! JSON schema parser for Avro schemas.
//!
//! Parses Avro schema JSON into the AvroSchema type hierarchy.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::SchemaError;
use crate::schema::{
    AvroSchema, EnumSchema, FieldSchema, FixedSchema, LogicalType, LogicalTypeName, RecordSchema,
};

/// Parse an Avro schema from a JSON string.
///
/// # Example
/// ```
/// use avro_model_codec::schema::parse_schema;
///
/// let schema = parse_schema(r#""string""#).unwrap();
/// ```
pub fn parse_schema(json: &str) -> Result<AvroSchema, SchemaError> {
    parse_schema_with_options(json, false)
}

/// Parse an Avro schema from a JSON string with validation options.
///
/// In strict mode, duplicate or nested union branches and names that break
/// the Avro naming rules are errors. In permissive mode they are logged at
/// `warn` level and parsing continues.
///
/// A union may only carry `null` as its first branch, in both modes.
///
/// # Example
/// ```
/// use avro_model_codec::schema::parse_schema_with_options;
///
/// // Permissive mode - warnings only
/// let schema = parse_schema_with_options(r#"["int", "int"]"#, false).unwrap();
///
/// // Strict mode - fails on duplicate types in union
/// let result = parse_schema_with_options(r#"["int", "int"]"#, true);
/// assert!(result.is_err());
/// ```
pub fn parse_schema_with_options(json: &str, strict: bool) -> Result<AvroSchema, SchemaError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| SchemaError::ParseError(format!("Invalid JSON: {}", e)))?;

    let mut parser = SchemaParser::new().with_strict(strict);
    parser.parse(&value)
}

/// Schema parser with named type resolution context.
///
/// Maintains a registry of named types (records, enums, fixed) for resolving
/// type references during parsing.
#[derive(Debug, Default)]
pub struct SchemaParser {
    /// Registry of named types by their fully qualified name
    named_types: HashMap<String, AvroSchema>,
    /// Current namespace for resolving unqualified names
    current_namespace: Option<String>,
    /// Whether to enforce strict schema validation
    strict_schema: bool,
}

/// Name and namespace of a named type after applying the enclosing namespace.
struct QualifiedName {
    name: String,
    namespace: Option<String>,
    fullname: String,
}

impl SchemaParser {
    /// Create a new SchemaParser with default settings (permissive mode).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to use strict schema validation.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict_schema = strict;
        self
    }

    /// Parse a JSON value into an AvroSchema.
    pub fn parse(&mut self, value: &Value) -> Result<AvroSchema, SchemaError> {
        match value {
            Value::String(s) => Ok(self.parse_string_schema(s)),
            Value::Object(obj) => self.parse_object_schema(obj),
            Value::Array(arr) => self.parse_union_schema(arr),
            _ => Err(SchemaError::InvalidSchema(format!(
                "Expected string, object, or array, found: {}",
                value
            ))),
        }
    }

    /// Get all registered named types.
    pub fn named_types(&self) -> &HashMap<String, AvroSchema> {
        &self.named_types
    }

    /// Parse a primitive type or named type reference from a string.
    fn parse_string_schema(&self, s: &str) -> AvroSchema {
        match primitive(s) {
            Some(schema) => schema,
            // May be defined later or refer to an enclosing record
            None => AvroSchema::Named(self.resolve_name(s)),
        }
    }

    /// Parse a complex type from a JSON object.
    fn parse_object_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let type_value = obj
            .get("type")
            .ok_or_else(|| SchemaError::InvalidSchema("Missing 'type' field".to_string()))?;

        let type_str = match type_value {
            Value::String(s) => s.as_str(),
            // {"type": {...}} or {"type": [...]} wraps another schema
            nested => {
                let inner = self.parse(nested)?;
                return Ok(self.maybe_wrap_logical(obj, inner));
            }
        };

        match type_str {
            "record" => self.parse_record_schema(obj),
            "enum" => self.parse_enum_schema(obj),
            "array" => self.parse_array_schema(obj),
            "map" => self.parse_map_schema(obj),
            "fixed" => self.parse_fixed_schema(obj),
            other => match primitive(other) {
                Some(base) => Ok(self.maybe_wrap_logical(obj, base)),
                None => {
                    let fullname = self.resolve_name(other);
                    if self.named_types.contains_key(&fullname) {
                        Ok(AvroSchema::Named(fullname))
                    } else {
                        Err(SchemaError::UnsupportedType(format!("Unknown type: {}", other)))
                    }
                }
            },
        }
    }

    /// Parse a union schema from a JSON array.
    fn parse_union_schema(&mut self, arr: &[Value]) -> Result<AvroSchema, SchemaError> {
        if arr.is_empty() {
            return Err(SchemaError::InvalidSchema(
                "Union schema cannot be empty".to_string(),
            ));
        }

        let variants = arr
            .iter()
            .map(|v| self.parse(v))
            .collect::<Result<Vec<_>, _>>()?;

        self.validate_union(&variants)?;

        Ok(AvroSchema::Union(variants))
    }

    /// Parse a record schema.
    fn parse_record_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let qualified = self.qualify(obj, "Record")?;

        // Nested types inherit the record's namespace
        let prev_namespace = self.current_namespace.clone();
        self.current_namespace = qualified.namespace.clone();

        // Register before parsing fields so recursive references resolve
        self.named_types.insert(
            qualified.fullname.clone(),
            AvroSchema::Named(qualified.fullname.clone()),
        );

        let fields_value = obj
            .get("fields")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                SchemaError::InvalidSchema("Record missing 'fields' array".to_string())
            });

        let fields = fields_value.and_then(|values| {
            values
                .iter()
                .map(|f| self.parse_field_schema(f))
                .collect::<Result<Vec<_>, _>>()
        });

        self.current_namespace = prev_namespace;

        let fields = fields?;
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::InvalidSchema(format!(
                    "Record '{}' has duplicate field '{}'",
                    qualified.fullname, field.name
                )));
            }
        }

        let record = RecordSchema {
            name: qualified.name,
            namespace: qualified.namespace,
            fields,
            doc: string_prop(obj, "doc"),
            aliases: aliases(obj),
        };

        let schema = AvroSchema::Record(record);
        self.named_types.insert(qualified.fullname, schema.clone());

        Ok(schema)
    }

    /// Parse a field schema within a record.
    fn parse_field_schema(&mut self, value: &Value) -> Result<FieldSchema, SchemaError> {
        let obj = value
            .as_object()
            .ok_or_else(|| SchemaError::InvalidSchema("Field must be an object".to_string()))?;

        let name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SchemaError::InvalidSchema("Field missing 'name'".to_string()))?
            .to_string();

        self.validate_name(&name, "Field")?;

        let type_value = obj
            .get("type")
            .ok_or_else(|| SchemaError::InvalidSchema("Field missing 'type'".to_string()))?;

        let mut schema = self.parse(type_value)?;

        // Shorthand: {"name": "d", "type": "int", "logicalType": "date"}
        if type_value.is_string() && schema.is_primitive() {
            schema = self.maybe_wrap_logical(obj, schema);
        }

        Ok(FieldSchema {
            name,
            schema,
            default: obj.get("default").cloned(),
            doc: string_prop(obj, "doc"),
            aliases: aliases(obj),
        })
    }

    /// Parse an enum schema.
    fn parse_enum_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let qualified = self.qualify(obj, "Enum")?;

        let symbols = obj
            .get("symbols")
            .and_then(|v| v.as_array())
            .ok_or_else(|| SchemaError::InvalidSchema("Enum missing 'symbols' array".to_string()))?
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect::<Vec<_>>();

        if symbols.is_empty() {
            return Err(SchemaError::InvalidSchema(
                "Enum must have at least one symbol".to_string(),
            ));
        }

        for symbol in &symbols {
            self.validate_name(symbol, "Enum symbol")?;
        }

        let default = string_prop(obj, "default");
        if let Some(default) = &default {
            if !symbols.contains(default) {
                return Err(SchemaError::InvalidSchema(format!(
                    "Enum '{}' default '{}' is not one of its symbols",
                    qualified.fullname, default
                )));
            }
        }

        let enum_schema = EnumSchema {
            name: qualified.name,
            namespace: qualified.namespace,
            symbols,
            doc: string_prop(obj, "doc"),
            aliases: aliases(obj),
            default,
        };

        let schema = AvroSchema::Enum(enum_schema);
        self.named_types.insert(qualified.fullname, schema.clone());

        Ok(schema)
    }

    /// Parse an array schema.
    fn parse_array_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let items = obj
            .get("items")
            .ok_or_else(|| SchemaError::InvalidSchema("Array missing 'items' field".to_string()))?;

        let item_schema = self.parse(items)?;
        Ok(AvroSchema::Array(Box::new(item_schema)))
    }

    /// Parse a map schema.
    fn parse_map_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let values = obj
            .get("values")
            .ok_or_else(|| SchemaError::InvalidSchema("Map missing 'values' field".to_string()))?;

        let value_schema = self.parse(values)?;
        Ok(AvroSchema::Map(Box::new(value_schema)))
    }

    /// Parse a fixed schema.
    fn parse_fixed_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let qualified = self.qualify(obj, "Fixed")?;

        let size = obj
            .get("size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| SchemaError::InvalidSchema("Fixed missing 'size' field".to_string()))?;

        let size = usize::try_from(size)
            .map_err(|_| SchemaError::InvalidSchema(format!("Fixed size {} too large", size)))?;

        let fixed_schema = FixedSchema {
            name: qualified.name,
            namespace: qualified.namespace,
            size,
            doc: string_prop(obj, "doc"),
            aliases: aliases(obj),
        };

        let schema = AvroSchema::Fixed(fixed_schema);
        self.named_types.insert(qualified.fullname, schema.clone());

        Ok(schema)
    }

    /// Wrap `base` in a logical type when the object carries a supported
    /// `logicalType` over the matching physical type.
    ///
    /// Unknown logical types, and known ones over the wrong physical type,
    /// are ignored and the base schema is returned unchanged.
    fn maybe_wrap_logical(&self, obj: &Map<String, Value>, base: AvroSchema) -> AvroSchema {
        let Some(name) = obj.get("logicalType").and_then(|v| v.as_str()) else {
            return base;
        };

        match LogicalTypeName::from_name(name) {
            Some(logical) if logical.base_schema() == base => {
                AvroSchema::Logical(LogicalType::new(base, logical))
            }
            Some(logical) => {
                warn!(
                    logical_type = logical.name(),
                    base = %base.type_name(),
                    "Ignoring logical type over unexpected base type"
                );
                base
            }
            None => base,
        }
    }

    /// Work out name, namespace and fullname of a named type definition.
    fn qualify(
        &self,
        obj: &Map<String, Value>,
        context: &str,
    ) -> Result<QualifiedName, SchemaError> {
        let raw = obj.get("name").and_then(|v| v.as_str()).ok_or_else(|| {
            SchemaError::InvalidSchema(format!("{} missing 'name' field", context))
        })?;

        let (explicit_ns, name) = match raw.rsplit_once('.') {
            Some((ns, short)) => (Some(ns.to_string()), short.to_string()),
            None => (string_prop(obj, "namespace"), raw.to_string()),
        };

        self.validate_name(&name, context)?;

        let namespace = explicit_ns
            .filter(|ns| !ns.is_empty())
            .or_else(|| self.current_namespace.clone());

        let fullname = match &namespace {
            Some(ns) => format!("{}.{}", ns, name),
            None => name.clone(),
        };

        Ok(QualifiedName {
            name,
            namespace,
            fullname,
        })
    }

    /// Resolve a type name to its fully qualified form.
    fn resolve_name(&self, name: &str) -> String {
        if name.contains('.') {
            name.to_string()
        } else if let Some(ns) = &self.current_namespace {
            let qualified = format!("{}.{}", ns, name);
            // Fall back to the bare name when only that was registered
            if !self.named_types.contains_key(&qualified) && self.named_types.contains_key(name) {
                name.to_string()
            } else {
                qualified
            }
        } else {
            name.to_string()
        }
    }

    /// Fail in strict mode, warn in permissive mode.
    fn violation(&self, msg: String) -> Result<(), SchemaError> {
        if self.strict_schema {
            Err(SchemaError::InvalidSchema(msg))
        } else {
            warn!("{}", msg);
            Ok(())
        }
    }

    /// Validate that a name follows Avro naming rules.
    ///
    /// Avro names must:
    /// - Start with [A-Za-z_]
    /// - Contain only [A-Za-z0-9_]
    fn validate_name(&self, name: &str, context: &str) -> Result<(), SchemaError> {
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return self.violation(format!("{} name cannot be empty", context));
        };

        if !first.is_ascii_alphabetic() && first != '_' {
            return self.violation(format!(
                "{} name '{}' must start with a letter or underscore",
                context, name
            ));
        }

        if let Some(ch) = chars.find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_') {
            return self.violation(format!(
                "{} name '{}' contains invalid character '{}'",
                context, name, ch
            ));
        }

        Ok(())
    }

    /// Validate union schema rules.
    ///
    /// `null` is only allowed as the first branch. Nested unions and
    /// duplicate branches are rule violations.
    fn validate_union(&self, variants: &[AvroSchema]) -> Result<(), SchemaError> {
        if let Some(pos) = variants
            .iter()
            .skip(1)
            .position(|v| matches!(v, AvroSchema::Null))
        {
            return Err(SchemaError::InvalidSchema(format!(
                "Union has null at position {}; null may only be the first branch",
                pos + 1
            )));
        }

        for (i, variant) in variants.iter().enumerate() {
            if matches!(variant, AvroSchema::Union(_)) {
                self.violation(format!(
                    "Union contains nested union at position {} (unions cannot be nested)",
                    i
                ))?;
            }
        }

        let mut seen_types = HashSet::new();
        for (i, variant) in variants.iter().enumerate() {
            let type_key = type_key(variant);
            if !seen_types.insert(type_key.clone()) {
                self.violation(format!(
                    "Union contains duplicate type '{}' at position {}",
                    type_key, i
                ))?;
            }
        }

        Ok(())
    }
}

fn primitive(name: &str) -> Option<AvroSchema> {
    match name {
        "null" => Some(AvroSchema::Null),
        "boolean" => Some(AvroSchema::Boolean),
        "int" => Some(AvroSchema::Int),
        "long" => Some(AvroSchema::Long),
        "float" => Some(AvroSchema::Float),
        "double" => Some(AvroSchema::Double),
        "bytes" => Some(AvroSchema::Bytes),
        "string" => Some(AvroSchema::String),
        _ => None,
    }
}

fn string_prop(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn aliases(obj: &Map<String, Value>) -> Vec<String> {
    obj.get("aliases")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Unique key for a schema type, for duplicate detection in unions.
fn type_key(schema: &AvroSchema) -> String {
    match schema {
        AvroSchema::Record(r) => format!("record:{}", r.fullname()),
        AvroSchema::Enum(e) => format!("enum:{}", e.fullname()),
        AvroSchema::Fixed(f) => format!("fixed:{}", f.fullname()),
        AvroSchema::Named(n) => format!("named:{}", n),
        AvroSchema::Array(_) => "array".to_string(),
        AvroSchema::Map(_) => "map".to_string(),
        AvroSchema::Union(_) => "union".to_string(),
        AvroSchema::Logical(lt) => type_key(&lt.base),
        other => other.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        assert_eq!(parse_schema(r#""null""#).unwrap(), AvroSchema::Null);
        assert_eq!(parse_schema(r#""long""#).unwrap(), AvroSchema::Long);
        assert_eq!(
            parse_schema(r#"{"type": "bytes"}"#).unwrap(),
            AvroSchema::Bytes
        );
    }

    #[test]
    fn test_parse_record_with_namespace() {
        let schema = parse_schema(
            r#"{
                "type": "record",
                "name": "User",
                "namespace": "com.example",
                "fields": [
                    {"name": "id", "type": "long"},
                    {"name": "address", "type": {
                        "type": "record",
                        "name": "Address",
                        "fields": [{"name": "city", "type": "string"}]
                    }}
                ]
            }"#,
        )
        .unwrap();

        let AvroSchema::Record(record) = schema else {
            panic!("expected record");
        };
        assert_eq!(record.fullname(), "com.example.User");
        let AvroSchema::Record(address) = &record.fields[1].schema else {
            panic!("expected nested record");
        };
        assert_eq!(address.fullname(), "com.example.Address");
    }

    #[test]
    fn test_parse_dotted_name() {
        let schema = parse_schema(
            r#"{"type": "fixed", "name": "org.acme.Hash", "size": 16}"#,
        )
        .unwrap();
        let AvroSchema::Fixed(fixed) = schema else {
            panic!("expected fixed");
        };
        assert_eq!(fixed.fullname(), "org.acme.Hash");
        assert_eq!(fixed.namespace.as_deref(), Some("org.acme"));
    }

    #[test]
    fn test_recursive_record_reference() {
        let schema = parse_schema(
            r#"{
                "type": "record",
                "name": "Node",
                "fields": [
                    {"name": "value", "type": "int"},
                    {"name": "next", "type": ["null", "Node"]}
                ]
            }"#,
        )
        .unwrap();

        let AvroSchema::Record(record) = schema else {
            panic!("expected record");
        };
        assert_eq!(
            record.fields[1].schema,
            AvroSchema::Union(vec![AvroSchema::Null, AvroSchema::Named("Node".to_string())])
        );
    }

    #[test]
    fn test_logical_types() {
        let date = parse_schema(r#"{"type": "int", "logicalType": "date"}"#).unwrap();
        assert!(matches!(
            date,
            AvroSchema::Logical(LogicalType { logical_type: LogicalTypeName::Date, .. })
        ));

        let micros =
            parse_schema(r#"{"type": "long", "logicalType": "timestamp-micros"}"#).unwrap();
        assert!(matches!(
            micros,
            AvroSchema::Logical(LogicalType {
                logical_type: LogicalTypeName::TimestampMicros,
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_logical_type_is_ignored() {
        let schema = parse_schema(r#"{"type": "string", "logicalType": "foobar"}"#).unwrap();
        assert_eq!(schema, AvroSchema::String);

        let decimal = parse_schema(
            r#"{"type": "bytes", "logicalType": "decimal", "precision": 4, "scale": 2}"#,
        )
        .unwrap();
        assert_eq!(decimal, AvroSchema::Bytes);
    }

    #[test]
    fn test_logical_type_over_wrong_base_is_ignored() {
        let schema = parse_schema(r#"{"type": "long", "logicalType": "date"}"#).unwrap();
        assert_eq!(schema, AvroSchema::Long);
    }

    #[test]
    fn test_field_level_logical_type_shorthand() {
        let schema = parse_schema(
            r#"{
                "type": "record",
                "name": "Event",
                "fields": [{"name": "created", "type": "int", "logicalType": "date"}]
            }"#,
        )
        .unwrap();

        let AvroSchema::Record(record) = schema else {
            panic!("expected record");
        };
        assert!(matches!(record.fields[0].schema, AvroSchema::Logical(_)));
    }

    #[test]
    fn test_null_must_be_first_union_branch() {
        assert!(parse_schema(r#"["null", "string"]"#).is_ok());

        let err = parse_schema(r#"["string", "null"]"#).unwrap_err();
        assert!(err.to_string().contains("first branch"));
    }

    #[test]
    fn test_strict_mode_rejects_duplicates() {
        assert!(parse_schema_with_options(r#"["int", "int"]"#, false).is_ok());
        assert!(parse_schema_with_options(r#"["int", "int"]"#, true).is_err());
    }

    #[test]
    fn test_strict_mode_rejects_bad_names() {
        let json = r#"{"type": "record", "name": "1bad", "fields": []}"#;
        assert!(parse_schema_with_options(json, false).is_ok());
        assert!(parse_schema_with_options(json, true).is_err());
    }

    #[test]
    fn test_enum_default_must_be_symbol() {
        let json = r#"{"type": "enum", "name": "Color", "symbols": ["RED"], "default": "BLUE"}"#;
        assert!(parse_schema(json).is_err());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let json = r#"{"type": "record", "name": "R", "fields": [
            {"name": "a", "type": "int"},
            {"name": "a", "type": "long"}
        ]}"#;
        assert!(parse_schema(json).is_err());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            parse_schema("{not json"),
            Err(SchemaError::ParseError(_))
        ));
    }
}
