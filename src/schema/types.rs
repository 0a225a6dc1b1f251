//! The schema tree the codec walks.
//!
//! Named types (records, enums, fixed) carry their namespace; a reference to
//! one by name stays a [`AvroSchema::Named`] node until the compiled schema
//! inlines it. Only the `date`, `timestamp-millis` and `timestamp-micros`
//! logical types get their own node.

use serde_json::{json, Map, Value};

/// A node of an Avro schema.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroSchema {
    Null,
    Boolean,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    Float,
    Double,
    Bytes,
    String,
    Record(RecordSchema),
    Enum(EnumSchema),
    Array(Box<AvroSchema>),
    /// String-keyed map
    Map(Box<AvroSchema>),
    /// Branches in declaration order; null, when present, is first
    Union(Vec<AvroSchema>),
    Fixed(FixedSchema),
    /// Reference by full name. After compilation only recursive references
    /// remain.
    Named(String),
    /// A supported logical type over its physical base
    Logical(LogicalType),
}

fn qualified(namespace: &Option<String>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{}.{}", ns, name),
        None => name.to_string(),
    }
}

/// Start the JSON object of a named type: `type`, `name`, and the optional
/// `namespace`, `doc` and `aliases`.
fn named_json(
    kind: &str,
    name: &str,
    namespace: &Option<String>,
    doc: &Option<String>,
    aliases: &[String],
) -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert("type".to_string(), json!(kind));
    obj.insert("name".to_string(), json!(name));
    if let Some(ns) = namespace {
        obj.insert("namespace".to_string(), json!(ns));
    }
    if let Some(doc) = doc {
        obj.insert("doc".to_string(), json!(doc));
    }
    if !aliases.is_empty() {
        obj.insert("aliases".to_string(), json!(aliases));
    }
    obj
}

/// A record: a named, ordered list of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub fields: Vec<FieldSchema>,
    pub doc: Option<String>,
    /// Other names writers may have used for this record
    pub aliases: Vec<String>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            fields,
            doc: None,
            aliases: Vec::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// `namespace.name`, or just the name without a namespace.
    pub fn fullname(&self) -> String {
        qualified(&self.namespace, &self.name)
    }

    /// Find a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn to_json_value(&self) -> Value {
        let mut obj = named_json("record", &self.name, &self.namespace, &self.doc, &self.aliases);
        let fields = self.fields.iter().map(FieldSchema::to_json_value).collect();
        obj.insert("fields".to_string(), Value::Array(fields));
        Value::Object(obj)
    }
}

/// One field of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub schema: AvroSchema,
    /// Default as written in the schema JSON, used when a writer lacks the
    /// field and as the initial attribute value of a model
    pub default: Option<Value>,
    pub doc: Option<String>,
    pub aliases: Vec<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, schema: AvroSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            default: None,
            doc: None,
            aliases: Vec::new(),
        }
    }

    pub fn to_json_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".to_string(), json!(&self.name));
        obj.insert("type".to_string(), self.schema.to_json_value());
        if let Some(default) = &self.default {
            obj.insert("default".to_string(), default.clone());
        }
        if let Some(doc) = &self.doc {
            obj.insert("doc".to_string(), json!(doc));
        }
        if !self.aliases.is_empty() {
            obj.insert("aliases".to_string(), json!(&self.aliases));
        }
        Value::Object(obj)
    }
}

/// An enum and its symbols, in wire index order.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub symbols: Vec<String>,
    pub doc: Option<String>,
    pub aliases: Vec<String>,
    /// Symbol a reader falls back to for writer symbols it lacks
    pub default: Option<String>,
}

impl EnumSchema {
    pub fn new(name: impl Into<String>, symbols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            symbols,
            doc: None,
            aliases: Vec::new(),
            default: None,
        }
    }

    pub fn fullname(&self) -> String {
        qualified(&self.namespace, &self.name)
    }

    /// Wire index of `symbol`.
    pub fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    pub fn to_json_value(&self) -> Value {
        let mut obj = named_json("enum", &self.name, &self.namespace, &self.doc, &self.aliases);
        obj.insert("symbols".to_string(), json!(&self.symbols));
        if let Some(default) = &self.default {
            obj.insert("default".to_string(), json!(default));
        }
        Value::Object(obj)
    }
}

/// A named byte string of exactly `size` bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub size: usize,
    pub doc: Option<String>,
    pub aliases: Vec<String>,
}

impl FixedSchema {
    pub fn fullname(&self) -> String {
        qualified(&self.namespace, &self.name)
    }

    pub fn to_json_value(&self) -> Value {
        let mut obj = named_json("fixed", &self.name, &self.namespace, &self.doc, &self.aliases);
        obj.insert("size".to_string(), json!(self.size));
        Value::Object(obj)
    }
}

/// A logical type annotation over its physical base.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalType {
    pub base: Box<AvroSchema>,
    pub logical_type: LogicalTypeName,
}

impl LogicalType {
    pub fn new(base: AvroSchema, logical_type: LogicalTypeName) -> Self {
        Self {
            base: Box::new(base),
            logical_type,
        }
    }

    /// `{"type": <base>, "logicalType": <name>}`
    pub fn to_json_value(&self) -> Value {
        json!({
            "type": self.base.to_json_value(),
            "logicalType": self.logical_type.name(),
        })
    }
}

/// Logical types understood by the codec.
///
/// Any other `logicalType` annotation is ignored at parse time and the
/// node keeps its physical base type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalTypeName {
    /// Days since the configured epoch, over int
    Date,
    /// Milliseconds since the Unix epoch, over long
    TimestampMillis,
    /// Microseconds since the Unix epoch, over long
    TimestampMicros,
}

impl LogicalTypeName {
    /// The `logicalType` value in schema JSON.
    pub fn name(&self) -> &'static str {
        match self {
            LogicalTypeName::Date => "date",
            LogicalTypeName::TimestampMillis => "timestamp-millis",
            LogicalTypeName::TimestampMicros => "timestamp-micros",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "date" => Some(LogicalTypeName::Date),
            "timestamp-millis" => Some(LogicalTypeName::TimestampMillis),
            "timestamp-micros" => Some(LogicalTypeName::TimestampMicros),
            _ => None,
        }
    }

    /// The physical type this logical type must annotate.
    pub fn base_schema(&self) -> AvroSchema {
        match self {
            LogicalTypeName::Date => AvroSchema::Int,
            LogicalTypeName::TimestampMillis | LogicalTypeName::TimestampMicros => {
                AvroSchema::Long
            }
        }
    }
}

impl AvroSchema {
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            AvroSchema::Null
                | AvroSchema::Boolean
                | AvroSchema::Int
                | AvroSchema::Long
                | AvroSchema::Float
                | AvroSchema::Double
                | AvroSchema::Bytes
                | AvroSchema::String
        )
    }

    /// A union whose first branch is null: optional, or a nullable true
    /// union.
    pub fn is_null_first_union(&self) -> bool {
        matches!(self, AvroSchema::Union(variants) if matches!(variants.first(), Some(AvroSchema::Null)))
    }

    /// Strip a logical annotation, returning the physical schema.
    pub fn physical(&self) -> &AvroSchema {
        match self {
            AvroSchema::Logical(l) => &l.base,
            other => other,
        }
    }

    /// Short human-readable type name, used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            AvroSchema::Record(r) => format!("record<{}>", r.fullname()),
            AvroSchema::Enum(e) => format!("enum<{}>", e.fullname()),
            AvroSchema::Fixed(f) => format!("fixed<{}>", f.fullname()),
            AvroSchema::Array(items) => format!("array<{}>", items.type_name()),
            AvroSchema::Map(values) => format!("map<{}>", values.type_name()),
            AvroSchema::Union(variants) => {
                let names: Vec<String> = variants.iter().map(|v| v.type_name()).collect();
                format!("union[{}]", names.join(", "))
            }
            AvroSchema::Named(n) => n.clone(),
            AvroSchema::Logical(l) => l.logical_type.name().to_string(),
            primitive => primitive
                .to_json_value()
                .as_str()
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Render the schema as JSON text that parses back to an equal tree.
    ///
    /// # Example
    /// ```
    /// use avro_model_codec::schema::AvroSchema;
    ///
    /// let schema = AvroSchema::Union(vec![AvroSchema::Null, AvroSchema::String]);
    /// assert_eq!(schema.to_json(), r#"["null","string"]"#);
    /// ```
    pub fn to_json(&self) -> String {
        self.to_json_value().to_string()
    }

    pub fn to_json_value(&self) -> Value {
        match self {
            AvroSchema::Null => json!("null"),
            AvroSchema::Boolean => json!("boolean"),
            AvroSchema::Int => json!("int"),
            AvroSchema::Long => json!("long"),
            AvroSchema::Float => json!("float"),
            AvroSchema::Double => json!("double"),
            AvroSchema::Bytes => json!("bytes"),
            AvroSchema::String => json!("string"),
            AvroSchema::Record(r) => r.to_json_value(),
            AvroSchema::Enum(e) => e.to_json_value(),
            AvroSchema::Fixed(f) => f.to_json_value(),
            AvroSchema::Array(items) => json!({"type": "array", "items": items.to_json_value()}),
            AvroSchema::Map(values) => json!({"type": "map", "values": values.to_json_value()}),
            AvroSchema::Union(variants) => {
                Value::Array(variants.iter().map(AvroSchema::to_json_value).collect())
            }
            AvroSchema::Named(name) => json!(name),
            AvroSchema::Logical(lt) => lt.to_json_value(),
        }
    }
}
