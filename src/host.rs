//! Host-side values and the model interface the codec consumes.
//!
//! The host application owns its models. The codec only sees them through
//! [`HostModel`]: ordered field lists per role, attribute lookup, declared
//! attribute types and a validation entry point.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::ValidationError;
use crate::schema::SchemaDefinition;
use crate::union::UnionDatum;

/// Which of a model's two schemas to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaRole {
    /// The message key schema
    Key,
    /// The message value schema
    Value,
}

impl SchemaRole {
    /// Map the boundary's `is_value_role` flag to a role.
    pub fn from_is_value(is_value_role: bool) -> Self {
        if is_value_role {
            SchemaRole::Value
        } else {
            SchemaRole::Key
        }
    }
}

impl fmt::Display for SchemaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaRole::Key => write!(f, "key"),
            SchemaRole::Value => write!(f, "value"),
        }
    }
}

/// A host-visible value.
///
/// The decoder produces these from wire data and the encoder reads them
/// from model attributes.
#[derive(Debug, Clone)]
pub enum HostValue {
    /// Absent value
    Null,
    /// Boolean
    Boolean(bool),
    /// Any integer (int or long on the wire)
    Int(i64),
    /// Any floating point number (float or double on the wire)
    Float(f64),
    /// Text
    String(String),
    /// Raw bytes (bytes or fixed on the wire)
    Bytes(Vec<u8>),
    /// Enum symbol
    Symbol(String),
    /// Calendar date
    Date(NaiveDate),
    /// Point in time, in UTC
    Timestamp(DateTime<Utc>),
    /// Ordered list
    Array(Vec<HostValue>),
    /// String-keyed map, in encoded order
    Map(Vec<(String, HostValue)>),
    /// Name-keyed record mapping, as produced by the decoder
    Record(Vec<(String, HostValue)>),
    /// Nested host model
    Model(Arc<dyn HostModel>),
    /// Tagged member of a true union
    Union(UnionDatum),
}

impl HostValue {
    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// Look up a record entry by name.
    pub fn get(&self, name: &str) -> Option<&HostValue> {
        match self {
            HostValue::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// The kind of this value, used for union member matching.
    pub fn kind(&self) -> Option<HostKind> {
        Some(match self {
            HostValue::Null => return None,
            HostValue::Boolean(_) => HostKind::Boolean,
            HostValue::Int(_) => HostKind::Int,
            HostValue::Float(_) => HostKind::Float,
            HostValue::String(_) => HostKind::String,
            HostValue::Bytes(_) => HostKind::Bytes,
            HostValue::Symbol(_) => HostKind::Symbol,
            HostValue::Date(_) => HostKind::Date,
            HostValue::Timestamp(_) => HostKind::Timestamp,
            HostValue::Array(_) => HostKind::Array,
            HostValue::Map(_) => HostKind::Map,
            HostValue::Record(entries) => HostKind::Record {
                name: String::new(),
                fields: entries.iter().map(|(key, _)| key.clone()).collect(),
            },
            HostValue::Model(model) => HostKind::Record {
                name: model.model_name().to_string(),
                fields: model.field_names(SchemaRole::Value).to_vec(),
            },
            HostValue::Union(datum) => return datum.datum.kind(),
        })
    }

    /// Short description of the value's kind, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Boolean(_) => "boolean",
            HostValue::Int(_) => "integer",
            HostValue::Float(_) => "float",
            HostValue::String(_) => "string",
            HostValue::Bytes(_) => "bytes",
            HostValue::Symbol(_) => "symbol",
            HostValue::Date(_) => "date",
            HostValue::Timestamp(_) => "timestamp",
            HostValue::Array(_) => "array",
            HostValue::Map(_) => "map",
            HostValue::Record(_) => "record",
            HostValue::Model(_) => "model",
            HostValue::Union(_) => "union",
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        use HostValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (String(a), String(b)) | (Symbol(a), Symbol(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Map(a), Map(b)) | (Record(a), Record(b)) => a == b,
            (Model(a), Model(b)) => Arc::ptr_eq(a, b),
            (Union(a), Union(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Boolean(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Int(value.into())
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Int(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}

impl From<NaiveDate> for HostValue {
    fn from(value: NaiveDate) -> Self {
        HostValue::Date(value)
    }
}

impl From<DateTime<Utc>> for HostValue {
    fn from(value: DateTime<Utc>) -> Self {
        HostValue::Timestamp(value)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HostValue::Null, Into::into)
    }
}

/// Value classes a union member accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostKind {
    Boolean,
    Int,
    Float,
    String,
    Bytes,
    Symbol,
    Date,
    Timestamp,
    Array,
    Map,
    /// A record: its full name (empty for anonymous mappings) and the
    /// names of its fields
    Record { name: String, fields: Vec<String> },
}

impl HostKind {
    /// Whether `value` belongs to this kind.
    pub fn matches(&self, value: &HostValue) -> bool {
        match (self, value) {
            (HostKind::Record { name, .. }, HostValue::Model(model)) => {
                record_name_matches(name, model.model_name())
            }
            // a mapping belongs to the first record that has all of its keys
            (HostKind::Record { fields, .. }, HostValue::Record(entries)) => {
                entries.iter().all(|(key, _)| fields.contains(key))
            }
            (HostKind::Symbol, HostValue::String(_)) => true,
            (kind, value) => value.kind().as_ref() == Some(kind),
        }
    }
}

fn record_name_matches(declared: &str, actual: &str) -> bool {
    let short = |name: &str| name.rsplit('.').next().unwrap_or(name).to_string();
    declared == actual || short(declared) == short(actual)
}

/// Function mapping a rich host value to a schema-compatible one.
///
/// The boolean is true when called on the encode path.
pub type Serializer = Arc<dyn Fn(&HostValue, bool) -> HostValue + Send + Sync>;

/// Declared type of a model attribute.
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// A plain value, array, or map
    Plain(PlainType),
    /// A value with a custom serialization hook
    Custom(CustomType),
    /// A true union of member types
    Union(UnionType),
}

impl AttributeType {
    /// Shorthand for `Plain(PlainType::Value)`.
    pub fn value() -> Self {
        AttributeType::Plain(PlainType::Value)
    }

    /// Array of `items`.
    pub fn array(items: AttributeType) -> Self {
        AttributeType::Plain(PlainType::Array(Box::new(items)))
    }

    /// Map with `values`.
    pub fn map(values: AttributeType) -> Self {
        AttributeType::Plain(PlainType::Map(Box::new(values)))
    }

    /// Element type for arrays, if declared.
    pub fn items(&self) -> Option<&AttributeType> {
        match self {
            AttributeType::Plain(PlainType::Array(items)) => Some(items),
            AttributeType::Custom(custom) => custom.default_type.as_deref().and_then(Self::items),
            _ => None,
        }
    }

    /// Value type for maps, if declared.
    pub fn values(&self) -> Option<&AttributeType> {
        match self {
            AttributeType::Plain(PlainType::Map(values)) => Some(values),
            AttributeType::Custom(custom) => custom.default_type.as_deref().and_then(Self::values),
            _ => None,
        }
    }
}

/// Non-union attribute shapes.
#[derive(Debug, Clone)]
pub enum PlainType {
    /// Scalar, enum, fixed or nested record
    Value,
    /// Array of the inner type
    Array(Box<AttributeType>),
    /// Map with values of the inner type
    Map(Box<AttributeType>),
}

/// An attribute type with a custom serializer.
#[derive(Clone)]
pub struct CustomType {
    /// Serialization hook
    pub serializer: Serializer,
    /// Type of the serialized value, used for further encoding
    pub default_type: Option<Box<AttributeType>>,
}

impl CustomType {
    /// Create a custom type from a serializer function.
    pub fn new<F>(serializer: F) -> Self
    where
        F: Fn(&HostValue, bool) -> HostValue + Send + Sync + 'static,
    {
        Self {
            serializer: Arc::new(serializer),
            default_type: None,
        }
    }

    /// Set the type the serialized value is encoded as.
    pub fn with_default_type(mut self, default_type: AttributeType) -> Self {
        self.default_type = Some(Box::new(default_type));
        self
    }

    /// Run the serialization hook.
    pub fn serialize(&self, value: &HostValue, strict: bool) -> HostValue {
        (self.serializer)(value, strict)
    }
}

impl fmt::Debug for CustomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomType")
            .field("default_type", &self.default_type)
            .finish_non_exhaustive()
    }
}

/// One member of a union attribute type.
#[derive(Debug, Clone)]
pub struct UnionMember {
    /// Values this member accepts
    pub kind: HostKind,
    /// Declared type of the member, used when encoding its value
    pub attribute_type: AttributeType,
}

/// Declared type of a true union attribute.
///
/// Members are in schema order and exclude the null branch.
#[derive(Debug, Clone)]
pub struct UnionType {
    /// Whether the schema union starts with null
    pub nullable: bool,
    /// Non-null members in order
    pub members: Vec<UnionMember>,
}

impl UnionType {
    /// Find the member that accepts `value`.
    ///
    /// Exact kind matches win; an integer falls back to a float member.
    pub fn find_index(&self, value: &HostValue) -> Option<usize> {
        self.members
            .iter()
            .position(|m| m.kind.matches(value))
            .or_else(|| match value {
                HostValue::Int(_) => self.members.iter().position(|m| m.kind == HostKind::Float),
                _ => None,
            })
    }
}

/// A host model as seen by the encoder.
pub trait HostModel: fmt::Debug + Send + Sync {
    /// Name used in validation messages and union member matching.
    fn model_name(&self) -> &str;

    /// Schema definition for `role`, if the model has one.
    fn schema(&self, role: SchemaRole) -> Option<&SchemaDefinition>;

    /// Ordered field names to encode for `role`.
    fn field_names(&self, role: SchemaRole) -> &[String];

    /// Attribute value; `None` means absent.
    fn attribute(&self, name: &str) -> Option<&HostValue>;

    /// Declared type of an attribute.
    fn attribute_type(&self, name: &str) -> Option<&AttributeType>;

    /// Paths of all required attributes that are missing, recursively.
    fn missing_attributes(&self) -> Vec<String>;

    /// Fail with a `ValidationError` listing every missing attribute.
    fn validate(&self) -> Result<(), ValidationError> {
        let missing = self.missing_attributes();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::missing(self.model_name(), missing))
        }
    }
}
