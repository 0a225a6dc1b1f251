//! Generic Avro value tree.

use serde_json::{Map, Number, Value};

/// A schema-conformant Avro value.
///
/// This is the intermediate form between wire bytes and host values. Both
/// the decoder and the encoder produce a fresh tree per call.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroValue {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit signed integer
    Long(i64),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit floating point
    Double(f64),
    /// Byte array
    Bytes(Vec<u8>),
    /// UTF-8 string
    String(String),
    /// Record with named fields, in schema order
    Record(Vec<(String, AvroValue)>),
    /// Enum variant (index and symbol name)
    Enum(i32, String),
    /// Array of values
    Array(Vec<AvroValue>),
    /// Map with string keys, in encoded order
    Map(Vec<(String, AvroValue)>),
    /// Union variant (branch index and value)
    Union(i32, Box<AvroValue>),
    /// Fixed-size byte array
    Fixed(Vec<u8>),

    // Logical type values
    /// Date value (days since the epoch)
    Date(i32),
    /// Timestamp in milliseconds since Unix epoch
    TimestampMillis(i64),
    /// Timestamp in microseconds since Unix epoch
    TimestampMicros(i64),
}

impl AvroValue {
    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, AvroValue::Null)
    }

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&AvroValue> {
        match self {
            AvroValue::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Short name of the value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AvroValue::Null => "null",
            AvroValue::Boolean(_) => "boolean",
            AvroValue::Int(_) => "int",
            AvroValue::Long(_) => "long",
            AvroValue::Float(_) => "float",
            AvroValue::Double(_) => "double",
            AvroValue::Bytes(_) => "bytes",
            AvroValue::String(_) => "string",
            AvroValue::Record(_) => "record",
            AvroValue::Enum(..) => "enum",
            AvroValue::Array(_) => "array",
            AvroValue::Map(_) => "map",
            AvroValue::Union(..) => "union",
            AvroValue::Fixed(_) => "fixed",
            AvroValue::Date(_) => "date",
            AvroValue::TimestampMillis(_) => "timestamp-millis",
            AvroValue::TimestampMicros(_) => "timestamp-micros",
        }
    }

    /// Convert the value to JSON, mainly for logging and debugging.
    ///
    /// Bytes and fixed values become arrays of numbers, unions collapse to
    /// their inner value, and non-finite floats become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            AvroValue::Null => Value::Null,
            AvroValue::Boolean(b) => Value::Bool(*b),
            AvroValue::Int(i) | AvroValue::Date(i) => Value::Number((*i).into()),
            AvroValue::Long(l) | AvroValue::TimestampMillis(l) | AvroValue::TimestampMicros(l) => {
                Value::Number((*l).into())
            }
            AvroValue::Float(f) => float_json(*f as f64),
            AvroValue::Double(d) => float_json(*d),
            AvroValue::Bytes(b) | AvroValue::Fixed(b) => {
                Value::Array(b.iter().map(|byte| Value::Number((*byte).into())).collect())
            }
            AvroValue::String(s) | AvroValue::Enum(_, s) => Value::String(s.clone()),
            AvroValue::Record(fields) | AvroValue::Map(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            AvroValue::Array(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            AvroValue::Union(_, inner) => inner.to_json(),
        }
    }
}

fn float_json(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}
