//! Error types for the Avro model codec

use thiserror::Error;

use crate::host::SchemaRole;

/// Errors that can occur during schema operations
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Invalid schema format
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    /// Unsupported schema type
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
    /// Schema parsing error
    #[error("Parse error: {0}")]
    ParseError(String),
    /// Incompatible schema evolution
    #[error("Incompatible schemas: {0}")]
    IncompatibleSchemas(String),
}

/// A schema definition could not be compiled into a schema tree.
///
/// Schema text handed to the codec has normally been validated upstream,
/// so this indicates an internal inconsistency rather than bad user input.
#[derive(Debug, Error)]
#[error("Failed to compile Avro schema '{schema}': {source}")]
pub struct SchemaCompilationError {
    /// The offending schema text
    pub schema: String,
    /// The underlying parser or validation failure
    #[source]
    pub source: SchemaError,
}

/// Logical type conversion failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogicalTypeError {
    /// The value cannot be represented in the target physical or logical type
    #[error("Value {value} is out of range for logical type {logical_type}")]
    OutOfRange {
        logical_type: &'static str,
        value: String,
    },
    /// The host value has no conversion to the logical type
    #[error("Cannot convert {value} to logical type {logical_type}")]
    Unsupported {
        logical_type: &'static str,
        value: String,
    },
}

/// Errors that can occur during decoding
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Invalid Avro data
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// Unexpected end of data
    #[error("Unexpected end of data")]
    UnexpectedEof,
    /// Type mismatch
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    /// Invalid varint encoding
    #[error("Invalid varint encoding")]
    InvalidVarint,
    /// String is not valid UTF-8
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    /// Bytes left over after the value was decoded
    #[error("{0} trailing bytes after decoded value")]
    TrailingBytes(usize),
    /// Writer and reader schemas cannot be reconciled
    #[error("Schema resolution failed: {0}")]
    Resolution(#[from] SchemaError),
    /// Logical type conversion failed
    #[error("Logical type error: {0}")]
    LogicalType(#[from] LogicalTypeError),
}

/// Errors that can occur while building or writing a generic value
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The host value cannot be represented by the schema node
    #[error("Type mismatch at '{path}': {message}")]
    TypeMismatch { path: String, message: String },
    /// Enum symbol not declared by the schema
    #[error("Unknown enum symbol '{symbol}' at '{path}'")]
    UnknownSymbol { path: String, symbol: String },
    /// Record value carries an entry the schema does not declare
    #[error("Unknown field '{field}' at '{path}'")]
    UnknownField { path: String, field: String },
    /// Named type reference missing from the compiled schema
    #[error("Unresolved named type reference: '{0}'")]
    UnresolvedName(String),
    /// A field default could not be applied
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    /// Logical type conversion failed
    #[error("Logical type error at '{path}': {source}")]
    LogicalType {
        path: String,
        #[source]
        source: LogicalTypeError,
    },
}

/// A model cannot be serialized because its attributes are invalid
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Human-readable description
    pub message: String,
    /// Paths of all attributes that are missing
    pub missing_attributes: Vec<String>,
}

impl ValidationError {
    /// Create a new ValidationError
    pub fn new(message: impl Into<String>, missing_attributes: Vec<String>) -> Self {
        Self {
            message: message.into(),
            missing_attributes,
        }
    }

    /// Build the standard message for a model with missing attributes.
    pub fn missing(model_name: &str, missing_attributes: Vec<String>) -> Self {
        let message = format!(
            "{} cannot be serialized because the following attributes are nil: {}",
            model_name,
            missing_attributes.join(", ")
        );
        Self::new(message, missing_attributes)
    }
}

/// An attribute name that the model does not define
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Unexpected attribute for {model}: {attribute}. Only the following attributes are allowed: {}",
    .allowed.join(", ")
)]
pub struct UnknownAttributeError {
    /// Model name
    pub model: String,
    /// The rejected attribute
    pub attribute: String,
    /// Attributes the model defines
    pub allowed: Vec<String>,
}

/// Top-level codec error type
#[derive(Debug, Error)]
pub enum CodecError {
    /// Schema compilation error
    #[error(transparent)]
    Compilation(#[from] SchemaCompilationError),

    /// Decode error
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Encode error
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Model validation error
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Model attribute error
    #[error(transparent)]
    UnknownAttribute(#[from] UnknownAttributeError),

    /// The model has no schema for the requested role
    #[error("Model '{model}' has no {role} schema")]
    MissingSchema { model: String, role: SchemaRole },
}
