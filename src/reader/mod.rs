//! Binary decoding into generic and host values.
//!
//! [`Decoder`] is the entry point: it compiles the reader and writer schema
//! definitions through the cache, decodes one value (resolving the writer's
//! layout when the two definitions differ), and projects the result into
//! host values.

pub mod decode;
mod project;
pub mod varint;

use std::sync::Arc;

use tracing::trace;

use crate::config::CodecConfig;
use crate::error::{CodecError, DecodeError};
use crate::host::HostValue;
use crate::logical::LogicalTypeCodec;
use crate::schema::{CompiledSchema, ResolvingDecoder, SchemaCache, SchemaDefinition};
use crate::union::UnionResolver;
use crate::value::AvroValue;

pub use decode::{
    decode_blocks, decode_boolean, decode_bytes, decode_double, decode_enum, decode_fixed,
    decode_float, decode_int, decode_long, decode_string, decode_union_index, decode_value,
    decode_value_bounded, min_encoded_size, skip_value, DEFAULT_MAX_BLOCK_ITEMS,
};
pub use project::HostProjection;
pub use varint::{decode_varint, decode_zigzag, encode_varint, encode_zigzag};

/// Decodes Avro binary data for host schema definitions.
#[derive(Debug, Clone)]
pub struct Decoder {
    cache: SchemaCache,
    unions: UnionResolver,
    logical: LogicalTypeCodec,
    max_block_items: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(&CodecConfig::default())
    }
}

impl Decoder {
    /// Create a decoder from a codec configuration.
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            cache: SchemaCache::new().with_strict(config.strict_schema),
            unions: UnionResolver::new(config.union_wrapper.clone()),
            logical: LogicalTypeCodec::new(config.epoch),
            max_block_items: config.max_block_items,
        }
    }

    /// Decode `bytes` written with `writer` into the generic value tree of
    /// `reader`.
    ///
    /// When both arguments are the same definition the data is decoded
    /// directly; otherwise the writer layout is resolved against the reader.
    /// The buffer must hold exactly one value.
    pub fn decode_value(
        &self,
        bytes: &[u8],
        reader: &SchemaDefinition,
        writer: &SchemaDefinition,
    ) -> Result<AvroValue, CodecError> {
        self.decode_compiled(bytes, reader, writer)
            .map(|(value, _)| value)
    }

    /// Decode `bytes` into host values shaped by `reader`.
    ///
    /// With `strict` set, true-union values come back bare instead of
    /// wrapped by the configured union wrapper.
    pub fn decode(
        &self,
        bytes: &[u8],
        reader: &SchemaDefinition,
        writer: &SchemaDefinition,
        strict: bool,
    ) -> Result<HostValue, CodecError> {
        let (value, reader_schema) = self.decode_compiled(bytes, reader, writer)?;
        let projection =
            HostProjection::new(reader_schema.context(), &self.unions, &self.logical, strict);
        Ok(projection.project(value, reader_schema.root())?)
    }

    fn decode_compiled(
        &self,
        bytes: &[u8],
        reader: &SchemaDefinition,
        writer: &SchemaDefinition,
    ) -> Result<(AvroValue, Arc<CompiledSchema>), CodecError> {
        let reader_schema = self.cache.compile(reader)?;
        let resolving = !std::ptr::eq(reader, writer);
        trace!(bytes = bytes.len(), resolving, "Decoding value");

        let mut cursor = bytes;
        let value = if resolving {
            let writer_schema = self.cache.compile(writer)?;
            let mut decoder =
                ResolvingDecoder::new(writer_schema.context(), reader_schema.context())
                    .with_max_block_items(self.max_block_items);
            decoder.decode(&mut cursor, writer_schema.root(), reader_schema.root())?
        } else {
            decode_value_bounded(
                &mut cursor,
                reader_schema.root(),
                reader_schema.context(),
                self.max_block_items,
            )?
        };

        if !cursor.is_empty() {
            return Err(DecodeError::TrailingBytes(cursor.len()).into());
        }
        Ok((value, reader_schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::union::UnionDatum;
    use chrono::NaiveDate;

    const WRITER: &str = r#"{
        "type": "record",
        "name": "Event",
        "fields": [
            {"name": "id", "type": "int"},
            {"name": "kind", "type": ["null", "string", "int"]},
            {"name": "note", "type": ["null", "string"]},
            {"name": "day", "type": {"type": "int", "logicalType": "date"}}
        ]
    }"#;

    fn event_bytes() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend(encode_zigzag(5)); // id
        data.extend(encode_zigzag(2)); // kind: branch 2 (int)
        data.extend(encode_zigzag(9));
        data.extend(encode_zigzag(0)); // note: null
        data.extend(encode_zigzag(19723)); // day
        data
    }

    #[test]
    fn test_decode_same_definition() {
        let schema = SchemaDefinition::from_json(WRITER);
        let value = Decoder::default()
            .decode(&event_bytes(), &schema, &schema, false)
            .unwrap();

        assert_eq!(value.get("id"), Some(&HostValue::Int(5)));
        assert_eq!(
            value.get("kind"),
            Some(&HostValue::Union(UnionDatum::new(1, HostValue::Int(9))))
        );
        assert_eq!(value.get("note"), Some(&HostValue::Null));
        assert_eq!(
            value.get("day"),
            Some(&HostValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()))
        );
    }

    #[test]
    fn test_decode_strict_unwraps_unions() {
        let schema = SchemaDefinition::from_json(WRITER);
        let value = Decoder::default()
            .decode(&event_bytes(), &schema, &schema, true)
            .unwrap();
        assert_eq!(value.get("kind"), Some(&HostValue::Int(9)));
    }

    #[test]
    fn test_decode_value_generic_tree() {
        let schema = SchemaDefinition::from_json(WRITER);
        let value = Decoder::default()
            .decode_value(&event_bytes(), &schema, &schema)
            .unwrap();
        assert_eq!(value.field("day"), Some(&AvroValue::Date(19723)));
    }

    #[test]
    fn test_decode_with_distinct_reader() {
        let writer = SchemaDefinition::from_json(WRITER);
        let reader = SchemaDefinition::from_json(
            r#"{
                "type": "record",
                "name": "Event",
                "fields": [
                    {"name": "day", "type": {"type": "int", "logicalType": "date"}},
                    {"name": "id", "type": "long"},
                    {"name": "source", "type": "string", "default": "unknown"}
                ]
            }"#,
        );

        let value = Decoder::default()
            .decode(&event_bytes(), &reader, &writer, false)
            .unwrap();
        assert_eq!(
            value,
            HostValue::Record(vec![
                (
                    "day".to_string(),
                    HostValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
                ),
                ("id".to_string(), HostValue::Int(5)),
                ("source".to_string(), HostValue::from("unknown")),
            ])
        );
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let schema = SchemaDefinition::from_json(WRITER);
        let mut data = event_bytes();
        data.push(0);
        let err = Decoder::default().decode(&data, &schema, &schema, false).unwrap_err();
        assert!(matches!(err, CodecError::Decode(DecodeError::TrailingBytes(1))));
    }

    #[test]
    fn test_truncated_input_fails() {
        let schema = SchemaDefinition::from_json(WRITER);
        let data = event_bytes();
        let err = Decoder::default()
            .decode(&data[..data.len() - 1], &schema, &schema, false)
            .unwrap_err();
        assert!(matches!(err, CodecError::Decode(DecodeError::UnexpectedEof)));
    }

    #[test]
    fn test_custom_union_wrapper() {
        let config = CodecConfig::new().with_union_wrapper(std::sync::Arc::new(|index: usize, value: HostValue| {
            HostValue::Array(vec![HostValue::Int(index as i64), value])
        }));
        let schema = SchemaDefinition::from_json(WRITER);
        let value = Decoder::new(&config)
            .decode(&event_bytes(), &schema, &schema, false)
            .unwrap();
        assert_eq!(
            value.get("kind"),
            Some(&HostValue::Array(vec![HostValue::Int(1), HostValue::Int(9)]))
        );
    }

    #[test]
    fn test_zero_size_items_capped_by_config() {
        let schema = SchemaDefinition::from_json(r#"{"type": "array", "items": "null"}"#);
        let mut data = encode_zigzag(20_000_000);
        data.push(0);

        let err = Decoder::default()
            .decode_value(&data, &schema, &schema)
            .unwrap_err();
        assert!(matches!(err, CodecError::Decode(DecodeError::InvalidData(_))));

        let mut small = encode_zigzag(3);
        small.push(0);
        let config = CodecConfig::new().with_max_block_items(2);
        let err = Decoder::new(&config)
            .decode_value(&small, &schema, &schema)
            .unwrap_err();
        assert!(matches!(err, CodecError::Decode(DecodeError::InvalidData(_))));

        let value = Decoder::default().decode_value(&small, &schema, &schema).unwrap();
        assert_eq!(value, AvroValue::Array(vec![AvroValue::Null; 3]));
    }

    #[test]
    fn test_resolving_decode_checks_block_counts() {
        let writer = SchemaDefinition::from_json(r#"{"type": "array", "items": "int"}"#);
        let reader = SchemaDefinition::from_json(r#"{"type": "array", "items": "long"}"#);
        let mut data = encode_zigzag(i64::MAX);
        data.push(0);

        let err = Decoder::default()
            .decode_value(&data, &reader, &writer)
            .unwrap_err();
        assert!(matches!(err, CodecError::Decode(DecodeError::InvalidData(_))));
    }
}
