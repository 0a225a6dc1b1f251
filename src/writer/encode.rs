//! Validating Avro binary writer.
//!
//! Mirrors the decoder: every value is checked against its schema node before
//! it is written. Arrays and maps are written as a single counted block
//! followed by the zero terminator.

use crate::error::EncodeError;
use crate::reader::varint::{write_varint, write_zigzag};
use crate::schema::{AvroSchema, LogicalTypeName, SchemaResolutionContext};
use crate::value::AvroValue;
use crate::writer::path::AttributePath;

// ============================================================================
// Primitive Writers
// ============================================================================

/// Write a boolean as a single byte.
#[inline]
pub fn write_boolean(buf: &mut Vec<u8>, value: bool) {
    buf.push(u8::from(value));
}

/// Write an int or long as a zigzag varint.
#[inline]
pub fn write_long(buf: &mut Vec<u8>, value: i64) {
    write_zigzag(buf, value);
}

/// Write a float as 4 little-endian bytes.
#[inline]
pub fn write_float(buf: &mut Vec<u8>, value: f32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Write a double as 8 little-endian bytes.
#[inline]
pub fn write_double(buf: &mut Vec<u8>, value: f64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Write length-prefixed bytes.
#[inline]
pub fn write_bytes(buf: &mut Vec<u8>, value: &[u8]) {
    write_zigzag(buf, value.len() as i64);
    buf.extend_from_slice(value);
}

/// Write a length-prefixed UTF-8 string.
#[inline]
pub fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_bytes(buf, value.as_bytes());
}

// ============================================================================
// Schema-directed Encoding
// ============================================================================

/// Encode `value` as `schema`, appending to `buf`.
///
/// Fails without a partial guarantee on `buf` if the value does not conform;
/// callers discard the buffer on error.
pub fn encode_value(
    value: &AvroValue,
    schema: &AvroSchema,
    context: &SchemaResolutionContext,
    buf: &mut Vec<u8>,
    path: &AttributePath<'_>,
) -> Result<(), EncodeError> {
    let schema = context
        .resolve_ref(schema)
        .map_err(|_| EncodeError::UnresolvedName(schema.type_name()))?;

    match (schema, value) {
        (AvroSchema::Null, AvroValue::Null) => Ok(()),
        (AvroSchema::Boolean, AvroValue::Boolean(b)) => {
            write_boolean(buf, *b);
            Ok(())
        }
        (AvroSchema::Int, AvroValue::Int(i)) => {
            write_long(buf, i64::from(*i));
            Ok(())
        }
        (AvroSchema::Long, AvroValue::Long(l)) => {
            write_long(buf, *l);
            Ok(())
        }
        (AvroSchema::Float, AvroValue::Float(f)) => {
            write_float(buf, *f);
            Ok(())
        }
        (AvroSchema::Double, AvroValue::Double(d)) => {
            write_double(buf, *d);
            Ok(())
        }
        (AvroSchema::Bytes, AvroValue::Bytes(b)) => {
            write_bytes(buf, b);
            Ok(())
        }
        (AvroSchema::String, AvroValue::String(s)) => {
            write_string(buf, s);
            Ok(())
        }

        (AvroSchema::Record(record), AvroValue::Record(fields)) => {
            if fields.len() != record.fields.len() {
                return Err(mismatch(
                    path,
                    format!(
                        "record {} has {} fields, value has {}",
                        record.name,
                        record.fields.len(),
                        fields.len()
                    ),
                ));
            }
            for (field, (name, field_value)) in record.fields.iter().zip(fields) {
                let field_path = AttributePath::Field(path, &field.name);
                if *name != field.name {
                    return Err(mismatch(
                        &field_path,
                        format!("expected field '{}', found '{}'", field.name, name),
                    ));
                }
                encode_value(field_value, &field.schema, context, buf, &field_path)?;
            }
            Ok(())
        }

        (AvroSchema::Enum(enum_schema), AvroValue::Enum(index, symbol)) => {
            match enum_schema.symbol_index(symbol) {
                Some(expected) if i64::from(*index) == expected as i64 => {
                    write_long(buf, i64::from(*index));
                    Ok(())
                }
                _ => Err(EncodeError::UnknownSymbol {
                    path: path.to_string(),
                    symbol: symbol.clone(),
                }),
            }
        }

        (AvroSchema::Array(item_schema), AvroValue::Array(items)) => {
            if !items.is_empty() {
                write_long(buf, items.len() as i64);
                for (index, item) in items.iter().enumerate() {
                    encode_value(item, item_schema, context, buf, &AttributePath::Index(path, index))?;
                }
            }
            write_varint(buf, 0);
            Ok(())
        }

        (AvroSchema::Map(value_schema), AvroValue::Map(entries)) => {
            if !entries.is_empty() {
                write_long(buf, entries.len() as i64);
                for (key, entry) in entries {
                    write_string(buf, key);
                    encode_value(entry, value_schema, context, buf, &AttributePath::Key(path, key))?;
                }
            }
            write_varint(buf, 0);
            Ok(())
        }

        (AvroSchema::Union(variants), AvroValue::Union(index, inner)) => {
            let variant = usize::try_from(*index)
                .ok()
                .and_then(|i| variants.get(i))
                .ok_or_else(|| {
                    mismatch(
                        path,
                        format!("union branch {} out of range (0..{})", index, variants.len()),
                    )
                })?;
            write_long(buf, i64::from(*index));
            encode_value(inner, variant, context, buf, path)
        }

        (AvroSchema::Fixed(fixed), AvroValue::Fixed(bytes)) => {
            if bytes.len() != fixed.size {
                return Err(mismatch(
                    path,
                    format!(
                        "fixed {} needs {} bytes, value has {}",
                        fixed.name,
                        fixed.size,
                        bytes.len()
                    ),
                ));
            }
            buf.extend_from_slice(bytes);
            Ok(())
        }

        (AvroSchema::Logical(logical), value) => match (logical.logical_type, value) {
            (LogicalTypeName::Date, AvroValue::Date(days)) => {
                write_long(buf, i64::from(*days));
                Ok(())
            }
            (LogicalTypeName::TimestampMillis, AvroValue::TimestampMillis(units))
            | (LogicalTypeName::TimestampMicros, AvroValue::TimestampMicros(units)) => {
                write_long(buf, *units);
                Ok(())
            }
            // A plain physical value is accepted for the logical type
            _ => encode_value(value, &logical.base, context, buf, path),
        },

        (schema, value) => Err(mismatch(
            path,
            format!("expected {}, found {}", schema.type_name(), value.kind()),
        )),
    }
}

fn mismatch(path: &AttributePath<'_>, message: String) -> EncodeError {
    EncodeError::TypeMismatch {
        path: path.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::decode::decode_value;
    use crate::schema::{parse_schema, EnumSchema};

    fn encode(value: &AvroValue, schema: &AvroSchema) -> Result<Vec<u8>, EncodeError> {
        let context = SchemaResolutionContext::build_from_schema(schema);
        let mut buf = Vec::new();
        encode_value(value, schema, &context, &mut buf, &AttributePath::Root)?;
        Ok(buf)
    }

    #[test]
    fn test_encode_primitives() {
        assert_eq!(encode(&AvroValue::Int(-1), &AvroSchema::Int).unwrap(), vec![0x01]);
        assert_eq!(encode(&AvroValue::Long(64), &AvroSchema::Long).unwrap(), vec![0x80, 0x01]);
        assert_eq!(encode(&AvroValue::Boolean(true), &AvroSchema::Boolean).unwrap(), vec![0x01]);
        assert_eq!(
            encode(&AvroValue::String("hi".to_string()), &AvroSchema::String).unwrap(),
            vec![0x04, b'h', b'i']
        );
        assert_eq!(
            encode(&AvroValue::Double(1.0), &AvroSchema::Double).unwrap(),
            1.0f64.to_le_bytes().to_vec()
        );
    }

    #[test]
    fn test_encode_array_single_block() {
        let schema = AvroSchema::Array(Box::new(AvroSchema::Int));
        let value = AvroValue::Array(vec![AvroValue::Int(1), AvroValue::Int(2)]);
        assert_eq!(encode(&value, &schema).unwrap(), vec![0x04, 0x02, 0x04, 0x00]);
        assert_eq!(encode(&AvroValue::Array(vec![]), &schema).unwrap(), vec![0x00]);
    }

    #[test]
    fn test_encode_map() {
        let schema = AvroSchema::Map(Box::new(AvroSchema::Boolean));
        let value = AvroValue::Map(vec![("a".to_string(), AvroValue::Boolean(false))]);
        assert_eq!(
            encode(&value, &schema).unwrap(),
            vec![0x02, 0x02, b'a', 0x00, 0x00]
        );
    }

    #[test]
    fn test_encode_record_round_trips() {
        let schema = parse_schema(
            r#"{"type": "record", "name": "R", "fields": [
                {"name": "id", "type": "long"},
                {"name": "tag", "type": ["null", "string"]},
                {"name": "day", "type": {"type": "int", "logicalType": "date"}}
            ]}"#,
        )
        .unwrap();
        let value = AvroValue::Record(vec![
            ("id".to_string(), AvroValue::Long(7)),
            (
                "tag".to_string(),
                AvroValue::Union(1, Box::new(AvroValue::String("x".to_string()))),
            ),
            ("day".to_string(), AvroValue::Date(19723)),
        ]);

        let bytes = encode(&value, &schema).unwrap();
        let context = SchemaResolutionContext::build_from_schema(&schema);
        let mut cursor = bytes.as_slice();
        assert_eq!(decode_value(&mut cursor, &schema, &context).unwrap(), value);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_encode_rejects_mismatch_with_path() {
        let schema = parse_schema(
            r#"{"type": "record", "name": "R", "fields": [
                {"name": "items", "type": {"type": "array", "items": "int"}}
            ]}"#,
        )
        .unwrap();
        let value = AvroValue::Record(vec![(
            "items".to_string(),
            AvroValue::Array(vec![AvroValue::Int(1), AvroValue::String("x".to_string())]),
        )]);
        let err = encode(&value, &schema).unwrap_err();
        assert!(matches!(err, EncodeError::TypeMismatch { ref path, .. } if path == "items[1]"));
    }

    #[test]
    fn test_encode_rejects_unknown_symbol() {
        let schema = AvroSchema::Enum(EnumSchema::new("E", vec!["A".to_string()]));
        let err = encode(&AvroValue::Enum(0, "B".to_string()), &schema).unwrap_err();
        assert!(matches!(err, EncodeError::UnknownSymbol { .. }));
    }

    #[test]
    fn test_encode_rejects_bad_union_index() {
        let schema = AvroSchema::Union(vec![AvroSchema::Null, AvroSchema::Int]);
        let value = AvroValue::Union(2, Box::new(AvroValue::Int(1)));
        assert!(encode(&value, &schema).is_err());
    }
}
