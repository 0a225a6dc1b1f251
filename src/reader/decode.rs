//! Avro binary decoder for primitive and complex types.
//!
//! Binary layout:
//! - Varints use zigzag encoding for signed integers
//! - Floats and doubles are little-endian IEEE 754
//! - Bytes and strings are length-prefixed
//! - Arrays and maps are a series of counted blocks ending with a zero count
//!
//! Decoding validates as it goes: union branch and enum indexes must be in
//! range, strings must be UTF-8, and named references must resolve.

use crate::error::DecodeError;
use crate::reader::varint::{decode_varint, decode_zigzag, decode_zigzag_i32};
use crate::schema::{AvroSchema, EnumSchema, LogicalTypeName, SchemaResolutionContext};
use crate::value::AvroValue;

// ============================================================================
// Primitive Decoders
// ============================================================================

/// Decode a boolean value.
///
/// Avro booleans are encoded as a single byte: 0x00 for false, 0x01 for true.
#[inline]
pub fn decode_boolean(data: &mut &[u8]) -> Result<bool, DecodeError> {
    let (&byte, rest) = data.split_first().ok_or(DecodeError::UnexpectedEof)?;
    *data = rest;
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(DecodeError::InvalidData(format!(
            "Invalid boolean value: {}, expected 0 or 1",
            byte
        ))),
    }
}

/// Decode a 32-bit signed integer (zigzag varint encoded).
#[inline]
pub fn decode_int(data: &mut &[u8]) -> Result<i32, DecodeError> {
    decode_zigzag_i32(data)
}

/// Decode a 64-bit signed integer (zigzag varint encoded).
#[inline]
pub fn decode_long(data: &mut &[u8]) -> Result<i64, DecodeError> {
    decode_zigzag(data)
}

/// Decode a 32-bit IEEE 754 float (little-endian).
#[inline]
pub fn decode_float(data: &mut &[u8]) -> Result<f32, DecodeError> {
    let bytes = take::<4>(data)?;
    Ok(f32::from_le_bytes(bytes))
}

/// Decode a 64-bit IEEE 754 double (little-endian).
#[inline]
pub fn decode_double(data: &mut &[u8]) -> Result<f64, DecodeError> {
    let bytes = take::<8>(data)?;
    Ok(f64::from_le_bytes(bytes))
}

/// Decode a length-prefixed byte sequence.
pub fn decode_bytes(data: &mut &[u8]) -> Result<Vec<u8>, DecodeError> {
    let len = decode_length(data)?;
    decode_fixed(data, len)
}

/// Decode a length-prefixed UTF-8 string.
pub fn decode_string(data: &mut &[u8]) -> Result<String, DecodeError> {
    let bytes = decode_bytes(data)?;
    Ok(String::from_utf8(bytes)?)
}

/// Decode exactly `size` raw bytes.
pub fn decode_fixed(data: &mut &[u8], size: usize) -> Result<Vec<u8>, DecodeError> {
    if data.len() < size {
        return Err(DecodeError::UnexpectedEof);
    }
    let (bytes, rest) = data.split_at(size);
    *data = rest;
    Ok(bytes.to_vec())
}

/// Decode an enum value, returning its index and symbol.
pub fn decode_enum(data: &mut &[u8], schema: &EnumSchema) -> Result<(i32, String), DecodeError> {
    let index = decode_int(data)?;
    let symbol = usize::try_from(index)
        .ok()
        .and_then(|i| schema.symbols.get(i))
        .ok_or_else(|| {
            DecodeError::InvalidData(format!(
                "Enum index {} out of range for '{}' ({} symbols)",
                index,
                schema.name,
                schema.symbols.len()
            ))
        })?;
    Ok((index, symbol.clone()))
}

/// Decode a union branch index, checking it against the number of variants.
#[inline]
pub fn decode_union_index(data: &mut &[u8], num_variants: usize) -> Result<usize, DecodeError> {
    let index = decode_long(data)?;
    usize::try_from(index)
        .ok()
        .filter(|i| *i < num_variants)
        .ok_or_else(|| {
            DecodeError::InvalidData(format!(
                "Union index {} out of range (0..{})",
                index, num_variants
            ))
        })
}

/// Items allowed in one array or map whose items take no bytes on the wire.
pub const DEFAULT_MAX_BLOCK_ITEMS: usize = 1 << 20;

/// Decode the items of a block-encoded array or map.
///
/// Each block starts with a long count. A negative count is followed by the
/// block's byte size, which is ignored here. A zero count ends the sequence.
/// `item` is called once per item.
///
/// Counts are checked before any item is read: items need at least
/// `min_item_size` bytes each, so a count the remaining input cannot hold
/// is rejected. Items that take no bytes are capped at `max_items` over the
/// whole sequence.
pub fn decode_blocks<F>(
    data: &mut &[u8],
    min_item_size: usize,
    max_items: usize,
    mut item: F,
) -> Result<(), DecodeError>
where
    F: FnMut(&mut &[u8]) -> Result<(), DecodeError>,
{
    let mut total: u64 = 0;
    loop {
        let count = decode_long(data)?;
        if count == 0 {
            return Ok(());
        }

        let item_count = if count < 0 {
            let _byte_size = decode_long(data)?;
            count.unsigned_abs()
        } else {
            count as u64
        };
        total = total.saturating_add(item_count);
        check_block_count(data, item_count, total, min_item_size, max_items)?;

        for _ in 0..item_count {
            item(data)?;
        }
    }
}

fn check_block_count(
    data: &[u8],
    item_count: u64,
    total: u64,
    min_item_size: usize,
    max_items: usize,
) -> Result<(), DecodeError> {
    if min_item_size > 0 {
        let available = (data.len() / min_item_size) as u64;
        if item_count > available {
            return Err(DecodeError::InvalidData(format!(
                "Block of {} items needs at least {} bytes, only {} remain",
                item_count,
                item_count.saturating_mul(min_item_size as u64),
                data.len()
            )));
        }
    } else if total > max_items as u64 {
        return Err(DecodeError::InvalidData(format!(
            "Block item count {} exceeds the limit of {} for zero-size items",
            total, max_items
        )));
    }
    Ok(())
}

/// Fewest bytes any value of `schema` takes on the wire.
///
/// References back into an enclosing record count as zero.
pub fn min_encoded_size(schema: &AvroSchema, context: &SchemaResolutionContext) -> usize {
    min_size_with_path(schema, context, &mut Vec::new())
}

fn min_size_with_path<'a>(
    schema: &'a AvroSchema,
    context: &'a SchemaResolutionContext,
    path: &mut Vec<&'a str>,
) -> usize {
    match schema {
        AvroSchema::Null => 0,
        AvroSchema::Float => 4,
        AvroSchema::Double => 8,
        AvroSchema::Fixed(fixed) => fixed.size,
        AvroSchema::Boolean
        | AvroSchema::Int
        | AvroSchema::Long
        | AvroSchema::Bytes
        | AvroSchema::String
        | AvroSchema::Enum(_)
        | AvroSchema::Array(_)
        | AvroSchema::Map(_)
        | AvroSchema::Union(_) => 1,
        AvroSchema::Logical(logical) => min_size_with_path(&logical.base, context, path),
        AvroSchema::Record(record) => record
            .fields
            .iter()
            .map(|field| min_size_with_path(&field.schema, context, path))
            .fold(0usize, usize::saturating_add),
        AvroSchema::Named(name) => {
            if path.contains(&name.as_str()) {
                return 0;
            }
            match context.get(name) {
                Some(resolved) => {
                    path.push(name);
                    let size = min_size_with_path(resolved, context, path);
                    path.pop();
                    size
                }
                None => 0,
            }
        }
    }
}

#[inline]
fn take<const N: usize>(data: &mut &[u8]) -> Result<[u8; N], DecodeError> {
    if data.len() < N {
        return Err(DecodeError::UnexpectedEof);
    }
    let (head, rest) = data.split_at(N);
    *data = rest;
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    Ok(out)
}

fn decode_length(data: &mut &[u8]) -> Result<usize, DecodeError> {
    let len = decode_long(data)?;
    usize::try_from(len)
        .map_err(|_| DecodeError::InvalidData(format!("Negative length: {}", len)))
}

// ============================================================================
// Schema-directed Decoding
// ============================================================================

/// Decode any Avro value based on its schema.
///
/// `Named` references are looked up in `context`. Arrays and maps of
/// zero-size items are capped at [`DEFAULT_MAX_BLOCK_ITEMS`].
pub fn decode_value(
    data: &mut &[u8],
    schema: &AvroSchema,
    context: &SchemaResolutionContext,
) -> Result<AvroValue, DecodeError> {
    decode_value_bounded(data, schema, context, DEFAULT_MAX_BLOCK_ITEMS)
}

/// [`decode_value`] with an explicit cap on zero-size block items.
pub fn decode_value_bounded(
    data: &mut &[u8],
    schema: &AvroSchema,
    context: &SchemaResolutionContext,
    max_block_items: usize,
) -> Result<AvroValue, DecodeError> {
    let decode_nested = |data: &mut &[u8], schema: &AvroSchema| {
        decode_value_bounded(data, schema, context, max_block_items)
    };
    match schema {
        AvroSchema::Null => Ok(AvroValue::Null),
        AvroSchema::Boolean => Ok(AvroValue::Boolean(decode_boolean(data)?)),
        AvroSchema::Int => Ok(AvroValue::Int(decode_int(data)?)),
        AvroSchema::Long => Ok(AvroValue::Long(decode_long(data)?)),
        AvroSchema::Float => Ok(AvroValue::Float(decode_float(data)?)),
        AvroSchema::Double => Ok(AvroValue::Double(decode_double(data)?)),
        AvroSchema::Bytes => Ok(AvroValue::Bytes(decode_bytes(data)?)),
        AvroSchema::String => Ok(AvroValue::String(decode_string(data)?)),

        AvroSchema::Record(record) => {
            let mut fields = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                let value = decode_nested(data, &field.schema)?;
                fields.push((field.name.clone(), value));
            }
            Ok(AvroValue::Record(fields))
        }
        AvroSchema::Enum(enum_schema) => {
            let (index, symbol) = decode_enum(data, enum_schema)?;
            Ok(AvroValue::Enum(index, symbol))
        }
        AvroSchema::Array(item_schema) => {
            let mut items = Vec::new();
            let min_size = min_encoded_size(item_schema, context);
            decode_blocks(data, min_size, max_block_items, |data| {
                items.push(decode_nested(data, item_schema)?);
                Ok(())
            })?;
            Ok(AvroValue::Array(items))
        }
        AvroSchema::Map(value_schema) => {
            let mut entries = Vec::new();
            // every entry carries at least its key length
            decode_blocks(data, 1, max_block_items, |data| {
                let key = decode_string(data)?;
                let value = decode_nested(data, value_schema)?;
                entries.push((key, value));
                Ok(())
            })?;
            Ok(AvroValue::Map(entries))
        }
        AvroSchema::Union(variants) => {
            let index = decode_union_index(data, variants.len())?;
            let value = decode_nested(data, &variants[index])?;
            Ok(AvroValue::Union(index as i32, Box::new(value)))
        }
        AvroSchema::Fixed(fixed) => Ok(AvroValue::Fixed(decode_fixed(data, fixed.size)?)),

        AvroSchema::Named(_) => {
            let resolved = context.resolve_ref(schema)?;
            decode_nested(data, resolved)
        }

        AvroSchema::Logical(logical) => match logical.logical_type {
            LogicalTypeName::Date => Ok(AvroValue::Date(decode_int(data)?)),
            LogicalTypeName::TimestampMillis => Ok(AvroValue::TimestampMillis(decode_long(data)?)),
            LogicalTypeName::TimestampMicros => Ok(AvroValue::TimestampMicros(decode_long(data)?)),
        },
    }
}

// ============================================================================
// Skip Functions
// ============================================================================

/// Skip over a value without materializing it.
///
/// Used by the resolving decoder for writer fields the reader does not want.
/// Blocks that carry a byte size are skipped without walking their items.
pub fn skip_value(
    data: &mut &[u8],
    schema: &AvroSchema,
    context: &SchemaResolutionContext,
) -> Result<(), DecodeError> {
    match schema {
        AvroSchema::Null => Ok(()),
        AvroSchema::Boolean => skip_exact(data, 1),
        AvroSchema::Int | AvroSchema::Long | AvroSchema::Enum(_) => {
            decode_varint(data).map(|_| ())
        }
        AvroSchema::Float => skip_exact(data, 4),
        AvroSchema::Double => skip_exact(data, 8),
        AvroSchema::Bytes | AvroSchema::String => {
            let len = decode_length(data)?;
            skip_exact(data, len)
        }
        AvroSchema::Fixed(fixed) => skip_exact(data, fixed.size),
        AvroSchema::Record(record) => record
            .fields
            .iter()
            .try_for_each(|field| skip_value(data, &field.schema, context)),
        AvroSchema::Array(item_schema) => {
            let min_size = min_encoded_size(item_schema, context);
            skip_blocks(data, min_size, |data| skip_value(data, item_schema, context))
        }
        AvroSchema::Map(value_schema) => skip_blocks(data, 1, |data| {
            let len = decode_length(data)?;
            skip_exact(data, len)?;
            skip_value(data, value_schema, context)
        }),
        AvroSchema::Union(variants) => {
            let index = decode_union_index(data, variants.len())?;
            skip_value(data, &variants[index], context)
        }
        AvroSchema::Named(_) => {
            let resolved = context.resolve_ref(schema)?;
            skip_value(data, resolved, context)
        }
        AvroSchema::Logical(logical) => skip_value(data, &logical.base, context),
    }
}

fn skip_exact(data: &mut &[u8], len: usize) -> Result<(), DecodeError> {
    if data.len() < len {
        return Err(DecodeError::UnexpectedEof);
    }
    *data = &data[len..];
    Ok(())
}

fn skip_blocks<F>(data: &mut &[u8], min_item_size: usize, mut item: F) -> Result<(), DecodeError>
where
    F: FnMut(&mut &[u8]) -> Result<(), DecodeError>,
{
    let mut total: u64 = 0;
    loop {
        let count = decode_long(data)?;
        if count == 0 {
            return Ok(());
        }

        if count < 0 {
            let byte_size = decode_length(data)?;
            skip_exact(data, byte_size)?;
        } else {
            total = total.saturating_add(count as u64);
            check_block_count(data, count as u64, total, min_item_size, DEFAULT_MAX_BLOCK_ITEMS)?;
            for _ in 0..count {
                item(data)?;
            }
        }
    }
}
