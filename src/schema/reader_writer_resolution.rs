//! Schema resolution for reader/writer schema evolution.
//!
//! Bytes written with one schema are decoded into the shape of another
//! compatible schema, per the Avro resolution rules:
//! - record fields are matched by name or alias, reordered, skipped when the
//!   reader does not know them, and defaulted when the writer lacks them
//! - numeric promotions (int→long/float/double, long→float/double,
//!   float→double) and string↔bytes
//! - enum symbols are mapped by name, falling back to the reader's default
//! - union branches are matched on either side

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{DecodeError, SchemaError};
use crate::reader::decode::{
    decode_blocks, decode_enum, decode_fixed, decode_string, decode_union_index, decode_value,
    min_encoded_size, skip_value, DEFAULT_MAX_BLOCK_ITEMS,
};
use crate::schema::{
    AvroSchema, EnumSchema, FieldSchema, LogicalTypeName, RecordSchema, SchemaResolutionContext,
};
use crate::value::AvroValue;

/// A resolved field mapping from writer to reader schema.
#[derive(Debug, Clone)]
pub enum ResolvedField {
    /// Field exists in both schemas
    Present {
        /// Index of the field in the writer schema
        writer_index: usize,
    },
    /// Field missing in writer - use the reader's default
    Default {
        /// The default, already converted to the reader field's schema
        default_value: AvroValue,
    },
}

/// Type promotions supported by Avro schema resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypePromotion {
    /// int → long
    IntToLong,
    /// int → float
    IntToFloat,
    /// int → double
    IntToDouble,
    /// long → float
    LongToFloat,
    /// long → double
    LongToDouble,
    /// float → double
    FloatToDouble,
    /// string → bytes
    StringToBytes,
    /// bytes → string
    BytesToString,
}

impl TypePromotion {
    /// Determine the promotion needed between two primitive types.
    ///
    /// Returns `None` if the types are identical, `Some(promotion)` if a
    /// valid promotion exists, or an error if the types are incompatible.
    pub fn from_schemas(
        writer: &AvroSchema,
        reader: &AvroSchema,
    ) -> Result<Option<Self>, SchemaError> {
        match (writer.physical(), reader.physical()) {
            (AvroSchema::Null, AvroSchema::Null)
            | (AvroSchema::Boolean, AvroSchema::Boolean)
            | (AvroSchema::Int, AvroSchema::Int)
            | (AvroSchema::Long, AvroSchema::Long)
            | (AvroSchema::Float, AvroSchema::Float)
            | (AvroSchema::Double, AvroSchema::Double)
            | (AvroSchema::Bytes, AvroSchema::Bytes)
            | (AvroSchema::String, AvroSchema::String) => Ok(None),

            (AvroSchema::Int, AvroSchema::Long) => Ok(Some(TypePromotion::IntToLong)),
            (AvroSchema::Int, AvroSchema::Float) => Ok(Some(TypePromotion::IntToFloat)),
            (AvroSchema::Int, AvroSchema::Double) => Ok(Some(TypePromotion::IntToDouble)),
            (AvroSchema::Long, AvroSchema::Float) => Ok(Some(TypePromotion::LongToFloat)),
            (AvroSchema::Long, AvroSchema::Double) => Ok(Some(TypePromotion::LongToDouble)),
            (AvroSchema::Float, AvroSchema::Double) => Ok(Some(TypePromotion::FloatToDouble)),
            (AvroSchema::String, AvroSchema::Bytes) => Ok(Some(TypePromotion::StringToBytes)),
            (AvroSchema::Bytes, AvroSchema::String) => Ok(Some(TypePromotion::BytesToString)),

            (w, r) => Err(SchemaError::IncompatibleSchemas(format!(
                "Cannot promote {} to {}",
                w.type_name(),
                r.type_name()
            ))),
        }
    }
}

/// Field mapping between one writer record and one reader record.
#[derive(Debug, Clone)]
pub struct ReaderWriterResolution {
    /// The writer record schema
    pub writer_schema: RecordSchema,
    /// The reader record schema
    pub reader_schema: RecordSchema,
    /// Resolved field mappings in reader schema order
    pub resolved_fields: Vec<ResolvedField>,
    /// For each writer field, the reader field it feeds, if any
    pub writer_to_reader: Vec<Option<usize>>,
}

impl ReaderWriterResolution {
    /// Build the field mapping between a writer and a reader record.
    ///
    /// Reader fields absent from the writer must declare a default, which
    /// is converted here once.
    pub fn new(
        writer_schema: &RecordSchema,
        reader_schema: &RecordSchema,
        reader_context: &SchemaResolutionContext,
    ) -> Result<Self, SchemaError> {
        if !record_names_match(writer_schema, reader_schema) {
            return Err(SchemaError::IncompatibleSchemas(format!(
                "Writer record '{}' does not match reader record '{}'",
                writer_schema.fullname(),
                reader_schema.fullname()
            )));
        }

        let writer_fields_by_name: HashMap<&str, usize> = writer_schema
            .fields
            .iter()
            .enumerate()
            .flat_map(|(idx, field)| {
                std::iter::once((field.name.as_str(), idx))
                    .chain(field.aliases.iter().map(move |a| (a.as_str(), idx)))
            })
            .collect();

        let mut resolved_fields = Vec::with_capacity(reader_schema.fields.len());
        let mut writer_to_reader = vec![None; writer_schema.fields.len()];
        let mut used_writer_indices = HashSet::new();

        for (reader_index, reader_field) in reader_schema.fields.iter().enumerate() {
            match find_matching_writer_field(reader_field, &writer_fields_by_name) {
                Some(writer_index) if used_writer_indices.insert(writer_index) => {
                    writer_to_reader[writer_index] = Some(reader_index);
                    resolved_fields.push(ResolvedField::Present { writer_index });
                }
                _ => {
                    let default = reader_field.default.as_ref().ok_or_else(|| {
                        SchemaError::IncompatibleSchemas(format!(
                            "Reader field '{}' not in writer schema and has no default",
                            reader_field.name
                        ))
                    })?;
                    let default_value =
                        json_to_avro_value(default, &reader_field.schema, reader_context)?;
                    resolved_fields.push(ResolvedField::Default { default_value });
                }
            }
        }

        Ok(Self {
            writer_schema: writer_schema.clone(),
            reader_schema: reader_schema.clone(),
            resolved_fields,
            writer_to_reader,
        })
    }

    /// Check if any default values are needed.
    pub fn needs_defaults(&self) -> bool {
        self.resolved_fields
            .iter()
            .any(|f| matches!(f, ResolvedField::Default { .. }))
    }

    /// Writer fields that the reader does not consume.
    pub fn skipped_writer_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.writer_schema
            .fields
            .iter()
            .zip(&self.writer_to_reader)
            .filter(|(_, target)| target.is_none())
            .map(|(field, _)| field)
    }
}

fn find_matching_writer_field(
    reader_field: &FieldSchema,
    writer_fields: &HashMap<&str, usize>,
) -> Option<usize> {
    std::iter::once(reader_field.name.as_str())
        .chain(reader_field.aliases.iter().map(String::as_str))
        .find_map(|name| writer_fields.get(name).copied())
}

fn short_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn names_match(writer_name: &str, reader_name: &str, reader_aliases: &[String]) -> bool {
    short_name(writer_name) == short_name(reader_name)
        || reader_aliases
            .iter()
            .any(|alias| alias == writer_name || short_name(alias) == short_name(writer_name))
}

fn record_names_match(writer: &RecordSchema, reader: &RecordSchema) -> bool {
    names_match(&writer.fullname(), &reader.fullname(), &reader.aliases)
}

/// Decoder that reads writer-schema bytes in the shape of a reader schema.
///
/// Record field mappings are computed on first use and reused for the rest
/// of the decode, which keeps recursive and repeated records cheap.
pub struct ResolvingDecoder<'a> {
    writer: &'a SchemaResolutionContext,
    reader: &'a SchemaResolutionContext,
    records: HashMap<(String, String), Arc<ReaderWriterResolution>>,
    max_block_items: usize,
}

impl<'a> ResolvingDecoder<'a> {
    /// Create a resolving decoder over the named types of both schemas.
    pub fn new(writer: &'a SchemaResolutionContext, reader: &'a SchemaResolutionContext) -> Self {
        Self {
            writer,
            reader,
            records: HashMap::new(),
            max_block_items: DEFAULT_MAX_BLOCK_ITEMS,
        }
    }

    /// Cap the number of zero-size items one array or map may declare.
    pub fn with_max_block_items(mut self, max_block_items: usize) -> Self {
        self.max_block_items = max_block_items;
        self
    }

    /// Decode one value written with `writer_schema` as `reader_schema`.
    pub fn decode(
        &mut self,
        data: &mut &[u8],
        writer_schema: &AvroSchema,
        reader_schema: &AvroSchema,
    ) -> Result<AvroValue, DecodeError> {
        let writer = self.writer.resolve_ref(writer_schema)?;
        let reader = self.reader.resolve_ref(reader_schema)?;

        // The writer's branch is on the wire; resolve it against the reader
        if let AvroSchema::Union(variants) = writer {
            let index = decode_union_index(data, variants.len())?;
            return self.decode(data, &variants[index], reader);
        }

        if let AvroSchema::Union(variants) = reader {
            let branch = self.match_reader_branch(writer, variants)?;
            let value = self.decode(data, writer, &variants[branch])?;
            return Ok(AvroValue::Union(branch as i32, Box::new(value)));
        }

        if let AvroSchema::Logical(logical) = reader {
            let base = self.decode(data, writer.physical(), &logical.base)?;
            return to_logical_value(base, logical.logical_type);
        }

        match (writer.physical(), reader) {
            (AvroSchema::Record(w), AvroSchema::Record(r)) => self.decode_record(data, w, r),
            (AvroSchema::Enum(w), AvroSchema::Enum(r)) => decode_resolved_enum(data, w, r),
            (AvroSchema::Array(w), AvroSchema::Array(r)) => {
                let mut items = Vec::new();
                let min_size = min_encoded_size(w, self.writer);
                decode_blocks(data, min_size, self.max_block_items, |data| {
                    items.push(self.decode(data, w, r)?);
                    Ok(())
                })?;
                Ok(AvroValue::Array(items))
            }
            (AvroSchema::Map(w), AvroSchema::Map(r)) => {
                let mut entries = Vec::new();
                decode_blocks(data, 1, self.max_block_items, |data| {
                    let key = decode_string(data)?;
                    let value = self.decode(data, w, r)?;
                    entries.push((key, value));
                    Ok(())
                })?;
                Ok(AvroValue::Map(entries))
            }
            (AvroSchema::Fixed(w), AvroSchema::Fixed(r)) => {
                if w.size != r.size || !names_match(&w.fullname(), &r.fullname(), &r.aliases) {
                    return Err(SchemaError::IncompatibleSchemas(format!(
                        "Fixed '{}' ({} bytes) does not match '{}' ({} bytes)",
                        w.fullname(),
                        w.size,
                        r.fullname(),
                        r.size
                    ))
                    .into());
                }
                Ok(AvroValue::Fixed(decode_fixed(data, w.size)?))
            }
            (w, r) if w.is_primitive() && r.is_primitive() => {
                let promotion = TypePromotion::from_schemas(w, r)?;
                let value = decode_value(data, w, self.writer)?;
                match promotion {
                    Some(p) => apply_promotion(value, p),
                    None => Ok(value),
                }
            }
            (w, r) => Err(SchemaError::IncompatibleSchemas(format!(
                "Cannot read {} as {}",
                w.type_name(),
                r.type_name()
            ))
            .into()),
        }
    }

    fn decode_record(
        &mut self,
        data: &mut &[u8],
        writer: &RecordSchema,
        reader: &RecordSchema,
    ) -> Result<AvroValue, DecodeError> {
        let resolution = self.record_resolution(writer, reader)?;

        let mut slots: Vec<Option<AvroValue>> = vec![None; reader.fields.len()];
        for (writer_field, target) in writer.fields.iter().zip(&resolution.writer_to_reader) {
            match target {
                Some(reader_index) => {
                    let reader_field = &reader.fields[*reader_index];
                    let value = self.decode(data, &writer_field.schema, &reader_field.schema)?;
                    slots[*reader_index] = Some(value);
                }
                None => skip_value(data, &writer_field.schema, self.writer)?,
            }
        }

        let mut fields = Vec::with_capacity(reader.fields.len());
        for ((reader_field, resolved), slot) in reader
            .fields
            .iter()
            .zip(&resolution.resolved_fields)
            .zip(slots)
        {
            let value = match (resolved, slot) {
                (ResolvedField::Present { .. }, Some(value)) => value,
                (ResolvedField::Default { default_value }, _) => default_value.clone(),
                (ResolvedField::Present { writer_index }, None) => {
                    return Err(DecodeError::InvalidData(format!(
                        "Writer field {} was not decoded",
                        writer_index
                    )))
                }
            };
            fields.push((reader_field.name.clone(), value));
        }

        Ok(AvroValue::Record(fields))
    }

    fn record_resolution(
        &mut self,
        writer: &RecordSchema,
        reader: &RecordSchema,
    ) -> Result<Arc<ReaderWriterResolution>, SchemaError> {
        let key = (writer.fullname(), reader.fullname());
        if let Some(resolution) = self.records.get(&key) {
            return Ok(Arc::clone(resolution));
        }

        let resolution = Arc::new(ReaderWriterResolution::new(writer, reader, self.reader)?);
        debug!(
            writer = %key.0,
            reader = %key.1,
            skipped = resolution.skipped_writer_fields().count(),
            defaults = resolution.needs_defaults(),
            "Resolved record fields"
        );
        self.records.insert(key, Arc::clone(&resolution));
        Ok(resolution)
    }

    /// Pick the reader union branch for a non-union writer schema.
    ///
    /// An exact match wins over a promotable one; otherwise the first
    /// match in reader order is used.
    fn match_reader_branch(
        &self,
        writer: &AvroSchema,
        variants: &[AvroSchema],
    ) -> Result<usize, SchemaError> {
        let mut promotable = None;
        for (index, variant) in variants.iter().enumerate() {
            let variant = self.reader.resolve_ref(variant)?;
            match branch_match(writer.physical(), variant.physical()) {
                BranchMatch::Exact => return Ok(index),
                BranchMatch::Promotable if promotable.is_none() => promotable = Some(index),
                _ => {}
            }
        }

        promotable.ok_or_else(|| {
            SchemaError::IncompatibleSchemas(format!(
                "No reader union branch matches writer type {}",
                writer.type_name()
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BranchMatch {
    Exact,
    Promotable,
    None,
}

fn branch_match(writer: &AvroSchema, reader: &AvroSchema) -> BranchMatch {
    match (writer, reader) {
        (AvroSchema::Record(w), AvroSchema::Record(r)) if record_names_match(w, r) => {
            BranchMatch::Exact
        }
        (AvroSchema::Enum(w), AvroSchema::Enum(r))
            if names_match(&w.fullname(), &r.fullname(), &r.aliases) =>
        {
            BranchMatch::Exact
        }
        (AvroSchema::Fixed(w), AvroSchema::Fixed(r))
            if w.size == r.size && names_match(&w.fullname(), &r.fullname(), &r.aliases) =>
        {
            BranchMatch::Exact
        }
        (AvroSchema::Array(_), AvroSchema::Array(_)) | (AvroSchema::Map(_), AvroSchema::Map(_)) => {
            BranchMatch::Exact
        }
        (w, r) if w.is_primitive() && r.is_primitive() => match TypePromotion::from_schemas(w, r) {
            Ok(None) => BranchMatch::Exact,
            Ok(Some(_)) => BranchMatch::Promotable,
            Err(_) => BranchMatch::None,
        },
        _ => BranchMatch::None,
    }
}

fn decode_resolved_enum(
    data: &mut &[u8],
    writer: &EnumSchema,
    reader: &EnumSchema,
) -> Result<AvroValue, DecodeError> {
    let (_, symbol) = decode_enum(data, writer)?;

    if let Some(index) = reader.symbol_index(&symbol) {
        return Ok(AvroValue::Enum(index as i32, symbol));
    }

    match reader.default.as_ref().and_then(|d| reader.symbol_index(d).map(|i| (i, d))) {
        Some((index, default)) => Ok(AvroValue::Enum(index as i32, default.clone())),
        None => Err(SchemaError::IncompatibleSchemas(format!(
            "Symbol '{}' is not in reader enum '{}' and it has no default",
            symbol,
            reader.fullname()
        ))
        .into()),
    }
}

/// Apply a type promotion to a decoded value.
pub fn apply_promotion(value: AvroValue, promotion: TypePromotion) -> Result<AvroValue, DecodeError> {
    match (value, promotion) {
        (AvroValue::Int(v), TypePromotion::IntToLong) => Ok(AvroValue::Long(v as i64)),
        (AvroValue::Int(v), TypePromotion::IntToFloat) => Ok(AvroValue::Float(v as f32)),
        (AvroValue::Int(v), TypePromotion::IntToDouble) => Ok(AvroValue::Double(v as f64)),
        (AvroValue::Long(v), TypePromotion::LongToFloat) => Ok(AvroValue::Float(v as f32)),
        (AvroValue::Long(v), TypePromotion::LongToDouble) => Ok(AvroValue::Double(v as f64)),
        (AvroValue::Float(v), TypePromotion::FloatToDouble) => Ok(AvroValue::Double(v as f64)),
        (AvroValue::String(s), TypePromotion::StringToBytes) => {
            Ok(AvroValue::Bytes(s.into_bytes()))
        }
        (AvroValue::Bytes(b), TypePromotion::BytesToString) => Ok(AvroValue::String(String::from_utf8(b)?)),
        (value, promotion) => Err(DecodeError::TypeMismatch(format!(
            "Cannot apply {:?} promotion to {}",
            promotion,
            value.kind()
        ))),
    }
}

/// Reinterpret a physical value under a logical annotation.
fn to_logical_value(value: AvroValue, logical: LogicalTypeName) -> Result<AvroValue, DecodeError> {
    match (value, logical) {
        (AvroValue::Int(days), LogicalTypeName::Date) => Ok(AvroValue::Date(days)),
        (AvroValue::Long(millis), LogicalTypeName::TimestampMillis) => {
            Ok(AvroValue::TimestampMillis(millis))
        }
        (AvroValue::Long(micros), LogicalTypeName::TimestampMicros) => {
            Ok(AvroValue::TimestampMicros(micros))
        }
        // Already logical when writer and reader agree on the annotation
        (value @ AvroValue::Date(_), LogicalTypeName::Date)
        | (value @ AvroValue::TimestampMillis(_), LogicalTypeName::TimestampMillis)
        | (value @ AvroValue::TimestampMicros(_), LogicalTypeName::TimestampMicros) => Ok(value),
        (value, logical) => Err(DecodeError::TypeMismatch(format!(
            "Cannot read {} as {}",
            value.kind(),
            logical.name()
        ))),
    }
}

/// Convert a JSON default value to an AvroValue.
///
/// Used for reader fields the writer does not have and for schema fields a
/// model leaves unset. A union default always refers to the first branch.
pub fn json_to_avro_value(
    json: &Value,
    schema: &AvroSchema,
    context: &SchemaResolutionContext,
) -> Result<AvroValue, SchemaError> {
    let invalid = || {
        SchemaError::InvalidSchema(format!(
            "Default {} does not match schema {}",
            json,
            schema.type_name()
        ))
    };

    match (json, schema) {
        (Value::Null, AvroSchema::Null) => Ok(AvroValue::Null),
        (Value::Bool(b), AvroSchema::Boolean) => Ok(AvroValue::Boolean(*b)),
        (Value::Number(n), AvroSchema::Int) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(AvroValue::Int)
            .ok_or_else(invalid),
        (Value::Number(n), AvroSchema::Long) => n.as_i64().map(AvroValue::Long).ok_or_else(invalid),
        (Value::Number(n), AvroSchema::Float) => {
            n.as_f64().map(|v| AvroValue::Float(v as f32)).ok_or_else(invalid)
        }
        (Value::Number(n), AvroSchema::Double) => n.as_f64().map(AvroValue::Double).ok_or_else(invalid),
        (Value::String(s), AvroSchema::String) => Ok(AvroValue::String(s.clone())),

        // Bytes and fixed defaults are ISO-8859-1 strings in JSON
        (Value::String(s), AvroSchema::Bytes) => latin1_bytes(s).map(AvroValue::Bytes).ok_or_else(invalid),
        (Value::String(s), AvroSchema::Fixed(fixed)) => match latin1_bytes(s) {
            Some(bytes) if bytes.len() == fixed.size => Ok(AvroValue::Fixed(bytes)),
            _ => Err(invalid()),
        },

        (Value::String(s), AvroSchema::Enum(enum_schema)) => enum_schema
            .symbol_index(s)
            .map(|index| AvroValue::Enum(index as i32, s.clone()))
            .ok_or_else(invalid),

        (Value::Array(arr), AvroSchema::Array(item_schema)) => Ok(AvroValue::Array(
            arr.iter()
                .map(|item| json_to_avro_value(item, item_schema, context))
                .collect::<Result<Vec<_>, _>>()?,
        )),

        (Value::Object(obj), AvroSchema::Map(value_schema)) => Ok(AvroValue::Map(
            obj.iter()
                .map(|(k, v)| Ok((k.clone(), json_to_avro_value(v, value_schema, context)?)))
                .collect::<Result<Vec<_>, SchemaError>>()?,
        )),

        (Value::Object(obj), AvroSchema::Record(record)) => {
            let fields = record
                .fields
                .iter()
                .map(|field| {
                    let value = obj.get(&field.name).or(field.default.as_ref()).ok_or_else(|| {
                        SchemaError::InvalidSchema(format!(
                            "Missing required field '{}' in default value",
                            field.name
                        ))
                    })?;
                    Ok((field.name.clone(), json_to_avro_value(value, &field.schema, context)?))
                })
                .collect::<Result<Vec<_>, SchemaError>>()?;
            Ok(AvroValue::Record(fields))
        }

        (json, AvroSchema::Union(variants)) => {
            let first = variants.first().ok_or_else(invalid)?;
            let value = json_to_avro_value(json, first, context)?;
            Ok(AvroValue::Union(0, Box::new(value)))
        }

        (json, AvroSchema::Named(_)) => json_to_avro_value(json, context.resolve_ref(schema)?, context),

        (json, AvroSchema::Logical(logical)) => {
            let base = json_to_avro_value(json, &logical.base, context)?;
            to_logical_value(base, logical.logical_type)
                .map_err(|e| SchemaError::InvalidSchema(e.to_string()))
        }

        _ => Err(invalid()),
    }
}

fn latin1_bytes(s: &str) -> Option<Vec<u8>> {
    s.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect()
}
