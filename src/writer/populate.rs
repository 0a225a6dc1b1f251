//! Building the generic value tree from a host model.

use crate::error::EncodeError;
use crate::host::{AttributeType, HostModel, HostValue, SchemaRole};
use crate::logical::LogicalTypeCodec;
use crate::schema::{
    json_to_avro_value, AvroSchema, CompiledSchema, FieldSchema, LogicalTypeName, RecordSchema,
};
use crate::union::UnionResolver;
use crate::value::AvroValue;
use crate::writer::path::AttributePath;

/// Why a value could not be populated.
#[derive(Debug)]
pub(crate) enum PopulateError {
    /// Required values are absent, by attribute path
    Missing(Vec<String>),
    /// The value does not fit the schema
    Encode(EncodeError),
}

impl From<EncodeError> for PopulateError {
    fn from(err: EncodeError) -> Self {
        PopulateError::Encode(err)
    }
}

type Populated<T> = Result<T, PopulateError>;

static NULL: HostValue = HostValue::Null;

/// Walks a host model alongside a compiled schema.
pub(crate) struct Populator<'a> {
    schema: &'a CompiledSchema,
    unions: &'a UnionResolver,
    logical: &'a LogicalTypeCodec,
}

impl<'a> Populator<'a> {
    pub(crate) fn new(
        schema: &'a CompiledSchema,
        unions: &'a UnionResolver,
        logical: &'a LogicalTypeCodec,
    ) -> Self {
        Self {
            schema,
            unions,
            logical,
        }
    }

    /// Populate a record from a model's fields for `role`.
    ///
    /// Every missing value in the model is collected before failing.
    pub(crate) fn model(
        &self,
        model: &dyn HostModel,
        role: SchemaRole,
        record: &RecordSchema,
        path: &AttributePath<'_>,
    ) -> Populated<AvroValue> {
        let fullname = record.fullname();
        let mut slots: Vec<Option<AvroValue>> = vec![None; record.fields.len()];
        let mut missing = Vec::new();

        for name in model.field_names(role) {
            let slot = self
                .schema
                .field_slot(&fullname, name)
                .or_else(|| record.fields.iter().position(|f| f.name == *name))
                .ok_or_else(|| EncodeError::UnknownField {
                    path: path.to_string(),
                    field: name.clone(),
                })?;
            let field = &record.fields[slot];
            let value = model.attribute(name).unwrap_or(&NULL);
            let field_path = AttributePath::Field(path, name);

            match self.value(value, model.attribute_type(name), &field.schema, &field_path) {
                Ok(populated) => slots[slot] = Some(populated),
                Err(PopulateError::Missing(paths)) => missing.extend(paths),
                Err(err) => return Err(err),
            }
        }

        self.finish_record(record, slots, missing, path)
    }

    /// Populate a record from a name-keyed mapping.
    fn mapping(
        &self,
        entries: &[(String, HostValue)],
        record: &RecordSchema,
        path: &AttributePath<'_>,
    ) -> Populated<AvroValue> {
        let mut slots: Vec<Option<AvroValue>> = vec![None; record.fields.len()];
        let mut missing = Vec::new();

        for (name, value) in entries {
            let slot = record
                .fields
                .iter()
                .position(|f| f.name == *name)
                .ok_or_else(|| EncodeError::UnknownField {
                    path: path.to_string(),
                    field: name.clone(),
                })?;
            let field_path = AttributePath::Field(path, name);

            match self.value(value, None, &record.fields[slot].schema, &field_path) {
                Ok(populated) => slots[slot] = Some(populated),
                Err(PopulateError::Missing(paths)) => missing.extend(paths),
                Err(err) => return Err(err),
            }
        }

        self.finish_record(record, slots, missing, path)
    }

    /// Fill schema fields the host did not provide, then assemble the record.
    fn finish_record(
        &self,
        record: &RecordSchema,
        slots: Vec<Option<AvroValue>>,
        mut missing: Vec<String>,
        path: &AttributePath<'_>,
    ) -> Populated<AvroValue> {
        let mut fields = Vec::with_capacity(record.fields.len());
        for (field, slot) in record.fields.iter().zip(slots) {
            let value = match slot {
                Some(value) => value,
                None => match self.unlisted_field(field)? {
                    Some(value) => value,
                    None => {
                        missing.push(AttributePath::Field(path, &field.name).to_string());
                        continue;
                    }
                },
            };
            fields.push((field.name.clone(), value));
        }

        if missing.is_empty() {
            Ok(AvroValue::Record(fields))
        } else {
            Err(PopulateError::Missing(missing))
        }
    }

    /// Value for a schema field the host does not list: null when the field
    /// is nullable, else the schema default.
    fn unlisted_field(&self, field: &FieldSchema) -> Result<Option<AvroValue>, EncodeError> {
        let schema = self.schema.context().resolve_ref(&field.schema)?;
        if schema.is_null_first_union() {
            return Ok(Some(AvroValue::Union(0, Box::new(AvroValue::Null))));
        }
        if matches!(schema, AvroSchema::Null) {
            return Ok(Some(AvroValue::Null));
        }
        match &field.default {
            Some(default) => Ok(Some(json_to_avro_value(
                default,
                schema,
                self.schema.context(),
            )?)),
            None => Ok(None),
        }
    }

    /// Populate one value for a schema node.
    pub(crate) fn value(
        &self,
        value: &HostValue,
        declared: Option<&AttributeType>,
        schema: &AvroSchema,
        path: &AttributePath<'_>,
    ) -> Populated<AvroValue> {
        let schema = self.schema.context().resolve_ref(schema).map_err(EncodeError::from)?;

        if let (Some(AttributeType::Custom(custom)), false) = (declared, value.is_null()) {
            let serialized = custom.serialize(value, true);
            return self.value(&serialized, custom.default_type.as_deref(), schema, path);
        }

        if let AvroSchema::Union(variants) = schema {
            if value.is_null() && !matches!(variants.first(), Some(AvroSchema::Null)) {
                return Err(PopulateError::Missing(vec![path.to_string()]));
            }
            let selection = self.unions.select_branch(
                variants,
                value,
                declared,
                self.schema.context(),
                &path.to_string(),
            )?;
            let inner = self.value(
                selection.value,
                selection.member_type,
                &variants[selection.branch],
                path,
            )?;
            return Ok(AvroValue::Union(selection.branch as i32, Box::new(inner)));
        }

        if value.is_null() {
            return match schema {
                AvroSchema::Null => Ok(AvroValue::Null),
                _ => Err(PopulateError::Missing(vec![path.to_string()])),
            };
        }

        let mismatch = || {
            PopulateError::Encode(EncodeError::TypeMismatch {
                path: path.to_string(),
                message: format!(
                    "cannot encode {} value as {}",
                    value.type_name(),
                    schema.type_name()
                ),
            })
        };

        match (schema, value) {
            (AvroSchema::Boolean, HostValue::Boolean(b)) => Ok(AvroValue::Boolean(*b)),
            (AvroSchema::Int, HostValue::Int(i)) => i32::try_from(*i)
                .map(AvroValue::Int)
                .map_err(|_| mismatch()),
            (AvroSchema::Long, HostValue::Int(i)) => Ok(AvroValue::Long(*i)),
            (AvroSchema::Float, HostValue::Float(f)) => Ok(AvroValue::Float(*f as f32)),
            (AvroSchema::Float, HostValue::Int(i)) => Ok(AvroValue::Float(*i as f32)),
            (AvroSchema::Double, HostValue::Float(f)) => Ok(AvroValue::Double(*f)),
            (AvroSchema::Double, HostValue::Int(i)) => Ok(AvroValue::Double(*i as f64)),
            (AvroSchema::String, HostValue::String(s) | HostValue::Symbol(s)) => {
                Ok(AvroValue::String(s.clone()))
            }
            (AvroSchema::Bytes, HostValue::Bytes(b)) => Ok(AvroValue::Bytes(b.clone())),
            (AvroSchema::Bytes, HostValue::String(s)) => Ok(AvroValue::Bytes(s.as_bytes().to_vec())),
            (AvroSchema::Fixed(fixed), HostValue::Bytes(_) | HostValue::String(_)) => {
                let bytes = match value {
                    HostValue::String(s) => s.as_bytes().to_vec(),
                    HostValue::Bytes(b) => b.clone(),
                    _ => return Err(mismatch()),
                };
                if bytes.len() != fixed.size {
                    return Err(PopulateError::Encode(EncodeError::TypeMismatch {
                        path: path.to_string(),
                        message: format!(
                            "fixed {} needs {} bytes, value has {}",
                            fixed.name,
                            fixed.size,
                            bytes.len()
                        ),
                    }));
                }
                Ok(AvroValue::Fixed(bytes))
            }
            (AvroSchema::Enum(enum_schema), HostValue::Symbol(symbol) | HostValue::String(symbol)) => {
                enum_schema
                    .symbol_index(symbol)
                    .map(|index| AvroValue::Enum(index as i32, symbol.clone()))
                    .ok_or_else(|| {
                        PopulateError::Encode(EncodeError::UnknownSymbol {
                            path: path.to_string(),
                            symbol: symbol.clone(),
                        })
                    })
            }
            (AvroSchema::Array(item_schema), HostValue::Array(items)) => {
                let item_type = declared.and_then(AttributeType::items);
                collect(items.iter().enumerate().map(|(index, item)| {
                    self.value(item, item_type, item_schema, &AttributePath::Index(path, index))
                }))
                .map(AvroValue::Array)
            }
            (AvroSchema::Map(value_schema), HostValue::Map(entries)) => {
                let value_type = declared.and_then(AttributeType::values);
                collect(entries.iter().map(|(key, entry)| {
                    self.value(entry, value_type, value_schema, &AttributePath::Key(path, key))
                        .map(|populated| (key.clone(), populated))
                }))
                .map(AvroValue::Map)
            }
            (AvroSchema::Record(record), HostValue::Model(model)) => {
                self.model(model.as_ref(), SchemaRole::Value, record, path)
            }
            (AvroSchema::Record(record), HostValue::Record(entries)) => {
                self.mapping(entries, record, path)
            }
            (AvroSchema::Logical(logical), value) => {
                let converted = match logical.logical_type {
                    LogicalTypeName::Date => self.logical.date_to_days(value).map(AvroValue::Date),
                    LogicalTypeName::TimestampMillis => self
                        .logical
                        .timestamp_to_millis(value)
                        .map(AvroValue::TimestampMillis),
                    LogicalTypeName::TimestampMicros => self
                        .logical
                        .timestamp_to_micros(value)
                        .map(AvroValue::TimestampMicros),
                };
                converted.map_err(|source| {
                    PopulateError::Encode(EncodeError::LogicalType {
                        path: path.to_string(),
                        source,
                    })
                })
            }
            _ => Err(mismatch()),
        }
    }
}

/// Collect results, gathering every missing path before failing.
fn collect<T>(results: impl Iterator<Item = Populated<T>>) -> Populated<Vec<T>> {
    let mut values = Vec::new();
    let mut missing = Vec::new();
    for result in results {
        match result {
            Ok(value) => values.push(value),
            Err(PopulateError::Missing(paths)) => missing.extend(paths),
            Err(err) => return Err(err),
        }
    }
    if missing.is_empty() {
        Ok(values)
    } else {
        Err(PopulateError::Missing(missing))
    }
}
