//! Projection of generic values into host values.

use crate::error::DecodeError;
use crate::host::HostValue;
use crate::logical::LogicalTypeCodec;
use crate::schema::{AvroSchema, SchemaResolutionContext};
use crate::union::UnionResolver;
use crate::value::AvroValue;

/// Converts a decoded [`AvroValue`] tree into [`HostValue`]s.
///
/// Walks the reader schema alongside the value so union branches can be
/// wrapped according to the union's layout.
pub struct HostProjection<'a> {
    context: &'a SchemaResolutionContext,
    unions: &'a UnionResolver,
    logical: &'a LogicalTypeCodec,
    strict: bool,
}

impl<'a> HostProjection<'a> {
    /// Create a projection over the named types of the reader schema.
    pub fn new(
        context: &'a SchemaResolutionContext,
        unions: &'a UnionResolver,
        logical: &'a LogicalTypeCodec,
        strict: bool,
    ) -> Self {
        Self {
            context,
            unions,
            logical,
            strict,
        }
    }

    /// Project `value`, which conforms to `schema`.
    pub fn project(&self, value: AvroValue, schema: &AvroSchema) -> Result<HostValue, DecodeError> {
        let schema = self.context.resolve_ref(schema)?;

        match (value, schema) {
            (AvroValue::Union(index, inner), AvroSchema::Union(variants)) => {
                let branch = usize::try_from(index)
                    .ok()
                    .filter(|b| *b < variants.len())
                    .ok_or_else(|| {
                        DecodeError::InvalidData(format!(
                            "Union index {} out of range (0..{})",
                            index,
                            variants.len()
                        ))
                    })?;
                let host = self.project(*inner, &variants[branch])?;
                Ok(self.unions.wrap_decoded(variants, branch, host, self.strict))
            }
            (AvroValue::Record(fields), AvroSchema::Record(record)) => {
                let mut entries = Vec::with_capacity(fields.len());
                for (name, field_value) in fields {
                    let field = record.field(&name).ok_or_else(|| {
                        DecodeError::TypeMismatch(format!(
                            "Field '{}' is not part of record {}",
                            name, record.name
                        ))
                    })?;
                    let host = self.project(field_value, &field.schema)?;
                    entries.push((name, host));
                }
                Ok(HostValue::Record(entries))
            }
            (AvroValue::Array(items), AvroSchema::Array(item_schema)) => items
                .into_iter()
                .map(|item| self.project(item, item_schema))
                .collect::<Result<Vec<_>, _>>()
                .map(HostValue::Array),
            (AvroValue::Map(entries), AvroSchema::Map(value_schema)) => entries
                .into_iter()
                .map(|(key, entry)| Ok((key, self.project(entry, value_schema)?)))
                .collect::<Result<Vec<_>, DecodeError>>()
                .map(HostValue::Map),
            (value, schema) => self.scalar(value, schema),
        }
    }

    fn scalar(&self, value: AvroValue, schema: &AvroSchema) -> Result<HostValue, DecodeError> {
        Ok(match value {
            AvroValue::Null => HostValue::Null,
            AvroValue::Boolean(b) => HostValue::Boolean(b),
            AvroValue::Int(i) => HostValue::Int(i64::from(i)),
            AvroValue::Long(l) => HostValue::Int(l),
            AvroValue::Float(f) => HostValue::Float(f64::from(f)),
            AvroValue::Double(d) => HostValue::Float(d),
            AvroValue::Bytes(b) | AvroValue::Fixed(b) => HostValue::Bytes(b),
            AvroValue::String(s) => HostValue::String(s),
            AvroValue::Enum(_, symbol) => HostValue::Symbol(symbol),
            AvroValue::Date(days) => HostValue::Date(self.logical.days_to_date(days)?),
            AvroValue::TimestampMillis(millis) => {
                HostValue::Timestamp(self.logical.millis_to_timestamp(millis)?)
            }
            AvroValue::TimestampMicros(micros) => {
                HostValue::Timestamp(self.logical.micros_to_timestamp(micros)?)
            }
            other => {
                return Err(DecodeError::TypeMismatch(format!(
                    "Cannot project {} value as {}",
                    other.kind(),
                    schema.type_name()
                )))
            }
        })
    }
}
