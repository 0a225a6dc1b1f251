//! Union branch selection and the tagged union wrapper.
//!
//! A union of exactly `[null, T]` is an optional field: it never produces or
//! expects a wrapper. Every other union is a true union whose host value is
//! a [`UnionDatum`] carrying a member index that skips the null branch.

use std::fmt;
use std::sync::Arc;

use crate::error::EncodeError;
use crate::host::{AttributeType, HostValue};
use crate::schema::{AvroSchema, LogicalTypeName, SchemaResolutionContext};

/// A value tagged with the union member it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionDatum {
    /// Member index, not counting a leading null branch
    pub member_index: usize,
    /// The member's value
    pub datum: Box<HostValue>,
}

impl UnionDatum {
    /// Create a new tagged union value.
    pub fn new(member_index: usize, datum: HostValue) -> Self {
        Self {
            member_index,
            datum: Box::new(datum),
        }
    }
}

/// Factory that builds the host's wrapper for a decoded true-union value.
pub type UnionWrapper = Arc<dyn Fn(usize, HostValue) -> HostValue + Send + Sync>;

/// The default wrapper factory, producing [`HostValue::Union`].
pub fn default_union_wrapper() -> UnionWrapper {
    Arc::new(|member_index, datum| HostValue::Union(UnionDatum::new(member_index, datum)))
}

/// The union branch picked for a host value.
#[derive(Debug)]
pub struct BranchSelection<'v> {
    /// Branch index in the schema union
    pub branch: usize,
    /// Value to encode with the branch schema
    pub value: &'v HostValue,
    /// Declared type of the selected member, if known
    pub member_type: Option<&'v AttributeType>,
}

/// Selects union branches on encode and wraps union values on decode.
#[derive(Clone)]
pub struct UnionResolver {
    wrapper: UnionWrapper,
}

impl fmt::Debug for UnionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnionResolver").finish_non_exhaustive()
    }
}

impl Default for UnionResolver {
    fn default() -> Self {
        Self::new(default_union_wrapper())
    }
}

impl UnionResolver {
    /// Create a resolver around a wrapper factory.
    pub fn new(wrapper: UnionWrapper) -> Self {
        Self { wrapper }
    }

    /// Produce the host value for a decoded union branch.
    ///
    /// Optional fields, null branches and strict decoding yield the bare
    /// value; everything else goes through the wrapper factory.
    pub fn wrap_decoded(
        &self,
        variants: &[AvroSchema],
        branch: usize,
        value: HostValue,
        strict: bool,
    ) -> HostValue {
        if strict || is_optional(variants) {
            return value;
        }
        if matches!(variants.get(branch), Some(AvroSchema::Null) | None) {
            return value;
        }

        let member_index = if starts_with_null(variants) {
            branch - 1
        } else {
            branch
        };
        (self.wrapper)(member_index, value)
    }

    /// Pick the schema branch for a host value on encode.
    ///
    /// The caller has already reported absent values for unions that do not
    /// start with null.
    pub fn select_branch<'v>(
        &self,
        variants: &[AvroSchema],
        value: &'v HostValue,
        declared: Option<&'v AttributeType>,
        context: &SchemaResolutionContext,
        path: &str,
    ) -> Result<BranchSelection<'v>, EncodeError> {
        let offset = usize::from(starts_with_null(variants));

        if value.is_null() && offset == 1 {
            return Ok(BranchSelection {
                branch: 0,
                value,
                member_type: None,
            });
        }

        let declared_union = match declared {
            Some(AttributeType::Union(union_type)) => Some(union_type),
            _ => None,
        };

        // A previously decoded wrapper carries its own member index
        if let HostValue::Union(datum) = value {
            let branch = datum.member_index + offset;
            if branch >= variants.len() {
                return Err(EncodeError::TypeMismatch {
                    path: path.to_string(),
                    message: format!(
                        "union member {} out of range for {} branches",
                        datum.member_index,
                        variants.len()
                    ),
                });
            }
            let member_type = declared_union
                .and_then(|u| u.members.get(datum.member_index))
                .map(|m| &m.attribute_type);
            return Ok(BranchSelection {
                branch,
                value: &datum.datum,
                member_type,
            });
        }

        if let Some(union_type) = declared_union {
            let member_index = union_type.find_index(value).ok_or_else(|| mismatch(path, value, variants))?;
            let branch = member_index + offset;
            if branch >= variants.len() {
                return Err(mismatch(path, value, variants));
            }
            return Ok(BranchSelection {
                branch,
                value,
                member_type: Some(&union_type.members[member_index].attribute_type),
            });
        }

        if is_optional(variants) {
            return Ok(BranchSelection {
                branch: 1,
                value,
                member_type: declared,
            });
        }

        let branch = variants
            .iter()
            .position(|variant| accepts(variant, value, context))
            .ok_or_else(|| mismatch(path, value, variants))?;

        Ok(BranchSelection {
            branch,
            value,
            member_type: declared,
        })
    }
}

/// Whether the union is the optional-field shape `[null, T]`.
pub fn is_optional(variants: &[AvroSchema]) -> bool {
    variants.len() == 2 && starts_with_null(variants)
}

fn starts_with_null(variants: &[AvroSchema]) -> bool {
    matches!(variants.first(), Some(AvroSchema::Null))
}

fn mismatch(path: &str, value: &HostValue, variants: &[AvroSchema]) -> EncodeError {
    let names: Vec<String> = variants.iter().map(|v| v.type_name()).collect();
    EncodeError::TypeMismatch {
        path: path.to_string(),
        message: format!(
            "no union branch of [{}] accepts a {} value",
            names.join(", "),
            value.type_name()
        ),
    }
}

/// Whether a schema branch can encode a host value.
pub fn accepts(schema: &AvroSchema, value: &HostValue, context: &SchemaResolutionContext) -> bool {
    let Ok(schema) = context.resolve_ref(schema) else {
        return false;
    };

    match (schema, value) {
        (AvroSchema::Null, HostValue::Null)
        | (AvroSchema::Boolean, HostValue::Boolean(_))
        | (AvroSchema::Int | AvroSchema::Long, HostValue::Int(_))
        | (AvroSchema::Float | AvroSchema::Double, HostValue::Float(_) | HostValue::Int(_))
        | (AvroSchema::String, HostValue::String(_))
        | (AvroSchema::Bytes, HostValue::Bytes(_))
        | (AvroSchema::Array(_), HostValue::Array(_))
        | (AvroSchema::Map(_), HostValue::Map(_)) => true,
        (AvroSchema::Record(record), HostValue::Record(entries)) => entries
            .iter()
            .all(|(key, _)| record.fields.iter().any(|field| &field.name == key)),
        (AvroSchema::Fixed(fixed), HostValue::Bytes(bytes)) => bytes.len() == fixed.size,
        (AvroSchema::Enum(e), HostValue::Symbol(s) | HostValue::String(s)) => {
            e.symbol_index(s).is_some()
        }
        (AvroSchema::Record(record), HostValue::Model(model)) => {
            let name = model.model_name();
            name == record.fullname() || name == record.name
        }
        (AvroSchema::Logical(logical), value) => match (logical.logical_type, value) {
            (LogicalTypeName::Date, HostValue::Date(_)) => true,
            (
                LogicalTypeName::TimestampMillis | LogicalTypeName::TimestampMicros,
                HostValue::Timestamp(_),
            ) => true,
            _ => accepts(&logical.base, value, context),
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostKind, UnionMember, UnionType};

    fn ctx() -> SchemaResolutionContext {
        SchemaResolutionContext::new()
    }

    fn string_or_int(nullable: bool) -> (Vec<AvroSchema>, AttributeType) {
        let mut variants = vec![AvroSchema::String, AvroSchema::Int];
        if nullable {
            variants.insert(0, AvroSchema::Null);
        }
        let union_type = UnionType {
            nullable,
            members: vec![
                UnionMember {
                    kind: HostKind::String,
                    attribute_type: AttributeType::value(),
                },
                UnionMember {
                    kind: HostKind::Int,
                    attribute_type: AttributeType::value(),
                },
            ],
        };
        (variants, AttributeType::Union(union_type))
    }

    #[test]
    fn test_wrap_decoded_optional_is_bare() {
        let resolver = UnionResolver::default();
        let optional = vec![AvroSchema::Null, AvroSchema::Int];
        assert_eq!(
            resolver.wrap_decoded(&optional, 1, HostValue::Int(3), false),
            HostValue::Int(3)
        );
    }

    #[test]
    fn test_wrap_decoded_member_index_skips_null() {
        let resolver = UnionResolver::default();
        let (nullable, _) = string_or_int(true);
        assert_eq!(
            resolver.wrap_decoded(&nullable, 2, HostValue::Int(3), false),
            HostValue::Union(UnionDatum::new(1, HostValue::Int(3)))
        );
        assert_eq!(
            resolver.wrap_decoded(&nullable, 0, HostValue::Null, false),
            HostValue::Null
        );

        let (plain, _) = string_or_int(false);
        assert_eq!(
            resolver.wrap_decoded(&plain, 1, HostValue::Int(3), false),
            HostValue::Union(UnionDatum::new(1, HostValue::Int(3)))
        );
    }

    #[test]
    fn test_wrap_decoded_strict_is_bare() {
        let resolver = UnionResolver::default();
        let (plain, _) = string_or_int(false);
        assert_eq!(
            resolver.wrap_decoded(&plain, 0, HostValue::from("x"), true),
            HostValue::from("x")
        );
    }

    #[test]
    fn test_custom_wrapper_factory() {
        let resolver = UnionResolver::new(Arc::new(|index, value| {
            HostValue::Array(vec![HostValue::Int(index as i64), value])
        }));
        let (plain, _) = string_or_int(false);
        assert_eq!(
            resolver.wrap_decoded(&plain, 0, HostValue::from("x"), false),
            HostValue::Array(vec![HostValue::Int(0), HostValue::from("x")])
        );
    }

    #[test]
    fn test_select_null_branch() {
        let resolver = UnionResolver::default();
        let (variants, declared) = string_or_int(true);
        let selection = resolver
            .select_branch(&variants, &HostValue::Null, Some(&declared), &ctx(), "f")
            .unwrap();
        assert_eq!(selection.branch, 0);
    }

    #[test]
    fn test_select_optional_shortcut() {
        let resolver = UnionResolver::default();
        let variants = vec![AvroSchema::Null, AvroSchema::Long];
        let declared = AttributeType::value();
        let selection = resolver
            .select_branch(&variants, &HostValue::Int(1), Some(&declared), &ctx(), "f")
            .unwrap();
        assert_eq!(selection.branch, 1);
    }

    #[test]
    fn test_select_by_union_type() {
        let resolver = UnionResolver::default();
        let (variants, declared) = string_or_int(true);
        let value = HostValue::Int(9);
        let selection = resolver
            .select_branch(&variants, &value, Some(&declared), &ctx(), "f")
            .unwrap();
        assert_eq!(selection.branch, 2);
        assert!(selection.member_type.is_some());
    }

    #[test]
    fn test_select_from_wrapper() {
        let resolver = UnionResolver::default();
        let (variants, declared) = string_or_int(true);
        let value = HostValue::Union(UnionDatum::new(0, HostValue::from("s")));
        let selection = resolver
            .select_branch(&variants, &value, Some(&declared), &ctx(), "f")
            .unwrap();
        assert_eq!(selection.branch, 1);
        assert_eq!(selection.value, &HostValue::from("s"));
    }

    #[test]
    fn test_select_by_schema_without_declared_type() {
        let resolver = UnionResolver::default();
        let variants = vec![AvroSchema::Boolean, AvroSchema::Double];
        let value = HostValue::Float(1.5);
        let selection = resolver
            .select_branch(&variants, &value, None, &ctx(), "f")
            .unwrap();
        assert_eq!(selection.branch, 1);

        let err = resolver
            .select_branch(&variants, &HostValue::from("no"), None, &ctx(), "f")
            .unwrap_err();
        assert!(err.to_string().contains("no union branch"));
    }

    #[test]
    fn test_select_record_branch_by_field_names() {
        use crate::schema::{FieldSchema, RecordSchema};

        let resolver = UnionResolver::default();
        let variants = vec![
            AvroSchema::Record(RecordSchema::new("A", vec![FieldSchema::new("a", AvroSchema::Int)])),
            AvroSchema::Record(RecordSchema::new("B", vec![FieldSchema::new("b", AvroSchema::String)])),
        ];
        let value = HostValue::Record(vec![("b".to_string(), HostValue::from("hi"))]);
        let selection = resolver
            .select_branch(&variants, &value, None, &ctx(), "u")
            .unwrap();
        assert_eq!(selection.branch, 1);

        let stray = HostValue::Record(vec![("c".to_string(), HostValue::Null)]);
        assert!(resolver.select_branch(&variants, &stray, None, &ctx(), "u").is_err());
    }
}
