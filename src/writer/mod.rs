//! Encoding host models to Avro binary.
//!
//! Encoding happens in two passes. The model is first walked alongside its
//! compiled schema to build an [`AvroValue`] tree, gathering every missing
//! required value on the way. The tree is then written by a validating
//! binary writer.

pub mod encode;
mod path;
mod populate;

use tracing::trace;

use crate::config::CodecConfig;
use crate::error::{CodecError, EncodeError, ValidationError};
use crate::host::{HostModel, SchemaRole};
use crate::logical::LogicalTypeCodec;
use crate::schema::{CompiledSchema, SchemaCache};
use crate::union::UnionResolver;
use crate::value::AvroValue;

pub use encode::{encode_value, write_boolean, write_bytes, write_double, write_float, write_long, write_string};
pub use path::AttributePath;
use populate::{PopulateError, Populator};

/// Encodes host models with the schema they declare for a role.
#[derive(Debug, Clone)]
pub struct Encoder {
    cache: SchemaCache,
    unions: UnionResolver,
    logical: LogicalTypeCodec,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(&CodecConfig::default())
    }
}

impl Encoder {
    /// Create an encoder from a codec configuration.
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            cache: SchemaCache::new().with_strict(config.strict_schema),
            unions: UnionResolver::new(config.union_wrapper.clone()),
            logical: LogicalTypeCodec::new(config.epoch),
        }
    }

    /// Encode `model` with its `role` schema.
    ///
    /// # Errors
    /// - `CodecError::MissingSchema` if the model has no schema for `role`
    /// - `CodecError::Validation` if required values are missing or the
    ///   populated value does not conform to the schema
    /// - `CodecError::Encode` if a value cannot be represented at all
    pub fn encode(&self, model: &dyn HostModel, role: SchemaRole) -> Result<Vec<u8>, CodecError> {
        trace!(model = model.model_name(), %role, "Encoding model");
        let compiled = self.compile(model, role)?;
        let value = self.populate(model, role, &compiled)?;

        let mut buf = Vec::new();
        encode_value(
            &value,
            compiled.root(),
            compiled.context(),
            &mut buf,
            &AttributePath::Root,
        )
        .map_err(|err| ValidationError::new(err.to_string(), Vec::new()))?;
        Ok(buf)
    }

    /// Encode with the value schema when `is_value_role` is set, else the
    /// key schema.
    pub fn encode_role(
        &self,
        model: &dyn HostModel,
        is_value_role: bool,
    ) -> Result<Vec<u8>, CodecError> {
        self.encode(model, SchemaRole::from_is_value(is_value_role))
    }

    /// Build the generic value tree `encode` would write.
    pub fn to_avro_value(
        &self,
        model: &dyn HostModel,
        role: SchemaRole,
    ) -> Result<AvroValue, CodecError> {
        let compiled = self.compile(model, role)?;
        self.populate(model, role, &compiled)
    }

    fn compile(
        &self,
        model: &dyn HostModel,
        role: SchemaRole,
    ) -> Result<std::sync::Arc<CompiledSchema>, CodecError> {
        let definition = model.schema(role).ok_or_else(|| CodecError::MissingSchema {
            model: model.model_name().to_string(),
            role,
        })?;
        Ok(self.cache.compile(definition)?)
    }

    fn populate(
        &self,
        model: &dyn HostModel,
        role: SchemaRole,
        compiled: &CompiledSchema,
    ) -> Result<AvroValue, CodecError> {
        let record = compiled.record().ok_or_else(|| EncodeError::TypeMismatch {
            path: String::new(),
            message: format!(
                "{} schema of {} must be a record, found {}",
                role,
                model.model_name(),
                compiled.root().type_name()
            ),
        })?;

        let populator = Populator::new(compiled, &self.unions, &self.logical);
        match populator.model(model, role, record, &AttributePath::Root) {
            Ok(value) => Ok(value),
            Err(PopulateError::Missing(paths)) => {
                model.validate()?;
                Err(ValidationError::missing(model.model_name(), paths).into())
            }
            Err(PopulateError::Encode(err)) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CustomType, HostValue};
    use crate::model::{Model, ModelDefinition};
    use crate::reader::Decoder;
    use crate::schema::SchemaDefinition;
    use crate::union::UnionDatum;
    use std::sync::Arc;

    const PROFILE: &str = r#"{
        "type": "record",
        "name": "Profile",
        "fields": [
            {"name": "id", "type": "long"},
            {"name": "name", "type": "string"},
            {"name": "nickname", "type": ["null", "string"]},
            {"name": "score", "type": ["null", "string", "int"]},
            {"name": "tags", "type": {"type": "array", "items": "string"}}
        ]
    }"#;

    fn profile_definition() -> (Arc<SchemaDefinition>, Arc<ModelDefinition>) {
        let schema = Arc::new(SchemaDefinition::from_json(PROFILE));
        let definition =
            ModelDefinition::from_schemas(Arc::clone(&schema), None, &SchemaCache::new()).unwrap();
        (schema, Arc::new(definition))
    }

    #[test]
    fn test_encode_round_trip() {
        let (schema, definition) = profile_definition();
        let model = Model::new(definition)
            .with("id", 7i64)
            .unwrap()
            .with("name", "ada")
            .unwrap()
            .with("score", 12i64)
            .unwrap()
            .with("tags", HostValue::Array(vec!["a".into(), "b".into()]))
            .unwrap();

        let bytes = Encoder::default().encode(&model, SchemaRole::Value).unwrap();
        let decoded = Decoder::default()
            .decode(&bytes, &schema, &schema, false)
            .unwrap();

        assert_eq!(decoded.get("id"), Some(&HostValue::Int(7)));
        assert_eq!(decoded.get("nickname"), Some(&HostValue::Null));
        assert_eq!(
            decoded.get("score"),
            Some(&HostValue::Union(UnionDatum::new(1, HostValue::Int(12))))
        );
    }

    #[test]
    fn test_union_datum_selects_member() {
        let (_, definition) = profile_definition();
        let model = Model::new(definition)
            .with("id", 1i64)
            .unwrap()
            .with("name", "n")
            .unwrap()
            .with("score", HostValue::Union(UnionDatum::new(0, "high".into())))
            .unwrap()
            .with("tags", HostValue::Array(vec![]))
            .unwrap();

        let value = Encoder::default().to_avro_value(&model, SchemaRole::Value).unwrap();
        assert_eq!(
            value.field("score"),
            Some(&AvroValue::Union(1, Box::new(AvroValue::String("high".to_string()))))
        );
    }

    #[test]
    fn test_missing_values_are_aggregated() {
        let (_, definition) = profile_definition();
        let model = Model::new(definition).with("id", 1i64).unwrap();

        let err = Encoder::default().encode(&model, SchemaRole::Value).unwrap_err();
        let CodecError::Validation(validation) = err else {
            panic!("expected validation error");
        };
        assert_eq!(validation.missing_attributes, vec!["name", "tags"]);
        assert_eq!(
            validation.message,
            "Profile cannot be serialized because the following attributes are nil: name, tags"
        );
    }

    #[test]
    fn test_missing_key_schema() {
        let (_, definition) = profile_definition();
        let model = Model::new(definition);
        let err = Encoder::default().encode_role(&model, false).unwrap_err();
        assert!(matches!(
            err,
            CodecError::MissingSchema {
                role: SchemaRole::Key,
                ..
            }
        ));
    }

    #[test]
    fn test_custom_type_serializer() {
        let (_, definition) = profile_definition();
        let definition = Arc::try_unwrap(definition)
            .unwrap()
            .with_custom_type(
                "name",
                CustomType::new(|value, _| match value {
                    HostValue::Symbol(s) => HostValue::String(s.to_lowercase()),
                    other => other.clone(),
                }),
            )
            .unwrap();
        let model = Model::new(Arc::new(definition))
            .with("id", 1i64)
            .unwrap()
            .with("name", HostValue::Symbol("ADA".to_string()))
            .unwrap()
            .with("tags", HostValue::Array(vec![]))
            .unwrap();

        let value = Encoder::default().to_avro_value(&model, SchemaRole::Value).unwrap();
        assert_eq!(value.field("name"), Some(&AvroValue::String("ada".to_string())));
    }

    #[test]
    fn test_type_mismatch_is_encode_error() {
        let (_, definition) = profile_definition();
        let model = Model::new(definition)
            .with("id", "not a number")
            .unwrap()
            .with("name", "n")
            .unwrap()
            .with("tags", HostValue::Array(vec![]))
            .unwrap();
        let err = Encoder::default().encode(&model, SchemaRole::Value).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Encode(EncodeError::TypeMismatch { ref path, .. }) if path == "id"
        ));
    }

    /// A model that lists only some of its schema's fields.
    #[derive(Debug)]
    struct PartialModel {
        schema: SchemaDefinition,
        fields: Vec<String>,
        id: HostValue,
    }

    impl HostModel for PartialModel {
        fn model_name(&self) -> &str {
            "Partial"
        }
        fn schema(&self, role: SchemaRole) -> Option<&SchemaDefinition> {
            (role == SchemaRole::Value).then_some(&self.schema)
        }
        fn field_names(&self, _role: SchemaRole) -> &[String] {
            &self.fields
        }
        fn attribute(&self, name: &str) -> Option<&HostValue> {
            (name == "id").then_some(&self.id)
        }
        fn attribute_type(&self, _name: &str) -> Option<&crate::host::AttributeType> {
            None
        }
        fn missing_attributes(&self) -> Vec<String> {
            Vec::new()
        }
    }

    #[test]
    fn test_unlisted_fields_use_null_or_default() {
        let model = PartialModel {
            schema: SchemaDefinition::from_json(
                r#"{"type": "record", "name": "Partial", "fields": [
                    {"name": "id", "type": "int"},
                    {"name": "note", "type": ["null", "string"]},
                    {"name": "level", "type": "int", "default": 3}
                ]}"#,
            ),
            fields: vec!["id".to_string()],
            id: HostValue::Int(1),
        };

        let value = Encoder::default().to_avro_value(&model, SchemaRole::Value).unwrap();
        assert_eq!(
            value,
            AvroValue::Record(vec![
                ("id".to_string(), AvroValue::Int(1)),
                ("note".to_string(), AvroValue::Union(0, Box::new(AvroValue::Null))),
                ("level".to_string(), AvroValue::Int(3)),
            ])
        );
    }

    #[test]
    fn test_missing_reported_when_validate_finds_nothing() {
        let model = PartialModel {
            schema: SchemaDefinition::from_json(
                r#"{"type": "record", "name": "Partial", "fields": [
                    {"name": "id", "type": "int"},
                    {"name": "level", "type": "int"}
                ]}"#,
            ),
            fields: vec!["id".to_string()],
            id: HostValue::Int(1),
        };

        let err = Encoder::default().encode(&model, SchemaRole::Value).unwrap_err();
        let CodecError::Validation(validation) = err else {
            panic!("expected validation error");
        };
        assert_eq!(validation.missing_attributes, vec!["level"]);
    }
}
