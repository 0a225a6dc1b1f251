//! Model instances holding attribute values.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::UnknownAttributeError;
use crate::host::{AttributeType, HostModel, HostValue, SchemaRole};
use crate::model::ModelDefinition;
use crate::schema::SchemaDefinition;

/// A model instance: a definition plus attribute values.
///
/// Attributes start at their schema defaults. Values are not coerced; the
/// encoder checks them against the schema.
#[derive(Debug, Clone)]
pub struct Model {
    definition: Arc<ModelDefinition>,
    values: HashMap<String, HostValue>,
}

impl Model {
    /// Create an instance with every attribute at its default.
    pub fn new(definition: Arc<ModelDefinition>) -> Self {
        let values = definition
            .attributes()
            .iter()
            .filter_map(|attr| attr.default.clone().map(|d| (attr.name.clone(), d)))
            .collect();
        Self { definition, values }
    }

    /// Create an instance from a decoded record mapping.
    ///
    /// Entries the definition does not know are rejected.
    pub fn from_record(
        definition: Arc<ModelDefinition>,
        record: HostValue,
    ) -> Result<Self, UnknownAttributeError> {
        let mut model = Self::new(definition);
        if let HostValue::Record(entries) = record {
            for (name, value) in entries {
                model.set(&name, value)?;
            }
        }
        Ok(model)
    }

    /// Builder-style [`Model::set`].
    pub fn with(
        mut self,
        name: &str,
        value: impl Into<HostValue>,
    ) -> Result<Self, UnknownAttributeError> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Set an attribute value.
    pub fn set(&mut self, name: &str, value: impl Into<HostValue>) -> Result<(), UnknownAttributeError> {
        let index = self.definition.attribute_index(name)?;
        let name = self.definition.attributes()[index].name.clone();
        self.values.insert(name, value.into());
        Ok(())
    }

    /// Current value of an attribute.
    pub fn get(&self, name: &str) -> Option<&HostValue> {
        self.values.get(name)
    }

    /// The model's definition.
    pub fn definition(&self) -> &Arc<ModelDefinition> {
        &self.definition
    }

    /// Wrap the instance for use as a nested attribute value.
    pub fn into_value(self) -> HostValue {
        HostValue::Model(Arc::new(self))
    }
}

impl HostModel for Model {
    fn model_name(&self) -> &str {
        self.definition.name()
    }

    fn schema(&self, role: SchemaRole) -> Option<&SchemaDefinition> {
        self.definition.schema(role).map(Arc::as_ref)
    }

    fn field_names(&self, role: SchemaRole) -> &[String] {
        self.definition.fields(role)
    }

    fn attribute(&self, name: &str) -> Option<&HostValue> {
        self.values.get(name)
    }

    fn attribute_type(&self, name: &str) -> Option<&AttributeType> {
        self.definition.attribute(name).map(|attr| &attr.attribute_type)
    }

    fn missing_attributes(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for attr in self.definition.attributes() {
            match self.values.get(&attr.name) {
                None | Some(HostValue::Null) => {
                    if attr.required {
                        missing.push(attr.name.clone());
                    }
                }
                Some(value) => missing_nested(&attr.name, value, &mut missing),
            }
        }
        missing
    }
}

fn missing_nested(path: &str, value: &HostValue, missing: &mut Vec<String>) {
    match value {
        HostValue::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                missing_nested(&format!("{}[{}]", path, index), item, missing);
            }
        }
        HostValue::Map(entries) => {
            for (key, entry) in entries {
                missing_nested(&format!("{}['{}']", path, key), entry, missing);
            }
        }
        HostValue::Model(model) => {
            missing.extend(
                model
                    .missing_attributes()
                    .into_iter()
                    .map(|child| format!("{}.{}", path, child)),
            );
        }
        HostValue::Union(datum) => missing_nested(path, &datum.datum, missing),
        _ => {}
    }
}
