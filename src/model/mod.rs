//! Reference host model implementation.
//!
//! [`ModelDefinition`] derives attributes from Avro record schemas, and
//! [`Model`] holds values for them and implements [`HostModel`].
//!
//! [`HostModel`]: crate::host::HostModel

mod definition;
mod instance;

pub use definition::{attribute_type, AttributeDefinition, ModelDefinition};
pub use instance::Model;
