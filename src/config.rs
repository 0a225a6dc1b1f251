//! Codec configuration.

use std::fmt;

use chrono::NaiveDate;

use crate::reader::decode::DEFAULT_MAX_BLOCK_ITEMS;
use crate::union::{default_union_wrapper, UnionWrapper};

/// Configuration shared by the encoder and decoder.
///
/// # Example
/// ```
/// use avro_model_codec::CodecConfig;
/// use chrono::NaiveDate;
///
/// let config = CodecConfig::new()
///     .with_epoch(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap())
///     .with_strict_schema(true);
/// assert!(config.strict_schema);
/// ```
#[derive(Clone)]
pub struct CodecConfig {
    /// Day zero of the `date` logical type (default: 1970-01-01).
    pub epoch: NaiveDate,
    /// Builds the host wrapper for decoded true-union values.
    pub union_wrapper: UnionWrapper,
    /// Reject schemas with invalid names or union layouts instead of
    /// warning (default: false).
    pub strict_schema: bool,
    /// Most items one decoded array or map may hold when its items take no
    /// bytes on the wire, such as `null` (default: 1048576).
    pub max_block_items: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            epoch: NaiveDate::default(),
            union_wrapper: default_union_wrapper(),
            strict_schema: false,
            max_block_items: DEFAULT_MAX_BLOCK_ITEMS,
        }
    }
}

impl fmt::Debug for CodecConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecConfig")
            .field("epoch", &self.epoch)
            .field("strict_schema", &self.strict_schema)
            .field("max_block_items", &self.max_block_items)
            .finish_non_exhaustive()
    }
}

impl CodecConfig {
    /// Create a new CodecConfig with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the date epoch.
    pub fn with_epoch(mut self, epoch: NaiveDate) -> Self {
        self.epoch = epoch;
        self
    }

    /// Set the union wrapper factory.
    pub fn with_union_wrapper(mut self, wrapper: UnionWrapper) -> Self {
        self.union_wrapper = wrapper;
        self
    }

    /// Enable or disable strict schema parsing.
    pub fn with_strict_schema(mut self, strict: bool) -> Self {
        self.strict_schema = strict;
        self
    }

    /// Set the item cap for arrays and maps of zero-size items.
    pub fn with_max_block_items(mut self, max_block_items: usize) -> Self {
        self.max_block_items = max_block_items;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostValue;
    use std::sync::Arc;

    #[test]
    fn test_codec_config_default() {
        let config = CodecConfig::default();
        assert_eq!(config.epoch, NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
        assert!(!config.strict_schema);
        assert_eq!(config.max_block_items, 1 << 20);
        assert!(matches!(
            (config.union_wrapper)(1, HostValue::Int(2)),
            HostValue::Union(_)
        ));
    }

    #[test]
    fn test_codec_config_builder() {
        let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let config = CodecConfig::new()
            .with_epoch(epoch)
            .with_strict_schema(true)
            .with_max_block_items(16)
            .with_union_wrapper(Arc::new(|_: usize, value: HostValue| value));

        assert_eq!(config.epoch, epoch);
        assert!(config.strict_schema);
        assert_eq!(config.max_block_items, 16);
        assert_eq!((config.union_wrapper)(0, HostValue::Int(2)), HostValue::Int(2));
    }

    #[test]
    fn test_codec_config_debug() {
        let debug = format!("{:?}", CodecConfig::default());
        assert!(debug.contains("CodecConfig"));
        assert!(debug.contains("1970-01-01"));
    }
}
