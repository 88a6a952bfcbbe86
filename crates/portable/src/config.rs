// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Marshaller configuration.

use crate::error::{PortableError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default recursion bound for encode and decode.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// What the registry does when a field is observed with a second wire kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Keep the kind recorded first, log a warning.
    #[default]
    KeepFirst,
    /// Replace the recorded kind with the newly observed one, log a warning.
    KeepLatest,
    /// Fail the write that observed the conflicting kind.
    Reject,
}

/// Per-type settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeConfig {
    /// Type name as used by builders and `Portable::type_name`.
    pub name: String,

    /// Static type id, bypassing the id mapper and the name hash.
    #[serde(default)]
    pub id: Option<i32>,

    /// When false, objects of this type carry the no-metadata flag and
    /// their fields are not accreted into the type descriptor.
    #[serde(default = "default_true")]
    pub metadata_enabled: bool,
}

impl TypeConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            metadata_enabled: true,
        }
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn without_metadata(mut self) -> Self {
        self.metadata_enabled = false;
        self
    }
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

/// Marshaller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortableConfig {
    /// Resolution of same-field/different-kind observations
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    /// Maximum object nesting on encode and decode
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Explicitly configured types
    #[serde(default)]
    pub types: Vec<TypeConfig>,
}

impl Default for PortableConfig {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            types: Vec::new(),
        }
    }
}

impl PortableConfig {
    /// Create a new config builder
    pub fn builder() -> PortableConfigBuilder {
        PortableConfigBuilder::default()
    }

    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PortableError::Config(e.to_string()))
    }

    /// Load a JSON document from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PortableError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Settings for `name`, if configured. Type names match ignoring case,
    /// like type ids.
    pub fn type_config(&self, name: &str) -> Option<&TypeConfig> {
        let name = name.to_lowercase();
        self.types.iter().find(|t| t.name.to_lowercase() == name)
    }
}

/// Config builder for fluent API
#[derive(Debug, Default)]
pub struct PortableConfigBuilder {
    conflict_policy: Option<ConflictPolicy>,
    max_depth: Option<usize>,
    types: Vec<TypeConfig>,
}

impl PortableConfigBuilder {
    /// Set the metadata conflict policy (default: keep first)
    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = Some(policy);
        self
    }

    /// Set the maximum nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Add a type configuration
    pub fn type_config(mut self, config: TypeConfig) -> Self {
        self.types.push(config);
        self
    }

    /// Build the configuration
    pub fn build(self) -> PortableConfig {
        let defaults = PortableConfig::default();

        PortableConfig {
            conflict_policy: self.conflict_policy.unwrap_or(defaults.conflict_policy),
            max_depth: self.max_depth.unwrap_or(defaults.max_depth),
            types: self.types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PortableConfig::default();
        assert_eq!(config.conflict_policy, ConflictPolicy::KeepFirst);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.types.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = PortableConfig::builder()
            .conflict_policy(ConflictPolicy::Reject)
            .max_depth(16)
            .type_config(TypeConfig::new("Sensor").with_id(7))
            .type_config(TypeConfig::new("Opaque").without_metadata())
            .build();

        assert_eq!(config.conflict_policy, ConflictPolicy::Reject);
        assert_eq!(config.max_depth, 16);
        assert_eq!(config.type_config("Sensor").and_then(|t| t.id), Some(7));
        assert!(!config.type_config("Opaque").expect("opaque").metadata_enabled);
        assert!(config.type_config("Missing").is_none());
        assert_eq!(config.type_config("sensor").and_then(|t| t.id), Some(7));
        assert!(!config.type_config("OPAQUE").expect("opaque").metadata_enabled);
    }

    #[test]
    fn test_config_from_json_defaults() {
        let config = PortableConfig::from_json_str(
            r#"{ "conflict_policy": "keep_latest", "types": [ { "name": "A" } ] }"#,
        )
        .expect("parse");
        assert_eq!(config.conflict_policy, ConflictPolicy::KeepLatest);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        let a = config.type_config("A").expect("A");
        assert!(a.metadata_enabled);
        assert_eq!(a.id, None);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{ "max_depth": 8 }}"#).expect("write");
        let config = PortableConfig::from_file(file.path()).expect("load");
        assert_eq!(config.max_depth, 8);

        let err = PortableConfig::from_json_str("{ not json").expect_err("bad json");
        assert!(matches!(err, PortableError::Config(_)));
    }
}
