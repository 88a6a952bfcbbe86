// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type registry: name to id assignment and field metadata accretion.
//!
//! One registry is shared (behind an `Arc`) by every encode, decode and
//! build that goes through a [`Marshaller`](crate::Marshaller). All tables
//! are `DashMap`s; first-id assignment and field merges go through the entry
//! API so concurrent discovery never loses a field.

mod descriptor;
mod id_mapper;

pub use descriptor::{FieldDescriptor, TypeDescriptor};
pub use id_mapper::{name_hash, IdMapper};

use crate::codec::WireTag;
use crate::config::{ConflictPolicy, PortableConfig};
use crate::error::{PortableError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug)]
struct TypeEntry {
    name: String,
    fields: Vec<FieldDescriptor>,
    metadata_enabled: bool,
}

/// Registry of type ids, field ids and observed field kinds.
#[derive(Debug)]
pub struct TypeRegistry {
    config: PortableConfig,
    mapper: Option<Arc<dyn IdMapper>>,
    /// Lower-cased type name -> id.
    ids: DashMap<String, i32>,
    types: DashMap<i32, TypeEntry>,
    /// (type id, field id) -> field name as first seen.
    field_names: DashMap<(i32, i32), String>,
}

impl TypeRegistry {
    pub fn new(config: PortableConfig) -> Self {
        Self {
            config,
            mapper: None,
            ids: DashMap::new(),
            types: DashMap::new(),
            field_names: DashMap::new(),
        }
    }

    pub fn with_id_mapper(config: PortableConfig, mapper: Arc<dyn IdMapper>) -> Self {
        Self {
            mapper: Some(mapper),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &PortableConfig {
        &self.config
    }

    /// Id for a type name, assigning (and registering) it on first use.
    ///
    /// Configured static ids win over the id mapper, which wins over the
    /// name hash. The first assignment is kept for the registry's lifetime.
    pub fn resolve_id(&self, name: &str) -> Result<i32> {
        if name.is_empty() {
            return Err(PortableError::invalid("type name is empty"));
        }
        if let Some(id) = self.ids.get(&name.to_lowercase()) {
            return Ok(*id);
        }

        let id = self
            .config
            .type_config(name)
            .and_then(|t| t.id)
            .or_else(|| self.mapper.as_ref().and_then(|m| m.type_id(name)))
            .unwrap_or_else(|| name_hash(name));
        self.register_type(name, id)?;
        Ok(id)
    }

    /// Bind `name` to `id`.
    ///
    /// Re-registering the same name is a no-op; a different name for a taken
    /// id is a collision.
    pub fn register_type(&self, name: &str, id: i32) -> Result<()> {
        if name.is_empty() {
            return Err(PortableError::invalid("type name is empty"));
        }
        let key = name.to_lowercase();
        match self.types.entry(id) {
            Entry::Occupied(existing) => {
                if existing.get().name.to_lowercase() != key {
                    return Err(PortableError::TypeIdCollision {
                        id,
                        existing: existing.get().name.clone(),
                        name: name.to_string(),
                    });
                }
            }
            Entry::Vacant(slot) => {
                let metadata_enabled = self
                    .config
                    .type_config(name)
                    .map_or(true, |t| t.metadata_enabled);
                log::debug!("[portable] registered type '{}' id={}", name, id);
                slot.insert(TypeEntry {
                    name: name.to_string(),
                    fields: Vec::new(),
                    metadata_enabled,
                });
            }
        }
        self.ids.entry(key).or_insert(id);
        Ok(())
    }

    /// Id for a field of `type_id`, recording its name for later lookups.
    pub fn resolve_field_id(&self, type_id: i32, field_name: &str) -> Result<i32> {
        let id = self
            .field_id(type_id, field_name)
            .ok_or_else(|| PortableError::invalid("field name is empty"))?;

        match self.field_names.entry((type_id, id)) {
            Entry::Occupied(existing) => {
                if existing.get().to_lowercase() != field_name.to_lowercase() {
                    return Err(PortableError::FieldIdCollision {
                        type_id,
                        id,
                        existing: existing.get().clone(),
                        name: field_name.to_string(),
                    });
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(field_name.to_string());
            }
        }
        Ok(id)
    }

    /// Field id a name would resolve to, without recording anything.
    pub fn field_id(&self, type_id: i32, field_name: &str) -> Option<i32> {
        if field_name.is_empty() {
            return None;
        }
        Some(
            self.mapper
                .as_ref()
                .and_then(|m| m.field_id(type_id, field_name))
                .unwrap_or_else(|| name_hash(field_name)),
        )
    }

    /// Name recorded for a field id.
    pub fn field_name(&self, type_id: i32, field_id: i32) -> Option<String> {
        self.field_names.get(&(type_id, field_id)).map(|n| n.clone())
    }

    /// Record that `field_name` was written with `tag`.
    ///
    /// New fields are appended, repeated observations of the same kind are
    /// no-ops. A different kind is resolved with the configured
    /// [`ConflictPolicy`]. A null only establishes a field: it never
    /// conflicts, and the first real kind seen afterwards replaces it.
    pub fn merge_field(&self, type_id: i32, field_name: &str, field_id: i32, tag: WireTag) -> Result<()> {
        let mut entry = self
            .types
            .get_mut(&type_id)
            .ok_or(PortableError::UnknownType(type_id))?;
        if !entry.metadata_enabled {
            return Ok(());
        }
        let observed = tag.field_kind();

        let Some(pos) = entry.fields.iter().position(|f| f.id == field_id) else {
            log::debug!(
                "[portable] type '{}' gained field '{}' ({})",
                entry.name,
                field_name,
                observed
            );
            entry
                .fields
                .push(FieldDescriptor::new(field_name, field_id, observed));
            return Ok(());
        };

        let existing = entry.fields[pos].wire_kind;
        if existing == observed || tag == WireTag::Null {
            return Ok(());
        }
        if existing == WireTag::Null {
            entry.fields[pos].wire_kind = observed;
            return Ok(());
        }
        match self.config.conflict_policy {
            ConflictPolicy::KeepFirst => {
                log::warn!(
                    "[portable] field '{}.{}' recorded as {}, ignoring observed {}",
                    entry.name,
                    field_name,
                    existing,
                    observed
                );
            }
            ConflictPolicy::KeepLatest => {
                log::warn!(
                    "[portable] field '{}.{}' recorded as {}, replacing with {}",
                    entry.name,
                    field_name,
                    existing,
                    observed
                );
                entry.fields[pos].wire_kind = observed;
            }
            ConflictPolicy::Reject => {
                return Err(PortableError::MetadataConflict {
                    type_name: entry.name.clone(),
                    field: field_name.to_string(),
                    existing: existing.to_string(),
                    observed: observed.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Whether objects of this type carry field metadata.
    pub fn metadata_enabled(&self, type_id: i32) -> bool {
        self.types.get(&type_id).map_or(true, |t| t.metadata_enabled)
    }

    /// Registered name of a type id.
    pub fn type_name(&self, type_id: i32) -> Option<String> {
        self.types.get(&type_id).map(|t| t.name.clone())
    }

    /// Descriptor by id.
    pub fn descriptor(&self, type_id: i32) -> Option<TypeDescriptor> {
        self.types.get(&type_id).map(|t| self.snapshot(type_id, &t))
    }

    /// Descriptor by name, without registering unknown names.
    pub fn descriptor_by_name(&self, name: &str) -> Option<TypeDescriptor> {
        let id = *self.ids.get(&name.to_lowercase())?;
        self.descriptor(id)
    }

    /// All registered types sorted by name.
    pub fn list_types(&self) -> Vec<TypeDescriptor> {
        let mut types: Vec<TypeDescriptor> = self
            .types
            .iter()
            .map(|t| self.snapshot(*t.key(), t.value()))
            .collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        types
    }

    fn snapshot(&self, id: i32, entry: &TypeEntry) -> TypeDescriptor {
        TypeDescriptor {
            name: entry.name.clone(),
            id,
            fields: entry.fields.clone(),
            metadata_enabled: entry.metadata_enabled,
            id_mapper: self.mapper.clone(),
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new(PortableConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TypeConfig;

    #[derive(Debug)]
    struct PinnedMapper;

    impl IdMapper for PinnedMapper {
        fn type_id(&self, type_name: &str) -> Option<i32> {
            match type_name {
                "Pinned" | "AlsoPinned" => Some(-65537),
                _ => None,
            }
        }

        fn field_id(&self, _type_id: i32, field_name: &str) -> Option<i32> {
            (field_name == "pinnedField").then_some(42)
        }
    }

    #[test]
    fn test_resolve_id_is_stable() {
        let reg = TypeRegistry::default();
        let id = reg.resolve_id("Address").expect("id");
        assert_eq!(id, name_hash("Address"));
        assert_eq!(reg.resolve_id("Address").expect("id"), id);
        assert_eq!(reg.resolve_id("address").expect("id"), id);
        assert_eq!(reg.type_name(id).as_deref(), Some("Address"));
        assert!(matches!(
            reg.resolve_id(""),
            Err(PortableError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_configured_id_beats_mapper() {
        let config = PortableConfig::builder()
            .type_config(TypeConfig::new("Pinned").with_id(5))
            .build();
        let reg = TypeRegistry::with_id_mapper(config, Arc::new(PinnedMapper));
        assert_eq!(reg.resolve_id("Pinned").expect("id"), 5);
        assert_eq!(reg.resolve_id("AlsoPinned").expect("id"), -65537);
        assert_eq!(reg.resolve_id("Other").expect("id"), name_hash("Other"));
        assert_eq!(reg.resolve_field_id(5, "pinnedField").expect("field"), 42);
        assert!(reg.descriptor(5).expect("desc").id_mapper.is_some());
    }

    #[test]
    fn test_configured_id_ignores_first_casing() {
        let config = PortableConfig::builder()
            .type_config(TypeConfig::new("Person").with_id(1001))
            .type_config(TypeConfig::new("Blob").without_metadata())
            .build();
        let reg = TypeRegistry::new(config);
        assert_eq!(reg.resolve_id("person").expect("lower"), 1001);
        assert_eq!(reg.resolve_id("Person").expect("exact"), 1001);
        let blob = reg.resolve_id("BLOB").expect("blob");
        assert!(!reg.metadata_enabled(blob));
    }

    #[test]
    fn test_type_id_collision() {
        let reg = TypeRegistry::with_id_mapper(PortableConfig::default(), Arc::new(PinnedMapper));
        reg.resolve_id("Pinned").expect("first");
        let err = reg.resolve_id("AlsoPinned").expect_err("collision");
        assert_eq!(
            err,
            PortableError::TypeIdCollision {
                id: -65537,
                existing: "Pinned".into(),
                name: "AlsoPinned".into(),
            }
        );
    }

    #[test]
    fn test_field_id_collision() {
        let reg = TypeRegistry::default();
        let tid = reg.resolve_id("T").expect("id");
        let id = reg.resolve_field_id(tid, "Name").expect("field");
        assert_eq!(reg.resolve_field_id(tid, "name").expect("same field"), id);
        // "aa" and "c#" share a hash under the 31-multiplier scheme.
        reg.resolve_field_id(tid, "Aa").expect("first");
        assert!(matches!(
            reg.resolve_field_id(tid, "C#"),
            Err(PortableError::FieldIdCollision { .. })
        ));
        assert_eq!(reg.field_name(tid, id).as_deref(), Some("Name"));
    }

    #[test]
    fn test_merge_accretes_in_first_observed_order() {
        let reg = TypeRegistry::default();
        let tid = reg.resolve_id("Sensor").expect("id");
        for (name, tag) in [("b", WireTag::Int), ("a", WireTag::String), ("b", WireTag::Int)] {
            let fid = reg.resolve_field_id(tid, name).expect("fid");
            reg.merge_field(tid, name, fid, tag).expect("merge");
        }
        let fid = reg.resolve_field_id(tid, "c").expect("fid");
        reg.merge_field(tid, "c", fid, WireTag::Null).expect("merge");

        let desc = reg.descriptor_by_name("sensor").expect("desc");
        assert_eq!(desc.field_names(), vec!["b", "a", "c"]);
        assert_eq!(desc.field_type_name("c"), Some("Object"));

        reg.merge_field(tid, "c", fid, WireTag::Long).expect("upgrade");
        let desc = reg.descriptor_by_name("sensor").expect("desc");
        assert_eq!(desc.field("c").map(|f| f.wire_kind), Some(WireTag::Long));
    }

    fn conflict(policy: ConflictPolicy) -> (TypeRegistry, Result<()>) {
        let reg = TypeRegistry::new(PortableConfig::builder().conflict_policy(policy).build());
        let tid = reg.resolve_id("T").expect("id");
        let fid = reg.resolve_field_id(tid, "v").expect("fid");
        reg.merge_field(tid, "v", fid, WireTag::Int).expect("first");
        reg.merge_field(tid, "v", fid, WireTag::Null).expect("null never conflicts");
        let res = reg.merge_field(tid, "v", fid, WireTag::Long);
        (reg, res)
    }

    #[test]
    fn test_conflict_policies() {
        let (reg, res) = conflict(ConflictPolicy::KeepFirst);
        res.expect("keep first");
        assert_eq!(reg.descriptor_by_name("T").expect("T").fields[0].wire_kind, WireTag::Int);

        let (reg, res) = conflict(ConflictPolicy::KeepLatest);
        res.expect("keep latest");
        assert_eq!(reg.descriptor_by_name("T").expect("T").fields[0].wire_kind, WireTag::Long);

        let (reg, res) = conflict(ConflictPolicy::Reject);
        assert!(matches!(res, Err(PortableError::MetadataConflict { .. })));
        assert_eq!(reg.descriptor_by_name("T").expect("T").fields[0].wire_kind, WireTag::Int);
    }

    #[test]
    fn test_metadata_disabled_type() {
        let config = PortableConfig::builder()
            .type_config(TypeConfig::new("Opaque").without_metadata())
            .build();
        let reg = TypeRegistry::new(config);
        let tid = reg.resolve_id("Opaque").expect("id");
        let fid = reg.resolve_field_id(tid, "f").expect("fid");
        reg.merge_field(tid, "f", fid, WireTag::Int).expect("merge");
        assert!(!reg.metadata_enabled(tid));
        assert!(reg.descriptor(tid).expect("desc").fields.is_empty());
        assert_eq!(reg.field_name(tid, fid).as_deref(), Some("f"));
    }

    #[test]
    fn test_list_types_sorted() {
        let reg = TypeRegistry::default();
        for name in ["Zeta", "Alpha", "Mid"] {
            reg.resolve_id(name).expect("id");
        }
        let names: Vec<String> = reg.list_types().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Alpha", "Mid", "Zeta"]);
        assert!(reg.descriptor_by_name("Unknown").is_none());
    }

    #[test]
    fn test_concurrent_merge_keeps_every_field() {
        let reg = Arc::new(TypeRegistry::default());
        std::thread::scope(|scope| {
            for t in 0..8 {
                let reg = Arc::clone(&reg);
                scope.spawn(move || {
                    let tid = reg.resolve_id("Shared").expect("id");
                    for i in 0..32 {
                        let name = format!("f{}_{}", t, i);
                        let fid = reg.resolve_field_id(tid, &name).expect("fid");
                        reg.merge_field(tid, &name, fid, WireTag::Int).expect("merge");
                    }
                });
            }
        });
        let desc = reg.descriptor_by_name("Shared").expect("desc");
        assert_eq!(desc.fields.len(), 8 * 32);
    }
}
