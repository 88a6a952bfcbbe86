// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mutable object builder.
//!
//! A builder is a copy-on-write overlay over an optional base
//! [`EncodedObject`]: an ordered list of overrides (set or removed) layered
//! over the base's fields. Nothing is encoded until [`ObjectBuilder::build`].
//!
//! Handles are cheap to clone and share one state, so a builder can be set
//! as a field of another builder (or of itself) before either is built.
//! Nested objects read through [`ObjectBuilder::get_field`] come back as
//! builders too; all builders spawned from one root share a context that
//! maps each base instance to its builder, so one nested instance reached
//! through several fields is edited once and written once.

use crate::error::Result;
use crate::object::EncodedObject;
use crate::registry::TypeRegistry;
use crate::value::Value;
use crate::writer::GraphWriter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

#[derive(Debug, Clone)]
pub(crate) enum Override {
    Set(Value),
    Removed,
}

pub(crate) struct BuilderState {
    type_id: i32,
    type_name: String,
    base: Option<EncodedObject>,
    /// (field id, name, entry) in first-set order.
    overrides: Vec<(i32, String, Override)>,
    /// Base fields already handed out with their objects wrapped in builders.
    cache: HashMap<i32, Value>,
    hash: Option<i32>,
}

impl BuilderState {
    fn upsert(&mut self, field_id: i32, name: &str, entry: Override) {
        self.cache.remove(&field_id);
        match self.overrides.iter_mut().find(|(id, _, _)| *id == field_id) {
            Some(slot) => {
                slot.1 = name.to_string();
                slot.2 = entry;
            }
            None => self.overrides.push((field_id, name.to_string(), entry)),
        }
    }
}

/// Copy of a builder's state taken for one write.
pub(crate) struct Snapshot {
    pub type_id: i32,
    pub base: Option<EncodedObject>,
    pub overrides: Vec<(i32, String, Override)>,
    pub cache: HashMap<i32, Value>,
    pub hash: Option<i32>,
}

/// Base instance -> builder editing it, shared by a builder family.
pub(crate) struct BuilderContext {
    registry: Arc<TypeRegistry>,
    spawned: Mutex<HashMap<(usize, usize), Weak<Mutex<BuilderState>>>>,
}

impl BuilderContext {
    fn new(registry: Arc<TypeRegistry>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            spawned: Mutex::new(HashMap::new()),
        })
    }

    /// Live builder registered for an encoded instance.
    pub fn lookup(self: &Arc<Self>, key: (usize, usize)) -> Option<ObjectBuilder> {
        let inner = self.spawned.lock().get(&key)?.upgrade()?;
        Some(ObjectBuilder {
            registry: Arc::clone(&self.registry),
            inner,
            ctx: Arc::clone(self),
        })
    }

    fn register(&self, key: (usize, usize), inner: &Arc<Mutex<BuilderState>>) {
        let mut spawned = self.spawned.lock();
        spawned.retain(|_, state| state.strong_count() > 0);
        spawned.insert(key, Arc::downgrade(inner));
    }

    #[cfg(test)]
    fn spawned_len(&self) -> usize {
        self.spawned.lock().len()
    }
}

/// Staging area for a new or edited object.
///
/// Owned by one caller at a time; clones are handles to the same builder.
#[derive(Clone)]
pub struct ObjectBuilder {
    registry: Arc<TypeRegistry>,
    inner: Arc<Mutex<BuilderState>>,
    ctx: Arc<BuilderContext>,
}

impl ObjectBuilder {
    /// Fresh builder for a type name.
    pub(crate) fn new(registry: Arc<TypeRegistry>, type_name: &str) -> Result<Self> {
        let type_id = registry.resolve_id(type_name)?;
        let ctx = BuilderContext::new(Arc::clone(&registry));
        let state = BuilderState {
            type_id,
            type_name: type_name.to_string(),
            base: None,
            overrides: Vec::new(),
            cache: HashMap::new(),
            hash: None,
        };
        Ok(Self {
            registry,
            inner: Arc::new(Mutex::new(state)),
            ctx,
        })
    }

    /// Builder over an existing object. An explicit hash on the base carries
    /// over.
    pub(crate) fn from_object(base: &EncodedObject) -> Self {
        let registry = Arc::clone(base.registry());
        let ctx = BuilderContext::new(Arc::clone(&registry));
        Self::over(registry, ctx, base.clone())
    }

    fn over(registry: Arc<TypeRegistry>, ctx: Arc<BuilderContext>, base: EncodedObject) -> Self {
        let key = base.key();
        let state = BuilderState {
            type_id: base.type_id(),
            type_name: registry.type_name(base.type_id()).unwrap_or_default(),
            hash: base.explicit_hash(),
            base: Some(base),
            overrides: Vec::new(),
            cache: HashMap::new(),
        };
        let builder = Self {
            registry,
            inner: Arc::new(Mutex::new(state)),
            ctx,
        };
        builder.ctx.register(key, &builder.inner);
        builder
    }

    /// Builder for a nested base instance, reusing the family's existing one.
    fn spawn(&self, view: EncodedObject) -> ObjectBuilder {
        self.ctx.lookup(view.key()).unwrap_or_else(|| {
            Self::over(Arc::clone(&self.registry), Arc::clone(&self.ctx), view)
        })
    }

    pub fn type_id(&self) -> i32 {
        self.inner.lock().type_id
    }

    pub fn type_name(&self) -> String {
        self.inner.lock().type_name.clone()
    }

    /// Set a field. Values may be scalars, containers, encoded objects or
    /// other builders; builders are encoded when this builder is built.
    pub fn set_field(&self, name: &str, value: impl Into<Value>) -> Result<&Self> {
        let value = value.into();
        let field_id = self.registry.resolve_field_id(self.type_id(), name)?;
        self.inner.lock().upsert(field_id, name, Override::Set(value));
        Ok(self)
    }

    /// Drop a field from the next build, even if the base has it.
    pub fn remove_field(&self, name: &str) -> Result<&Self> {
        let field_id = self.registry.resolve_field_id(self.type_id(), name)?;
        self.inner.lock().upsert(field_id, name, Override::Removed);
        Ok(self)
    }

    /// Current value of a field. Objects from the base come back wrapped in
    /// builders, so editing them is reflected in the next build.
    pub fn get_field(&self, name: &str) -> Result<Option<Value>> {
        let Some(field_id) = self.registry.field_id(self.type_id(), name) else {
            return Ok(None);
        };
        let base = {
            let state = self.inner.lock();
            if let Some((_, _, entry)) = state.overrides.iter().find(|(id, _, _)| *id == field_id) {
                return Ok(match entry {
                    Override::Set(value) => Some(value.clone()),
                    Override::Removed => None,
                });
            }
            if let Some(cached) = state.cache.get(&field_id) {
                return Ok(Some(cached.clone()));
            }
            match &state.base {
                Some(base) => base.clone(),
                None => return Ok(None),
            }
        };

        let Some(value) = base.get_field_by_id(field_id)? else {
            return Ok(None);
        };
        if !contains_object(&value) {
            return Ok(Some(value));
        }
        let wrapped = self.wrap(value);
        self.inner.lock().cache.insert(field_id, wrapped.clone());
        Ok(Some(wrapped))
    }

    fn wrap(&self, value: Value) -> Value {
        match value {
            Value::Object(view) => Value::Builder(self.spawn(view)),
            Value::ObjectArray(items) => {
                Value::ObjectArray(items.into_iter().map(|v| self.wrap(v)).collect())
            }
            Value::Collection(items) => {
                Value::Collection(items.into_iter().map(|v| self.wrap(v)).collect())
            }
            Value::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (self.wrap(k), self.wrap(v)))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Pin the hash for this and every later build.
    pub fn set_hash(&self, hash: i32) -> &Self {
        self.inner.lock().hash = Some(hash);
        self
    }

    /// Explicit hash, if one is set or inherited from the base.
    pub fn hash(&self) -> Option<i32> {
        self.inner.lock().hash
    }

    /// Encode into a new, independent buffer.
    ///
    /// Base fields that were not touched come first in their original order,
    /// then set fields in first-set order, then the base's raw segment.
    pub fn build(&self) -> Result<EncodedObject> {
        log::trace!("[portable] building '{}'", self.type_name());
        let mut writer = GraphWriter::new(&self.registry, None);
        writer.write_builder(self)?;
        EncodedObject::from_bytes(Arc::clone(&self.registry), writer.finish())
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let state = self.inner.lock();
        Snapshot {
            type_id: state.type_id,
            base: state.base.clone(),
            overrides: state.overrides.clone(),
            cache: state.cache.clone(),
            hash: state.hash,
        }
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    pub(crate) fn context(&self) -> &Arc<BuilderContext> {
        &self.ctx
    }
}

fn contains_object(value: &Value) -> bool {
    match value {
        Value::Object(_) | Value::Builder(_) | Value::Node(_) => true,
        Value::ObjectArray(items) | Value::Collection(items) => items.iter().any(contains_object),
        Value::Map(entries) => entries
            .iter()
            .any(|(k, v)| contains_object(k) || contains_object(v)),
        _ => false,
    }
}

impl PartialEq for ObjectBuilder {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ObjectBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ObjectBuilder");
        s.field("addr", &format_args!("{:#x}", self.addr()));
        // A builder can reach itself through its fields.
        if let Some(state) = self.inner.try_lock() {
            s.field("type_name", &state.type_name)
                .field("overrides", &state.overrides.len())
                .field("has_base", &state.base.is_some());
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortableConfig;

    fn registry() -> Arc<TypeRegistry> {
        Arc::new(TypeRegistry::new(PortableConfig::default()))
    }

    #[test]
    fn test_overrides_keep_first_set_order() {
        let b = ObjectBuilder::new(registry(), "Ordered").expect("builder");
        b.set_field("b", 1i32).expect("b");
        b.set_field("a", 2i32).expect("a");
        b.set_field("b", 3i32).expect("b again");

        let obj = b.build().expect("build");
        assert_eq!(obj.field_names().expect("names"), vec!["b", "a"]);
        assert_eq!(obj.field::<i32>("b").expect("b"), Some(3));
    }

    #[test]
    fn test_remove_then_set_again() {
        let b = ObjectBuilder::new(registry(), "Tomb").expect("builder");
        b.set_field("val", 1i32).expect("set");
        b.remove_field("val").expect("remove");
        assert_eq!(b.get_field("val").expect("get"), None);
        assert!(!b.build().expect("build").has_field("val"));

        b.set_field("val", 2i32).expect("set");
        assert_eq!(b.build().expect("build").field::<i32>("val").expect("val"), Some(2));
    }

    #[test]
    fn test_nested_base_objects_share_one_builder() {
        let reg = registry();
        let inner = ObjectBuilder::new(Arc::clone(&reg), "Inner").expect("inner");
        inner.set_field("v", 1i32).expect("v");
        let outer = ObjectBuilder::new(Arc::clone(&reg), "Outer").expect("outer");
        outer.set_field("a", &inner).expect("a");
        outer.set_field("b", &inner).expect("b");
        let obj = outer.build().expect("build");

        let edit = ObjectBuilder::from_object(&obj);
        let a = edit.get_field("a").expect("a").expect("present");
        let b = edit.get_field("b").expect("b").expect("present");
        assert_eq!(a, b);
        assert_eq!(edit.get_field("a").expect("again"), Some(a.clone()));

        a.as_builder().expect("builder").set_field("v", 7i32).expect("v");
        let rebuilt = edit.build().expect("rebuild");
        let ra = rebuilt.field::<EncodedObject>("a").expect("a").expect("present");
        let rb = rebuilt.field::<EncodedObject>("b").expect("b").expect("present");
        assert_eq!(ra.field::<i32>("v").expect("v"), Some(7));
        assert_eq!(ra.key(), rb.key());
    }

    #[test]
    fn test_dropped_spawns_are_pruned() {
        let reg = registry();
        let outer = ObjectBuilder::new(Arc::clone(&reg), "Outer").expect("outer");
        for i in 0..16 {
            let inner = ObjectBuilder::new(Arc::clone(&reg), "Inner").expect("inner");
            inner.set_field("v", i).expect("v");
            outer.set_field(&format!("f{}", i), &inner).expect("field");
        }
        let obj = outer.build().expect("build");

        let edit = ObjectBuilder::from_object(&obj);
        for i in 0..16 {
            let name = format!("f{}", i);
            let nested = edit.get_field(&name).expect("get").expect("present");
            assert!(nested.as_builder().is_some());
            // Dropping the override releases the spawned builder.
            edit.set_field(&name, i).expect("replace");
        }
        // Root plus the one spawn still alive when the last insert ran.
        assert!(edit.context().spawned_len() <= 2);
    }

    #[test]
    fn test_hash_persists() {
        let b = ObjectBuilder::new(registry(), "Hashed").expect("builder");
        b.set_hash(99);
        assert_eq!(b.build().expect("build").identity_hash(), 99);
        b.set_field("x", 1i32).expect("x");
        let obj = b.build().expect("build");
        assert_eq!(obj.identity_hash(), 99);
        assert_eq!(ObjectBuilder::from_object(&obj).hash(), Some(99));
    }

    #[test]
    fn test_debug_does_not_recurse_forever() {
        let b = ObjectBuilder::new(registry(), "SelfRef").expect("builder");
        b.set_field("me", &b).expect("me");
        let text = format!("{:?}", b);
        assert!(text.contains("SelfRef"));
    }
}
