use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Error;
use crate::query::QueryBuilder;
use crate::value::Value;

/// A read-through cache for high-frequency key→value lookups (style
/// elements, parameters). One equality constraint, the domain, is
/// pinned at construction; one property supplies the outer cache key
/// and any number of value properties fill the inner map. After a
/// single `execute`, lookups never touch the database again.
///
/// Population is atomic: either the whole result set lands in the
/// cache or none of it does. Zero rows leave the cache empty but valid.
pub struct Collector {
    builder: QueryBuilder,
    key_property: Option<String>,
    value_properties: Vec<String>,
    cache: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Collector {
    pub(crate) fn new(builder: QueryBuilder) -> Self {
        Self {
            builder,
            key_property: None,
            value_properties: Vec::new(),
            cache: BTreeMap::new(),
        }
    }

    /// Designate the property whose column supplies the outer cache
    /// key. An optional value narrows the query to that one key.
    pub fn set_key_property(
        &mut self,
        name: &str,
        value: Option<Value>,
    ) -> Result<(), Error> {
        if let Some(value) = value {
            self.builder.add_constraint(name, "=", value)?;
        }
        self.key_property = Some(name.to_string());
        Ok(())
    }

    /// Add one projected value property. Repeatable.
    pub fn add_value_property(&mut self, name: &str) -> Result<(), Error> {
        self.value_properties.push(name.to_string());
        Ok(())
    }

    /// Run the underlying query once and populate the cache. Returns
    /// `false` when the key property is unset (no SQL is issued) or the
    /// query matched no rows.
    pub async fn execute(&mut self) -> Result<bool, Error> {
        let Some(key) = self.key_property.clone() else {
            debug!("collector execute with no key property");
            return Ok(false);
        };

        let mut names = Vec::with_capacity(1 + self.value_properties.len());
        names.push(key.clone());
        names.extend(self.value_properties.iter().cloned());

        let rows = self.builder.execute_fields(&names).await?;

        let mut fresh: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
        for mut row in rows {
            let Some(key_value) = row.remove(&key) else {
                continue;
            };
            let entry = fresh.entry(key_value.to_string()).or_default();
            for name in &self.value_properties {
                if let Some(value) = row.remove(name) {
                    entry.insert(name.clone(), value);
                }
            }
        }

        let populated = !fresh.is_empty();
        self.cache = fresh;
        Ok(populated)
    }

    // ==================== Cache access ====================

    pub fn get(&self, key: &str) -> Option<&BTreeMap<String, Value>> {
        self.cache.get(key)
    }

    pub fn get_subkey(&self, key: &str, subkey: &str) -> Option<&Value> {
        self.cache.get(key)?.get(subkey)
    }

    pub fn list_keys(&self) -> Vec<String> {
        self.cache.keys().cloned().collect()
    }

    /// Manual cache population, bypassing query execution. Without a
    /// subkey the key is merely marked present (empty subkey map), so
    /// `list_keys` reports it.
    pub fn set(&mut self, key: &str, subkey: Option<&str>, value: Value) {
        let entry = self.cache.entry(key.to_string()).or_default();
        if let Some(subkey) = subkey {
            entry.insert(subkey.to_string(), value);
        }
    }

    /// Copy `other`'s keys into this cache. With `overwrite`, existing
    /// keys are replaced; without, only absent keys are copied.
    pub fn merge(&mut self, other: &Collector, overwrite: bool) {
        for (key, subkeys) in &other.cache {
            if overwrite || !self.cache.contains_key(key) {
                self.cache.insert(key.clone(), subkeys.clone());
            }
        }
    }

    pub fn remove_key(&mut self, key: &str) -> bool {
        self.cache.remove(key).is_some()
    }

    // ==================== Builder passthrough ====================
    //
    // All of these shape the underlying query and only make sense
    // before `execute`.

    pub fn add_constraint(
        &mut self,
        name: &str,
        op: &str,
        value: impl Into<Value>,
    ) -> Result<(), Error> {
        self.builder.add_constraint(name, op, value)
    }

    pub fn add_constraint_with_property(
        &mut self,
        name_a: &str,
        op: &str,
        name_b: &str,
    ) -> Result<(), Error> {
        self.builder.add_constraint_with_property(name_a, op, name_b)
    }

    pub fn begin_group(&mut self, op: &str) -> Result<(), Error> {
        self.builder.begin_group(op)
    }

    pub fn end_group(&mut self) -> Result<(), Error> {
        self.builder.end_group()
    }

    pub fn add_order(&mut self, name: &str, direction: &str) -> Result<(), Error> {
        self.builder.add_order(name, direction)
    }

    pub fn set_limit(&mut self, limit: u64) {
        self.builder.set_limit(limit);
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.builder.set_offset(offset);
    }

    pub fn set_language(&mut self, lang: u32) {
        self.builder.set_language(lang);
    }

    pub fn unset_languages(&mut self) {
        self.builder.unset_languages();
    }

    pub fn include_deleted(&mut self) {
        self.builder.include_deleted();
    }
}
