//! Operation descriptors: which operations are cached, for how long, and
//! which other operations invalidate them.

use std::collections::HashMap;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ConfigError;

/// Caching policy of one read operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OperationDescriptor {
    /// How long a stored result stays valid.
    #[serde(deserialize_with = "crate::transport::config::de::seconds")]
    pub ttl: Duration,

    /// Operations whose successful completion discards this operation's
    /// cached results.
    #[serde(default, rename = "clear_on")]
    pub cleared_by: Vec<String>,
}

impl OperationDescriptor {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cleared_by: Vec::new(),
        }
    }

    pub fn cleared_by<I, S>(mut self, operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cleared_by
            .extend(operations.into_iter().map(Into::into));
        self
    }
}

/// The cacheable operations of an API, plus the reverse index from each
/// invalidating operation to the caches it clears.
///
/// Deserializes from `{"show_vlans": {"ttl": 60, "clear_on": ["create_vlan"]}}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "IndexMap<String, OperationDescriptor>")]
pub struct OperationTable {
    operations: IndexMap<String, OperationDescriptor>,
    clears: HashMap<String, Vec<String>>,
}

impl OperationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a table from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Add (or replace) an operation.
    pub fn with(mut self, name: impl Into<String>, descriptor: OperationDescriptor) -> Self {
        self.insert(name.into(), descriptor);
        self
    }

    /// Shorthand for [`with`](Self::with).
    pub fn cacheable(self, name: &str, ttl: Duration, cleared_by: &[&str]) -> Self {
        self.with(
            name,
            OperationDescriptor::new(ttl).cleared_by(cleared_by.iter().copied()),
        )
    }

    fn insert(&mut self, name: String, descriptor: OperationDescriptor) {
        self.operations.insert(name, descriptor);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.clears.clear();
        for (name, descriptor) in &self.operations {
            for writer in &descriptor.cleared_by {
                let targets = self.clears.entry(writer.clone()).or_default();
                if !targets.contains(name) {
                    targets.push(name.clone());
                }
            }
        }
    }

    pub fn get(&self, operation: &str) -> Option<&OperationDescriptor> {
        self.operations.get(operation)
    }

    pub fn is_cacheable(&self, operation: &str) -> bool {
        self.operations.contains_key(operation)
    }

    /// The cached operations a successful `operation` invalidates.
    pub fn invalidated_by(&self, operation: &str) -> &[String] {
        self.clears
            .get(operation)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OperationDescriptor)> {
        self.operations.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<IndexMap<String, OperationDescriptor>> for OperationTable {
    fn from(operations: IndexMap<String, OperationDescriptor>) -> Self {
        let mut table = Self {
            operations,
            clears: HashMap::new(),
        };
        table.reindex();
        table
    }
}

impl FromIterator<(String, OperationDescriptor)> for OperationTable {
    fn from_iter<T: IntoIterator<Item = (String, OperationDescriptor)>>(iter: T) -> Self {
        Self::from(iter.into_iter().collect::<IndexMap<_, _>>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_index() {
        let table = OperationTable::new()
            .cacheable("show_vlans", Duration::from_secs(60), &["create_vlan", "destroy_vlan"])
            .cacheable("show_interfaces", Duration::from_secs(60), &["interface_attach_vlan"])
            .cacheable("show_lags", Duration::from_secs(60), &["create_vlan"]);

        assert_eq!(table.invalidated_by("create_vlan"), &["show_vlans", "show_lags"]);
        assert_eq!(table.invalidated_by("interface_attach_vlan"), &["show_interfaces"]);
        assert!(table.invalidated_by("show_vlans").is_empty());
        assert!(table.is_cacheable("show_vlans"));
        assert!(!table.is_cacheable("create_vlan"));
    }

    #[test]
    fn test_from_json() {
        let table = OperationTable::from_json(
            r#"{
                "show_hostname": {"ttl": 300},
                "show_vlans": {"ttl": 60, "clear_on": ["create_vlan"]}
            }"#,
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get("show_hostname").unwrap().ttl,
            Duration::from_secs(300)
        );
        assert_eq!(table.invalidated_by("create_vlan"), &["show_vlans"]);
        let names: Vec<_> = table.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["show_hostname", "show_vlans"]);
    }

    #[test]
    fn test_from_json_rejects_missing_ttl() {
        assert!(OperationTable::from_json(r#"{"show_vlans": {"clear_on": []}}"#).is_err());
    }

    #[test]
    fn test_replacing_an_operation_reindexes() {
        let table = OperationTable::new()
            .cacheable("show_vlans", Duration::from_secs(60), &["create_vlan"])
            .cacheable("show_vlans", Duration::from_secs(60), &["destroy_vlan"]);

        assert!(table.invalidated_by("create_vlan").is_empty());
        assert_eq!(table.invalidated_by("destroy_vlan"), &["show_vlans"]);
    }
}
