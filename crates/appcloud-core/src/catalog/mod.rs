//! Service catalog: type → vendor → version → tier.
//!
//! The controller publishes the catalog as nested JSON objects keyed by
//! arbitrary names. Each level decodes into an [`OrderedMap`] so the
//! document order survives; it is the tie-breaker when tiers are sorted
//! for presentation.

pub mod pricing;
pub mod resolver;

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use pricing::{PricingDescriptor, PricingModel};
pub use resolver::{Candidate, ChoiceLevel, Chooser, ServiceRequest, ServiceResolver};

/// String-keyed map that keeps entries in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert or replace, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_key_value(&self, key: &str) -> Option<(&str, &V)> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k, v)))
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = OrderedMap::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// Whole catalog, keyed by service type (e.g. `database`).
pub type ServiceCatalog = OrderedMap<ServiceType>;

/// Vendors offering one service type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ServiceType {
    pub vendors: OrderedMap<ServiceVendor>,
}

/// Versions published by one vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ServiceVendor {
    pub versions: OrderedMap<ServiceVersion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ServiceVersion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tiers: OrderedMap<TierDescriptor>,
}

/// A pricing/capability level within a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TierDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Presentation order; lower first, ties keep catalog order.
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub options: OrderedMap<OptionSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSchema {
    #[serde(rename = "type")]
    pub kind: OptionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "scalar_list")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    /// One value from an enumerated set.
    Value,
    /// Any kind the client does not prompt for.
    #[serde(other)]
    Unsupported,
}

/// One row of the services directory (`info services`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub service_type: String,
    pub vendor: String,
    pub version: String,
    pub description: Option<String>,
}

/// Flatten the catalog to one row per type/vendor/version.
pub fn directory(catalog: &ServiceCatalog) -> Vec<DirectoryEntry> {
    let mut rows = Vec::new();
    for (service_type, vendors) in catalog.iter() {
        for (vendor, versions) in vendors.vendors.iter() {
            for (version, entry) in versions.versions.iter() {
                rows.push(DirectoryEntry {
                    service_type: service_type.to_string(),
                    vendor: vendor.to_string(),
                    version: version.to_string(),
                    description: entry.description.clone(),
                });
            }
        }
    }
    rows
}

fn scalar_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let values = Vec::<Value>::deserialize(deserializer)?;
    values
        .iter()
        .map(|v| {
            crate::gateway::wire::scalar_to_string(v)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid option value {v}")))
        })
        .collect()
}

/// Amounts keyed by option value.
pub(crate) type PriceTable = BTreeMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "key-value": {
            "redis": {"2.0": {"description": "Redis key-value store", "tiers": {
                "free": {"description": "Free", "order": 1}
            }}}
        },
        "database": {
            "mysql": {"5.1.45": {"description": "MySQL database", "tiers": {
                "std": {"description": "Standard", "order": 2},
                "free": {"description": "Free", "order": 1,
                    "options": {"size": {"type": "value", "description": "Size", "values": ["256MiB", 512]}},
                    "pricing": {"type": "flat", "period": "month", "values": {"256MiB": 0, "512": 5}}}
            }}}
        }
    }"#;

    #[test]
    fn decodes_in_document_order() {
        let catalog: ServiceCatalog = serde_json::from_str(CATALOG).unwrap();
        let types: Vec<_> = catalog.keys().collect();
        assert_eq!(types, vec!["key-value", "database"]);

        let tiers: Vec<_> = catalog.get("database").unwrap().vendors.get("mysql").unwrap()
            .versions
            .get("5.1.45")
            .unwrap()
            .tiers
            .keys()
            .collect();
        assert_eq!(tiers, vec!["std", "free"]);
    }

    #[test]
    fn option_values_accept_numbers() {
        let catalog: ServiceCatalog = serde_json::from_str(CATALOG).unwrap();
        let tier = &catalog.get("database").unwrap().vendors.get("mysql").unwrap().versions
            .get("5.1.45")
            .unwrap()
            .tiers;
        let size = tier.get("free").unwrap().options.get("size").unwrap();
        assert_eq!(size.kind, OptionKind::Value);
        assert_eq!(size.values, vec!["256MiB", "512"]);
    }

    #[test]
    fn unknown_option_kind_is_unsupported() {
        let schema: OptionSchema =
            serde_json::from_str(r#"{"type": "text", "description": "Label"}"#).unwrap();
        assert_eq!(schema.kind, OptionKind::Unsupported);
        assert!(schema.values.is_empty());
    }

    #[test]
    fn directory_flattens_catalog() {
        let catalog: ServiceCatalog = serde_json::from_str(CATALOG).unwrap();
        let rows = directory(&catalog);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].service_type, "database");
        assert_eq!(rows[1].description.as_deref(), Some("MySQL database"));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut map: OrderedMap<u32> = [("a", 1), ("b", 2)].into_iter().collect();
        map.insert("a", 3);
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![("a", &3), ("b", &2)]);
    }
}
