//! Resolve a partial service request against the catalog.
//!
//! Resolution walks type → vendor → version → tier → options. A level the
//! request already names is validated; a level with a single candidate is
//! taken automatically; anything else is deferred to the injected
//! [`Chooser`]. The algorithm itself never touches a terminal.

use std::collections::BTreeMap;

use tracing::debug;

use super::pricing::{PricingDescriptor, format_price};
use super::{OptionKind, OrderedMap, ServiceCatalog, TierDescriptor};
use crate::error::{CloudError, CloudResult};
use crate::types::{Price, ServiceManifest};

/// What the caller already knows about the service to provision.
#[derive(Debug, Clone, Default)]
pub struct ServiceRequest {
    /// Explicit service name; defaults to `<name_prefix>_<type>`.
    pub name: Option<String>,
    pub name_prefix: String,
    pub service_type: Option<String>,
    pub vendor: Option<String>,
    pub version: Option<String>,
    pub tier: Option<String>,
    /// Pre-selected option values.
    pub options: BTreeMap<String, String>,
}

impl ServiceRequest {
    pub fn new(name_prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = Some(tier.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// The catalog level a choice is being made at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceLevel {
    Type,
    Vendor {
        service_type: String,
    },
    Version {
        service_type: String,
        vendor: String,
    },
    Tier {
        service_type: String,
        vendor: String,
    },
    Option {
        name: String,
        description: Option<String>,
    },
}

impl ChoiceLevel {
    /// Singular noun for messages (`vendor`, `tier`, ...).
    pub fn noun(&self) -> &'static str {
        match self {
            ChoiceLevel::Type => "service type",
            ChoiceLevel::Vendor { .. } => "vendor",
            ChoiceLevel::Version { .. } => "version",
            ChoiceLevel::Tier { .. } => "tier",
            ChoiceLevel::Option { .. } => "option value",
        }
    }

    fn context(&self) -> String {
        match self {
            ChoiceLevel::Type => String::new(),
            ChoiceLevel::Vendor { service_type } => format!("{service_type} services"),
            ChoiceLevel::Version {
                service_type,
                vendor,
            }
            | ChoiceLevel::Tier {
                service_type,
                vendor,
            } => format!("{vendor} {service_type}"),
            ChoiceLevel::Option { name, .. } => format!("option '{name}'"),
        }
    }
}

/// One selectable entry: the catalog key and how to present it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub key: String,
    pub label: String,
}

impl Candidate {
    fn plain(key: &str) -> Self {
        Self {
            key: key.to_string(),
            label: key.to_string(),
        }
    }
}

/// Capability to pick among several eligible catalog entries.
pub trait Chooser {
    /// Return the index of the chosen candidate.
    fn choose(&mut self, level: &ChoiceLevel, candidates: &[Candidate]) -> anyhow::Result<usize>;

    /// Called when a level resolved to its only candidate.
    fn auto_selected(&mut self, _level: &ChoiceLevel, _candidate: &Candidate) {}

    /// Name for the new service; `None` keeps the default.
    fn service_name(&mut self, _default: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

impl<F> Chooser for F
where
    F: FnMut(&ChoiceLevel, &[Candidate]) -> anyhow::Result<usize>,
{
    fn choose(&mut self, level: &ChoiceLevel, candidates: &[Candidate]) -> anyhow::Result<usize> {
        self(level, candidates)
    }
}

pub struct ServiceResolver<'a> {
    catalog: &'a ServiceCatalog,
}

impl<'a> ServiceResolver<'a> {
    pub fn new(catalog: &'a ServiceCatalog) -> Self {
        Self { catalog }
    }

    /// Produce a fully specified manifest for `request`.
    pub fn resolve(
        &self,
        request: &ServiceRequest,
        chooser: &mut dyn Chooser,
    ) -> CloudResult<ServiceManifest> {
        let level = ChoiceLevel::Type;
        let (service_type, vendors) = pick(
            &level,
            self.catalog,
            request.service_type.as_deref(),
            plain_candidates(self.catalog),
            chooser,
        )?;

        let level = ChoiceLevel::Vendor {
            service_type: service_type.to_string(),
        };
        let (vendor, versions) = pick(
            &level,
            &vendors.vendors,
            request.vendor.as_deref(),
            plain_candidates(&vendors.vendors),
            chooser,
        )?;

        let level = ChoiceLevel::Version {
            service_type: service_type.to_string(),
            vendor: vendor.to_string(),
        };
        let (version, version_entry) = pick(
            &level,
            &versions.versions,
            request.version.as_deref(),
            plain_candidates(&versions.versions),
            chooser,
        )?;

        let level = ChoiceLevel::Tier {
            service_type: service_type.to_string(),
            vendor: vendor.to_string(),
        };
        let tiers = ordered_tiers(&version_entry.tiers);
        let (tier, tier_entry) = pick(
            &level,
            &version_entry.tiers,
            request.tier.as_deref(),
            tier_candidates(&tiers),
            chooser,
        )?;

        let pricing = match &tier_entry.pricing {
            Some(pricing) => {
                pricing.ensure_supported()?;
                Some(pricing)
            }
            None => None,
        };

        let (options, price) = resolve_options(tier_entry, pricing, request, chooser)?;

        let default_name = format!("{}_{}", request.name_prefix, service_type);
        let name = match &request.name {
            Some(name) => name.clone(),
            None => chooser
                .service_name(&default_name)?
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(default_name),
        };

        debug!(
            service = %name,
            service_type, vendor, version, tier,
            "resolved service manifest"
        );

        Ok(ServiceManifest {
            name,
            service_type: service_type.to_string(),
            vendor: vendor.to_string(),
            version: version.to_string(),
            tier: tier.to_string(),
            options,
            price,
        })
    }
}

/// Select one entry of `map`, by name, automatically, or via the chooser.
///
/// `candidates` lists the keys of `map` in presentation order.
fn pick<'m, V>(
    level: &ChoiceLevel,
    map: &'m OrderedMap<V>,
    requested: Option<&str>,
    candidates: Vec<Candidate>,
    chooser: &mut dyn Chooser,
) -> CloudResult<(&'m str, &'m V)> {
    let key = match requested {
        Some(key) => key.to_string(),
        None => choose_key(level, &candidates, chooser)?,
    };
    map.get_key_value(&key)
        .ok_or_else(|| unknown(level, &key))
}

fn choose_key(
    level: &ChoiceLevel,
    candidates: &[Candidate],
    chooser: &mut dyn Chooser,
) -> CloudResult<String> {
    match candidates {
        [] => Err(unknown(level, "")),
        [only] => {
            chooser.auto_selected(level, only);
            Ok(only.key.clone())
        }
        _ => {
            let index = chooser.choose(level, candidates)?;
            candidates
                .get(index)
                .map(|c| c.key.clone())
                .ok_or_else(|| unknown(level, &index.to_string()))
        }
    }
}

fn resolve_options(
    tier: &TierDescriptor,
    pricing: Option<&PricingDescriptor>,
    request: &ServiceRequest,
    chooser: &mut dyn Chooser,
) -> CloudResult<(BTreeMap<String, String>, Option<Price>)> {
    let mut selected = BTreeMap::new();
    let mut price = None;

    for (name, schema) in tier.options.iter() {
        if schema.kind != OptionKind::Value {
            continue;
        }
        let level = ChoiceLevel::Option {
            name: name.to_string(),
            description: schema.description.clone(),
        };

        let value = match request.options.get(name) {
            Some(value) => {
                if !schema.values.contains(value) {
                    return Err(unknown(&level, value));
                }
                value.clone()
            }
            None => {
                let candidates = schema
                    .values
                    .iter()
                    .map(|value| option_candidate(value, pricing))
                    .collect::<CloudResult<Vec<_>>>()?;
                choose_key(&level, &candidates, chooser)?
            }
        };

        if price.is_none()
            && let Some(pricing) = pricing
        {
            price = Some(pricing.price_for(&value)?);
        }
        selected.insert(name.to_string(), value);
    }

    Ok((selected, price))
}

fn option_candidate(value: &str, pricing: Option<&PricingDescriptor>) -> CloudResult<Candidate> {
    let Some(pricing) = pricing else {
        return Ok(Candidate::plain(value));
    };
    let price = pricing.price_for(value)?;
    Ok(Candidate {
        key: value.to_string(),
        label: format!(
            "{value} ({})",
            format_price(&price.amount, &pricing.model, &price.period)?
        ),
    })
}

/// Tiers sorted by `order`; the sort is stable so ties keep catalog order.
fn ordered_tiers(tiers: &OrderedMap<TierDescriptor>) -> Vec<(&str, &TierDescriptor)> {
    let mut sorted: Vec<_> = tiers.iter().collect();
    sorted.sort_by_key(|(_, tier)| tier.order);
    sorted
}

fn tier_candidates(tiers: &[(&str, &TierDescriptor)]) -> Vec<Candidate> {
    tiers
        .iter()
        .map(|(key, tier)| Candidate {
            key: key.to_string(),
            label: match &tier.description {
                Some(description) => format!("{key} ({description})"),
                None => key.to_string(),
            },
        })
        .collect()
}

fn plain_candidates<V>(map: &OrderedMap<V>) -> Vec<Candidate> {
    map.keys().map(Candidate::plain).collect()
}

fn unknown(level: &ChoiceLevel, key: &str) -> CloudError {
    CloudError::UnknownCatalogEntry {
        level: level.noun(),
        key: key.to_string(),
        context: level.context(),
    }
}
