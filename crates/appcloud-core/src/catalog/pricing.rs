//! Tier pricing descriptors.

use serde::{Deserialize, Serialize};

use super::PriceTable;
use crate::error::{CloudError, CloudResult};
use crate::gateway::wire::scalar_to_string;
use crate::types::Price;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PricingModel {
    /// Fixed amount per period.
    Flat,
    /// Usage based; not supported by this client.
    Metered,
    Other(String),
}

impl From<String> for PricingModel {
    fn from(s: String) -> Self {
        match s.as_str() {
            "flat" => PricingModel::Flat,
            "metered" => PricingModel::Metered,
            _ => PricingModel::Other(s),
        }
    }
}

impl From<PricingModel> for String {
    fn from(model: PricingModel) -> Self {
        match model {
            PricingModel::Flat => "flat".to_string(),
            PricingModel::Metered => "metered".to_string(),
            PricingModel::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingDescriptor {
    #[serde(rename = "type")]
    pub model: PricingModel,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub values: PriceTable,
}

impl PricingDescriptor {
    /// Fail unless the descriptor can be rendered.
    pub fn ensure_supported(&self) -> CloudResult<()> {
        match &self.model {
            PricingModel::Flat => Ok(()),
            PricingModel::Metered => Err(CloudError::UnsupportedPricingModel("metered".to_string())),
            PricingModel::Other(name) => Err(CloudError::UnsupportedPricingModel(name.clone())),
        }
    }

    /// Price of one option value.
    ///
    /// A flat table must price every value it is asked about; a gap is
    /// reported as an unknown entry rather than leaving the value unpriced.
    pub fn price_for(&self, value: &str) -> CloudResult<Price> {
        self.ensure_supported()?;
        let amount = self
            .values
            .get(value)
            .and_then(scalar_to_string)
            .ok_or_else(|| CloudError::UnknownCatalogEntry {
                level: "price",
                key: value.to_string(),
                context: "flat pricing".to_string(),
            })?;
        Ok(Price {
            amount,
            period: self.period.clone().unwrap_or_default(),
        })
    }
}

/// Format an amount under a pricing model, e.g. `$10/month`.
pub fn format_price(amount: &str, model: &PricingModel, period: &str) -> CloudResult<String> {
    match model {
        PricingModel::Flat => Ok(format!("${amount}/{period}")),
        PricingModel::Metered => Err(CloudError::UnsupportedPricingModel("metered".to_string())),
        PricingModel::Other(name) => Err(CloudError::UnsupportedPricingModel(name.clone())),
    }
}
