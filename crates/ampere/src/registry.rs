//! Deployment-known models and the products they back.

use crate::error::{EngineError, Result};
use ampere_features::{FeatureRecord, numeric_value};
use serde::Serialize;

/// One deployable model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelEntry {
    /// Model name, also the artifact name in the store
    pub name: &'static str,
    /// Product the model scores propensity for
    pub product: Option<&'static str>,
    /// What the model predicts
    pub description: &'static str,
    /// Customer column that is 0 while the product is not yet held
    pub eligibility_column: Option<&'static str>,
}

impl ModelEntry {
    /// Whether the customer may be offered this model's product.
    ///
    /// Only a flag equal to 0 qualifies; an absent, null or unparseable flag
    /// does not.
    pub fn is_eligible(&self, record: &FeatureRecord) -> bool {
        self.eligibility_column
            .and_then(|column| record.get(column))
            .and_then(|value| numeric_value(value).ok())
            .is_some_and(|flag| flag == 0.0)
    }
}

const MODELS: [ModelEntry; 7] = [
    ModelEntry {
        name: "churn",
        product: None,
        description: "Likelihood that the customer leaves",
        eligibility_column: None,
    },
    ModelEntry {
        name: "crosssell_hvac",
        product: Some("HVAC System"),
        description: "Upgrade to our energy-efficient HVAC system repair and maintenance services.",
        eligibility_column: Some("hvac_cross_sell_target"),
    },
    ModelEntry {
        name: "crosssell_insurance",
        product: Some("Home Insurance"),
        description: "Protect your home with our comprehensive insurance plans.",
        eligibility_column: Some("insurance_cross_sell_target"),
    },
    ModelEntry {
        name: "crosssell_solar",
        product: Some("Solar Panel Installation"),
        description: "Install solar panels to reduce your energy bills and carbon footprint.",
        eligibility_column: Some("solar_cross_sell_target"),
    },
    ModelEntry {
        name: "upsell_efficiency_analysis",
        product: Some("Energy Efficiency Analysis"),
        description: "Get a detailed analysis of your energy usage and recommendations for savings.",
        eligibility_column: Some("efficiency_analysis_upsell_target"),
    },
    ModelEntry {
        name: "upsell_green_plan",
        product: Some("Green Energy Plan"),
        description: "Switch to our Green Energy Plan for sustainable energy solutions.",
        eligibility_column: Some("green_plan_upsell_target"),
    },
    ModelEntry {
        name: "upsell_surge_protection",
        product: Some("Surge Protection"),
        description: "Safeguard your home appliances with our surge protection services.",
        eligibility_column: Some("surge_protection_upsell_target"),
    },
];

/// The models a deployment serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRegistry {
    entries: Vec<ModelEntry>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self {
            entries: MODELS.to_vec(),
        }
    }
}

impl ModelRegistry {
    /// Registry restricted to `names`; an empty list keeps every model.
    pub fn restricted_to<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let all = Self::default();
        if names.is_empty() {
            return Ok(all);
        }
        let entries = names
            .iter()
            .map(|name| all.get(name.as_ref()).copied())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// All entries, in registration order.
    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    /// Model names, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    /// Look up a model by name.
    pub fn get(&self, name: &str) -> Result<&ModelEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| EngineError::UnknownModel {
                model: name.to_string(),
                known: self.names().into_iter().map(String::from).collect(),
            })
    }

    /// Look up the model backing a product, by display name or model name.
    pub fn for_product(&self, product: &str) -> Result<&ModelEntry> {
        let wanted = product.trim();
        self.entries
            .iter()
            .find(|entry| {
                entry
                    .product
                    .is_some_and(|name| name.eq_ignore_ascii_case(wanted))
                    || (entry.product.is_some() && entry.name == wanted)
            })
            .ok_or_else(|| EngineError::UnknownProduct(product.to_string()))
    }

    /// Products the customer does not hold yet.
    pub fn eligible_products(&self, record: &FeatureRecord) -> Vec<&ModelEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.is_eligible(record))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_registry() {
        let registry = ModelRegistry::default();
        assert_eq!(registry.entries().len(), 7);
        assert!(registry.get("crosssell_hvac").is_ok());
        let err = registry.get("crosssell_boats").unwrap_err();
        assert!(err.to_string().contains("crosssell_boats"));
        assert!(err.to_string().contains("upsell_green_plan"));
    }

    #[rstest]
    #[case("HVAC System", "crosssell_hvac")]
    #[case("hvac system", "crosssell_hvac")]
    #[case(" Green Energy Plan ", "upsell_green_plan")]
    #[case("crosssell_solar", "crosssell_solar")]
    fn test_for_product(#[case] product: &str, #[case] model: &str) {
        let registry = ModelRegistry::default();
        assert_eq!(registry.for_product(product).unwrap().name, model);
    }

    #[test]
    fn test_churn_is_not_a_product() {
        let registry = ModelRegistry::default();
        assert!(matches!(
            registry.for_product("churn"),
            Err(EngineError::UnknownProduct(_))
        ));
    }

    #[test]
    fn test_eligibility_requires_zero_flag() {
        let registry = ModelRegistry::default();
        let record = FeatureRecord::new()
            .with("hvac_cross_sell_target", 0)
            .with("Solar_Cross_Sell_Target", "0")
            .with("insurance_cross_sell_target", 1)
            .with("green_plan_upsell_target", Option::<i64>::None);

        let eligible: Vec<_> = registry
            .eligible_products(&record)
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(eligible, vec!["crosssell_hvac", "crosssell_solar"]);
    }

    #[test]
    fn test_restriction() {
        let registry = ModelRegistry::restricted_to(&["churn", "crosssell_hvac"]).unwrap();
        assert_eq!(registry.names(), vec!["churn", "crosssell_hvac"]);
        assert!(registry.get("crosssell_solar").is_err());
        assert!(ModelRegistry::restricted_to(&["nope"]).is_err());

        let empty: [&str; 0] = [];
        assert_eq!(ModelRegistry::restricted_to(&empty).unwrap().entries().len(), 7);
    }
}
