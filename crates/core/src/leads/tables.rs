use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;
use crate::leads::followup::{SlaTable, MAX_SLA_MINUTES};
use crate::leads::recommendation::{
    default_competitor_keywords, default_recommendation_rules, RecommendationRule,
};
use crate::leads::scoring::ScoringWeights;
use crate::leads::valuation::{
    default_seasonal_modifiers, default_service_rates, CustomerFactors, SizeMultipliers,
    ValuationTables,
};

/// Every lookup table the engine reads. Loaded from `[tables]` in `leadflow.toml`;
/// sections left out keep their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineTables {
    pub scoring: ScoringWeights,
    pub service_rates: BTreeMap<String, Decimal>,
    pub size_multipliers: SizeMultipliers,
    /// January through December.
    pub seasonal_modifiers: Vec<Decimal>,
    pub customer_factors: CustomerFactors,
    pub follow_up_sla: SlaTable,
    pub competitor_keywords: Vec<String>,
    pub recommendation_rules: Vec<RecommendationRule>,
}

impl Default for EngineTables {
    fn default() -> Self {
        Self {
            scoring: ScoringWeights::default(),
            service_rates: default_service_rates(),
            size_multipliers: SizeMultipliers::default(),
            seasonal_modifiers: default_seasonal_modifiers(),
            customer_factors: CustomerFactors::default(),
            follow_up_sla: SlaTable::default(),
            competitor_keywords: default_competitor_keywords(),
            recommendation_rules: default_recommendation_rules(),
        }
    }
}

impl EngineTables {
    pub fn valuation(&self) -> ValuationTables<'_> {
        ValuationTables {
            service_rates: &self.service_rates,
            size_multipliers: &self.size_multipliers,
            seasonal_modifiers: &self.seasonal_modifiers,
            customer_factors: &self.customer_factors,
        }
    }

    pub fn is_known_service(&self, service: &str) -> bool {
        self.service_rates.contains_key(service)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.service_rates.is_empty() {
            return Err(ConfigurationError::MissingTable { table: "service_rates" });
        }
        if let Some((service, rate)) =
            self.service_rates.iter().find(|(_, rate)| **rate < Decimal::ZERO)
        {
            return Err(ConfigurationError::InvalidEntry {
                table: "service_rates",
                detail: format!("rate for `{service}` is negative ({rate})"),
            });
        }
        if let Some(service) = self.service_rates.keys().find(|service| !is_slug(service)) {
            return Err(ConfigurationError::InvalidEntry {
                table: "service_rates",
                detail: format!("service id `{service}` must be lower-case kebab-case"),
            });
        }

        if self.seasonal_modifiers.is_empty() {
            return Err(ConfigurationError::MissingTable { table: "seasonal_modifiers" });
        }
        if self.seasonal_modifiers.len() != 12 {
            return Err(ConfigurationError::InvalidEntry {
                table: "seasonal_modifiers",
                detail: format!(
                    "expected 12 monthly entries, found {}",
                    self.seasonal_modifiers.len()
                ),
            });
        }
        if self.seasonal_modifiers.iter().any(|modifier| *modifier <= Decimal::ZERO) {
            return Err(ConfigurationError::InvalidEntry {
                table: "seasonal_modifiers",
                detail: "every monthly modifier must be positive".to_string(),
            });
        }

        let sizes = &self.size_multipliers;
        if [sizes.small, sizes.medium, sizes.large, sizes.estate]
            .iter()
            .any(|multiplier| *multiplier <= Decimal::ZERO)
        {
            return Err(ConfigurationError::InvalidEntry {
                table: "size_multipliers",
                detail: "every size multiplier must be positive".to_string(),
            });
        }

        for factors in [&self.customer_factors.residential, &self.customer_factors.commercial] {
            if factors.repeat_factor < Decimal::ZERO {
                return Err(ConfigurationError::InvalidEntry {
                    table: "customer_factors",
                    detail: "repeat_factor must be >= 0".to_string(),
                });
            }
            if factors.churn_rate < Decimal::ZERO || factors.churn_rate > Decimal::ONE {
                return Err(ConfigurationError::InvalidEntry {
                    table: "customer_factors",
                    detail: format!("churn_rate {} must be within 0..=1", factors.churn_rate),
                });
            }
        }

        if let Some((priority, minutes)) = self
            .follow_up_sla
            .entries()
            .into_iter()
            .find(|(_, minutes)| !(1..=MAX_SLA_MINUTES).contains(minutes))
        {
            return Err(ConfigurationError::InvalidEntry {
                table: "follow_up_sla",
                detail: format!(
                    "{} offset must be within 1..={MAX_SLA_MINUTES} minutes, got {minutes}",
                    priority.as_str()
                ),
            });
        }

        if let Some(rule) =
            self.recommendation_rules.iter().find(|rule| rule.action.trim().is_empty())
        {
            return Err(ConfigurationError::InvalidEntry {
                table: "recommendation_rules",
                detail: format!("rule {rule:?} has an empty action"),
            });
        }
        if let Some(rule) = self
            .recommendation_rules
            .iter()
            .find(|rule| rule.min_estimated_value.is_some_and(|floor| floor < Decimal::ZERO))
        {
            return Err(ConfigurationError::InvalidEntry {
                table: "recommendation_rules",
                detail: format!("rule {rule:?} has a negative value floor"),
            });
        }

        Ok(())
    }
}

fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
