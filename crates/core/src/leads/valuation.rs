use std::collections::BTreeMap;

use chrono::Datelike;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::lead::{CustomerType, PropertySize, QuoteRequest};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeMultipliers {
    pub small: Decimal,
    pub medium: Decimal,
    pub large: Decimal,
    pub estate: Decimal,
}

impl Default for SizeMultipliers {
    fn default() -> Self {
        Self {
            small: Decimal::new(80, 2),
            medium: Decimal::ONE,
            large: Decimal::new(150, 2),
            estate: Decimal::new(220, 2),
        }
    }
}

impl SizeMultipliers {
    pub fn for_size(&self, size: &PropertySize) -> Decimal {
        match size.resolved() {
            PropertySize::Small => self.small,
            PropertySize::Large => self.large,
            PropertySize::Estate => self.estate,
            PropertySize::Medium | PropertySize::Unrecognized(_) => self.medium,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionFactors {
    /// Expected engagements in the first year, relative to the quoted job.
    pub repeat_factor: Decimal,
    /// Share of customers lost each subsequent year, `0..=1`.
    pub churn_rate: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerFactors {
    pub residential: RetentionFactors,
    pub commercial: RetentionFactors,
}

impl Default for RetentionFactors {
    fn default() -> Self {
        Self { repeat_factor: Decimal::new(25, 1), churn_rate: Decimal::new(25, 2) }
    }
}

impl Default for CustomerFactors {
    fn default() -> Self {
        Self {
            residential: RetentionFactors::default(),
            commercial: RetentionFactors {
                repeat_factor: Decimal::from(4),
                churn_rate: Decimal::new(15, 2),
            },
        }
    }
}

impl CustomerFactors {
    pub fn for_customer(&self, customer_type: CustomerType) -> &RetentionFactors {
        match customer_type {
            CustomerType::Residential => &self.residential,
            CustomerType::Commercial => &self.commercial,
        }
    }
}

/// Demand multipliers indexed January through December.
pub fn default_seasonal_modifiers() -> Vec<Decimal> {
    [80, 85, 110, 125, 125, 110, 100, 100, 115, 120, 95, 80]
        .into_iter()
        .map(|hundredths| Decimal::new(hundredths, 2))
        .collect()
}

pub fn default_service_rates() -> BTreeMap<String, Decimal> {
    [
        ("aeration", 120),
        ("fertilization", 85),
        ("hardscaping", 2_500),
        ("hedge-trimming", 90),
        ("irrigation", 450),
        ("landscape-design", 1_200),
        ("lawn-mowing", 60),
        ("leaf-removal", 180),
        ("mulching", 140),
        ("pest-control", 110),
        ("snow-removal", 150),
        ("tree-service", 350),
    ]
    .into_iter()
    .map(|(service, rate)| (service.to_string(), Decimal::from(rate)))
    .collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valuation {
    pub base_total: Decimal,
    pub size_multiplier: Decimal,
    pub seasonal_modifier: Decimal,
    pub estimated_value: Decimal,
    pub clv_first_year: Decimal,
    pub clv_three_year: Decimal,
}

/// Read-only view over the rate tables a valuation needs.
#[derive(Clone, Copy, Debug)]
pub struct ValuationTables<'a> {
    pub service_rates: &'a BTreeMap<String, Decimal>,
    pub size_multipliers: &'a SizeMultipliers,
    pub seasonal_modifiers: &'a [Decimal],
    pub customer_factors: &'a CustomerFactors,
}

pub fn estimate(request: &QuoteRequest, tables: ValuationTables<'_>) -> Valuation {
    let base_total: Decimal = request
        .services
        .iter()
        .filter_map(|service| tables.service_rates.get(service.as_str()))
        .map(|rate| (*rate).max(Decimal::ZERO))
        .sum();

    let size_multiplier = tables.size_multipliers.for_size(&request.property_size);
    let seasonal = seasonal_modifier(tables.seasonal_modifiers, request.created_at.month0());
    let gross = base_total * size_multiplier.max(Decimal::ZERO) * seasonal;
    let estimated_value = money(gross.max(Decimal::ZERO));

    let factors = tables.customer_factors.for_customer(request.customer_type);
    let (clv_first_year, clv_three_year) = project_clv(estimated_value, factors);

    Valuation {
        base_total,
        size_multiplier,
        seasonal_modifier: seasonal,
        estimated_value,
        clv_first_year,
        clv_three_year,
    }
}

/// Falls back to a neutral `1.0` when the month is missing or the entry is not positive.
pub fn seasonal_modifier(table: &[Decimal], month0: u32) -> Decimal {
    table
        .get(month0 as usize)
        .copied()
        .filter(|modifier| *modifier > Decimal::ZERO)
        .unwrap_or(Decimal::ONE)
}

/// First-year value plus two retained years: `first * (1 + r + r^2)` with `r = 1 - churn`.
pub fn project_clv(estimated_value: Decimal, factors: &RetentionFactors) -> (Decimal, Decimal) {
    let first_year = money(estimated_value * factors.repeat_factor.max(Decimal::ZERO));
    let retention = Decimal::ONE - factors.churn_rate.clamp(Decimal::ZERO, Decimal::ONE);
    let three_year = money(first_year * (Decimal::ONE + retention + retention * retention));

    (first_year, three_year.max(first_year))
}

pub fn money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
