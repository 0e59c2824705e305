use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuoteRequestId(pub Uuid);

impl QuoteRequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for QuoteRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceId(pub String);

impl ServiceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    Emergency,
    ThisWeek,
    ThisMonth,
    Flexible,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::ThisWeek => "this-week",
            Self::ThisMonth => "this-month",
            Self::Flexible => "flexible",
        }
    }
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match slugify(value).as_str() {
            "emergency" | "urgent" | "asap" | "immediately" => Ok(Self::Emergency),
            "this-week" | "week" | "soon" | "within-a-week" => Ok(Self::ThisWeek),
            "this-month" | "month" | "within-a-month" => Ok(Self::ThisMonth),
            "flexible" | "planning" | "no-rush" | "just-researching" => Ok(Self::Flexible),
            other => Err(format!(
                "unsupported urgency `{other}` (expected emergency|this-week|this-month|flexible)"
            )),
        }
    }
}

/// Lot-size tier reported by the customer.
///
/// Anything the site sends that does not map to a known tier is kept verbatim in
/// `Unrecognized` so it can be persisted as submitted, while scoring and valuation
/// treat it as [`PropertySize::DEFAULT_TIER`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PropertySize {
    Small,
    Medium,
    Large,
    Estate,
    Unrecognized(String),
}

impl PropertySize {
    pub const DEFAULT_TIER: PropertySize = PropertySize::Medium;

    pub fn parse(value: &str) -> Self {
        match slugify(value).as_str() {
            "small" | "s" | "under-quarter-acre" | "townhome" => Self::Small,
            "medium" | "m" | "quarter-to-half-acre" | "standard" => Self::Medium,
            "large" | "l" | "half-to-one-acre" => Self::Large,
            "estate" | "xl" | "xlarge" | "x-large" | "over-one-acre" | "acreage" => Self::Estate,
            _ => Self::Unrecognized(value.trim().to_string()),
        }
    }

    /// Tier used for scoring and valuation.
    pub fn resolved(&self) -> PropertySize {
        match self {
            Self::Unrecognized(_) => Self::DEFAULT_TIER,
            known => known.clone(),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Estate => "estate",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for PropertySize {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<PropertySize> for String {
    fn from(value: PropertySize) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerType {
    Residential,
    Commercial,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Residential => "residential",
            Self::Commercial => "commercial",
        }
    }
}

impl FromStr for CustomerType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match slugify(value).as_str() {
            "residential" | "homeowner" | "home" => Ok(Self::Residential),
            "commercial" | "business" | "hoa" | "property-manager" => Ok(Self::Commercial),
            other => Err(format!(
                "unsupported customer type `{other}` (expected residential|commercial)"
            )),
        }
    }
}

/// Canonical, validated submission. Created once by the normalizer and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub id: QuoteRequestId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub property_size: PropertySize,
    pub services: BTreeSet<ServiceId>,
    pub additional_info: Option<String>,
    pub urgency: Urgency,
    pub location_slug: Option<String>,
    pub customer_type: CustomerType,
    pub source: String,
    #[serde(rename = "usedAIPlanner")]
    pub used_ai_planner: bool,
    pub used_audit: bool,
    pub page_view_count: u32,
    pub is_return_visit: bool,
    pub promo_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl QuoteRequest {
    /// SHA-256 over every field in declaration order, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        let mut field = |value: &str| {
            hasher.update(value.as_bytes());
            hasher.update([0x1f]);
        };

        field(&self.id.to_string());
        field(&self.name);
        field(&self.email);
        field(&self.phone);
        field(&self.address);
        field(self.property_size.as_str());
        let services =
            self.services.iter().map(ServiceId::as_str).collect::<Vec<_>>().join(",");
        field(&services);
        field(self.additional_info.as_deref().unwrap_or(""));
        field(self.urgency.as_str());
        field(self.location_slug.as_deref().unwrap_or(""));
        field(self.customer_type.as_str());
        field(&self.source);
        field(if self.used_ai_planner { "1" } else { "0" });
        field(if self.used_audit { "1" } else { "0" });
        field(&self.page_view_count.to_string());
        field(if self.is_return_visit { "1" } else { "0" });
        field(self.promo_code.as_deref().unwrap_or(""));
        field(&self.created_at.to_rfc3339());

        hasher.finalize().iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

/// Lowercases, trims and joins words with `-` so `This Week`, `this_week` and
/// `this-week` compare equal.
pub fn slugify(value: &str) -> String {
    value
        .trim()
        .to_ascii_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
