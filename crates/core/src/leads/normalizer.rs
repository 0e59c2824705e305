//! Raw web-form submissions into canonical [`QuoteRequest`]s.
//!
//! Every field is checked before failing so the caller gets the complete list of problems
//! in one [`ValidationError`].

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::lead::{
    slugify, CustomerType, PropertySize, QuoteRequest, QuoteRequestId, ServiceId, Urgency,
};
use crate::domain::promotion::normalize_code;
use crate::errors::{FieldIssue, ValidationError};

pub const DEFAULT_SOURCE: &str = "direct";

/// Untyped key/value submission as posted by the site.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawSubmission(Map<String, Value>);

impl RawSubmission {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            _ => Err(ValidationError {
                issues: vec![FieldIssue::malformed(
                    "submission",
                    "submission must be a JSON object",
                )],
            }),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// First present, non-null, non-blank value among `keys`.
    fn get(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().filter_map(|key| self.0.get(*key)).find(|value| match value {
            Value::Null => false,
            Value::String(text) => !text.trim().is_empty(),
            _ => true,
        })
    }
}

impl From<QuoteRequest> for RawSubmission {
    fn from(request: QuoteRequest) -> Self {
        match serde_json::to_value(request) {
            Ok(Value::Object(fields)) => Self(fields),
            _ => Self::default(),
        }
    }
}

struct Reader<'a> {
    raw: &'a RawSubmission,
    errors: ValidationError,
}

impl<'a> Reader<'a> {
    fn text(&mut self, field: &str, keys: &[&str]) -> Option<String> {
        match self.raw.get(keys)? {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => {
                self.errors.push(FieldIssue::malformed(field, format!("{field} must be text")));
                None
            }
        }
    }

    fn required_text(&mut self, field: &str, keys: &[&str]) -> Option<String> {
        let present = self.raw.get(keys).is_some();
        let value = self.text(field, keys);
        if !present {
            self.errors.push(FieldIssue::missing(field));
        }
        value
    }

    fn parsed<T: FromStr<Err = String>>(&mut self, field: &str, keys: &[&str]) -> Option<T> {
        let text = self.text(field, keys)?;
        match text.parse() {
            Ok(value) => Some(value),
            Err(message) => {
                self.errors.push(FieldIssue::malformed(field, message));
                None
            }
        }
    }

    fn flag(&mut self, field: &str, keys: &[&str]) -> bool {
        let Some(value) = self.raw.get(keys) else {
            return false;
        };
        let parsed = match value {
            Value::Bool(flag) => Some(*flag),
            Value::Number(number) => match number.as_i64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };
        parsed.unwrap_or_else(|| {
            self.errors.push(FieldIssue::malformed(field, format!("{field} must be a boolean")));
            false
        })
    }

    fn count(&mut self, field: &str, keys: &[&str]) -> u32 {
        let Some(value) = self.raw.get(keys) else {
            return 0;
        };
        let parsed = match value {
            Value::Number(number) => {
                number.as_i64().or_else(|| number.as_f64().map(|float| float.trunc() as i64))
            }
            Value::String(text) => text.trim().parse::<i64>().ok(),
            _ => None,
        };
        match parsed {
            Some(count) => u32::try_from(count.max(0)).unwrap_or(u32::MAX),
            None => {
                self.errors
                    .push(FieldIssue::malformed(field, format!("{field} must be a whole number")));
                0
            }
        }
    }

    fn email(&mut self) -> Option<String> {
        let email = self.required_text("email", &["email"])?.to_lowercase();
        let valid = email.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        });
        if !valid {
            self.errors
                .push(FieldIssue::malformed("email", "email must look like name@domain.tld"));
            return None;
        }
        Some(email)
    }

    fn phone(&mut self) -> Option<String> {
        let raw = self.required_text("phone", &["phone", "phoneNumber", "phone_number"])?;
        match canonical_phone(&raw) {
            Some(phone) => Some(phone),
            None => {
                self.errors.push(FieldIssue::malformed(
                    "phone",
                    "phone must contain 10 digits (optionally prefixed with country code 1)",
                ));
                None
            }
        }
    }

    fn services(&mut self, known: &dyn Fn(&str) -> bool) -> BTreeSet<ServiceId> {
        let keys = ["services", "service", "servicesRequested", "services_requested"];
        let Some(value) = self.raw.get(&keys) else {
            self.errors.push(FieldIssue::missing("services"));
            return BTreeSet::new();
        };

        let entries: Vec<String> = match value {
            Value::String(text) => split_services(text),
            Value::Array(items) => {
                let mut entries = Vec::new();
                for item in items {
                    match item {
                        Value::String(text) => entries.extend(split_services(text)),
                        _ => {
                            self.errors.push(FieldIssue::malformed(
                                "services",
                                "services must be a list of service identifiers",
                            ));
                            return BTreeSet::new();
                        }
                    }
                }
                entries
            }
            _ => {
                self.errors.push(FieldIssue::malformed(
                    "services",
                    "services must be a list or a delimited string",
                ));
                return BTreeSet::new();
            }
        };

        let mut services = BTreeSet::new();
        let mut unknown = Vec::new();
        for entry in entries {
            let id = slugify(&entry);
            if known(&id) {
                services.insert(ServiceId(id));
            } else {
                unknown.push(entry);
            }
        }

        if !unknown.is_empty() {
            self.errors.push(FieldIssue::malformed(
                "services",
                format!("unknown service(s): {}", unknown.join(", ")),
            ));
        } else if services.is_empty() {
            self.errors.push(FieldIssue::missing("services"));
        }
        services
    }

    fn created_at(&mut self, received_at: DateTime<Utc>) -> DateTime<Utc> {
        let Some(text) = self.text("createdAt", &["createdAt", "created_at"]) else {
            return received_at;
        };
        match DateTime::parse_from_rfc3339(&text) {
            Ok(timestamp) => timestamp.with_timezone(&Utc),
            Err(error) => {
                self.errors.push(FieldIssue::malformed(
                    "createdAt",
                    format!("createdAt must be an RFC 3339 timestamp: {error}"),
                ));
                received_at
            }
        }
    }

    fn id(&mut self) -> QuoteRequestId {
        let Some(text) = self.text("id", &["id"]) else {
            return QuoteRequestId::generate();
        };
        match Uuid::parse_str(&text) {
            Ok(id) => QuoteRequestId(id),
            Err(_) => {
                self.errors.push(FieldIssue::malformed("id", "id must be a UUID"));
                QuoteRequestId::generate()
            }
        }
    }
}

/// Ten-digit NANP number, or `None` when the input cannot be one.
pub fn canonical_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let digits = match digits.len() {
        11 if digits.starts_with('1') => digits[1..].to_string(),
        10 => digits,
        _ => return None,
    };
    Some(digits)
}

fn split_services(text: &str) -> Vec<String> {
    text.split([',', ';', '|'])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validates `raw` and builds the canonical request.
///
/// `is_known_service` decides which slugified service ids are accepted. `received_at`
/// stands in for `createdAt` when the submission carries none.
pub fn normalize(
    raw: &RawSubmission,
    is_known_service: &dyn Fn(&str) -> bool,
    received_at: DateTime<Utc>,
) -> Result<QuoteRequest, ValidationError> {
    let mut reader = Reader { raw, errors: ValidationError::default() };

    let id = reader.id();
    let name = reader.required_text("name", &["name", "fullName", "full_name"]);
    let email = reader.email();
    let phone = reader.phone();
    let address = reader.required_text("address", &["address", "streetAddress", "street_address"]);
    let property_size = reader
        .required_text("propertySize", &["propertySize", "property_size"])
        .map(|size| PropertySize::parse(&size));
    let services = reader.services(is_known_service);
    let additional_info =
        reader.text("additionalInfo", &["additionalInfo", "additional_info", "message"]);
    let urgency =
        reader.parsed::<Urgency>("urgency", &["urgency", "timeline"]).unwrap_or(Urgency::Flexible);
    let location_slug = reader
        .text("locationSlug", &["locationSlug", "location_slug", "location"])
        .map(|location| slugify(&location))
        .filter(|slug| !slug.is_empty());
    let customer_type = reader
        .parsed::<CustomerType>("customerType", &["customerType", "customer_type"])
        .unwrap_or(CustomerType::Residential);
    let source = reader
        .text("source", &["source", "utmSource", "utm_source"])
        .map(|source| source.to_lowercase())
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string());
    let used_ai_planner =
        reader.flag("usedAIPlanner", &["usedAIPlanner", "usedAiPlanner", "used_ai_planner"]);
    let used_audit = reader.flag("usedAudit", &["usedAudit", "used_audit"]);
    let page_view_count = reader.count("pageViewCount", &["pageViewCount", "page_view_count"]);
    let is_return_visit = reader.flag("isReturnVisit", &["isReturnVisit", "is_return_visit"]);
    let promo_code = reader
        .text("promoCode", &["promoCode", "promo_code"])
        .and_then(|code| normalize_code(&code));
    let created_at = reader.created_at(received_at);

    if !reader.errors.is_empty() {
        return Err(reader.errors);
    }

    match (name, email, phone, address, property_size) {
        (Some(name), Some(email), Some(phone), Some(address), Some(property_size)) => {
            Ok(QuoteRequest {
                id,
                name,
                email,
                phone,
                address,
                property_size,
                services,
                additional_info,
                urgency,
                location_slug,
                customer_type,
                source,
                used_ai_planner,
                used_audit,
                page_view_count,
                is_return_visit,
                promo_code,
                created_at,
            })
        }
        _ => Err(ValidationError {
            issues: vec![FieldIssue::malformed("submission", "required fields are incomplete")],
        }),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, TimeZone, Utc};
    use serde_json::json;

    use super::{canonical_phone, normalize, RawSubmission};
    use crate::domain::lead::{CustomerType, PropertySize, ServiceId, Urgency};
    use crate::errors::IssueKind;
    use crate::leads::valuation::default_service_rates;

    fn known(service: &str) -> bool {
        default_service_rates().contains_key(service)
    }

    fn raw(value: serde_json::Value) -> RawSubmission {
        RawSubmission::from_value(value).expect("object")
    }

    #[test]
    fn canonicalizes_a_complete_submission() {
        let received = Utc.with_ymd_and_hms(2026, 4, 12, 15, 0, 0).single().expect("timestamp");
        let submission = raw(json!({
            "name": "  Dana Whitfield ",
            "email": "Dana@Example.COM",
            "phone": "+1 (512) 555-0188",
            "address": "18 Live Oak Dr",
            "propertySize": "Large",
            "services": "Lawn Mowing; tree-service | lawn-mowing",
            "urgency": "This Week",
            "location_slug": "Round Rock",
            "customerType": "Commercial",
            "usedAIPlanner": "yes",
            "pageViewCount": 7,
            "isReturnVisit": true,
            "promoCode": " spring15 "
        }));

        let request = normalize(&submission, &known, received).expect("valid submission");

        assert_eq!(request.name, "Dana Whitfield");
        assert_eq!(request.email, "dana@example.com");
        assert_eq!(request.phone, "5125550188");
        assert_eq!(request.property_size, PropertySize::Large);
        assert_eq!(
            request.services.iter().map(ServiceId::as_str).collect::<Vec<_>>(),
            vec!["lawn-mowing", "tree-service"]
        );
        assert_eq!(request.urgency, Urgency::ThisWeek);
        assert_eq!(request.location_slug.as_deref(), Some("round-rock"));
        assert_eq!(request.customer_type, CustomerType::Commercial);
        assert!(request.used_ai_planner);
        assert!(!request.used_audit);
        assert_eq!(request.page_view_count, 7);
        assert!(request.is_return_visit);
        assert_eq!(request.promo_code.as_deref(), Some("SPRING15"));
        assert_eq!(request.source, "direct");
        assert_eq!(request.created_at, received);
    }

    #[test]
    fn reports_every_missing_and_malformed_field() {
        let submission = raw(json!({
            "name": "",
            "email": "not-an-email",
            "phone": "555-01",
            "services": ["lawn-mowing", "moon-landing"]
        }));

        let error = normalize(&submission, &known, Utc::now()).expect_err("invalid submission");

        assert_eq!(
            error.fields(),
            vec!["name", "email", "phone", "address", "propertySize", "services"]
        );
        assert_eq!(error.issues[0].kind, IssueKind::Missing);
        assert_eq!(error.issues[1].kind, IssueKind::Malformed);
        assert!(error.issues[5].message.contains("moon-landing"));
    }

    #[test]
    fn optional_fields_take_defaults() {
        let submission = raw(json!({
            "name": "Lee",
            "email": "lee@example.org",
            "phone": "5125550100",
            "address": "3 Ash Way",
            "property_size": "half-to-one-acre",
            "services": ["aeration"],
            "pageViewCount": -4
        }));

        let request = normalize(&submission, &known, Utc::now()).expect("valid submission");

        assert_eq!(request.urgency, Urgency::Flexible);
        assert_eq!(request.customer_type, CustomerType::Residential);
        assert_eq!(request.page_view_count, 0);
        assert_eq!(request.location_slug, None);
        assert_eq!(request.promo_code, None);
        assert_eq!(request.property_size, PropertySize::Large);
    }

    #[test]
    fn unknown_property_size_is_kept_not_rejected() {
        let submission = raw(json!({
            "name": "Lee",
            "email": "lee@example.org",
            "phone": "5125550100",
            "address": "3 Ash Way",
            "propertySize": "football field",
            "services": "mulching",
            "createdAt": "2026-11-03T08:15:00-06:00"
        }));

        let request = normalize(&submission, &known, Utc::now()).expect("valid submission");
        assert_eq!(request.property_size, PropertySize::Unrecognized("football field".to_string()));
        assert_eq!(request.created_at.month(), 11);
        assert_eq!(request.created_at.to_rfc3339(), "2026-11-03T14:15:00+00:00");
    }

    #[test]
    fn bad_optional_values_are_malformed() {
        let submission = raw(json!({
            "name": "Lee",
            "email": "lee@example.org",
            "phone": "5125550100",
            "address": "3 Ash Way",
            "propertySize": "small",
            "services": "mulching",
            "urgency": "yesterday",
            "usedAudit": "maybe",
            "pageViewCount": "lots",
            "id": "not-a-uuid"
        }));

        let error = normalize(&submission, &known, Utc::now()).expect_err("invalid submission");
        assert_eq!(error.fields(), vec!["id", "urgency", "usedAudit", "pageViewCount"]);
    }

    #[test]
    fn non_object_submission_is_rejected() {
        let error = RawSubmission::from_value(json!(["name"])).expect_err("array");
        assert_eq!(error.fields(), vec!["submission"]);
    }

    #[test]
    fn normalized_request_round_trips_through_raw_form() {
        let submission = raw(json!({
            "name": "Lee",
            "email": "lee@example.org",
            "phone": "5125550100",
            "address": "3 Ash Way",
            "propertySize": "estate",
            "services": "mulching, aeration",
            "usedAudit": true
        }));
        let first = normalize(&submission, &known, Utc::now()).expect("valid submission");

        let second = normalize(&RawSubmission::from(first.clone()), &known, Utc::now())
            .expect("canonical form is valid");

        assert_eq!(first, second);
    }

    #[test]
    fn phone_canonicalization() {
        assert_eq!(canonical_phone("512.555.0100").as_deref(), Some("5125550100"));
        assert_eq!(canonical_phone("1-512-555-0100").as_deref(), Some("5125550100"));
        assert_eq!(canonical_phone("2-512-555-0100"), None);
        assert_eq!(canonical_phone("555-0100"), None);
    }
}
