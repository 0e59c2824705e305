use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::lead::CustomerType;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StaffId(pub String);

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    pub id: StaffId,
    pub name: String,
    /// Service areas. Empty or `*` covers every location.
    pub location_slugs: Vec<String>,
    /// Empty means the member takes both residential and commercial work.
    pub specializations: Vec<CustomerType>,
    pub rotation_order: u32,
    pub active: bool,
}

impl StaffMember {
    pub fn covers_location(&self, location_slug: Option<&str>) -> bool {
        if self.location_slugs.is_empty() {
            return true;
        }
        let Some(slug) = location_slug else {
            return false;
        };
        self.location_slugs
            .iter()
            .any(|covered| covered == "*" || covered.eq_ignore_ascii_case(slug))
    }

    pub fn handles(&self, customer_type: CustomerType) -> bool {
        self.specializations.is_empty() || self.specializations.contains(&customer_type)
    }
}
