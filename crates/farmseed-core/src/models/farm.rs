//! Farm workspace and membership models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named shared workspace; the unit of multi-device sync scope
///
/// Farm ids are short user-chosen codes, not UUIDs. The optional password
/// gates joining, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Farm {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl Farm {
    /// Check a join attempt's password against the farm's
    ///
    /// A farm without a password accepts anything; a farm with one requires
    /// an exact match.
    #[must_use]
    pub fn accepts_password(&self, provided: Option<&str>) -> bool {
        match self.password.as_deref() {
            None | Some("") => true,
            Some(expected) => provided == Some(expected),
        }
    }
}

/// A device's membership row in a farm, as stored by the membership service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmMember {
    /// Row id assigned by the membership service
    pub id: String,
    pub farm_id: String,
    pub device_id: String,
    pub user_name: String,
    pub is_admin: bool,
    pub joined_at: DateTime<Utc>,
}

/// Payload for creating or refreshing a membership row
///
/// Upserted on the `(farm_id, device_id)` conflict key, so re-joining from
/// the same device updates the existing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMember {
    pub farm_id: String,
    pub device_id: String,
    pub user_name: String,
    pub is_admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_farm_accepts_any_password() {
        let farm = Farm {
            id: "open".to_string(),
            name: "Open Farm".to_string(),
            password: None,
        };
        assert!(farm.accepts_password(None));
        assert!(farm.accepts_password(Some("whatever")));
    }

    #[test]
    fn test_protected_farm_requires_exact_match() {
        let farm = Farm {
            id: "locked".to_string(),
            name: "Locked Farm".to_string(),
            password: Some("hunter2".to_string()),
        };
        assert!(farm.accepts_password(Some("hunter2")));
        assert!(!farm.accepts_password(Some("wrong")));
        assert!(!farm.accepts_password(None));
    }

    #[test]
    fn test_empty_password_counts_as_open() {
        let farm = Farm {
            id: "blank".to_string(),
            name: "Blank".to_string(),
            password: Some(String::new()),
        };
        assert!(farm.accepts_password(None));
    }
}
