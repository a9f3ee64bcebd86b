//! Shared payload types carried inside protocol messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Description of the asset being transferred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetProfile {
    /// Asset issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Asset code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_code: Option<String>,
    /// Asset code type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_code_type: Option<String>,
    /// Links to key information documents
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_information_link: Vec<String>,
    /// Free-form keyword tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyword_tags: Vec<String>,
    /// Transfer restrictions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_restriction: Option<String>,
    /// Ledger requirements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_requirements: Option<String>,
    /// Instant after which the profile is no longer transferable
    pub expiration_date: DateTime<Utc>,
}

impl AssetProfile {
    /// Profile with only an expiration date set
    pub fn expiring_at(expiration_date: DateTime<Utc>) -> Self {
        Self {
            issuer: None,
            asset_code: None,
            asset_code_type: None,
            key_information_link: Vec::new(),
            keyword_tags: Vec::new(),
            transfer_restriction: None,
            ledger_requirements: None,
            expiration_date,
        }
    }

    /// Whether the profile has expired at `now` (expiry instant included)
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration_date
    }
}

/// Payload profile of an initialization request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadProfile {
    /// Asset profile
    pub asset_profile: AssetProfile,
    /// Declared capabilities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expiry_is_inclusive() {
        let now = Utc::now();
        let profile = AssetProfile::expiring_at(now);
        assert!(profile.is_expired_at(now));
        assert!(!profile.is_expired_at(now - Duration::seconds(1)));
    }

    #[test]
    fn test_empty_optionals_are_omitted() {
        let profile = AssetProfile::expiring_at(Utc::now());
        let json = serde_json::to_value(&profile).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj.contains_key("expirationDate"));
    }
}
