//! Profiles: one persistent record per bad actor, plus the typed identifier
//! rows (bank accounts, phone numbers, social handles) it owns.
//!
//! RULES:
//!   - Profiles are never deleted and only grow.
//!   - Rollup counters are a cache over identifier rows and VERIFIED
//!     linked reports; `Aggregator::rebuild_profile_stats` recomputes them.

use crate::types::ProfileId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub profile_id:      ProfileId,
    pub display_name:    String,
    pub alternate_names: Vec<String>,
    pub created_at:      DateTime<Utc>,
    pub updated_at:      DateTime<Utc>,
    pub total_loss:      f64,
    pub total_reports:   i64,
    pub unique_banks:    i64,
    pub unique_phones:   i64,
    pub unique_socials:  i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BankAccountRecord {
    pub profile_id:     ProfileId,
    pub account_number: String,
    pub bank_name:      String,
    pub holder_name:    String,
    pub report_count:   i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhoneNumberRecord {
    pub profile_id:   ProfileId,
    pub phone_number: String,
    pub report_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocialHandleRecord {
    pub profile_id:         ProfileId,
    pub url:                String,
    pub platform:           Option<String>,
    pub extracted_username: Option<String>,
    pub platform_user_id:   Option<String>,
    pub display_name:       Option<String>,
    pub username_history:   Vec<String>,
    pub lookup_status:      Option<String>,
    pub last_checked_at:    Option<DateTime<Utc>>,
    pub report_count:       i64,
}

/// Rollup values recomputed from ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProfileStats {
    pub total_loss:     f64,
    pub total_reports:  i64,
    pub unique_banks:   i64,
    pub unique_phones:  i64,
    pub unique_socials: i64,
}

/// Fresh id: `pid-` plus the first eight hex characters of a v4 uuid.
pub fn new_profile_id() -> ProfileId {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("pid-{}", &hex[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_id_shape() {
        let id = new_profile_id();
        assert!(id.starts_with("pid-"));
        assert_eq!(id.len(), 12);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
