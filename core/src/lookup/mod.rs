//! Outbound lookup collaborators and the pure parsers that feed them.
//!
//! RULES:
//!   - Every network-facing collaborator sits behind a trait so flows can
//!     run against demo or scripted implementations.
//!   - A collaborator error is "unavailable", never a negative result.

pub mod demo;
pub mod duitnow;
pub mod phone;
pub mod url_classifier;

use crate::{error::DeskResult, types::FileRef};
use async_trait::async_trait;
use serde::Serialize;

pub use duitnow::{parse_duitnow, DuitNowPayload};
pub use phone::{sanitize_phone, PhoneCheck, PhoneLookupService};
pub use url_classifier::{classify_social_url, Platform, SocialHandle};

/// Identifier category understood by the reputation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationCategory {
    Phone,
    Bank,
}

impl ReputationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReputationCategory::Phone => "phone",
            ReputationCategory::Bank  => "bank",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReputationReport {
    pub ok:               bool,
    pub search_count:     u32,
    pub occurrence_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneLookupStatus {
    Success,
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhoneLookupResult {
    pub status:    PhoneLookupStatus,
    pub name:      Option<String>,
    pub carrier:   Option<String>,
    pub is_spam:   bool,
    pub spam_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialLookupStatus {
    Success,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocialLookupResult {
    pub status:           SocialLookupStatus,
    pub platform:         Platform,
    pub username:         String,
    pub platform_user_id: Option<String>,
    pub display_name:     Option<String>,
}

/// Police-report / mule-account reputation service.
#[async_trait]
pub trait ReputationLookup: Send + Sync {
    async fn lookup(&self, category: ReputationCategory, value: &str) -> DeskResult<ReputationReport>;
}

/// Caller-id style phone reputation provider.
#[async_trait]
pub trait PhoneLookup: Send + Sync {
    async fn lookup(&self, phone: &str) -> DeskResult<PhoneLookupResult>;
}

/// Resolves a social username to its permanent platform id.
#[async_trait]
pub trait SocialLookup: Send + Sync {
    async fn lookup(&self, username: &str, platform: Platform) -> DeskResult<SocialLookupResult>;
}

/// Reads a QR code out of a stored photo. `Ok(None)` when none is found.
#[async_trait]
pub trait QrDecoder: Send + Sync {
    async fn decode(&self, file: &FileRef) -> DeskResult<Option<String>>;
}
