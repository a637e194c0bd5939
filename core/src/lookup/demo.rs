//! Config-driven stand-ins for the external lookup services, used by the
//! runner when no real provider is wired in.

use super::{
    Platform, PhoneLookup, PhoneLookupResult, PhoneLookupStatus, QrDecoder, ReputationCategory,
    ReputationLookup, ReputationReport, SocialLookup, SocialLookupResult, SocialLookupStatus,
};
use crate::{config::DemoConfig, error::DeskResult, types::FileRef};
use async_trait::async_trait;
use log::info;

pub struct DemoReputation {
    police_reports: u32,
}

impl DemoReputation {
    pub fn new(config: &DemoConfig) -> Self {
        Self {
            police_reports: config.police_reports,
        }
    }
}

#[async_trait]
impl ReputationLookup for DemoReputation {
    async fn lookup(&self, category: ReputationCategory, value: &str) -> DeskResult<ReputationReport> {
        info!(
            "[Reputation] demo lookup: type={}, value={value}, police_reports={}",
            category.as_str(),
            self.police_reports
        );
        Ok(ReputationReport {
            ok:               true,
            search_count:     self.police_reports,
            occurrence_count: self.police_reports,
        })
    }
}

pub struct DemoPhoneLookup {
    found: bool,
}

impl DemoPhoneLookup {
    pub fn new(config: &DemoConfig) -> Self {
        Self {
            found: config.phone_found,
        }
    }
}

#[async_trait]
impl PhoneLookup for DemoPhoneLookup {
    async fn lookup(&self, phone: &str) -> DeskResult<PhoneLookupResult> {
        info!("[PhoneLookup] demo lookup for {phone}");
        if self.found {
            Ok(PhoneLookupResult {
                status:    PhoneLookupStatus::Success,
                name:      Some("Demo User".into()),
                carrier:   Some("Demo Carrier".into()),
                is_spam:   false,
                spam_type: None,
            })
        } else {
            Ok(PhoneLookupResult {
                status:    PhoneLookupStatus::NoData,
                name:      None,
                carrier:   None,
                is_spam:   false,
                spam_type: None,
            })
        }
    }
}

pub struct DemoSocialLookup {
    found: bool,
}

impl DemoSocialLookup {
    pub fn new(config: &DemoConfig) -> Self {
        Self {
            found: config.social_found,
        }
    }
}

#[async_trait]
impl SocialLookup for DemoSocialLookup {
    async fn lookup(&self, username: &str, platform: Platform) -> DeskResult<SocialLookupResult> {
        info!("[SocialLookup] demo lookup: @{username} on {}", platform.as_str());
        if self.found {
            Ok(SocialLookupResult {
                status:           SocialLookupStatus::Success,
                platform,
                username:         username.to_string(),
                platform_user_id: Some(format!("demo_{}_{username}", platform.as_str())),
                display_name:     Some(format!("Demo ({username})")),
            })
        } else {
            Ok(SocialLookupResult {
                status:           SocialLookupStatus::NotFound,
                platform,
                username:         username.to_string(),
                platform_user_id: None,
                display_name:     None,
            })
        }
    }
}

/// Treats a file reference of the form `qr:<payload>` as an image that
/// decodes to `<payload>`. Anything else has no QR code.
pub struct DemoQrDecoder;

#[async_trait]
impl QrDecoder for DemoQrDecoder {
    async fn decode(&self, file: &FileRef) -> DeskResult<Option<String>> {
        Ok(file.strip_prefix("qr:").map(str::to_string))
    }
}
