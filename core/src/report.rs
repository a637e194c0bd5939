//! Scam report records and the parsing rules for what a reporter types in.
//!
//! RULES:
//!   - A report carries exactly one target, and only that target's fields.
//!   - Evidence is stored as typed facts. Legacy prefixed strings
//!     ("Telefon: ...", "Bank: ...", "Sosial: ...") are tokenized on read.
//!   - Only phone evidence feeds a profile's identifier tables.

use crate::types::{FileRef, ProfileId, ReportId, UserId};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PHONE_IN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\d{8,15}").expect("Invalid phone regex"));

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Unverified,
    Verified,
    Disputed,
    NeedsInfo,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Unverified => "UNVERIFIED",
            ReportStatus::Verified   => "VERIFIED",
            ReportStatus::Disputed   => "DISPUTED",
            ReportStatus::NeedsInfo  => "NEEDS_INFO",
            ReportStatus::Rejected   => "REJECTED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "UNVERIFIED" => Some(ReportStatus::Unverified),
            "VERIFIED"   => Some(ReportStatus::Verified),
            "DISPUTED"   => Some(ReportStatus::Disputed),
            "NEEDS_INFO" => Some(ReportStatus::NeedsInfo),
            "REJECTED"   => Some(ReportStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReporterRole {
    Victim,
    Witness,
    Awareness,
}

impl ReporterRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReporterRole::Victim    => "victim",
            ReporterRole::Witness   => "witness",
            ReporterRole::Awareness => "awareness",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "victim"    => Some(ReporterRole::Victim),
            "witness"   => Some(ReporterRole::Witness),
            "awareness" => Some(ReporterRole::Awareness),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReporterRole::Victim    => "I'VE BEEN SCAMMED",
            ReporterRole::Witness   => "SOMEONE I KNOW WAS SCAMMED",
            ReporterRole::Awareness => "RAISING AWARENESS",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetKind {
    Phone,
    Bank,
    Social,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Phone  => "PHONE",
            TargetKind::Bank   => "BANK",
            TargetKind::Social => "SOCIAL",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PHONE"  => Some(TargetKind::Phone),
            "BANK"   => Some(TargetKind::Bank),
            "SOCIAL" => Some(TargetKind::Social),
            _ => None,
        }
    }

    /// Input hint shown when asking for the target details.
    pub fn details_hint(&self) -> &'static str {
        match self {
            TargetKind::Phone  => "Send the phone number, optionally followed by a name: NUMBER, NAME",
            TargetKind::Bank   => "Send the bank details as: ACCOUNT NUMBER, BANK NAME, HOLDER NAME",
            TargetKind::Social => "Send the link to the social media profile",
        }
    }
}

/// Who or what the report is against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    Phone {
        number:       String,
        display_name: Option<String>,
    },
    Bank {
        account:     String,
        bank_name:   String,
        holder_name: String,
    },
    Social {
        url: String,
    },
}

impl Target {
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Phone { .. }  => TargetKind::Phone,
            Target::Bank { .. }   => TargetKind::Bank,
            Target::Social { .. } => TargetKind::Social,
        }
    }

    /// The value used to match this target against profile identifiers.
    pub fn primary_value(&self) -> &str {
        match self {
            Target::Phone { number, .. } => number,
            Target::Bank { account, .. } => account,
            Target::Social { url }       => url,
        }
    }

    /// Person name attached to the target, if the reporter gave one.
    pub fn attached_name(&self) -> Option<&str> {
        match self {
            Target::Phone { display_name, .. } => display_name.as_deref(),
            Target::Bank { holder_name, .. }   => Some(holder_name),
            Target::Social { .. }              => None,
        }
    }

    /// Re-render in the same shape the reporter typed it.
    pub fn as_input(&self) -> String {
        match self {
            Target::Phone { number, display_name: Some(name) } => format!("{number}, {name}"),
            Target::Phone { number, display_name: None } => number.clone(),
            Target::Bank { account, bank_name, holder_name } => {
                format!("{account}, {bank_name}, {holder_name}")
            }
            Target::Social { url } => url.clone(),
        }
    }

    /// Parse the free-text details for a target of `kind`.
    ///
    /// Phone: `NUMBER[, NAME]`, split on the first comma.
    /// Bank: `ACCOUNT, BANK, HOLDER`, exactly three non-empty fields; the
    /// holder keeps any further commas.
    pub fn parse_details(kind: TargetKind, raw: &str) -> Result<Target, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("Details cannot be empty.".into());
        }
        match kind {
            TargetKind::Phone => {
                let mut parts = raw.splitn(2, ',');
                let number = parts.next().unwrap_or_default().trim();
                if number.is_empty() {
                    return Err("Phone number is missing.".into());
                }
                let display_name = parts
                    .next()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(String::from);
                Ok(Target::Phone {
                    number: number.to_string(),
                    display_name,
                })
            }
            TargetKind::Bank => {
                let parts: Vec<&str> = raw.splitn(3, ',').map(str::trim).collect();
                if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
                    return Err(
                        "Bank details need three parts: ACCOUNT NUMBER, BANK NAME, HOLDER NAME."
                            .into(),
                    );
                }
                Ok(Target::Bank {
                    account:     parts[0].to_string(),
                    bank_name:   parts[1].to_string(),
                    holder_name: parts[2].to_string(),
                })
            }
            TargetKind::Social => Ok(Target::Social {
                url: raw.to_string(),
            }),
        }
    }
}

/// Parse a loss amount. Tolerates an `RM` prefix, whitespace and thousands
/// separators. Must be finite and not negative.
pub fn parse_amount(raw: &str) -> Result<f64, String> {
    let trimmed = raw.trim();
    let without_prefix = match trimmed.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("rm") => &trimmed[2..],
        _ => trimmed,
    };
    let cleaned: String = without_prefix
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    let amount: f64 = cleaned
        .parse()
        .map_err(|_| format!("'{}' is not a valid amount.", raw.trim()))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err("Amount must be zero or a positive number.".into());
    }
    Ok(amount)
}

// ── Evidence ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Phone,
    Bank,
    Social,
}

impl EvidenceKind {
    fn legacy_prefix(&self) -> &'static str {
        match self {
            EvidenceKind::Phone  => "Telefon: ",
            EvidenceKind::Bank   => "Bank: ",
            EvidenceKind::Social => "Sosial: ",
        }
    }

    /// Whether linking a report folds this kind of evidence into the
    /// profile's identifier tables. Bank and social evidence stay read-only
    /// facts on the report.
    pub fn feeds_identifier_table(&self) -> bool {
        matches!(self, EvidenceKind::Phone)
    }

    pub fn label(&self) -> &'static str {
        match self {
            EvidenceKind::Phone  => "Phone",
            EvidenceKind::Bank   => "Bank",
            EvidenceKind::Social => "Social",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Evidence {
    pub kind:  EvidenceKind,
    pub value: String,
}

impl Evidence {
    /// Tokenize reporter input for an additional fact.
    /// Phone evidence must contain a recognisable number; only that number
    /// is kept.
    pub fn from_input(kind: EvidenceKind, raw: &str) -> Result<Evidence, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("Evidence cannot be empty.".into());
        }
        let value = match kind {
            EvidenceKind::Phone => extract_phone(raw)
                .ok_or_else(|| "No phone number found in that message.".to_string())?,
            EvidenceKind::Bank | EvidenceKind::Social => raw.to_string(),
        };
        Ok(Evidence { kind, value })
    }

    /// Tokenize a legacy prefixed string. Unknown prefixes yield `None`.
    pub fn parse_legacy(raw: &str) -> Option<Evidence> {
        for kind in [EvidenceKind::Phone, EvidenceKind::Bank, EvidenceKind::Social] {
            if let Some(rest) = raw.strip_prefix(kind.legacy_prefix()) {
                let rest = rest.trim();
                let value = match kind {
                    EvidenceKind::Phone => extract_phone(rest)?,
                    _ => rest.to_string(),
                };
                return Some(Evidence { kind, value });
            }
        }
        None
    }

    pub fn display(&self) -> String {
        format!("{}: {}", self.kind.label(), self.value)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEvidence {
    Typed { kind: EvidenceKind, value: String },
    Legacy(String),
}

/// Decode the stored evidence column, typed facts and legacy strings alike.
/// Legacy strings that do not tokenize are dropped.
pub fn decode_evidence(json: &str) -> serde_json::Result<Vec<Evidence>> {
    let stored: Vec<StoredEvidence> = serde_json::from_str(json)?;
    Ok(stored
        .into_iter()
        .filter_map(|item| match item {
            StoredEvidence::Typed { kind, value } => Some(Evidence { kind, value }),
            StoredEvidence::Legacy(raw) => Evidence::parse_legacy(&raw),
        })
        .collect())
}

pub fn extract_phone(text: &str) -> Option<String> {
    PHONE_IN_TEXT.find(text).map(|m| m.as_str().to_string())
}

// ── Records ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ReportRecord {
    pub report_id:         ReportId,
    pub submitter_id:      UserId,
    pub submitted_at:      DateTime<Utc>,
    pub title:             String,
    pub description:       String,
    pub reporter_role:     ReporterRole,
    pub status:            ReportStatus,
    pub loss_amount:       f64,
    pub target:            Target,
    pub evidence:          Vec<Evidence>,
    pub linked_profile_id: Option<ProfileId>,
    pub admin_note:        Option<String>,
    pub needs_info_since:  Option<DateTime<Utc>>,
    pub rejection_reason:  Option<String>,
    pub auto_rejected:     bool,
    pub restored_at:       Option<DateTime<Utc>>,
}

impl ReportRecord {
    /// A submitter may revise a report that is waiting for information or
    /// that was archived for lack of a reply.
    pub fn is_updatable(&self) -> bool {
        match self.status {
            ReportStatus::NeedsInfo => true,
            ReportStatus::Rejected  => self.auto_rejected,
            _ => false,
        }
    }
}

/// A report as submitted, before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub submitter_id:      UserId,
    pub title:             String,
    pub description:       String,
    pub reporter_role:     ReporterRole,
    pub loss_amount:       f64,
    pub target:            Target,
    pub evidence:          Vec<Evidence>,
    pub screenshots:       Vec<FileRef>,
    pub linked_profile_id: Option<ProfileId>,
}
