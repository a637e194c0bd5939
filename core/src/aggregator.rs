//! Profile aggregation: folds a verified report into a profile.
//!
//! RULES:
//!   - One link is one IMMEDIATE transaction: status, rollups, identifier
//!     upserts and distinct counts commit together or not at all.
//!   - Only an UNVERIFIED report can be linked. The check runs inside the
//!     transaction, so a racing admin gets `AlreadyLinked` or `NotEditable`.
//!   - Creating a profile and linking its first report is one transaction.
//!   - Only evidence kinds whose `feeds_identifier_table()` is true are
//!     upserted; other evidence stays on the report.

use crate::{
    clock::Clock,
    error::{DeskError, DeskResult},
    lookup::classify_social_url,
    profile::{new_profile_id, ProfileRecord, ProfileStats},
    report::{ReportRecord, Target},
    store::{self, DeskStore},
    types::{ProfileId, ReportId},
};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub report:          ReportRecord,
    pub profile:         ProfileRecord,
    pub created_profile: bool,
}

#[derive(Clone)]
pub struct Aggregator {
    store: DeskStore,
    clock: Arc<dyn Clock>,
}

impl Aggregator {
    pub fn new(store: DeskStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Verify `report_id` and fold it into an existing profile.
    pub fn link_report(&self, report_id: ReportId, profile_id: &str) -> DeskResult<LinkOutcome> {
        let now = self.clock.now();
        let report = self.store.with_transaction(|tx| {
            if !store::profile_exists(tx, profile_id)? {
                return Err(DeskError::ProfileNotFound {
                    profile_id: profile_id.to_string(),
                });
            }
            fold_report(tx, report_id, profile_id, now)
        })?;
        let profile = self.store.get_profile(profile_id)?;
        info!(
            "[Aggregator] report {report_id} linked to {profile_id} (reports={}, loss={:.2})",
            profile.total_reports, profile.total_loss
        );
        Ok(LinkOutcome {
            report,
            profile,
            created_profile: false,
        })
    }

    /// Create a profile named `display_name` and link `report_id` to it.
    pub fn create_profile_and_link(
        &self,
        report_id: ReportId,
        display_name: &str,
    ) -> DeskResult<LinkOutcome> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(DeskError::Validation("profile name cannot be empty".into()));
        }
        let now = self.clock.now();
        let profile_id = new_profile_id();
        let report = self.store.with_transaction(|tx| {
            store::insert_profile(tx, &profile_id, display_name, now)?;
            fold_report(tx, report_id, &profile_id, now)
        })?;
        let profile = self.store.get_profile(&profile_id)?;
        info!("[Aggregator] created profile {profile_id} '{display_name}' from report {report_id}");
        Ok(LinkOutcome {
            report,
            profile,
            created_profile: true,
        })
    }

    /// The profile a new report should be provisionally linked to: the
    /// single profile owning its primary identifier. Zero or several
    /// owners leave the choice to an admin.
    pub fn resolve_auto_link(&self, target: &Target) -> DeskResult<Option<ProfileId>> {
        let mut owners = self
            .store
            .profile_ids_for_identifier(target.kind(), target.primary_value())?;
        if owners.len() == 1 {
            Ok(owners.pop())
        } else {
            Ok(None)
        }
    }

    /// Profiles an admin may link `report` to: owners of its primary
    /// identifier plus its provisional link, oldest first.
    pub fn candidate_profiles(&self, report: &ReportRecord) -> DeskResult<Vec<ProfileRecord>> {
        let mut ids: BTreeSet<ProfileId> = self
            .store
            .profile_ids_for_identifier(report.target.kind(), report.target.primary_value())?
            .into_iter()
            .collect();
        if let Some(linked) = &report.linked_profile_id {
            ids.insert(linked.clone());
        }
        let mut profiles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(profile) = self.store.find_profile(&id)? {
                profiles.push(profile);
            }
        }
        profiles.sort_by_key(|p| p.created_at);
        Ok(profiles)
    }

    /// Recompute one profile's rollups from identifier rows and VERIFIED
    /// linked reports.
    pub fn rebuild_profile_stats(&self, profile_id: &str) -> DeskResult<ProfileStats> {
        self.store.with_transaction(|tx| {
            let stats = store::compute_profile_stats(tx, profile_id)?;
            store::write_profile_stats(tx, profile_id, &stats)?;
            Ok(stats)
        })
    }

    /// Rebuild every profile. Returns how many were rewritten.
    pub fn rebuild_all_profile_stats(&self) -> DeskResult<usize> {
        let ids = self.store.all_profile_ids()?;
        for id in &ids {
            self.rebuild_profile_stats(id)?;
        }
        info!("[Aggregator] rebuilt rollups for {} profiles", ids.len());
        Ok(ids.len())
    }
}

/// Steps 1-5 of a link, run against an open transaction.
fn fold_report(
    tx: &Connection,
    report_id: ReportId,
    profile_id: &str,
    now: DateTime<Utc>,
) -> DeskResult<ReportRecord> {
    let report = store::mark_verified_linked(tx, report_id, profile_id)?;
    store::bump_profile_totals(tx, profile_id, report.loss_amount, now)?;

    match &report.target {
        Target::Phone { number, .. } => store::upsert_phone_number(tx, profile_id, number)?,
        Target::Bank {
            account,
            bank_name,
            holder_name,
        } => store::upsert_bank_account(tx, profile_id, account, bank_name, holder_name)?,
        Target::Social { url } => {
            let handle = classify_social_url(url);
            store::upsert_social_handle(
                tx,
                profile_id,
                url,
                handle.as_ref().map(|h| h.platform.as_str()),
                handle.as_ref().map(|h| h.username.as_str()),
            )?
        }
    }

    // One increment per distinct number per report.
    let target_phone = match &report.target {
        Target::Phone { number, .. } => Some(number.as_str()),
        _ => None,
    };
    let evidence_phones: BTreeSet<&str> = report
        .evidence
        .iter()
        .filter(|e| e.kind.feeds_identifier_table())
        .map(|e| e.value.as_str())
        .filter(|v| Some(*v) != target_phone)
        .collect();
    for phone in evidence_phones {
        store::upsert_phone_number(tx, profile_id, phone)?;
    }

    if let Some(name) = report.target.attached_name() {
        store::add_alternate_name(tx, profile_id, name)?;
    }

    store::recompute_unique_counts(tx, profile_id)?;
    Ok(report)
}
