use super::{like_pattern, opt_time_col, time_col, DeskStore};
use crate::{
    clock::to_db_time,
    error::{DeskError, DeskResult},
    report::{decode_evidence, NewReport, ReportRecord, ReportStatus, ReporterRole, Target, TargetKind},
    types::{FileRef, ReportId, UserId},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

const REPORT_COLUMNS: &str = "r.report_id, r.submitter_id, r.submitted_at, r.title, r.description,
    r.reporter_role, r.status, r.loss_amount, r.target_kind, r.target_phone_number,
    r.target_phone_name, r.target_bank_account, r.target_bank_name, r.target_bank_holder,
    r.target_social_url, r.evidence, r.linked_profile_id, r.admin_note, r.needs_info_since,
    r.rejection_reason, r.auto_rejected, r.restored_at";

const UPDATE_SEPARATOR: &str = "\n\n--- UPDATE ---\n";

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
}

fn required_text(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<String> {
    let value: Option<String> = row.get(idx)?;
    value.ok_or_else(|| conversion_error(idx, "missing target column".into()))
}

// Helper function for mapping report rows
fn report_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReportRecord> {
    let role_raw: String = row.get(5)?;
    let status_raw: String = row.get(6)?;
    let kind_raw: String = row.get(8)?;
    let kind = TargetKind::parse(&kind_raw)
        .ok_or_else(|| conversion_error(8, format!("unknown target kind '{kind_raw}'")))?;
    let target = match kind {
        TargetKind::Phone => Target::Phone {
            number:       required_text(row, 9)?,
            display_name: row.get(10)?,
        },
        TargetKind::Bank => Target::Bank {
            account:     required_text(row, 11)?,
            bank_name:   required_text(row, 12)?,
            holder_name: required_text(row, 13)?,
        },
        TargetKind::Social => Target::Social {
            url: required_text(row, 14)?,
        },
    };
    let evidence_json: String = row.get(15)?;
    let evidence = decode_evidence(&evidence_json)
        .map_err(|e| conversion_error(15, format!("bad evidence: {e}")))?;

    Ok(ReportRecord {
        report_id:     row.get(0)?,
        submitter_id:  row.get(1)?,
        submitted_at:  time_col(row, 2)?,
        title:         row.get(3)?,
        description:   row.get(4)?,
        reporter_role: ReporterRole::parse(&role_raw)
            .ok_or_else(|| conversion_error(5, format!("unknown role '{role_raw}'")))?,
        status: ReportStatus::parse(&status_raw)
            .ok_or_else(|| conversion_error(6, format!("unknown status '{status_raw}'")))?,
        loss_amount: row.get(7)?,
        target,
        evidence,
        linked_profile_id: row.get(16)?,
        admin_note:        row.get(17)?,
        needs_info_since:  opt_time_col(row, 18)?,
        rejection_reason:  row.get(19)?,
        auto_rejected:     row.get::<_, i32>(20)? != 0,
        restored_at:       opt_time_col(row, 21)?,
    })
}

fn find_report_in(conn: &Connection, report_id: ReportId) -> DeskResult<Option<ReportRecord>> {
    conn.query_row(
        &format!("SELECT {REPORT_COLUMNS} FROM reports r WHERE r.report_id = ?1"),
        params![report_id],
        report_row_mapper,
    )
    .optional()
    .map_err(Into::into)
}

fn get_report_in(conn: &Connection, report_id: ReportId) -> DeskResult<ReportRecord> {
    find_report_in(conn, report_id)?.ok_or(DeskError::ReportNotFound { report_id })
}

/// Explain why a conditional status update touched no row.
fn transition_conflict(conn: &Connection, report_id: ReportId) -> DeskError {
    match find_report_in(conn, report_id) {
        Ok(None) => DeskError::ReportNotFound { report_id },
        Ok(Some(r)) if r.status == ReportStatus::Verified => DeskError::AlreadyLinked { report_id },
        Ok(Some(r)) => DeskError::NotEditable {
            report_id,
            status: r.status.as_str().to_string(),
        },
        Err(e) => e,
    }
}

fn insert_screenshots(
    conn: &Connection,
    report_id: ReportId,
    files: &[FileRef],
    now: DateTime<Utc>,
) -> DeskResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO screenshots (report_id, file_ref, added_at) VALUES (?1, ?2, ?3)",
    )?;
    let added_at = to_db_time(now);
    for file in files {
        stmt.execute(params![report_id, file, &added_at])?;
    }
    Ok(())
}

/// Set VERIFIED and the profile link. Only an UNVERIFIED report can be
/// linked; anything else is a conflict. Returns the updated report.
pub(crate) fn mark_verified_linked(
    conn: &Connection,
    report_id: ReportId,
    profile_id: &str,
) -> DeskResult<ReportRecord> {
    let changed = conn.execute(
        "UPDATE reports SET status = 'VERIFIED', linked_profile_id = ?1, needs_info_since = NULL
         WHERE report_id = ?2 AND status = 'UNVERIFIED'",
        params![profile_id, report_id],
    )?;
    if changed == 0 {
        return Err(transition_conflict(conn, report_id));
    }
    get_report_in(conn, report_id)
}

impl DeskStore {
    // ── Report ─────────────────────────────────────────────────────

    /// Insert the report and its screenshots atomically. Returns the new id.
    pub fn insert_report(&self, new: &NewReport, now: DateTime<Utc>) -> DeskResult<ReportId> {
        let evidence_json = serde_json::to_string(&new.evidence)?;
        let (phone, phone_name, account, bank_name, holder, social) = match &new.target {
            Target::Phone { number, display_name } => {
                (Some(number.as_str()), display_name.as_deref(), None, None, None, None)
            }
            Target::Bank { account, bank_name, holder_name } => (
                None,
                None,
                Some(account.as_str()),
                Some(bank_name.as_str()),
                Some(holder_name.as_str()),
                None,
            ),
            Target::Social { url } => (None, None, None, None, None, Some(url.as_str())),
        };
        self.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO reports (
                    submitter_id, submitted_at, title, description, reporter_role, status,
                    loss_amount, target_kind, target_phone_number, target_phone_name,
                    target_bank_account, target_bank_name, target_bank_holder, target_social_url,
                    evidence, linked_profile_id
                 ) VALUES (?1, ?2, ?3, ?4, ?5, 'UNVERIFIED', ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    new.submitter_id,
                    to_db_time(now),
                    &new.title,
                    &new.description,
                    new.reporter_role.as_str(),
                    new.loss_amount,
                    new.target.kind().as_str(),
                    phone,
                    phone_name,
                    account,
                    bank_name,
                    holder,
                    social,
                    &evidence_json,
                    new.linked_profile_id.as_deref(),
                ],
            )?;
            let report_id = tx.last_insert_rowid();
            insert_screenshots(tx, report_id, &new.screenshots, now)?;
            Ok(report_id)
        })
    }

    pub fn get_report(&self, report_id: ReportId) -> DeskResult<ReportRecord> {
        let conn = self.conn()?;
        get_report_in(&conn, report_id)
    }

    pub fn find_report(&self, report_id: ReportId) -> DeskResult<Option<ReportRecord>> {
        let conn = self.conn()?;
        find_report_in(&conn, report_id)
    }

    pub fn report_screenshots(&self, report_id: ReportId) -> DeskResult<Vec<FileRef>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT file_ref FROM screenshots WHERE report_id = ?1 ORDER BY screenshot_id ASC",
        )?;
        let rows = stmt.query_map(params![report_id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Reports in `status`, oldest first.
    pub fn reports_by_status(&self, status: ReportStatus) -> DeskResult<Vec<ReportRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports r WHERE r.status = ?1
             ORDER BY r.submitted_at ASC, r.report_id ASC"
        ))?;
        let rows = stmt.query_map(params![status.as_str()], report_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn count_reports_by_status(&self, status: ReportStatus) -> DeskResult<i64> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM reports WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )
        .map_err(Into::into)
    }

    /// Oldest UNVERIFIED report whose id is not in `skip`.
    pub fn next_unverified(&self, skip: &[ReportId]) -> DeskResult<Option<ReportRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports r WHERE r.status = 'UNVERIFIED'
             ORDER BY r.submitted_at ASC, r.report_id ASC"
        ))?;
        let rows = stmt.query_map([], report_row_mapper)?;
        for row in rows {
            let report = row?;
            if !skip.contains(&report.report_id) {
                return Ok(Some(report));
            }
        }
        Ok(None)
    }

    /// UNVERIFIED → DISPUTED. Drops any provisional profile link.
    pub fn mark_disputed(&self, report_id: ReportId) -> DeskResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE reports SET status = 'DISPUTED', linked_profile_id = NULL
             WHERE report_id = ?1 AND status = 'UNVERIFIED'",
            params![report_id],
        )?;
        if changed == 0 {
            return Err(transition_conflict(&conn, report_id));
        }
        Ok(())
    }

    /// UNVERIFIED → NEEDS_INFO, stamping the grace-period start.
    pub fn mark_needs_info(
        &self,
        report_id: ReportId,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> DeskResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE reports SET status = 'NEEDS_INFO', needs_info_since = ?1, admin_note = ?2,
                    linked_profile_id = NULL
             WHERE report_id = ?3 AND status = 'UNVERIFIED'",
            params![to_db_time(now), reason, report_id],
        )?;
        if changed == 0 {
            return Err(transition_conflict(&conn, report_id));
        }
        Ok(())
    }

    /// NEEDS_INFO reports whose grace period started at or before `cutoff`.
    pub fn stale_needs_info(&self, cutoff: DateTime<Utc>) -> DeskResult<Vec<ReportRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports r
             WHERE r.status = 'NEEDS_INFO' AND r.needs_info_since <= ?1
             ORDER BY r.needs_info_since ASC"
        ))?;
        let rows = stmt.query_map(params![to_db_time(cutoff)], report_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// NEEDS_INFO → REJECTED (auto). Returns false when the report was no
    /// longer waiting, e.g. the submitter restored it meanwhile.
    pub fn archive_report(&self, report_id: ReportId, reason: &str) -> DeskResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE reports SET status = 'REJECTED', auto_rejected = 1, rejection_reason = ?1,
                    needs_info_since = NULL, linked_profile_id = NULL
             WHERE report_id = ?2 AND status = 'NEEDS_INFO'",
            params![reason, report_id],
        )?;
        Ok(changed > 0)
    }

    /// Submitter update: append text after a separator, append screenshots,
    /// and put the report back in the review queue.
    pub fn restore_report(
        &self,
        report_id: ReportId,
        submitter_id: UserId,
        addition: &str,
        screenshots: &[FileRef],
        provisional_link: Option<&str>,
        now: DateTime<Utc>,
    ) -> DeskResult<ReportRecord> {
        self.with_transaction(|tx| {
            let report = get_report_in(tx, report_id)?;
            if report.submitter_id != submitter_id {
                return Err(DeskError::ReportNotFound { report_id });
            }
            if !report.is_updatable() {
                return Err(DeskError::NotEditable {
                    report_id,
                    status: report.status.as_str().to_string(),
                });
            }
            tx.execute(
                "UPDATE reports SET description = description || ?1, status = 'UNVERIFIED',
                        needs_info_since = NULL, admin_note = NULL, rejection_reason = NULL,
                        auto_rejected = 0, restored_at = ?2, linked_profile_id = ?3
                 WHERE report_id = ?4",
                params![
                    format!("{UPDATE_SEPARATOR}{addition}"),
                    to_db_time(now),
                    provisional_link,
                    report_id
                ],
            )?;
            insert_screenshots(tx, report_id, screenshots, now)?;
            get_report_in(tx, report_id)
        })
    }

    /// Substring match over UNVERIFIED reports: title, description, target
    /// fields and evidence. Newest first.
    pub fn search_unverified_reports(&self, term: &str) -> DeskResult<Vec<ReportRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports r
             WHERE r.status = 'UNVERIFIED' AND (
                   r.title LIKE ?1 ESCAPE '\\'
                OR r.description LIKE ?1 ESCAPE '\\'
                OR r.target_phone_number LIKE ?1 ESCAPE '\\'
                OR r.target_phone_name LIKE ?1 ESCAPE '\\'
                OR r.target_bank_account LIKE ?1 ESCAPE '\\'
                OR r.target_bank_holder LIKE ?1 ESCAPE '\\'
                OR r.target_social_url LIKE ?1 ESCAPE '\\'
                OR r.evidence LIKE ?1 ESCAPE '\\')
             ORDER BY r.submitted_at DESC, r.report_id DESC"
        ))?;
        let rows = stmt.query_map(params![like_pattern(term)], report_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn reports_by_submitter(&self, submitter_id: UserId) -> DeskResult<Vec<ReportRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports r WHERE r.submitter_id = ?1
             ORDER BY r.submitted_at DESC, r.report_id DESC"
        ))?;
        let rows = stmt.query_map(params![submitter_id], report_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// VERIFIED reports linked to a profile, newest first.
    pub fn verified_reports_for_profile(&self, profile_id: &str) -> DeskResult<Vec<ReportRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports r
             WHERE r.linked_profile_id = ?1 AND r.status = 'VERIFIED'
             ORDER BY r.submitted_at DESC, r.report_id DESC"
        ))?;
        let rows = stmt.query_map(params![profile_id], report_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Whether any report or profile already names this phone number.
    pub fn phone_known(&self, phone: &str) -> DeskResult<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM reports WHERE target_phone_number = ?1
                 UNION ALL
                 SELECT 1 FROM profile_phone_numbers WHERE phone_number = ?1
                 LIMIT 1",
                params![phone],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
