use super::{like_pattern, opt_time_col, time_col, DeskStore};
use crate::{
    clock::to_db_time,
    error::{DeskError, DeskResult},
    profile::{BankAccountRecord, PhoneNumberRecord, ProfileRecord, ProfileStats, SocialHandleRecord},
    report::TargetKind,
    types::ProfileId,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

const PROFILE_COLUMNS: &str = "p.profile_id, p.display_name, p.alternate_names, p.created_at,
    p.updated_at, p.total_loss, p.total_reports, p.unique_banks, p.unique_phones, p.unique_socials";

fn json_col<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn profile_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProfileRecord> {
    Ok(ProfileRecord {
        profile_id:      row.get(0)?,
        display_name:    row.get(1)?,
        alternate_names: json_col(row, 2)?,
        created_at:      time_col(row, 3)?,
        updated_at:      time_col(row, 4)?,
        total_loss:      row.get(5)?,
        total_reports:   row.get(6)?,
        unique_banks:    row.get(7)?,
        unique_phones:   row.get(8)?,
        unique_socials:  row.get(9)?,
    })
}

fn social_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<SocialHandleRecord> {
    Ok(SocialHandleRecord {
        profile_id:         row.get(0)?,
        url:                row.get(1)?,
        platform:           row.get(2)?,
        extracted_username: row.get(3)?,
        platform_user_id:   row.get(4)?,
        display_name:       row.get(5)?,
        username_history:   json_col(row, 6)?,
        lookup_status:      row.get(7)?,
        last_checked_at:    opt_time_col(row, 8)?,
        report_count:       row.get(9)?,
    })
}

fn find_profile_in(conn: &Connection, profile_id: &str) -> DeskResult<Option<ProfileRecord>> {
    conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM profiles p WHERE p.profile_id = ?1"),
        params![profile_id],
        profile_row_mapper,
    )
    .optional()
    .map_err(Into::into)
}

fn collect_profiles(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> DeskResult<Vec<ProfileRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, profile_row_mapper)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

// ── Transaction building blocks (used by the aggregator) ─────────

pub(crate) fn profile_exists(conn: &Connection, profile_id: &str) -> DeskResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM profiles WHERE profile_id = ?1",
            params![profile_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn insert_profile(
    conn: &Connection,
    profile_id: &str,
    display_name: &str,
    now: DateTime<Utc>,
) -> DeskResult<()> {
    let ts = to_db_time(now);
    conn.execute(
        "INSERT INTO profiles (profile_id, display_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)",
        params![profile_id, display_name, ts],
    )?;
    Ok(())
}

pub(crate) fn bump_profile_totals(
    conn: &Connection,
    profile_id: &str,
    loss: f64,
    now: DateTime<Utc>,
) -> DeskResult<()> {
    let changed = conn.execute(
        "UPDATE profiles SET total_loss = total_loss + ?1, total_reports = total_reports + 1,
                updated_at = ?2
         WHERE profile_id = ?3",
        params![loss, to_db_time(now), profile_id],
    )?;
    if changed == 0 {
        return Err(DeskError::ProfileNotFound {
            profile_id: profile_id.to_string(),
        });
    }
    Ok(())
}

/// Bank and holder names follow the most recent report.
pub(crate) fn upsert_bank_account(
    conn: &Connection,
    profile_id: &str,
    account_number: &str,
    bank_name: &str,
    holder_name: &str,
) -> DeskResult<()> {
    conn.execute(
        "INSERT INTO profile_bank_accounts (profile_id, account_number, bank_name, holder_name)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(profile_id, account_number) DO UPDATE SET
             report_count = report_count + 1,
             bank_name    = excluded.bank_name,
             holder_name  = excluded.holder_name",
        params![profile_id, account_number, bank_name, holder_name],
    )?;
    Ok(())
}

pub(crate) fn upsert_phone_number(conn: &Connection, profile_id: &str, phone: &str) -> DeskResult<()> {
    conn.execute(
        "INSERT INTO profile_phone_numbers (profile_id, phone_number) VALUES (?1, ?2)
         ON CONFLICT(profile_id, phone_number) DO UPDATE SET report_count = report_count + 1",
        params![profile_id, phone],
    )?;
    Ok(())
}

/// Platform and username are only filled when the row is first created
/// or was still unclassified.
pub(crate) fn upsert_social_handle(
    conn: &Connection,
    profile_id: &str,
    url: &str,
    platform: Option<&str>,
    username: Option<&str>,
) -> DeskResult<()> {
    conn.execute(
        "INSERT INTO profile_social_media (profile_id, url, platform, extracted_username)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(profile_id, url) DO UPDATE SET
             report_count       = report_count + 1,
             platform           = COALESCE(platform, excluded.platform),
             extracted_username = COALESCE(extracted_username, excluded.extracted_username)",
        params![profile_id, url, platform, username],
    )?;
    Ok(())
}

pub(crate) fn recompute_unique_counts(conn: &Connection, profile_id: &str) -> DeskResult<()> {
    conn.execute(
        "UPDATE profiles SET
             unique_banks   = (SELECT COUNT(*) FROM profile_bank_accounts WHERE profile_id = ?1),
             unique_phones  = (SELECT COUNT(*) FROM profile_phone_numbers WHERE profile_id = ?1),
             unique_socials = (SELECT COUNT(*) FROM profile_social_media  WHERE profile_id = ?1)
         WHERE profile_id = ?1",
        params![profile_id],
    )?;
    Ok(())
}

/// Record `name` as an unconfirmed alias unless it is the display name or
/// already listed (case-insensitive).
pub(crate) fn add_alternate_name(conn: &Connection, profile_id: &str, name: &str) -> DeskResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(());
    }
    let profile = find_profile_in(conn, profile_id)?.ok_or_else(|| DeskError::ProfileNotFound {
        profile_id: profile_id.to_string(),
    })?;
    let known = profile.display_name.eq_ignore_ascii_case(name)
        || profile
            .alternate_names
            .iter()
            .any(|n| n.eq_ignore_ascii_case(name));
    if known {
        return Ok(());
    }
    let mut names = profile.alternate_names;
    names.push(name.to_string());
    conn.execute(
        "UPDATE profiles SET alternate_names = ?1 WHERE profile_id = ?2",
        params![serde_json::to_string(&names)?, profile_id],
    )?;
    Ok(())
}

/// Rollups from ground truth: VERIFIED linked reports and identifier rows.
pub(crate) fn compute_profile_stats(conn: &Connection, profile_id: &str) -> DeskResult<ProfileStats> {
    let (total_loss, total_reports): (f64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(loss_amount), 0), COUNT(*) FROM reports
         WHERE linked_profile_id = ?1 AND status = 'VERIFIED'",
        params![profile_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let count = |table: &str| -> DeskResult<i64> {
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE profile_id = ?1"),
            params![profile_id],
            |row| row.get(0),
        )
        .map_err(Into::into)
    };
    Ok(ProfileStats {
        total_loss,
        total_reports,
        unique_banks:   count("profile_bank_accounts")?,
        unique_phones:  count("profile_phone_numbers")?,
        unique_socials: count("profile_social_media")?,
    })
}

pub(crate) fn write_profile_stats(
    conn: &Connection,
    profile_id: &str,
    stats: &ProfileStats,
) -> DeskResult<()> {
    let changed = conn.execute(
        "UPDATE profiles SET total_loss = ?1, total_reports = ?2, unique_banks = ?3,
                unique_phones = ?4, unique_socials = ?5
         WHERE profile_id = ?6",
        params![
            stats.total_loss,
            stats.total_reports,
            stats.unique_banks,
            stats.unique_phones,
            stats.unique_socials,
            profile_id
        ],
    )?;
    if changed == 0 {
        return Err(DeskError::ProfileNotFound {
            profile_id: profile_id.to_string(),
        });
    }
    Ok(())
}

impl DeskStore {
    // ── Profile ────────────────────────────────────────────────────

    pub fn get_profile(&self, profile_id: &str) -> DeskResult<ProfileRecord> {
        let conn = self.conn()?;
        find_profile_in(&conn, profile_id)?.ok_or_else(|| DeskError::ProfileNotFound {
            profile_id: profile_id.to_string(),
        })
    }

    pub fn find_profile(&self, profile_id: &str) -> DeskResult<Option<ProfileRecord>> {
        let conn = self.conn()?;
        find_profile_in(&conn, profile_id)
    }

    pub fn all_profile_ids(&self) -> DeskResult<Vec<ProfileId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT profile_id FROM profiles ORDER BY created_at ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Profiles owning an identifier row with exactly this value.
    pub fn profile_ids_for_identifier(
        &self,
        kind: TargetKind,
        value: &str,
    ) -> DeskResult<Vec<ProfileId>> {
        let sql = match kind {
            TargetKind::Phone => {
                "SELECT DISTINCT profile_id FROM profile_phone_numbers WHERE phone_number = ?1"
            }
            TargetKind::Bank => {
                "SELECT DISTINCT profile_id FROM profile_bank_accounts WHERE account_number = ?1"
            }
            TargetKind::Social => "SELECT DISTINCT profile_id FROM profile_social_media WHERE url = ?1",
        };
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![value], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Substring match over names, identifier rows and the evidence of
    /// VERIFIED linked reports. Most reported first.
    pub fn search_profiles(&self, term: &str) -> DeskResult<Vec<ProfileRecord>> {
        let conn = self.conn()?;
        collect_profiles(
            &conn,
            &format!(
                "SELECT {PROFILE_COLUMNS} FROM profiles p
                 WHERE p.display_name LIKE ?1 ESCAPE '\\'
                    OR p.alternate_names LIKE ?1 ESCAPE '\\'
                    OR EXISTS (SELECT 1 FROM profile_bank_accounts b WHERE b.profile_id = p.profile_id
                               AND (b.account_number LIKE ?1 ESCAPE '\\' OR b.holder_name LIKE ?1 ESCAPE '\\'))
                    OR EXISTS (SELECT 1 FROM profile_phone_numbers n WHERE n.profile_id = p.profile_id
                               AND n.phone_number LIKE ?1 ESCAPE '\\')
                    OR EXISTS (SELECT 1 FROM profile_social_media s WHERE s.profile_id = p.profile_id
                               AND (s.url LIKE ?1 ESCAPE '\\' OR s.extracted_username LIKE ?1 ESCAPE '\\'))
                    OR EXISTS (SELECT 1 FROM reports r WHERE r.linked_profile_id = p.profile_id
                               AND r.status = 'VERIFIED' AND r.evidence LIKE ?1 ESCAPE '\\')
                 ORDER BY p.total_reports DESC, p.created_at ASC"
            ),
            params![like_pattern(term)],
        )
    }

    /// Profiles holding a social row resolved to this permanent platform id.
    pub fn profiles_by_platform_user_id(
        &self,
        platform_user_id: &str,
        platform: &str,
    ) -> DeskResult<Vec<ProfileRecord>> {
        let conn = self.conn()?;
        collect_profiles(
            &conn,
            &format!(
                "SELECT {PROFILE_COLUMNS} FROM profiles p
                 WHERE EXISTS (SELECT 1 FROM profile_social_media s
                               WHERE s.profile_id = p.profile_id AND s.platform_user_id = ?1
                                 AND LOWER(s.platform) = LOWER(?2))
                 ORDER BY p.created_at ASC"
            ),
            params![platform_user_id, platform],
        )
    }

    pub fn bank_accounts(&self, profile_id: &str) -> DeskResult<Vec<BankAccountRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT profile_id, account_number, bank_name, holder_name, report_count
             FROM profile_bank_accounts WHERE profile_id = ?1 ORDER BY report_count DESC, id ASC",
        )?;
        let rows = stmt.query_map(params![profile_id], |row| {
            Ok(BankAccountRecord {
                profile_id:     row.get(0)?,
                account_number: row.get(1)?,
                bank_name:      row.get(2)?,
                holder_name:    row.get(3)?,
                report_count:   row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn phone_numbers(&self, profile_id: &str) -> DeskResult<Vec<PhoneNumberRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT profile_id, phone_number, report_count
             FROM profile_phone_numbers WHERE profile_id = ?1 ORDER BY report_count DESC, id ASC",
        )?;
        let rows = stmt.query_map(params![profile_id], |row| {
            Ok(PhoneNumberRecord {
                profile_id:   row.get(0)?,
                phone_number: row.get(1)?,
                report_count: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn social_handles(&self, profile_id: &str) -> DeskResult<Vec<SocialHandleRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT profile_id, url, platform, extracted_username, platform_user_id, display_name,
                    username_history, lookup_status, last_checked_at, report_count
             FROM profile_social_media WHERE profile_id = ?1 ORDER BY report_count DESC, id ASC",
        )?;
        let rows = stmt.query_map(params![profile_id], social_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Fold a successful social lookup into stored handles.
    ///
    /// Rows already bound to `platform_user_id` under another username get
    /// the new username (the old one goes to history). Rows with this
    /// username get bound to the id. Returns `(old, new)` when a rename was
    /// detected.
    pub fn refresh_social_identity(
        &self,
        platform: &str,
        username: &str,
        platform_user_id: &str,
        display_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> DeskResult<Option<(String, String)>> {
        let checked_at = to_db_time(now);
        self.with_transaction(|tx| {
            let mut renamed: Option<(String, String)> = None;
            {
                let mut stmt = tx.prepare(
                    "SELECT id, extracted_username, username_history FROM profile_social_media
                     WHERE platform_user_id = ?1 AND LOWER(platform) = LOWER(?2)",
                )?;
                let bound: Vec<(i64, Option<String>, String)> = stmt
                    .query_map(params![platform_user_id, platform], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                for (id, old_username, history_json) in bound {
                    let Some(old) = old_username else { continue };
                    if old.eq_ignore_ascii_case(username) {
                        continue;
                    }
                    let mut history: Vec<String> = serde_json::from_str(&history_json)?;
                    if !history.iter().any(|h| h.eq_ignore_ascii_case(&old)) {
                        history.push(old.clone());
                    }
                    tx.execute(
                        "UPDATE profile_social_media
                         SET extracted_username = ?1, username_history = ?2, last_checked_at = ?3
                         WHERE id = ?4",
                        params![username, serde_json::to_string(&history)?, &checked_at, id],
                    )?;
                    renamed = Some((old, username.to_string()));
                }
            }
            tx.execute(
                "UPDATE profile_social_media
                 SET platform_user_id = ?1, display_name = COALESCE(?2, display_name),
                     lookup_status = 'success', last_checked_at = ?3
                 WHERE LOWER(extracted_username) = LOWER(?4) AND LOWER(platform) = LOWER(?5)",
                params![platform_user_id, display_name, &checked_at, username, platform],
            )?;
            Ok(renamed)
        })
    }
}
