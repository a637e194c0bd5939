use super::DeskStore;
use crate::{clock::to_db_time, error::DeskResult, types::UserId};
use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub user_id:    UserId,
    #[serde(default)]
    pub username:   Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name:  Option<String>,
}

/// Desk-wide counters shown on the statistics screen.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemStats {
    pub total_users:           i64,
    pub new_users_today:       i64,
    pub active_users_30d:      i64,
    pub total_reports:         i64,
    pub verified_reports:      i64,
    pub total_verified_loss:   f64,
    pub highest_verified_loss: f64,
    pub distinct_banks:        i64,
    pub distinct_phones:       i64,
    pub distinct_socials:      i64,
    pub cached_phone_lookups:  i64,
    pub searches:              i64,
}

fn distinct_identifier_sql(target_column: &str, evidence_kind: &str) -> String {
    format!(
        "SELECT COUNT(DISTINCT v) FROM (
             SELECT {target_column} AS v FROM reports WHERE {target_column} IS NOT NULL
             UNION ALL
             SELECT json_extract(j.value, '$.value') AS v
             FROM reports r, json_each(r.evidence) j
             WHERE json_type(j.value) = 'object'
               AND json_extract(j.value, '$.kind') = '{evidence_kind}'
         )"
    )
}

impl DeskStore {
    // ── Users ──────────────────────────────────────────────────────

    /// Insert the user if unseen, then refresh names and activity.
    /// Returns true for a first-time user.
    pub fn register_user(&self, user: &NewUser, now: DateTime<Utc>) -> DeskResult<bool> {
        let ts = to_db_time(now);
        self.with_transaction(|tx| {
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO users (user_id, username, first_name, last_name, created_at, last_active_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![user.user_id, &user.username, &user.first_name, &user.last_name, &ts],
            )?;
            if inserted == 0 {
                tx.execute(
                    "UPDATE users SET username = ?1, first_name = ?2, last_name = ?3, last_active_at = ?4
                     WHERE user_id = ?5",
                    params![&user.username, &user.first_name, &user.last_name, &ts, user.user_id],
                )?;
            }
            Ok(inserted > 0)
        })
    }

    pub fn touch_user(&self, user_id: UserId, now: DateTime<Utc>) -> DeskResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET last_active_at = ?1 WHERE user_id = ?2",
            params![to_db_time(now), user_id],
        )?;
        Ok(())
    }

    // ── Search log ─────────────────────────────────────────────────

    pub fn log_search(
        &self,
        query: &str,
        search_type: &str,
        source: &str,
        now: DateTime<Utc>,
    ) -> DeskResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO search_logs (query, search_type, source, searched_at) VALUES (?1, ?2, ?3, ?4)",
            params![query, search_type, source, to_db_time(now)],
        )?;
        Ok(())
    }

    pub fn search_log_count(&self) -> DeskResult<i64> {
        let conn = self.conn()?;
        conn.query_row("SELECT COUNT(*) FROM search_logs", [], |row| row.get(0))
            .map_err(Into::into)
    }

    // ── Statistics ─────────────────────────────────────────────────

    pub fn system_stats(&self, now: DateTime<Utc>) -> DeskResult<SystemStats> {
        let conn = self.conn()?;
        let count = |sql: &str, param: Option<String>| -> DeskResult<i64> {
            let value = match param {
                Some(p) => conn.query_row(sql, params![p], |row| row.get(0))?,
                None => conn.query_row(sql, [], |row| row.get(0))?,
            };
            Ok(value)
        };

        let start_of_day = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|d| d.and_utc())
            .unwrap_or(now);
        let active_since = now - Duration::days(30);

        let (total_verified_loss, highest_verified_loss): (f64, f64) = conn.query_row(
            "SELECT COALESCE(SUM(loss_amount), 0), COALESCE(MAX(loss_amount), 0)
             FROM reports WHERE status = 'VERIFIED'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(SystemStats {
            total_users: count("SELECT COUNT(*) FROM users", None)?,
            new_users_today: count(
                "SELECT COUNT(*) FROM users WHERE created_at >= ?1",
                Some(to_db_time(start_of_day)),
            )?,
            active_users_30d: count(
                "SELECT COUNT(*) FROM users WHERE last_active_at >= ?1",
                Some(to_db_time(active_since)),
            )?,
            total_reports: count("SELECT COUNT(*) FROM reports", None)?,
            verified_reports: count("SELECT COUNT(*) FROM reports WHERE status = 'VERIFIED'", None)?,
            total_verified_loss,
            highest_verified_loss,
            distinct_banks: count(&distinct_identifier_sql("target_bank_account", "bank"), None)?,
            distinct_phones: count(&distinct_identifier_sql("target_phone_number", "phone"), None)?,
            distinct_socials: count(&distinct_identifier_sql("target_social_url", "social"), None)?,
            cached_phone_lookups: count("SELECT COUNT(*) FROM phone_lookup_cache", None)?,
            searches: count("SELECT COUNT(*) FROM search_logs", None)?,
        })
    }
}
