use super::{bool_to_int, time_col, DeskStore};
use crate::{clock::to_db_time, error::DeskResult, types::UserId};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

/// A stored phone reputation result.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CachedPhoneLookup {
    pub phone_number: String,
    pub name:         Option<String>,
    pub carrier:      Option<String>,
    pub is_spam:      bool,
    pub spam_type:    Option<String>,
    pub looked_up_at: DateTime<Utc>,
}

impl DeskStore {
    // ── Phone lookup cache ─────────────────────────────────────────

    pub fn cached_phone_lookup(&self, phone: &str) -> DeskResult<Option<CachedPhoneLookup>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT phone_number, name, carrier, is_spam, spam_type, looked_up_at
             FROM phone_lookup_cache WHERE phone_number = ?1",
            params![phone],
            |row| {
                Ok(CachedPhoneLookup {
                    phone_number: row.get(0)?,
                    name:         row.get(1)?,
                    carrier:      row.get(2)?,
                    is_spam:      row.get::<_, i32>(3)? != 0,
                    spam_type:    row.get(4)?,
                    looked_up_at: time_col(row, 5)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }

    /// Insert or replace the cached result for a number.
    pub fn save_phone_lookup(
        &self,
        entry: &CachedPhoneLookup,
        raw_result: &serde_json::Value,
        looked_up_by: UserId,
    ) -> DeskResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO phone_lookup_cache
                 (phone_number, name, carrier, is_spam, spam_type, raw_result, looked_up_at, looked_up_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(phone_number) DO UPDATE SET
                 name = excluded.name, carrier = excluded.carrier, is_spam = excluded.is_spam,
                 spam_type = excluded.spam_type, raw_result = excluded.raw_result,
                 looked_up_at = excluded.looked_up_at, looked_up_by = excluded.looked_up_by",
            params![
                &entry.phone_number,
                &entry.name,
                &entry.carrier,
                bool_to_int(entry.is_spam),
                &entry.spam_type,
                raw_result.to_string(),
                to_db_time(entry.looked_up_at),
                looked_up_by,
            ],
        )?;
        Ok(())
    }
}
