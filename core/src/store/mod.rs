//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Flows and the aggregator call store methods; they never execute SQL
//! directly. Multi-statement mutations run inside `with_transaction`.

mod lookup_cache;
mod profile;
mod report;
mod user;

pub use lookup_cache::CachedPhoneLookup;
pub use user::{NewUser, SystemStats};

pub(crate) use profile::{
    add_alternate_name, bump_profile_totals, compute_profile_stats, insert_profile,
    profile_exists, recompute_unique_counts, upsert_bank_account, upsert_phone_number,
    upsert_social_handle, write_profile_stats,
};
pub(crate) use report::mark_verified_linked;

use crate::error::{DeskError, DeskResult};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};

/// Cloneable handle onto one SQLite connection.
#[derive(Clone)]
pub struct DeskStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl DeskStore {
    pub fn open(path: &str) -> DeskResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> DeskResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order. Every script is idempotent.
    pub fn migrate(&self) -> DeskResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(include_str!("../../../migrations/001_profiles.sql"))?;
        conn.execute_batch(include_str!("../../../migrations/002_reports.sql"))?;
        conn.execute_batch(include_str!("../../../migrations/003_users_search.sql"))?;
        conn.execute_batch(include_str!("../../../migrations/004_phone_lookup_cache.sql"))?;
        Ok(())
    }

    /// Lock the shared connection. A poisoned lock means an earlier
    /// holder panicked mid-statement; surface it as an error.
    pub(crate) fn conn(&self) -> DeskResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DeskError::Other(anyhow::anyhow!("store connection lock poisoned")))
    }

    /// Run `f` inside one IMMEDIATE transaction. Any error rolls back
    /// everything `f` wrote.
    pub fn with_transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> DeskResult<T>,
    ) -> DeskResult<T> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

pub(crate) fn bool_to_int(b: bool) -> i32 {
    if b { 1 } else { 0 }
}

/// Decode a stored timestamp column, reporting bad text as a conversion error.
pub(crate) fn time_col(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    let raw: String = row.get(idx)?;
    crate::clock::from_db_time(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("bad timestamp '{raw}'").into(),
        )
    })
}

pub(crate) fn opt_time_col(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<chrono::DateTime<chrono::Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(raw) => crate::clock::from_db_time(&raw).map(Some).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                format!("bad timestamp '{raw}'").into(),
            )
        }),
    }
}

/// Escape `%`, `_` and `\` so user text matches literally inside LIKE.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}
