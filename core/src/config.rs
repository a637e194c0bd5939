use crate::types::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled:      bool,
    pub max_lookups:  usize,
    pub window_hours: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled:      true,
            max_lookups:  2,
            window_hours: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub grace_days:           i64,
    pub interval_secs:        u64,
    pub first_run_delay_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            grace_days:           30,
            interval_secs:        3600,
            first_run_delay_secs: 60,
        }
    }
}

/// Knobs for the built-in demo lookup collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub police_reports: u32,
    pub phone_found:    bool,
    pub social_found:   bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            police_reports: 0,
            phone_found:    true,
            social_found:   true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub db_path:             String,
    pub admin_user_ids:      Vec<UserId>,
    pub max_screenshots:     usize,
    pub min_search_len:      usize,
    pub reports_per_page:    usize,
    pub lookup_timeout_secs: u64,
    pub rate_limit:          RateLimitConfig,
    pub archive:             ArchiveConfig,
    pub demo:                DemoConfig,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            db_path:             "scamdesk.db".into(),
            admin_user_ids:      Vec::new(),
            max_screenshots:     10,
            min_search_len:      4,
            reports_per_page:    3,
            lookup_timeout_secs: 8,
            rate_limit:          RateLimitConfig::default(),
            archive:             ArchiveConfig::default(),
            demo:                DemoConfig::default(),
        }
    }
}

impl DeskConfig {
    /// Load from a JSON file. Missing keys fall back to defaults.
    /// `DESK_DB_PATH` and `DESK_ADMIN_USER_IDS` (comma separated) override
    /// the file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let mut config: DeskConfig = serde_json::from_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(db_path) = std::env::var("DESK_DB_PATH") {
            self.db_path = db_path;
        }
        if let Ok(raw) = std::env::var("DESK_ADMIN_USER_IDS") {
            self.admin_user_ids = parse_admin_ids(&raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_screenshots == 0 {
            anyhow::bail!("max_screenshots must be at least 1");
        }
        if self.reports_per_page == 0 {
            anyhow::bail!("reports_per_page must be at least 1");
        }
        if self.rate_limit.enabled && self.rate_limit.window_hours <= 0 {
            anyhow::bail!("rate_limit.window_hours must be positive");
        }
        if self.archive.grace_days <= 0 {
            anyhow::bail!("archive.grace_days must be positive");
        }
        Ok(())
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_user_ids.contains(&user_id)
    }

    /// Config used by tests: in-memory database, user 900 is the only admin.
    pub fn default_test() -> Self {
        Self {
            db_path: ":memory:".into(),
            admin_user_ids: vec![900],
            ..Self::default()
        }
    }
}

fn parse_admin_ids(raw: &str) -> anyhow::Result<Vec<UserId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<UserId>()
                .map_err(|e| anyhow::anyhow!("Bad admin id '{s}': {e}"))
        })
        .collect()
}
