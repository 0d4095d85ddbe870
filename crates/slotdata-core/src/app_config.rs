use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// How a store page is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// One plain HTTP GET; one snapshot, no JSON interception.
    Static,
    /// Headless browser with tab clicking and XHR interception.
    Interactive,
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureMode::Static => write!(f, "static"),
            CaptureMode::Interactive => write!(f, "interactive"),
        }
    }
}

/// Whether record ids are salted per extraction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
    /// Ids include a per-pass nonce; re-scraping the same day inserts new rows.
    RunScoped,
    /// Ids derive from `(store, date, unique key)` only; re-scrapes collide.
    Stable,
}

/// How rows from several HTML snapshots are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// `FirstMatch` for static captures, `UnionAll` for interactive ones.
    Auto,
    FirstMatch,
    UnionAll,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub site_profile_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub capture_mode: CaptureMode,
    pub browser_headless: bool,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub accept_language: String,
    pub max_concurrent_stores: usize,
    pub max_retries: u32,
    pub retry_backoff_base_secs: u64,
    pub session_timeout_secs: u64,
    pub upsert_batch_size: usize,
    pub polite_delay_min_ms: u64,
    pub polite_delay_max_ms: u64,
    pub max_tab_clicks: usize,
    pub json_body_limit_bytes: usize,
    pub identity_mode: IdentityMode,
    pub merge_policy: MergePolicy,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("site_profile_path", &self.site_profile_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("capture_mode", &self.capture_mode)
            .field("browser_headless", &self.browser_headless)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("accept_language", &self.accept_language)
            .field("max_concurrent_stores", &self.max_concurrent_stores)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_secs", &self.retry_backoff_base_secs)
            .field("session_timeout_secs", &self.session_timeout_secs)
            .field("upsert_batch_size", &self.upsert_batch_size)
            .field("polite_delay_min_ms", &self.polite_delay_min_ms)
            .field("polite_delay_max_ms", &self.polite_delay_max_ms)
            .field("max_tab_clicks", &self.max_tab_clicks)
            .field("json_body_limit_bytes", &self.json_body_limit_bytes)
            .field("identity_mode", &self.identity_mode)
            .field("merge_policy", &self.merge_policy)
            .finish()
    }
}
