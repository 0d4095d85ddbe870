//! Domain types and configuration shared by every slotdata crate.

pub mod app_config;
pub mod config;
pub mod fields;
pub mod record;
pub mod session;
pub mod site;

use thiserror::Error;

pub use app_config::{AppConfig, CaptureMode, Environment, IdentityMode, MergePolicy};
pub use config::{load_app_config, load_app_config_from_env};
pub use fields::CanonicalField;
pub use record::SlotRecord;
pub use session::{
    finalize_status, Session, SessionStatus, StoreErrorKind, StoreErrorReport,
    ORCHESTRATION_ERROR_KEY,
};
pub use site::{
    default_site_profile, load_site_profile, load_site_profile_or_default, FieldSynonyms,
    SeedStore, SiteProfile, SiteSelectors,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read site profile at {path}: {source}")]
    SiteProfileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse site profile: {0}")]
    SiteProfileParse(#[source] serde_yaml::Error),

    #[error("site profile validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid session status: {0}")]
    InvalidSessionStatus(String),

    #[error("session is already {status}; cannot {action}")]
    SessionTerminal {
        status: SessionStatus,
        action: &'static str,
    },

    #[error("session counters would exceed total stores ({total})")]
    CounterOverflow { total: u32 },
}
