//! # pbsync
//!
//! Declarative management of Proxmox Backup Server configuration.
//!
//! Callers hold declared and observed state; this crate turns the difference
//! into the smallest set of API calls, guarded by the server's configuration
//! digest.
//!
//! ## Example
//!
//! ```no_run
//! use pbsync::{DeclaredState, ProviderConfig, ResourceKind};
//!
//! let reconciler = ProviderConfig::load()?.connect()?;
//! let remotes = reconciler.resource(ResourceKind::Remote);
//!
//! let declared = DeclaredState::new()
//!     .with("name", "offsite")
//!     .with("host", "pbs2.example.com")
//!     .with("auth_id", "sync@pbs")
//!     .with("password", "secret");
//! let observed = remotes.create(&declared)?;
//!
//! let next = declared.clone().with("comment", "second site");
//! remotes.update(&observed.key, &observed, &next)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod resource;

pub use config::ProviderConfig;
pub use engine::{
    ApplyResult, Change, ExecuteOptions, ExecuteReport, ExecuteSummary, PlanItem, Reconciler,
    ResourceHandle, execute, plan_change,
};
pub use error::{Error, ErrorCategory, ErrorKind, Operation, Result};
pub use reconcile::{DeclaredState, FieldValue, ObservedState, ResourceKey, ResourceKind, VersionToken};

/// Install the logger for embedding transports
///
/// `verbosity` 0 shows warnings, 1 info, 2 debug and 3 or more trace;
/// `quiet` limits output to errors. Fails if a logger is already set.
pub fn init_logging(verbosity: u8, quiet: bool) -> std::result::Result<(), log::SetLoggerError> {
    let log_level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .try_init()
}
