//! Reconciliation engine
//!
//! - [`reconciler`] - create/read/update/delete/import against the server
//! - [`planner`] - what converging one instance would take
//! - [`executor`] - applying a batch of plan items in parallel

pub mod executor;
pub mod planner;
pub mod reconciler;

pub use executor::{ApplyResult, ExecuteOptions, ExecuteReport, ExecuteSummary, ItemOutcome, execute};
pub use planner::{Change, PlanItem, plan_change};
pub use reconciler::{Reconciler, ResourceHandle};
