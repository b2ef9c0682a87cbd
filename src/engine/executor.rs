//! Batch execution - converge many resource instances at once
//!
//! Distinct instances are independent and run on a rayon pool. Steps for a
//! single instance stay sequential: a replacement deletes before it creates.

use log::{debug, warn};
use pbskit::Api;
use rayon::prelude::*;
use reconcile::ObservedState;

use super::planner::{Change, PlanItem};
use super::reconciler::Reconciler;
use crate::error::{Error, ErrorKind, Operation};

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just report what would happen
    pub dry_run: bool,
    /// Number of parallel jobs
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
        }
    }
}

/// Result of applying one plan item
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyResult {
    /// Already converged
    NoChange,
    Created(ObservedState),
    Updated(ObservedState),
    /// Deleted and created again
    Replaced(ObservedState),
    Deleted,
    /// Apply failed
    Failed { error: Error },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Created(_) | Self::Updated(_) | Self::Replaced(_) | Self::Deleted
        )
    }

    /// New snapshot to store, if the item still exists
    pub fn observed(&self) -> Option<&ObservedState> {
        match self {
            Self::Created(o) | Self::Updated(o) | Self::Replaced(o) => Some(o),
            _ => None,
        }
    }
}

/// Outcome for one plan item
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub id: String,
    pub result: ApplyResult,
}

/// Summary of execution results
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.replaced + self.deleted
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn total(&self) -> usize {
        self.total_changes() + self.unchanged + self.failed + self.skipped
    }

    /// Add one result to the tally
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.unchanged += 1,
            ApplyResult::Created(_) => self.created += 1,
            ApplyResult::Updated(_) => self.updated += 1,
            ApplyResult::Replaced(_) => self.replaced += 1,
            ApplyResult::Deleted => self.deleted += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Per-item outcomes, in plan order, plus the tally
#[derive(Debug, Clone, Default)]
pub struct ExecuteReport {
    pub outcomes: Vec<ItemOutcome>,
    pub summary: ExecuteSummary,
}

impl ExecuteReport {
    /// Outcomes that failed
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.result.is_success())
    }
}

/// Apply every item of the plan
///
/// Items must address distinct instances. One failing item does not stop
/// the others.
pub fn execute<A: Api>(
    reconciler: &Reconciler<A>,
    items: Vec<PlanItem>,
    opts: ExecuteOptions,
) -> ExecuteReport {
    let outcomes = if opts.jobs <= 1 {
        apply_sequential(reconciler, &items, &opts)
    } else {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(opts.jobs)
            .build()
        {
            Ok(pool) => pool.install(|| {
                items
                    .par_iter()
                    .map(|item| apply_item(reconciler, item, &opts))
                    .collect::<Vec<_>>()
            }),
            Err(e) => {
                warn!("Failed to create apply thread pool, running sequentially: {e}");
                apply_sequential(reconciler, &items, &opts)
            }
        }
    };

    let mut summary = ExecuteSummary::default();
    for outcome in &outcomes {
        summary.add_result(&outcome.result);
    }
    ExecuteReport { outcomes, summary }
}

fn apply_sequential<A: Api>(
    reconciler: &Reconciler<A>,
    items: &[PlanItem],
    opts: &ExecuteOptions,
) -> Vec<ItemOutcome> {
    items
        .iter()
        .map(|item| apply_item(reconciler, item, opts))
        .collect()
}

fn apply_item<A: Api>(
    reconciler: &Reconciler<A>,
    item: &PlanItem,
    opts: &ExecuteOptions,
) -> ItemOutcome {
    let id = item.id();
    let result = match item.plan() {
        Ok(Change::NoChange) => ApplyResult::NoChange,
        Ok(change) if opts.dry_run => ApplyResult::Skipped {
            reason: format!("dry run: would {change}"),
        },
        Ok(change) => apply_change(reconciler, item, &change).unwrap_or_else(|error| {
            warn!("{error}. {}", error.category().advice());
            ApplyResult::Failed { error }
        }),
        Err(e) => ApplyResult::Failed {
            error: Error::new(item.kind, strip_kind(&id), operation(item), ErrorKind::from(e)),
        },
    };
    debug!("{id}: {result:?}");
    ItemOutcome { id, result }
}

fn apply_change<A: Api>(
    reconciler: &Reconciler<A>,
    item: &PlanItem,
    change: &Change,
) -> crate::error::Result<ApplyResult> {
    let handle = reconciler.resource(item.kind);
    match (change, &item.prior, &item.next) {
        (Change::Create, _, Some(next)) => handle.create(next).map(ApplyResult::Created),
        (Change::Update(_), Some(prior), Some(next)) => handle
            .update(&prior.key, prior, next)
            .map(ApplyResult::Updated),
        (Change::Replace { reason }, Some(prior), Some(next)) => {
            debug!("replacing {} '{}': {}", item.kind, prior.key, reason);
            handle.delete(&prior.key, prior.version.as_ref())?;
            handle.create(next).map(ApplyResult::Replaced)
        }
        (Change::Delete, Some(prior), _) => handle
            .delete(&prior.key, prior.version.as_ref())
            .map(|()| ApplyResult::Deleted),
        _ => Ok(ApplyResult::NoChange),
    }
}

fn operation(item: &PlanItem) -> Operation {
    match (&item.prior, &item.next) {
        (None, _) => Operation::Create,
        (Some(_), Some(_)) => Operation::Update,
        (Some(_), None) => Operation::Delete,
    }
}

fn strip_kind(id: &str) -> &str {
    id.split_once(':').map_or(id, |(_, key)| key)
}
