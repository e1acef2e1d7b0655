use crate::error::{Error, FailureReason, Result};
use crate::extract::extract;
use crate::model::PatternModel;
use crate::normalize::normalize;
use crate::search::{SearchEngine, SearchStatus};
use crate::types::{CuttingPlanLine, DemandRecord, MaterialKey, PatternSummary};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIME_LIMIT_SECS: f64 = 30.0;

fn default_time_limit_secs() -> Option<f64> {
    Some(DEFAULT_TIME_LIMIT_SECS)
}

/// Solver settings for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveConfig {
    /// Per-group search limit in seconds; `None` searches to completion.
    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: Option<f64>,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: default_time_limit_secs(),
        }
    }
}

impl SolveConfig {
    pub fn unbounded() -> Self {
        Self {
            time_limit_secs: None,
        }
    }

    pub fn with_time_limit(limit: Duration) -> Self {
        Self {
            time_limit_secs: Some(limit.as_secs_f64()),
        }
    }

    /// Bounds the limit by `max`; an unbounded limit becomes `max`.
    pub fn capped(self, max: Duration) -> Self {
        let limit = match self.time_limit() {
            Some(limit) if limit <= max => limit,
            _ => max,
        };
        Self::with_time_limit(limit)
    }

    /// Negative or NaN limits count as zero.
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs
            .map(|secs| Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupPlan {
    pub key: MaterialKey,
    pub status: SearchStatus,
    pub stock_length: u64,
    pub lines: Vec<CuttingPlanLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupFailure {
    pub key: MaterialKey,
    pub status: SearchStatus,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every group has a plan.
    Complete,
    /// Some groups have a plan, others failed.
    Partial,
    /// No group has a plan.
    Empty,
}

/// Serializable view of a report with its totals and pattern summary.
#[derive(Debug, Serialize)]
pub struct ReportView<'a> {
    pub outcome: RunOutcome,
    pub tubes_used: usize,
    pub total_scrap: u64,
    pub utilization_percent: f64,
    pub patterns: Vec<PatternSummary>,
    #[serde(flatten)]
    pub report: &'a PlanReport,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlanReport {
    pub groups: Vec<GroupPlan>,
    pub failures: Vec<GroupFailure>,
}

impl PlanReport {
    /// All plan lines, group by group.
    pub fn lines(&self) -> impl Iterator<Item = &CuttingPlanLine> {
        self.groups.iter().flat_map(|g| g.lines.iter())
    }

    pub fn outcome(&self) -> RunOutcome {
        match (self.groups.is_empty(), self.failures.is_empty()) {
            (true, _) => RunOutcome::Empty,
            (false, true) => RunOutcome::Complete,
            (false, false) => RunOutcome::Partial,
        }
    }

    /// Fails with [`Error::EmptyResult`] when no group produced a plan.
    pub fn ensure_nonempty(self) -> Result<Self> {
        if self.outcome() == RunOutcome::Empty {
            return Err(Error::EmptyResult {
                failed: self.failures.len(),
            });
        }
        Ok(self)
    }

    /// One error per failed group, in group order.
    pub fn warnings(&self) -> Vec<Error> {
        self.failures
            .iter()
            .map(|f| Error::for_group(f.key, &f.reason))
            .collect()
    }

    pub fn tubes_used(&self) -> usize {
        self.lines().count()
    }

    pub fn total_scrap(&self) -> u64 {
        self.lines().map(|l| l.scrap).sum()
    }

    pub fn utilization_percent(&self) -> f64 {
        let stock: u64 = self.lines().map(|l| l.stock_length).sum();
        if stock == 0 {
            return 0.0;
        }
        (stock - self.total_scrap()) as f64 / stock as f64 * 100.0
    }

    pub fn view(&self) -> ReportView<'_> {
        ReportView {
            outcome: self.outcome(),
            tubes_used: self.tubes_used(),
            total_scrap: self.total_scrap(),
            utilization_percent: self.utilization_percent(),
            patterns: self.pattern_summary(),
            report: self,
        }
    }

    /// Identical tubes within a group collapsed to one row with a quantity.
    /// Rows keep the order in which each pattern first appears.
    pub fn pattern_summary(&self) -> Vec<PatternSummary> {
        let mut rows: Vec<PatternSummary> = Vec::new();
        for group in &self.groups {
            let start = rows.len();
            for line in &group.lines {
                match rows[start..].iter_mut().find(|r| r.pattern == line.pattern) {
                    Some(row) => row.quantity += 1,
                    None => rows.push(PatternSummary {
                        key: line.key,
                        stock_length: line.stock_length,
                        pattern: line.pattern.clone(),
                        scrap: line.scrap,
                        quantity: 1,
                    }),
                }
            }
        }
        rows
    }
}

/// Runs normalization, modelling, search and extraction for every
/// material group, one group at a time in key order.
///
/// Invalid input aborts the run. A group whose search ends infeasible or
/// without a result is recorded as a failure and the run moves on.
pub fn plan_cuts<E: SearchEngine + ?Sized>(
    records: &[DemandRecord],
    engine: &E,
    config: &SolveConfig,
) -> Result<PlanReport> {
    let groups = normalize(records)?;
    let time_limit = config.time_limit();
    let mut report = PlanReport::default();

    for (key, group) in groups {
        tracing::info!(
            group = %key,
            piece_types = group.pieces.len(),
            pieces = group.total_pieces(),
            stock_length = group.stock_length,
            "optimizing group"
        );

        let model = PatternModel::build(group);
        let outcome = engine.solve(&model, time_limit);

        let result = match (outcome.status, &outcome.assignment) {
            (SearchStatus::Optimal | SearchStatus::Feasible, Some(assignment)) => {
                extract(&model, assignment)
            }
            (SearchStatus::Optimal | SearchStatus::Feasible, None) => Err(
                FailureReason::InvalidAssignment("search reported a solution without values".into()),
            ),
            (SearchStatus::Infeasible, _) => Err(FailureReason::Infeasible),
            (SearchStatus::NoResult, _) => Err(FailureReason::Timeout),
        };

        match result {
            Ok(lines) => {
                tracing::info!(
                    group = %key,
                    status = %outcome.status,
                    tubes = lines.len(),
                    scrap = lines.iter().map(|l| l.scrap).sum::<u64>(),
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "group planned"
                );
                report.groups.push(GroupPlan {
                    key,
                    status: outcome.status,
                    stock_length: model.stock_length(),
                    lines,
                });
            }
            Err(reason) => {
                tracing::warn!(group = %key, %reason, "no feasible solution found for group");
                report.failures.push(GroupFailure {
                    key,
                    status: outcome.status,
                    reason,
                });
            }
        }
    }

    if report.outcome() == RunOutcome::Empty {
        tracing::warn!(
            failed = report.failures.len(),
            "no feasible solutions found for any group"
        );
    }

    Ok(report)
}
