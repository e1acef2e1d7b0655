//! Minimum-waste cutting plans for tube stock.
//!
//! Demand is grouped by material (thickness, diameter), each group is
//! formulated as an exact assignment problem over candidate stock units,
//! searched under a deadline, and the winning assignment is turned into
//! per-tube cutting patterns.

pub mod error;
pub mod extract;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod render;
pub mod search;
pub mod table;
pub mod types;

pub use error::{Error, FailureReason, Result, ValidationError};
pub use orchestrator::{PlanReport, RunOutcome, SolveConfig, plan_cuts};
pub use search::{BranchAndBound, SearchEngine, SearchOutcome, SearchStatus};
pub use types::{CuttingPlanLine, DemandRecord, MaterialKey, Measure};
