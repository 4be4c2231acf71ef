use thiserror::Error;

/// Typed failures of the control core. Planner rejections are deliberately
/// not errors (see `planner::PlanOutcome`): they leave the plan unchanged
/// and record the test in history only.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    /// Persistence write or read failed; the guarded mutation did not happen
    /// and the operation is safe to retry.
    #[error("store error: {0}")]
    Store(String),
    #[error("pump output error: {0}")]
    Pump(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
