mod coordinator;
mod outcome;
mod plan;

pub use coordinator::{OperationKind, RetryCoordinator};
pub use outcome::RetryOutcome;
pub use plan::{BackoffGrowth, JitterStrategy, RetryPlan};
