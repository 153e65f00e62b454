pub mod caption;
pub mod control;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod notify;
pub mod pipeline;
pub mod policy;

pub use crate::control::{BatchControl, RetrySnapshot, RetryState, StopRequest, StopSignal};
pub use crate::executor::Executor;
pub use crate::ledger::Ledger;
pub use crate::notify::Notifier;
pub use crate::pipeline::{BatchSummary, Deliverer, DeliveryOutcome, Route};
pub use crate::policy::{Failure, RetryPolicy};
