pub mod credential;
pub mod idempotency;
pub mod log;
pub mod user;
pub mod workflow;

pub use credential::Credential;
pub use idempotency::{IdempotencyClaim, IdempotencyRecord};
pub use log::{ExecutionLog, LogStatus};
pub use user::User;
pub use workflow::{ChainedAction, InputSource, TriggerKind, Workflow};
