pub mod clock;
pub mod effects;
pub mod error;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod router;
pub mod services;
pub mod store;

pub use error::{ConflictReason, ErrorCode, SchedulingError};
pub use services::scheduling::{Outcome, SchedulingService};
