pub mod auth;
pub mod error;

pub use auth::{RequestContext, Role};
pub use error::AppError;
