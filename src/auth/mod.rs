pub mod guard;
pub mod handlers;
pub mod middleware;
pub mod session;

pub use guard::{authorize, authorize_all, Actor, AuthzError, Requirement};
pub use middleware::require_auth;
