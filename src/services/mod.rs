pub mod admin_service;
pub mod audit_service;
pub mod auth_service;
pub mod email_service;
pub mod user_service;
pub mod verification_service;

pub use admin_service::{AdminService, ListUsersParams, UserListing};
pub use audit_service::AuditService;
pub use auth_service::{AuthService, AuthServiceError, LoginRequest};
pub use email_service::{create_email_service, EmailError, EmailService, MockEmailService};
pub use user_service::{CreateUserRequest, UserService, UserServiceError};
pub use verification_service::{VerificationConfig, VerificationError, VerificationService};
