pub mod admin_handlers;
pub mod health_handlers;

pub use admin_handlers::{
    change_role_handler, delete_user_handler, list_activities_handler, list_users_handler,
    verify_user_handler,
};
pub use health_handlers::health_handler;
