pub mod activity_repository;
pub mod user_repository;

pub use activity_repository::{ActivityRepository, SqliteActivityRepository};
pub use user_repository::{RepositoryError, SqliteUserRepository, UserRepository};
