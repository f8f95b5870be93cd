pub mod activity;
pub mod user;

pub use activity::{Activity, ActivityType, NewActivity};
pub use user::{
    InvalidRole, NewUser, PublicUser, Role, User, UserFilter, UserUpdate, UserUpdateError,
};
