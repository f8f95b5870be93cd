use crate::auth::guard::Actor;
use crate::models::user::User;
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use tower_sessions::Session;

pub const USER_ID_KEY: &str = "user_id";
pub const AUTH_TIMESTAMP_KEY: &str = "auth_timestamp";

pub async fn start_session(
    session: &Session,
    user: &User,
) -> Result<(), tower_sessions::session::Error> {
    // new session id on login
    session.cycle_id().await?;
    session.insert(USER_ID_KEY, &user.id).await?;
    session
        .insert(AUTH_TIMESTAMP_KEY, chrono::Utc::now().timestamp())
        .await?;
    Ok(())
}

pub async fn session_user_id(session: &Session) -> Option<String> {
    session.get::<String>(USER_ID_KEY).await.ok().flatten()
}

/// Resolves the actor for the current request.
///
/// The role is read from the user record, not from the session, so a role
/// change or deletion takes effect on the very next request. A session that
/// points at a deleted user resolves to `None`.
pub async fn resolve_actor(
    session: &Session,
    users: &dyn UserRepository,
) -> Result<Option<Actor>, RepositoryError> {
    let Some(user_id) = session_user_id(session).await else {
        return Ok(None);
    };

    let actor = users.find_by_id(&user_id).await?.map(|user| Actor::from(&user));
    if actor.is_none() {
        tracing::debug!(user_id = %user_id, "session refers to a missing user");
    }

    Ok(actor)
}
