use crate::models::user::{NewUser, User, UserFilter, UserUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("User not found")]
    NotFound,
    #[error("User already exists")]
    AlreadyExists,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

const USER_COLUMNS: &str = "id, email, name, password_hash, role, verified, \
    verification_token, verification_token_expires_at, created_at, updated_at";

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> RepositoryResult<User>;
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_token(&self, token: &str) -> RepositoryResult<Option<User>>;
    /// Applies a partial update. Returns `None` when no row has this id.
    async fn update_user(&self, id: &str, update: UserUpdate) -> RepositoryResult<Option<User>>;
    /// Marks the holder of `token` verified and clears the token in one
    /// conditional statement, provided the token has not expired at `now`.
    /// Returns the user id, or `None` if no row held an unexpired `token`
    /// when the statement ran.
    async fn consume_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<String>>;
    /// Clears `token` if some row still holds it. Returns whether a row changed.
    async fn clear_token(&self, token: &str) -> RepositoryResult<bool>;
    /// Returns `false` when the row did not exist.
    async fn delete_user(&self, id: &str) -> RepositoryResult<bool>;
    async fn list_users(
        &self,
        filter: UserFilter,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<User>>;
    async fn count_users(&self, filter: UserFilter) -> RepositoryResult<i64>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: UserFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(role) = filter.role {
        builder.push(" AND role = ").push_bind(role);
    }
    if let Some(verified) = filter.verified {
        builder.push(" AND verified = ").push_bind(verified);
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, new_user: NewUser) -> RepositoryResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password_hash, role, verified, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => self.find_by_id(&id).await?.ok_or(RepositoryError::NotFound),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(RepositoryError::AlreadyExists)
            }
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_token(&self, token: &str) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE verification_token = ?"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user(&self, id: &str, update: UserUpdate) -> RepositoryResult<Option<User>> {
        let mut update = update;
        // verified and "no token" must land in the same write
        if update.verified == Some(true) {
            update.verification_token = Some(None);
            update.verification_token_expires_at = Some(None);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE users SET updated_at = ");
        builder.push_bind(Utc::now());

        if let Some(role) = update.role {
            builder.push(", role = ").push_bind(role);
        }
        if let Some(verified) = update.verified {
            builder.push(", verified = ").push_bind(verified);
        }
        if let Some(token) = update.verification_token {
            builder.push(", verification_token = ").push_bind(token);
        }
        if let Some(expires_at) = update.verification_token_expires_at {
            builder
                .push(", verification_token_expires_at = ")
                .push_bind(expires_at);
        }

        builder.push(" WHERE id = ").push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_id(id).await
    }

    async fn consume_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<String>> {
        let user_id = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE users
            SET verified = 1,
                verification_token = NULL,
                verification_token_expires_at = NULL,
                updated_at = ?
            WHERE verification_token = ?
              AND julianday(verification_token_expires_at) >= julianday(?)
            RETURNING id
            "#,
        )
        .bind(now)
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id)
    }

    async fn clear_token(&self, token: &str) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET verification_token = NULL,
                verification_token_expires_at = NULL,
                updated_at = ?
            WHERE verification_token = ?
            "#,
        )
        .bind(Utc::now())
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: &str) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_users(
        &self,
        filter: UserFilter,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<User>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let users = builder
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    async fn count_users(&self, filter: UserFilter) -> RepositoryResult<i64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users");
        push_filter(&mut builder, filter);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
