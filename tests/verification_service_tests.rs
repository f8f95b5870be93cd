use chrono::{Duration, Utc};
use std::sync::Arc;
use tutorhub::{
    models::{ActivityType, Role, UserUpdate},
    repositories::{
        ActivityRepository, SqliteActivityRepository, SqliteUserRepository, UserRepository,
    },
    services::{
        AuditService, CreateUserRequest, UserService, VerificationConfig, VerificationError,
        VerificationService,
    },
    test_utils::test_helpers::{self, FailingEmailService, RecordingEmailService},
};

struct Harness {
    pool: sqlx::SqlitePool,
    users: Arc<dyn UserRepository>,
    activities: Arc<dyn ActivityRepository>,
    mailer: RecordingEmailService,
    service: VerificationService,
}

async fn harness(config: VerificationConfig) -> Harness {
    let pool = test_helpers::create_test_db().await.unwrap();
    let users: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(pool.clone()));
    let activities: Arc<dyn ActivityRepository> =
        Arc::new(SqliteActivityRepository::new(pool.clone()));
    let mailer = RecordingEmailService::new();

    let service = VerificationService::new(
        users.clone(),
        Arc::new(UserService::new(users.clone())),
        Arc::new(AuditService::new(activities.clone())),
        Arc::new(mailer.clone()),
        config,
    );

    Harness {
        pool,
        users,
        activities,
        mailer,
        service,
    }
}

fn no_resend_limit() -> VerificationConfig {
    VerificationConfig {
        resend_interval: Duration::zero(),
        ..VerificationConfig::default()
    }
}

#[tokio::test]
async fn test_registration_through_verification() {
    let h = harness(VerificationConfig::default()).await;

    let user = h
        .service
        .register(CreateUserRequest::student("new@example.com", "password123"))
        .await
        .unwrap();

    assert_eq!(user.role, Role::Student);
    assert!(!user.verified);
    let token = user.verification_token.clone().unwrap();
    assert_eq!(token.len(), 64);
    let expires_at = user.verification_token_expires_at.unwrap();
    assert!(expires_at > Utc::now() + Duration::hours(23));
    assert!(expires_at <= Utc::now() + Duration::hours(24));

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "new@example.com");
    assert_eq!(
        sent[0].link,
        format!("http://localhost:8080/auth/verify/{}", token)
    );

    let verified_id = h.service.consume_token(&token).await.unwrap();
    assert_eq!(verified_id, user.id);

    let stored = h.users.find_by_id(&user.id).await.unwrap().unwrap();
    assert!(stored.verified);
    assert!(stored.verification_token.is_none());
    assert!(stored.verification_token_expires_at.is_none());

    let history = h.activities.list_for_user(&user.id).await.unwrap();
    let kinds: Vec<_> = history.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![ActivityType::UserVerified, ActivityType::UserCreated]);
    assert!(history.iter().all(|a| a.performed_by.is_none()));
}

#[tokio::test]
async fn test_token_is_single_use() {
    let h = harness(VerificationConfig::default()).await;
    let user = h
        .service
        .register(CreateUserRequest::student("once@example.com", "password123"))
        .await
        .unwrap();
    let token = user.verification_token.unwrap();

    h.service.consume_token(&token).await.unwrap();
    let second = h.service.consume_token(&token).await;
    assert!(matches!(second, Err(VerificationError::InvalidToken)));

    // only the first consumption is audited
    assert_eq!(test_helpers::count_activities(&h.pool).await.unwrap(), 2);
}

#[tokio::test]
async fn test_expired_token_is_cleared() {
    let h = harness(VerificationConfig::default()).await;
    let user = h
        .service
        .register(CreateUserRequest::student("late@example.com", "password123"))
        .await
        .unwrap();
    let token = user.verification_token.unwrap();

    test_helpers::set_token_expiry(&h.pool, &user.id, Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    let result = h.service.consume_token(&token).await;
    assert!(matches!(result, Err(VerificationError::ExpiredToken)));

    let stored = h.users.find_by_id(&user.id).await.unwrap().unwrap();
    assert!(!stored.verified);
    assert!(stored.verification_token.is_none());
    assert!(stored.verification_token_expires_at.is_none());

    // the cleared token no longer resolves at all
    let again = h.service.consume_token(&token).await;
    assert!(matches!(again, Err(VerificationError::InvalidToken)));
}

#[tokio::test]
async fn test_unknown_and_blank_tokens_are_invalid() {
    let h = harness(VerificationConfig::default()).await;

    assert!(matches!(
        h.service.consume_token("deadbeef").await,
        Err(VerificationError::InvalidToken)
    ));
    assert!(matches!(
        h.service.consume_token("   ").await,
        Err(VerificationError::InvalidToken)
    ));
}

#[tokio::test]
async fn test_reissue_replaces_previous_token() {
    let h = harness(no_resend_limit()).await;
    let user = h
        .service
        .register(CreateUserRequest::student("again@example.com", "password123"))
        .await
        .unwrap();
    let first = user.verification_token.unwrap();

    let second = h.service.resend_token(&user.id).await.unwrap();
    assert_ne!(first, second);

    assert!(matches!(
        h.service.consume_token(&first).await,
        Err(VerificationError::InvalidToken)
    ));
    assert_eq!(h.service.consume_token(&second).await.unwrap(), user.id);
}

#[tokio::test]
async fn test_resend_is_rate_limited() {
    let h = harness(VerificationConfig::default()).await;
    let user = h
        .service
        .register(CreateUserRequest::student("hasty@example.com", "password123"))
        .await
        .unwrap();

    match h.service.resend_token(&user.id).await {
        Err(VerificationError::ResendTooSoon { retry_after_secs }) => {
            assert!(retry_after_secs > 0 && retry_after_secs <= 60);
        }
        other => panic!("expected ResendTooSoon, got {:?}", other),
    }

    // pretend the token was issued two minutes ago
    let issued = Utc::now() - Duration::minutes(2);
    test_helpers::set_token_expiry(&h.pool, &user.id, issued + Duration::hours(24))
        .await
        .unwrap();

    assert!(h.service.resend_token(&user.id).await.is_ok());
}

#[tokio::test]
async fn test_resend_for_email_mails_a_new_link() {
    let h = harness(no_resend_limit()).await;
    h.service
        .register(CreateUserRequest::student("mail@example.com", "password123"))
        .await
        .unwrap();

    h.service.resend_for_email("MAIL@example.com").await.unwrap();

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert_ne!(sent[0].link, sent[1].link);

    let token = h.mailer.last_token_for("mail@example.com").unwrap();
    assert!(h.service.consume_token(&token).await.is_ok());

    assert!(matches!(
        h.service.resend_for_email("ghost@example.com").await,
        Err(VerificationError::UserNotFound)
    ));
}

#[tokio::test]
async fn test_verified_user_gets_no_new_token() {
    let h = harness(no_resend_limit()).await;
    let user = h
        .service
        .register(CreateUserRequest::student("done@example.com", "password123"))
        .await
        .unwrap();
    h.service
        .consume_token(&user.verification_token.unwrap())
        .await
        .unwrap();

    assert!(matches!(
        h.service.issue_token(&user.id).await,
        Err(VerificationError::AlreadyVerified)
    ));
    assert!(matches!(
        h.service.resend_token(&user.id).await,
        Err(VerificationError::AlreadyVerified)
    ));
}

#[tokio::test]
async fn test_mark_verified_clears_token_in_same_write() {
    let h = harness(VerificationConfig::default()).await;
    let user = h
        .service
        .register(CreateUserRequest::student("admin-path@example.com", "password123"))
        .await
        .unwrap();
    let token = user.verification_token.unwrap();

    let updated = h
        .users
        .update_user(&user.id, UserUpdate::mark_verified())
        .await
        .unwrap()
        .unwrap();
    assert!(updated.verified);
    assert!(updated.verification_token.is_none());

    assert!(matches!(
        h.service.consume_token(&token).await,
        Err(VerificationError::InvalidToken)
    ));
}

#[tokio::test]
async fn test_registration_survives_mail_failure() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let users: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(pool.clone()));
    let service = VerificationService::new(
        users.clone(),
        Arc::new(UserService::new(users.clone())),
        Arc::new(AuditService::new(Arc::new(SqliteActivityRepository::new(
            pool.clone(),
        )))),
        Arc::new(FailingEmailService),
        VerificationConfig::default(),
    );

    let user = service
        .register(CreateUserRequest::student("offline@example.com", "password123"))
        .await
        .unwrap();
    assert!(user.verification_token.is_some());
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let h = harness(VerificationConfig::default()).await;
    h.service
        .register(CreateUserRequest::student("dup@example.com", "password123"))
        .await
        .unwrap();

    let result = h
        .service
        .register(CreateUserRequest::student("Dup@Example.com", "password123"))
        .await;
    assert!(matches!(
        result,
        Err(VerificationError::User(
            tutorhub::services::UserServiceError::EmailTaken
        ))
    ));
    assert_eq!(test_helpers::count_activities(&h.pool).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_consumers_verify_once() {
    const RACERS: usize = 8;

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("race.db").display());
    let pool = tutorhub::db::create_pool(&url).await.unwrap();
    tutorhub::db::run_migrations(&pool).await.unwrap();

    let users: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(pool.clone()));
    let activities: Arc<dyn ActivityRepository> =
        Arc::new(SqliteActivityRepository::new(pool.clone()));
    let service = Arc::new(VerificationService::new(
        users.clone(),
        Arc::new(UserService::new(users.clone())),
        Arc::new(AuditService::new(activities.clone())),
        Arc::new(RecordingEmailService::new()),
        VerificationConfig::default(),
    ));

    for round in 0..10 {
        let user = service
            .register(CreateUserRequest::student(
                format!("race{round}@example.com"),
                "password123",
            ))
            .await
            .unwrap();
        let token = user.verification_token.clone().unwrap();

        let barrier = Arc::new(tokio::sync::Barrier::new(RACERS));
        let handles: Vec<_> = (0..RACERS)
            .map(|_| {
                let service = service.clone();
                let barrier = barrier.clone();
                let token = token.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    service.consume_token(&token).await
                })
            })
            .collect();

        let mut successes = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(id) => {
                    assert_eq!(id, user.id);
                    successes += 1;
                }
                Err(VerificationError::InvalidToken) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(rejected, RACERS - 1);

        let verifications = activities
            .list_for_user(&user.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.kind == ActivityType::UserVerified)
            .count();
        assert_eq!(verifications, 1);

        let stored = users.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(stored.verified);
        assert!(stored.verification_token.is_none());
    }
}
