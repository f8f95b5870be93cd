use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tutorhub::{
    config::Settings,
    db,
    models::{ActivityType, Role, User, UserFilter, UserUpdate},
    services::{CreateUserRequest, MockEmailService},
    AppState,
};

#[derive(Parser)]
#[command(name = "tutorhub-cli")]
#[command(about = "CLI tool for managing TutorHub users", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Show recent audit activity
    Activities {
        /// Maximum number of entries to display
        #[arg(short, long, default_value_t = 50)]
        limit: i64,

        /// Only show entries about this user id
        #[arg(short, long)]
        user: Option<String>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,

        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,

        /// Role: student, teacher or admin
        #[arg(short, long, default_value = "student")]
        role: Role,

        /// Mark email as verified
        #[arg(long)]
        verified: bool,
    },

    /// List users, newest first
    List {
        /// Only users with this role
        #[arg(long)]
        role: Option<Role>,

        /// Only verified (true) or unverified (false) users
        #[arg(long)]
        verified: Option<bool>,

        /// Maximum number of users to display
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        /// Offset for pagination
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,
    },

    /// Change a user's role
    SetRole {
        /// Email address of the user
        #[arg(short, long)]
        email: String,

        /// New role: student, teacher or admin
        #[arg(short, long)]
        role: Role,
    },

    /// Verify a user's email
    Verify {
        /// Email address of the user to verify
        #[arg(short, long)]
        email: String,
    },

    /// Delete a user
    Delete {
        /// Email address of the user to delete
        #[arg(short, long)]
        email: String,
    },
}

fn get_password(prompt: &str) -> anyhow::Result<String> {
    use std::io::{self, Write};
    print!("{}: ", prompt);
    io::stdout().flush()?;

    Ok(rpassword::read_password()?)
}

async fn require_user(state: &AppState, email: &str) -> anyhow::Result<User> {
    match state.user_service.find_user_by_email(email).await? {
        Some(user) => Ok(user),
        None => bail!("User '{}' not found", email),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutorhub=warn".into()),
        )
        .init();

    let settings = Settings::from_env()?;

    // Connect to database
    let pool = db::create_pool(&settings.database_url)
        .await
        .context("failed to open database")?;

    // Run migrations
    db::run_migrations(&pool).await?;

    // Nothing is mailed from the CLI
    let state = AppState::new(
        pool,
        Arc::new(MockEmailService::new()),
        settings.verification(),
    );

    // Parse CLI arguments
    let cli = Cli::parse();

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Create {
                email,
                name,
                password,
                role,
                verified,
            } => {
                let password = match password {
                    Some(pw) => pw,
                    None => {
                        let password = get_password("Password")?;
                        if password != get_password("Confirm password")? {
                            bail!("Passwords do not match");
                        }
                        password
                    }
                };

                let request = CreateUserRequest {
                    email,
                    name,
                    password,
                    role,
                };

                let mut user = state
                    .user_service
                    .create_user(request)
                    .await
                    .context("failed to create user")?;
                state
                    .audit_service
                    .record(
                        ActivityType::UserCreated,
                        &user.id,
                        format!("Account {} created from the command line", user.email),
                        None,
                    )
                    .await;

                if verified {
                    user = state
                        .user_service
                        .update_user(&user.id, UserUpdate::mark_verified())
                        .await?
                        .context("user disappeared during creation")?;
                    state
                        .audit_service
                        .record(
                            ActivityType::UserVerified,
                            &user.id,
                            format!("Email of {} verified from the command line", user.email),
                            None,
                        )
                        .await;
                }

                println!("✅ User created successfully!");
                println!("  ID: {}", user.id);
                println!("  Email: {}", user.email);
                println!("  Role: {}", user.role);
                println!("  Verified: {}", user.verified);
            }

            UserCommands::List {
                role,
                verified,
                limit,
                offset,
            } => {
                let page = state
                    .user_service
                    .list_users(UserFilter { role, verified }, limit, offset)
                    .await?;

                if page.users.is_empty() {
                    println!("No users found.");
                } else {
                    println!(
                        "{:<38} {:<36} {:<8} {:<9} {:<20}",
                        "ID", "Email", "Role", "Verified", "Created"
                    );
                    println!("{}", "-".repeat(114));
                    for user in &page.users {
                        println!(
                            "{:<38} {:<36} {:<8} {:<9} {:<20}",
                            user.id,
                            user.email,
                            user.role,
                            if user.verified { "Yes" } else { "No" },
                            user.created_at.format("%Y-%m-%d %H:%M:%S")
                        );
                    }
                    println!("{} of {} users", page.users.len(), page.total);
                }
            }

            UserCommands::SetRole { email, role } => {
                let user = require_user(&state, &email).await?;
                if user.role == role {
                    println!("ℹ️  User '{}' already has role {}", email, role);
                    return Ok(());
                }

                let updated = state
                    .user_service
                    .update_user(&user.id, UserUpdate::role(role))
                    .await?
                    .context("user not found")?;
                state
                    .audit_service
                    .record(
                        ActivityType::RoleChanged,
                        &updated.id,
                        format!(
                            "Role of {} changed from {} to {} from the command line",
                            updated.email, user.role, role
                        ),
                        None,
                    )
                    .await;

                println!("✅ Role of '{}' set to {}", email, role);
            }

            UserCommands::Verify { email } => {
                let user = require_user(&state, &email).await?;
                if user.verified {
                    println!("ℹ️  User '{}' is already verified", email);
                    return Ok(());
                }

                state
                    .user_service
                    .update_user(&user.id, UserUpdate::mark_verified())
                    .await?
                    .context("user not found")?;
                state
                    .audit_service
                    .record(
                        ActivityType::UserVerified,
                        &user.id,
                        format!("Email of {} verified from the command line", user.email),
                        None,
                    )
                    .await;

                println!("✅ User '{}' email verified successfully!", email);
            }

            UserCommands::Delete { email } => {
                let user = require_user(&state, &email).await?;
                if !state.user_service.delete_user(&user.id).await? {
                    bail!("User '{}' not found", email);
                }
                state
                    .audit_service
                    .record(
                        ActivityType::UserDeleted,
                        &user.id,
                        format!("Deleted user {} ({}) from the command line", user.email, user.role),
                        None,
                    )
                    .await;

                println!("✅ User '{}' deleted successfully!", email);
            }
        },

        Commands::Activities { limit, user } => {
            let activities = match user {
                Some(user_id) => state.audit_service.for_user(&user_id).await?,
                None => state.audit_service.recent(limit.clamp(1, 100)).await?,
            };

            if activities.is_empty() {
                println!("No activity recorded.");
            }
            for activity in activities {
                println!(
                    "{}  {:<14} {:<38} {}",
                    activity.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    activity.kind,
                    activity.user_id,
                    activity.details
                );
            }
        }
    }

    Ok(())
}
