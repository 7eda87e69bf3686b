use clap::{Parser, Subcommand};
use fieldwatch::{
    db,
    models::{Role, User},
    repositories::user_repository::SqliteUserRepository,
    services::user_service::{CreateUserRequest, UpdatePasswordRequest, UserService},
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "fieldwatch-cli")]
#[command(about = "CLI tool for managing Fieldwatch users", long_about = None)]
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
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        #[arg(long, default_value = "")]
        first_name: String,

        #[arg(long, default_value = "")]
        last_name: String,

        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,

        /// Mark email as verified
        #[arg(long)]
        verified: bool,

        /// Grant the admin role
        #[arg(long)]
        admin: bool,
    },

    /// List all users
    List {
        /// Maximum number of users to display
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        /// Offset for pagination
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,
    },

    /// Verify a user's email
    Verify {
        #[arg(short, long)]
        email: String,
    },

    /// Set a new password for a user
    SetPassword {
        #[arg(short, long)]
        email: String,

        /// New password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Grant the admin role
    Promote {
        #[arg(short, long)]
        email: String,
    },

    /// Block a user from logging in
    Deactivate {
        #[arg(short, long)]
        email: String,
    },

    /// Allow a deactivated user to log in again
    Activate {
        #[arg(short, long)]
        email: String,
    },
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn get_password(prompt: &str) -> CliResult<String> {
    use std::io::{self, Write};
    print!("{}: ", prompt);
    io::stdout().flush()?;

    Ok(rpassword::read_password()?)
}

fn password_pair(password: Option<String>, prompt: &str) -> CliResult<(String, String)> {
    match password {
        Some(pw) => Ok((pw.clone(), pw)),
        None => {
            let password = get_password(prompt)?;
            let confirm = get_password("Confirm password")?;
            Ok((password, confirm))
        }
    }
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}", msg);
    std::process::exit(1);
}

async fn require_user(user_service: &UserService, email: &str) -> User {
    match user_service.find_user_by_email(email).await {
        Ok(Some(user)) => user,
        Ok(None) => fail(format!("User '{}' not found", email)),
        Err(err) => fail(format!("Failed to find user: {}", err)),
    }
}

#[tokio::main]
async fn main() -> CliResult<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Connect to database
    let pool = db::create_pool().await?;
    db::migrate(&pool).await?;

    let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
    let user_service = UserService::new(user_repository);

    let cli = Cli::parse();

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Create {
                email,
                first_name,
                last_name,
                password,
                verified,
                admin,
            } => {
                let (password, password_confirm) = password_pair(password, "Password")?;

                let request = CreateUserRequest {
                    email,
                    password,
                    password_confirm: Some(password_confirm),
                    first_name,
                    last_name,
                    email_verified: verified,
                };

                let user = match user_service.create_user(request).await {
                    Ok(user) => user,
                    Err(err) => fail(format!("Failed to create user: {}", err)),
                };
                if admin {
                    if let Err(err) = user_service.set_role(user.id, Role::Admin).await {
                        fail(format!("User created but promotion failed: {}", err));
                    }
                }

                println!("✅ User created successfully!");
                println!("  ID: {}", user.id);
                println!("  Email: {}", user.email);
                println!("  Verified: {}", user.is_verified);
                println!("  Admin: {}", admin);
            }

            UserCommands::List { limit, offset } => {
                let users = match user_service.list_users(Some(limit), Some(offset)).await {
                    Ok(users) => users,
                    Err(err) => fail(format!("Failed to list users: {}", err)),
                };

                if users.is_empty() {
                    println!("No users found.");
                } else {
                    println!(
                        "{:<5} {:<36} {:<24} {:<6} {:<9} {:<7} {:<20}",
                        "ID", "Email", "Name", "Role", "Verified", "Active", "Created"
                    );
                    println!("{}", "-".repeat(112));
                    for user in users {
                        println!(
                            "{:<5} {:<36} {:<24} {:<6} {:<9} {:<7} {:<20}",
                            user.id,
                            user.email,
                            user.display_name(),
                            user.role.as_str(),
                            if user.is_verified { "Yes" } else { "No" },
                            if user.is_active { "Yes" } else { "No" },
                            user.created_display()
                        );
                    }
                }
            }

            UserCommands::Verify { email } => {
                let user = require_user(&user_service, &email).await;
                if user.is_verified {
                    println!("ℹ️  User '{}' is already verified", email);
                } else if let Err(err) = user_service.verify_user_email(user.id).await {
                    fail(format!("Failed to verify user: {}", err));
                } else {
                    println!("✅ User '{}' email verified successfully!", email);
                }
            }

            UserCommands::SetPassword { email, password } => {
                let user = require_user(&user_service, &email).await;
                let (new_password, password_confirm) = password_pair(password, "New password")?;

                let request = UpdatePasswordRequest {
                    user_id: user.id,
                    new_password,
                    new_password_confirm: Some(password_confirm),
                };

                match user_service.update_password(request).await {
                    Ok(()) => println!("✅ Password updated successfully for '{}'!", email),
                    Err(err) => fail(format!("Failed to update password: {}", err)),
                }
            }

            UserCommands::Promote { email } => {
                let user = require_user(&user_service, &email).await;
                match user_service.set_role(user.id, Role::Admin).await {
                    Ok(()) => println!("✅ User '{}' is now an admin", email),
                    Err(err) => fail(format!("Failed to promote user: {}", err)),
                }
            }

            UserCommands::Deactivate { email } => {
                let user = require_user(&user_service, &email).await;
                match user_service.set_active(user.id, false).await {
                    Ok(()) => println!("✅ User '{}' deactivated", email),
                    Err(err) => fail(format!("Failed to deactivate user: {}", err)),
                }
            }

            UserCommands::Activate { email } => {
                let user = require_user(&user_service, &email).await;
                match user_service.set_active(user.id, true).await {
                    Ok(()) => println!("✅ User '{}' activated", email),
                    Err(err) => fail(format!("Failed to activate user: {}", err)),
                }
            }
        },
    }

    Ok(())
}
