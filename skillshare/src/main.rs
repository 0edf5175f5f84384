use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration};
use clap::Parser;
use skillshare::{
    JwtConfig, SkillShareBuilder, SqliteRepositoryProvider, repositories::RepositoryProvider,
};
use tracing_subscriber::EnvFilter;

/// Operator command line for SkillShare authentication
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://skillshare.db")]
    db_url: String,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(clap::Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// List migrations and when they were applied
    Status,
    /// Print version information
    Version,
    /// Show the lockout state of an account
    Inspect { email: String },
    /// Lift a lock and clear the consecutive failure count
    Unlock { email: String },
    /// Clear every failure counter and the lock
    ResetAttempts { email: String },
    /// Delete expired password reset tokens
    CleanupTokens,
    /// Mint a bearer token for the admin account-lockout endpoints
    AdminToken {
        /// Identity recorded in the token's `sub` and `email` claims
        #[arg(long, default_value = "admin")]
        subject: String,

        /// Token lifetime in hours
        #[arg(long, default_value_t = 1)]
        ttl_hours: i64,

        /// HS256 signing secret, at least 32 bytes
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        jwt_secret: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("SkillShare v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Migrate => {
            println!("Running migrations...");
            let storage = connect(&cli.db_url).await?;
            storage.migrate().await.context("Failed to run migrations")?;
            println!("Migrations complete");
        }
        Commands::Status => {
            let storage = connect(&cli.db_url).await?;
            for migration in storage.migration_status().await? {
                let applied = migration
                    .applied_at
                    .and_then(DateTime::from_timestamp_millis)
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "pending".to_string());
                println!("{:>4}  {:<32} {}", migration.version, migration.name, applied);
            }
        }
        Commands::Inspect { email } => {
            let auth = build(&cli.db_url, None).await?;
            let status = auth.lockout_status(&email).await?;
            println!("{}", format_status(&status));
        }
        Commands::Unlock { email } => {
            let auth = build(&cli.db_url, None).await?;
            let account = auth.unlock_account(&email).await?;
            println!("Account {} has been unlocked", account.email);
        }
        Commands::ResetAttempts { email } => {
            let auth = build(&cli.db_url, None).await?;
            let account = auth.reset_failed_attempts(&email).await?;
            println!("Failed login attempts reset for {}", account.email);
        }
        Commands::CleanupTokens => {
            let auth = build(&cli.db_url, None).await?;
            let removed = auth.cleanup_expired_reset_tokens().await?;
            println!("Removed {removed} expired reset tokens");
        }
        Commands::AdminToken {
            subject,
            ttl_hours,
            jwt_secret,
        } => {
            anyhow::ensure!(ttl_hours > 0, "--ttl-hours must be positive");
            let ttl = Duration::try_hours(ttl_hours).context("--ttl-hours is out of range")?;
            let jwt = JwtConfig::new_hs256(jwt_secret)?;
            let auth = build(&cli.db_url, Some(jwt)).await?;
            let token = auth.issue_admin_token(&subject, ttl)?;
            println!("{}", token.token);
        }
    }

    Ok(())
}

async fn connect(db_url: &str) -> anyhow::Result<Arc<SqliteRepositoryProvider>> {
    let storage = SqliteRepositoryProvider::connect(db_url)
        .await
        .with_context(|| format!("Failed to connect to {db_url}"))?;
    Ok(Arc::new(storage))
}

/// Commands that do not sign tokens still need a JWT configuration to build;
/// they get a throwaway random one.
async fn build(
    db_url: &str,
    jwt: Option<JwtConfig>,
) -> anyhow::Result<skillshare::SkillShare<SqliteRepositoryProvider>> {
    let jwt = match jwt {
        Some(jwt) => jwt,
        None => JwtConfig::new_hs256(skillshare_core::crypto::generate_reset_token().plaintext)?,
    };

    let auth = SkillShareBuilder::new()
        .with_repositories(connect(db_url).await?)
        .with_jwt(jwt)
        .build()
        .await?;
    Ok(auth)
}

fn format_status(status: &skillshare::AccountLockoutStatus) -> String {
    let mut out = format!(
        "email:                 {}\nlogin attempts:        {}\ntotal failed attempts: {}\n",
        status.email, status.login_attempts, status.total_failed_attempts
    );
    let last = status
        .last_login_attempt
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    out.push_str(&format!("last attempt:          {last}\n"));

    match (&status.lockout_info.reason, status.lockout_info.remaining_minutes) {
        (Some(reason), Some(minutes)) if status.lockout_info.is_locked => {
            out.push_str(&format!("locked:                yes ({minutes} min)\n"));
            out.push_str(&format!("reason:                {reason}"));
        }
        _ => out.push_str("locked:                no"),
    }
    out
}
