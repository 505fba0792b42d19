//! fenix-ctl - operator commands against the configured database and storage
//!
//! `create-admin` is the only way to bootstrap the first administrator;
//! `import-pages` runs the ZIP importer without going through HTTP.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fenix_common::auth::hash_password;
use fenix_common::config::{load_toml_config, AdminConfig};
use fenix_common::db::init_database;
use fenix_common::MediaStore;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fenix_admin::cli::ConfigArgs;
use fenix_admin::db::users::{self, NewUser, Role};
use fenix_admin::forms::{is_valid_email, MIN_NAME_LEN, MIN_PASSWORD_LEN};
use fenix_admin::import;

#[derive(Parser, Debug)]
#[command(name = "fenix-ctl")]
#[command(about = "Operator commands for the Fênix manga catalog")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an administrator, or promote an existing account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, env = "FENIX_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Import page images from a ZIP archive into a chapter
    ImportPages {
        #[arg(long)]
        chapter_id: i64,
        #[arg(long)]
        zip: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fenix_admin=info,fenix_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let file_config = load_toml_config(cli.config.config.as_deref());
    let config = AdminConfig::resolve(&cli.config.to_overrides(), file_config.as_ref())
        .context("Invalid configuration")?;

    let pool = init_database(&config.database_path)
        .await
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;

    match cli.command {
        Command::CreateAdmin {
            email,
            name,
            password,
        } => {
            let email = email.trim().to_lowercase();
            let name = name.trim().to_string();
            if !is_valid_email(&email) {
                bail!("'{}' is not a valid e-mail address", email);
            }
            if name.chars().count() < MIN_NAME_LEN {
                bail!("Name must be at least {} characters", MIN_NAME_LEN);
            }
            if password.chars().count() < MIN_PASSWORD_LEN {
                bail!("Password must be at least {} characters", MIN_PASSWORD_LEN);
            }

            let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
                .await
                .context("Hashing task failed")??;

            match users::find_by_email(&pool, &email).await? {
                Some(existing) => {
                    users::promote_to_admin(&pool, existing.id, &name, &password_hash).await?;
                    info!("Promoted user {} ({}) to administrator", existing.id, email);
                    println!("Promoted {} to administrator (id {})", email, existing.id);
                }
                None => {
                    let id = users::insert(
                        &pool,
                        &NewUser {
                            email: &email,
                            password_hash: &password_hash,
                            name: &name,
                            role: Role::Admin,
                        },
                    )
                    .await?;
                    info!("Created administrator {} ({})", id, email);
                    println!("Created administrator {} (id {})", email, id);
                }
            }
        }
        Command::ImportPages { chapter_id, zip } => {
            let media = MediaStore::from_config(&config.storage)
                .context("Failed to set up media storage")?;
            let data = tokio::fs::read(&zip)
                .await
                .with_context(|| format!("Failed to read {}", zip.display()))?;
            let file_name = zip.file_name().and_then(|n| n.to_str());

            let report = import::import_zip(&pool, &media, chapter_id, file_name, data).await?;
            println!(
                "Imported {} page(s) into chapter {} ({} skipped)",
                report.imported, report.chapter_id, report.skipped
            );
            for entry in &report.skipped_entries {
                println!("  skipped: {}", entry);
            }
        }
    }

    pool.close().await;
    Ok(())
}
