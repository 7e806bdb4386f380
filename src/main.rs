use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use medtrend::authorization::CurrentUser;
use medtrend::config::{AppConfig, APP_VERSION};
use medtrend::core_state::CoreState;
use medtrend::models::enums::{RecordType, Role};
use medtrend::pipeline::batch::{UploadFile, UploadRequest};
use medtrend::pipeline::import::content_type_for_path;

#[derive(Parser, Debug)]
#[command(
    name = "medtrend",
    version,
    about = "Ingest medical documents and query measurement trends."
)]
struct Cli {
    /// Data directory (overrides MEDTREND_DATA_DIR).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage users.
    #[command(subcommand)]
    User(UserCommand),
    /// Upload up to 10 documents in one batch.
    Upload {
        #[command(flatten)]
        actor: Actor,
        /// Declared record type for every file of the batch.
        #[arg(long = "type", value_parser = parse_record_type, default_value = "Blood Test")]
        record_type: RecordType,
        /// Owner to upload for (administrators only).
        #[arg(long)]
        owner: Option<Uuid>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Re-run structured extraction for a stored record.
    Reanalyze {
        #[command(flatten)]
        actor: Actor,
        record_id: Uuid,
    },
    /// Delete a record with its analysis and measurements.
    Delete {
        #[command(flatten)]
        actor: Actor,
        record_id: Uuid,
    },
    /// All measurements, newest first.
    Measurements(OwnerScope),
    /// Measurements whose name contains NAME, oldest first.
    Trend {
        #[command(flatten)]
        scope: OwnerScope,
        name: String,
    },
    /// Measurements grouped by record type and name.
    Grouped(OwnerScope),
    /// Totals, per-category counts and recent measurements.
    Summary(OwnerScope),
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Register a user and print it.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        admin: bool,
    },
}

#[derive(Args, Debug)]
struct Actor {
    /// Id of the user performing the action.
    #[arg(long = "as", value_name = "USER_ID")]
    user_id: Uuid,
}

#[derive(Args, Debug)]
struct OwnerScope {
    #[command(flatten)]
    actor: Actor,
    /// Owner whose data is read (administrators only).
    #[arg(long)]
    owner: Option<Uuid>,
}

/// Accepts display labels ("Blood Test") and tags ("blood_test"); unknown tags map to Other.
fn parse_record_type(raw: &str) -> Result<RecordType, String> {
    if raw.trim().is_empty() {
        return Err("record type must not be empty".into());
    }
    Ok(RecordType::from_label(raw))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn current_user(core: &CoreState, actor: &Actor) -> anyhow::Result<CurrentUser> {
    let user = core
        .get_user(actor.user_id)
        .await
        .with_context(|| format!("Unknown user {}", actor.user_id))?;
    Ok(CurrentUser {
        id: user.id,
        role: user.role,
    })
}

fn read_upload(path: &Path) -> anyhow::Result<UploadFile> {
    let bytes = std::fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
    Ok(UploadFile {
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        content_type: content_type_for_path(path).to_string(),
        bytes,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    medtrend::init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    tracing::info!(version = APP_VERSION, "MedTrend starting");

    let core = CoreState::new(config).context("Could not initialise MedTrend")?;

    match cli.command {
        Command::User(UserCommand::Add { name, admin }) => {
            let role = if admin { Role::Admin } else { Role::Patient };
            print_json(&core.register_user(&name, role).await?)
        }
        Command::Upload {
            actor,
            record_type,
            owner,
            files,
        } => {
            let user = current_user(&core, &actor).await?;
            let files = files.iter().map(|p| read_upload(p)).collect::<anyhow::Result<Vec<_>>>()?;
            let request = UploadRequest {
                target_owner: owner,
                declared_type: record_type,
                files,
            };
            let outcome = core.upload_batch(&user, request).await?;
            print_json(&outcome)
        }
        Command::Reanalyze { actor, record_id } => {
            let user = current_user(&core, &actor).await?;
            print_json(&core.reanalyze(&user, record_id).await?)
        }
        Command::Delete { actor, record_id } => {
            let user = current_user(&core, &actor).await?;
            core.delete_record(&user, record_id).await?;
            print_json(&serde_json::json!({ "deleted": record_id }))
        }
        Command::Measurements(scope) => {
            let user = current_user(&core, &scope.actor).await?;
            print_json(&core.list_measurements(&user, scope.owner).await?)
        }
        Command::Trend { scope, name } => {
            let user = current_user(&core, &scope.actor).await?;
            print_json(&core.trend_by_name(&user, scope.owner, &name).await?)
        }
        Command::Grouped(scope) => {
            let user = current_user(&core, &scope.actor).await?;
            print_json(&core.grouped_trend(&user, scope.owner).await?)
        }
        Command::Summary(scope) => {
            let user = current_user(&core, &scope.actor).await?;
            print_json(&core.summary(&user, scope.owner).await?)
        }
    }
}
