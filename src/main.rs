//! # param-sync
//!
//! Command-line interface for synchronizing a CSV parameter file with AWS
//! Systems Manager Parameter Store.
//!
//! ## Usage
//!
//! ```bash
//! # Preview what a put would change
//! param-sync diff -f parameters.csv --region eu-west-1
//!
//! # Check permissions and shapes without writing
//! param-sync put -f parameters.csv --dry-run
//!
//! # Apply the file
//! param-sync put -f parameters.csv --region eu-west-1
//!
//! # Undo the last put
//! param-sync rollback
//!
//! # Export a path prefix to CSV
//! param-sync export --path-prefix /myapp/dev --recursive -o dev.csv
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use param_sync::config::{LogFormat, StoreTarget, SyncConfig};
use param_sync::controller::confirm::{AssumeYes, ConfirmationProvider, StdinConfirmation};
use param_sync::controller::diff::compute_diff;
use param_sync::controller::export::export_parameters;
use param_sync::controller::reconciler::{Reconciler, SyncResult};
use param_sync::controller::rollback::{FileRollbackStore, RollbackExecutor, RollbackStateStore};
use param_sync::error::SyncError;
use param_sync::observability::init_logging;
use param_sync::parameter::Parameter;
use param_sync::parameter_file::{
    read_parameters_from_path, write_parameters, ParsedFile, TEMPLATE,
};
use param_sync::provider::aws::AwsParameterStore;
use param_sync::provider::RetryingStore;
use std::path::{Path, PathBuf};
use tracing::info;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// Sync a CSV parameter file with AWS Systems Manager Parameter Store
#[derive(Parser)]
#[command(name = "param-sync", version, long_version = LONG_VERSION)]
#[command(
    about = "Sync a CSV parameter file with AWS Systems Manager Parameter Store",
    long_about = None,
    after_help = "\
CSV columns: name,value,type,description,kmsKeyId,tags
  type: String | SecureString | StringList (default String)
  tags: key=value;key2=value2

Examples:
  param-sync diff -f parameters.csv
  param-sync put -f parameters.csv --dry-run
  param-sync rollback --region eu-west-1
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// AWS region (defaults to AWS_REGION or the profile's region)
    #[arg(short, long, global = true)]
    region: Option<String>,

    /// AWS named profile
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Answer yes to confirmation prompts
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Log format: text or json
    #[arg(long, global = true, value_name = "FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and update parameters from a CSV file
    Put {
        /// CSV parameter file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// Check every change without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Undo the most recent put
    Rollback,
    /// Show what a put would change
    Diff {
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,
    },
    /// Validate a CSV file without contacting AWS
    Validate {
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,
    },
    /// Export parameters under a path prefix to CSV
    Export {
        /// Path prefix to export, e.g. /myapp/dev
        #[arg(long, value_name = "PREFIX", default_value = "/")]
        path_prefix: String,

        /// Include nested paths
        #[arg(long)]
        recursive: bool,

        /// Output file (stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Write an example CSV file
    #[command(name = "generate-template")]
    GenerateTemplate {
        /// Output file (stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = SyncConfig::from_env()
        .with_region(cli.region)
        .with_profile(cli.profile);
    config.assume_yes |= cli.yes;
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }

    init_logging(config.log_format);

    match cli.command {
        Commands::Put { file, dry_run } => put_command(&config, &file, dry_run).await,
        Commands::Rollback => rollback_command(config).await,
        Commands::Diff { file } => diff_command(&config, &file).await,
        Commands::Validate { file } => validate_command(&file),
        Commands::Export {
            path_prefix,
            recursive,
            output,
        } => export_command(&config, &path_prefix, recursive, output.as_deref()).await,
        Commands::GenerateTemplate { output } => generate_template_command(output.as_deref()),
    }
}

async fn connect(config: &SyncConfig) -> Result<RetryingStore<AwsParameterStore>> {
    let store = AwsParameterStore::connect(config.region.as_deref(), config.profile.as_deref())
        .await
        .context("Failed to create AWS Parameter Store client")?;
    Ok(RetryingStore::new(store, config.retry.clone()))
}

fn confirmation(config: &SyncConfig) -> Box<dyn ConfirmationProvider> {
    if config.assume_yes {
        Box::new(AssumeYes)
    } else {
        Box::new(StdinConfirmation::new(config.confirmation_timeout))
    }
}

fn print_row_errors(parsed: &ParsedFile) {
    for error in &parsed.errors {
        println!("   ❌ {error}");
    }
}

/// Parse a CSV file, refusing to continue when any row is invalid
fn load_parameters(file: &Path) -> Result<Vec<Parameter>> {
    let parsed = read_parameters_from_path(file)?;
    if !parsed.is_valid() {
        println!("❌ {} has invalid rows:", file.display());
        print_row_errors(&parsed);
        anyhow::bail!("{} invalid row(s) in {}", parsed.errors.len(), file.display());
    }
    Ok(parsed.parameters)
}

async fn put_command(config: &SyncConfig, file: &Path, dry_run: bool) -> Result<()> {
    let desired = load_parameters(file)?;
    let store = connect(config).await?;
    let target = StoreTarget {
        region: store.inner().region().to_string(),
        profile: config.profile.clone(),
    };
    let state = FileRollbackStore::new(&config.state_dir, config.snapshot_ttl);
    let confirm = confirmation(config);

    let reconciler = Reconciler::new(&store, &state, confirm.as_ref(), config);
    let result = reconciler.sync(&desired, &target, dry_run).await?;

    print_sync_summary(&result);
    if result.has_failures() {
        anyhow::bail!("{} parameter(s) failed", result.failed);
    }
    Ok(())
}

fn print_sync_summary(result: &SyncResult) {
    if result.cancelled {
        println!("⚠️  Operation cancelled, no changes applied");
        return;
    }

    println!();
    if result.dry_run {
        println!("🔍 Dry run complete (no changes written)");
        println!("   Would succeed: {}", result.success);
    } else {
        println!("📊 Sync summary");
        println!("   Created: {}", result.created());
        println!("   Updated: {}", result.updated);
    }
    println!("   Skipped: {}", result.skipped);
    println!("   Failed:  {}", result.failed);

    for error in &result.errors {
        println!("   ❌ {error}");
    }
    if !result.dry_run && !result.has_failures() && result.success > 0 {
        println!("✅ Sync completed successfully");
    }
}

async fn rollback_command(mut config: SyncConfig) -> Result<()> {
    let state = FileRollbackStore::new(&config.state_dir, config.snapshot_ttl);

    // Without an explicit region, go back to wherever the last put went
    if config.region.is_none() {
        let snapshot = state.load().ok_or(SyncError::NoRollbackHistory)?;
        info!("Targeting region {} from the rollback snapshot", snapshot.region);
        config = config
            .with_region(Some(snapshot.region))
            .with_profile(snapshot.profile);
    }

    let store = connect(&config).await?;
    let region = store.inner().region().to_string();
    let confirm = confirmation(&config);

    let executor = RollbackExecutor::new(&store, &state, confirm.as_ref(), &config, &region);
    let result = executor.rollback().await?;

    if result.cancelled {
        println!("⚠️  Rollback cancelled, no changes applied");
        return Ok(());
    }

    println!();
    println!("📊 Rollback summary");
    println!("   Reverted: {}", result.success);
    println!("   Failed:   {}", result.failed);
    for error in &result.errors {
        println!("   ❌ {error}");
    }

    if result.failed > 0 {
        anyhow::bail!(
            "{} parameter(s) could not be rolled back; run rollback again to retry",
            result.failed
        );
    }
    println!("✅ Rollback completed successfully");
    Ok(())
}

async fn diff_command(config: &SyncConfig, file: &Path) -> Result<()> {
    let desired = load_parameters(file)?;
    let store = connect(config).await?;
    let report = compute_diff(&store, &desired, config.read_concurrency).await;

    for change in &report.changes {
        println!("{}", change.summary_line());
    }
    println!();
    println!(
        "📊 {} to create, {} to update, {} unchanged",
        report.summary.create, report.summary.update, report.summary.skip
    );
    Ok(())
}

fn validate_command(file: &Path) -> Result<()> {
    let parsed = read_parameters_from_path(file)?;
    if parsed.is_valid() {
        println!(
            "✅ {} is valid ({} parameter(s))",
            file.display(),
            parsed.parameters.len()
        );
        return Ok(());
    }

    println!("❌ {} has invalid rows:", file.display());
    print_row_errors(&parsed);
    anyhow::bail!("{} invalid row(s) in {}", parsed.errors.len(), file.display())
}

async fn export_command(
    config: &SyncConfig,
    prefix: &str,
    recursive: bool,
    output: Option<&Path>,
) -> Result<()> {
    let store = connect(config).await?;
    let parameters = export_parameters(&store, prefix, recursive, config.read_concurrency)
        .await
        .with_context(|| format!("Failed to export parameters under {prefix}"))?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_parameters(file, &parameters)?;
            println!(
                "✅ Exported {} parameter(s) to {}",
                parameters.len(),
                path.display()
            );
        }
        None => {
            write_parameters(std::io::stdout().lock(), &parameters)?;
            info!("Exported {} parameter(s)", parameters.len());
        }
    }
    Ok(())
}

fn generate_template_command(output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, TEMPLATE)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✅ Template written to {}", path.display());
        }
        None => print!("{TEMPLATE}"),
    }
    Ok(())
}
