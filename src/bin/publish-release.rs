//! publish-release CLI
//!
//! Create or reuse a release and upload assets to it

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use publish_release::{
    CONFIG_FILENAME, ConfigFile, ConfigLoadOptions, ConfigLoader, HttpTransport, PublishEvent,
    PublishStatus, spawn_publish,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Publish a release to GitHub and upload assets to it
#[derive(Parser)]
#[command(name = "publish-release")]
#[command(version)]
#[command(about = "Publish a release to GitHub and upload assets to it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create (or reuse) a release and upload assets
    Publish(PublishArgs),

    /// Write a starter .publish-release.yaml
    Init {
        /// Project path (defaults to current directory)
        #[arg(value_name = "PROJECT_PATH")]
        project_path: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
struct PublishArgs {
    /// Directory holding .publish-release.yaml (defaults to current directory)
    #[arg(long, value_name = "DIR")]
    config: Option<PathBuf>,

    /// API token (falls back to GITHUB_TOKEN / GH_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Repository owner
    #[arg(long)]
    owner: Option<String>,

    /// Repository name
    #[arg(long)]
    repo: Option<String>,

    /// Tag of the release
    #[arg(long)]
    tag: Option<String>,

    /// Commitish the tag is created from
    #[arg(long)]
    target_commitish: Option<String>,

    /// Release title
    #[arg(long)]
    name: Option<String>,

    /// Release notes
    #[arg(long)]
    notes: Option<String>,

    /// Create the release as a draft
    #[arg(long)]
    draft: bool,

    /// Mark the release as a prerelease
    #[arg(long)]
    prerelease: bool,

    /// Reuse an existing release with the same tag
    #[arg(long)]
    reuse_release: bool,

    /// Only reuse draft releases
    #[arg(long)]
    reuse_draft_only: bool,

    /// Do nothing if a published release with the tag exists
    #[arg(long)]
    skip_if_published: bool,

    /// Update a reused release with the given metadata
    #[arg(long)]
    edit_release: bool,

    /// Delete the tag when editing turns a published release into a draft
    #[arg(long)]
    delete_empty_tag: bool,

    /// Do not check that assets exist before publishing
    #[arg(long)]
    skip_assets_check: bool,

    /// Keep assets that already exist instead of replacing them
    #[arg(long)]
    skip_duplicated_assets: bool,

    /// Replacement rounds per conflicting asset
    #[arg(long)]
    max_duplicate_retries: Option<u32>,

    /// API root (for GitHub Enterprise)
    #[arg(long)]
    api_url: Option<String>,

    /// Files to upload, in order
    #[arg(value_name = "ASSETS")]
    assets: Vec<PathBuf>,
}

impl PublishArgs {
    /// CLI layer of the configuration; unset flags defer to other layers
    fn to_config_file(&self) -> ConfigFile {
        let flag = |set: bool| set.then_some(true);

        ConfigFile {
            api_url: self.api_url.clone(),
            token: self.token.clone(),
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            tag: self.tag.clone(),
            target_commitish: self.target_commitish.clone(),
            name: self.name.clone(),
            notes: self.notes.clone(),
            draft: flag(self.draft),
            prerelease: flag(self.prerelease),
            assets: (!self.assets.is_empty()).then(|| self.assets.clone()),
            reuse_release: flag(self.reuse_release),
            reuse_draft_only: flag(self.reuse_draft_only),
            skip_if_published: flag(self.skip_if_published),
            edit_release: flag(self.edit_release),
            delete_empty_tag: flag(self.delete_empty_tag),
            skip_assets_check: flag(self.skip_assets_check),
            skip_duplicated_assets: flag(self.skip_duplicated_assets),
            max_duplicate_retries: self.max_duplicate_retries,
        }
    }
}

const CONFIG_TEMPLATE: &str = r#"# publish-release configuration
token: ${GITHUB_TOKEN}
owner: your-name
repo: your-repo
# apiUrl: https://api.github.com
# draft: false
# prerelease: false
# reuseRelease: true
# reuseDraftOnly: true
# skipDuplicatedAssets: false
# assets:
#   - dist/app.tar.gz
"#;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run().await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Publish(args) => publish_command(args).await,
        Commands::Init {
            project_path,
            force,
        } => {
            let path = project_path.unwrap_or_else(|| PathBuf::from("."));
            init_command(path, force).await
        }
    }
}

async fn publish_command(args: PublishArgs) -> Result<i32> {
    let project_path = args.config.clone().unwrap_or_else(|| PathBuf::from("."));
    let options = ConfigLoadOptions::from_process_env(project_path, Some(args.to_config_file()));
    let config = ConfigLoader::load(options)
        .await
        .context("failed to load configuration")?;

    let transport = HttpTransport::with_connect_timeout(CONNECT_TIMEOUT)?;
    let mut handle = spawn_publish(config, Arc::new(transport));

    while let Some(event) = handle.events.recv().await {
        render(&event);
    }

    let outcome = handle
        .outcome
        .await
        .context("publish task ended without a result")?;

    match outcome {
        Ok(report) => {
            match report.status {
                PublishStatus::Published => {
                    println!("\n✅ Release {} published", report.release.tag_name);
                }
                PublishStatus::AlreadyPublished => {
                    println!(
                        "\n✅ Release {} is already published, nothing to do",
                        report.release.tag_name
                    );
                }
            }
            if let Some(url) = &report.release.html_url {
                println!("   {}", url);
            }
            let skipped = report.skipped_stages();
            if !skipped.is_empty() {
                println!("   Skipped: {:?}", skipped);
            }
            Ok(0)
        }
        Err(e) => {
            eprintln!("\n❌ Publishing failed: {}", e);
            for action in e.suggested_actions() {
                eprintln!("  - {}", action);
            }
            if e.is_recoverable() {
                eprintln!("  Re-running the same command may succeed.");
            }
            Ok(1)
        }
    }
}

fn render(event: &PublishEvent) {
    match event {
        PublishEvent::CreateRelease => println!("📦 Creating release..."),
        PublishEvent::CreatedRelease { release } => {
            println!("  ✅ Created release {}", release.tag_name)
        }
        PublishEvent::ReuseRelease { release } => {
            println!("♻️  Reusing release {} ({})", release.tag_name, release.id)
        }
        PublishEvent::EditRelease => println!("✏️  Editing release..."),
        PublishEvent::EditedRelease { .. } => println!("  ✅ Release updated"),
        PublishEvent::DeletedTagRelease { tag } => println!("🗑️  Deleted tag {}", tag),
        PublishEvent::UploadAsset { file_name } => println!("📤 Uploading {}", file_name),
        PublishEvent::UploadProgress(sample) => {
            println!("  {:>5.1}% {}", sample.percentage, sample.file_name)
        }
        PublishEvent::DuplicatedAsset { file_name } => {
            println!("  ⚠️  {} already exists", file_name)
        }
        PublishEvent::DuplicatedAssetDeleted { file_name } => {
            println!("  🗑️  Deleted existing {}", file_name)
        }
        PublishEvent::UploadedAsset { file_name } => println!("  ✅ Uploaded {}", file_name),
        // Reported with the outcome
        PublishEvent::Error { .. } => {}
    }
}

async fn init_command(project_path: PathBuf, force: bool) -> Result<i32> {
    let path = project_path.join(CONFIG_FILENAME);

    if tokio::fs::try_exists(&path).await.unwrap_or(false) && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    tokio::fs::write(&path, CONFIG_TEMPLATE)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("✅ Wrote {}", path.display());
    Ok(0)
}
