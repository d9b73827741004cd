use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use r2media::config::{self, mask};
use r2media::s3::{Cleanup, ObjectStorageClient};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "r2media")]
#[command(version, about = "Upload, replace and delete images on Cloudflare R2", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (environment variables are used when omitted)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Profile to use from config
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether credentials are configured
    Status,

    /// Upload an image and print its public URL
    Upload {
        /// Local image file
        file: PathBuf,

        /// Target folder (defaults to the portfolio folder)
        #[arg(long)]
        folder: Option<String>,
    },

    /// Upload a replacement image, then remove the old one
    Update {
        /// Local image file
        file: PathBuf,

        /// Public URL of the image being replaced
        #[arg(long)]
        old_url: Option<String>,

        /// Target folder (defaults to the portfolio folder)
        #[arg(long)]
        folder: Option<String>,
    },

    /// Delete the image behind a public URL
    Delete {
        /// Public URL
        url: String,
    },

    /// Print the object key a URL maps to
    Key {
        /// Public or endpoint URL
        url: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // One command per process; a single thread is plenty
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let config = config::load_config(cli.config.as_deref(), cli.profile.as_deref())?;
    let folders = config.folders.clone();
    let profile = config.active_profile();

    let client = ObjectStorageClient::new(profile.clone())
        .context("Failed to create storage client")?
        .with_folders(folders.clone());

    match cli.command {
        Commands::Status => {
            if client.is_configured() {
                println!("configured");
            } else {
                println!("not configured (missing: {})", profile.missing_fields().join(", "));
            }
            println!("  access key:  {}", mask(&profile.access_key_id));
            println!("  region:      {}", profile.region());
            println!("  endpoint:    {}", profile.endpoint);
            println!("  bucket:      {}", profile.bucket);
            println!("  public base: {}", profile.public_url_base);
        }
        Commands::Upload { file, folder } => {
            let folder = folder.unwrap_or(folders.portfolio);
            let url = client
                .upload_file(&file, &folder)
                .await
                .context(format!("Upload of {} failed", file.display()))?;
            println!("{}", url);
        }
        Commands::Update {
            file,
            old_url,
            folder,
        } => {
            let folder = folder.unwrap_or(folders.portfolio);
            let report = client
                .update_file(old_url.as_deref(), &file, &folder)
                .await
                .context(format!("Update with {} failed", file.display()))?;
            println!("{}", report.url);
            match report.cleanup {
                Cleanup::Skipped => {}
                Cleanup::Deleted => eprintln!("previous image removed"),
                Cleanup::Failed(e) => eprintln!("previous image left in place: {}", e),
            }
        }
        Commands::Delete { url } => {
            client
                .delete(&url)
                .await
                .context(format!("Delete of {} failed", url))?;
            println!("deleted");
        }
        Commands::Key { url } => match client.key_for_url(&url) {
            Some(key) => println!("{}", key),
            None => anyhow::bail!("{} is not an object in bucket '{}'", url, profile.bucket),
        },
    }

    Ok(())
}
