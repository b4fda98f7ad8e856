use std::path::Path;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use coverstash::application::{
    PrefetchOutcome, collect_slide_requests, collect_startup_requests,
};
use coverstash::domain::AssetCachePort;
use coverstash::domain::entities::Catalog;
use coverstash::infrastructure::config::{ClearTarget, Command};
use coverstash::infrastructure::{AppConfig, CliArgs, MediaServices, StorageManager};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn read_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read catalog {}", path.display()))?;
    serde_json::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse catalog {}", path.display()))
}

async fn run(command: Command, services: &MediaServices) -> Result<()> {
    match command {
        Command::Prefetch {
            catalog,
            slides,
            force,
        } => {
            let catalog = read_catalog(&catalog)?;
            let startup = collect_startup_requests(&catalog.books, &catalog.categories);

            if force {
                let report = services.prefetch().prefetch_media(startup).await;
                println!("prefetched: {report}");
            } else {
                match services.prefetch().prefetch_if_needed(startup).await {
                    PrefetchOutcome::AlreadyWarm => println!("already warm, nothing to do"),
                    PrefetchOutcome::Empty => println!("no locators in catalog"),
                    PrefetchOutcome::Completed(report) => println!("prefetched: {report}"),
                }
            }

            if slides {
                let report = services
                    .prefetch()
                    .prefetch_media(collect_slide_requests(&catalog.slides))
                    .await;
                println!("slides: {report}");
            }
        }
        Command::Fetch { url, video } => {
            if video {
                let path = services
                    .videos()
                    .fetch_if_needed(&url)
                    .await
                    .ok_or_else(|| eyre!("Could not fetch video {url}"))?;
                println!("{}", path.display());
            } else {
                let image = services
                    .images()
                    .fetch_if_needed(&url)
                    .await
                    .ok_or_else(|| eyre!("Could not fetch image {url}"))?;
                println!("{}x{}", image.width(), image.height());
            }
        }
        Command::Lookup { url, video } => {
            let cached = if video {
                services.videos().lookup(&url).await.is_some()
            } else {
                services.images().lookup(&url).await.is_some()
            };
            println!("{}", if cached { "cached" } else { "not cached" });
        }
        Command::Stats => {
            let stats = services.stats().await;
            println!("memory: {}", stats.memory);
            println!(
                "images: {} files, {} bytes",
                stats.images.files, stats.images.bytes
            );
            println!(
                "videos: {} files, {} bytes",
                stats.videos.files, stats.videos.bytes
            );
            println!("warm: {}", services.prefetch().is_warm().await);
        }
        Command::Clear { target } => {
            match target {
                ClearTarget::Images => services.images().clear().await,
                ClearTarget::Videos => services.videos().clear().await,
                ClearTarget::All => services.clear_all().await,
            }
            println!("cleared");
        }
        Command::ResetWarm => {
            services
                .prefetch()
                .reset_warm_flag()
                .await
                .wrap_err("Failed to reset warm flag")?;
            println!("warm flag cleared");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let storage = StorageManager::new()?;
    let mut config = storage
        .load_config(args.config.as_deref())
        .wrap_err("Failed to load configuration")?;
    config.merge_with_args(&args);

    init_logging(&config)?;

    info!(version = coverstash::VERSION, "Starting {}", coverstash::NAME);

    let services = MediaServices::from_config(&config, storage.settings_path())
        .await
        .wrap_err("Failed to open media caches")?;

    run(args.command, &services).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use coverstash::application::PrefetchRequest;
    use coverstash::domain::entities::EntityRef;

    #[test]
    fn test_read_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"{"books": [{"id": 1, "title": "Dune", "cover": "https://cdn.example.com/1.jpg"}]}"#,
        )
        .unwrap();

        let catalog = read_catalog(&path).unwrap();

        assert_eq!(catalog.books.len(), 1);
        assert!(catalog.slides.is_empty());
        assert_eq!(
            collect_startup_requests(&catalog.books, &catalog.categories),
            vec![
                PrefetchRequest::image("https://cdn.example.com/1.jpg")
                    .with_entity(EntityRef::Book(1))
            ]
        );
    }

    #[test]
    fn test_read_catalog_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "{").unwrap();

        assert!(read_catalog(&path).is_err());
    }
}
