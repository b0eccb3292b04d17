//! reqcache - HTTP requests with a TTL-governed disk cache
//!
//! A small command-line front end over the library: issue a request through the
//! cache, inspect the cache directory, or clear it.

use std::error::Error;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reqcache::cli::{Cli, Command, RequestArgs};
use reqcache::{CacheConfig, CacheManager, CachedClient, CachedResponse};

/// Logs go to stderr so response bodies on stdout stay clean
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reqcache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Writes the status line and headers, curl `-i` style
fn write_head(out: &mut impl Write, response: &CachedResponse) -> io::Result<()> {
    writeln!(
        out,
        "HTTP {} {}",
        response.status(),
        response.reason().unwrap_or_default()
    )?;
    for (name, values) in response.headers() {
        for value in values {
            writeln!(out, "{}: {}", name, value)?;
        }
    }
    writeln!(out)
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = CacheConfig::from_cli(&cli)?;

    match &cli.command {
        Command::Info => {
            let stats = CacheManager::with_dir(config.cache_dir()).stats()?;
            println!("cache dir: {}", stats.cache_dir.display());
            println!("exists: {}", stats.exists);
            println!("total files: {}", stats.total_files);
            println!("valid entries: {}", stats.valid_entries);
            println!("expired entries: {}", stats.expired_entries);
            println!("total size: {} bytes ({:.2} MB)", stats.total_size_bytes, stats.total_size_mb());
        }
        Command::Clear => {
            let report = CacheManager::with_dir(config.cache_dir()).clear();
            println!("Deleted {} cache files", report.deleted);
            if !report.is_complete() {
                for failure in &report.failures {
                    eprintln!("failed: {}", failure);
                }
                return Err(format!("{} cache files could not be deleted", report.failures.len()).into());
            }
        }
        Command::Request(command) => {
            let RequestArgs {
                method,
                url,
                ttl,
                options,
                include,
            } = RequestArgs::from_cli(command, &config)?;

            let client = CachedClient::new(config);
            let response = client.request(method, &url, ttl, options).await?;
            info!(
                status = response.status(),
                from_cache = response.from_cache(),
                "{} {}",
                method,
                url
            );

            let mut stdout = io::stdout().lock();
            if include {
                write_head(&mut stdout, &response)?;
            }
            stdout.write_all(response.body())?;
            stdout.flush()?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
