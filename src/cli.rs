//! Command-line interface parsing for reqcache
//!
//! This module handles parsing of CLI arguments using clap, and turns them into a
//! [`CacheConfig`] and, for the `request` subcommand, a fully validated [`RequestArgs`].

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::cache::{Ttl, TtlError};
use crate::config::CacheConfig;
use crate::http::{Method, RequestOptions, UnknownMethod};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The HTTP method is not supported
    #[error(transparent)]
    InvalidMethod(#[from] UnknownMethod),

    /// The TTL is not -1, 0, or a positive integer
    #[error("Invalid TTL: {0}")]
    InvalidTtl(#[from] TtlError),

    /// A `--param` value without `=`
    #[error("Invalid parameter: '{0}'. Expected KEY=VALUE")]
    InvalidParam(String),

    /// A `--header` value without `:`
    #[error("Invalid header: '{0}'. Expected NAME:VALUE")]
    InvalidHeader(String),

    /// `--json` is not valid JSON
    #[error("Invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// `--user-cache` was given but there is no home directory
    #[error("Could not determine a per-user cache directory")]
    NoUserCacheDir,
}

/// reqcache - HTTP requests with a TTL-governed disk cache
#[derive(Parser, Debug)]
#[command(name = "reqcache")]
#[command(about = "HTTP requests with a TTL-governed disk cache")]
#[command(version)]
pub struct Cli {
    /// Cache directory (default: .cache in the working directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Use the per-user cache directory instead of .cache
    #[arg(long, global = true, conflicts_with = "cache_dir")]
    pub user_cache: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Issue a request through the cache and print the response body
    ///
    /// Examples:
    ///   reqcache request GET https://httpbin.org/uuid
    ///   reqcache request GET https://httpbin.org/get --param q=rust --ttl 3600
    ///   reqcache request POST https://httpbin.org/post --json '{"name":"Alice"}' --ttl -1
    Request(RequestCommand),
    /// Show cache statistics
    Info,
    /// Delete all cached responses
    Clear,
}

/// Arguments of the `request` subcommand, as typed
#[derive(Args, Debug)]
pub struct RequestCommand {
    /// HTTP method: GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS
    pub method: String,

    /// Request URL
    pub url: String,

    /// Seconds to cache the response; 0 disables caching, -1 caches forever
    #[arg(long, allow_hyphen_values = true, value_name = "SECONDS")]
    pub ttl: Option<String>,

    /// Query parameter, repeatable
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Request header, repeatable
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// Raw request body
    #[arg(short = 'd', long, conflicts_with = "json")]
    pub data: Option<String>,

    /// JSON request body
    #[arg(long)]
    pub json: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Print the status line and headers before the body
    #[arg(short = 'i', long)]
    pub include: bool,
}

/// A request described on the command line, validated and ready to send
#[derive(Debug, Clone)]
pub struct RequestArgs {
    pub method: Method,
    pub url: String,
    pub ttl: Ttl,
    pub options: RequestOptions,
    pub include: bool,
}

/// Parses a `KEY=VALUE` query parameter
pub fn parse_param(s: &str) -> Result<(String, String), CliError> {
    s.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| CliError::InvalidParam(s.to_string()))
}

/// Parses a `NAME:VALUE` header
pub fn parse_header(s: &str) -> Result<(String, String), CliError> {
    match s.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(CliError::InvalidHeader(s.to_string())),
    }
}

impl CacheConfig {
    /// Creates a CacheConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(CacheConfig)` for `--cache-dir`, `--user-cache`, or the default `.cache`
    /// * `Err(CliError::NoUserCacheDir)` if `--user-cache` cannot be resolved
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.user_cache {
            return CacheConfig::for_user().ok_or(CliError::NoUserCacheDir);
        }
        Ok(match &cli.cache_dir {
            Some(dir) => CacheConfig::with_dir(dir),
            None => CacheConfig::default(),
        })
    }
}

impl RequestArgs {
    /// Validates the `request` subcommand's arguments.
    ///
    /// The TTL falls back to the configured default when `--ttl` is absent.
    ///
    /// # Returns
    /// * `Ok(RequestArgs)` with a parsed method, TTL and request options
    /// * `Err(CliError)` for the first argument that does not parse
    pub fn from_cli(command: &RequestCommand, config: &CacheConfig) -> Result<Self, CliError> {
        let method: Method = command.method.parse()?;
        let ttl = match &command.ttl {
            Some(raw) => raw.parse::<Ttl>()?,
            None => config.default_ttl,
        };

        let mut options = RequestOptions::new();
        for param in &command.params {
            let (key, value) = parse_param(param)?;
            options = options.param(key, value);
        }
        for header in &command.headers {
            let (name, value) = parse_header(header)?;
            options = options.header(name, value);
        }
        if let Some(json) = &command.json {
            options = options.json(serde_json::from_str(json)?);
        } else if let Some(data) = &command.data {
            options = options.text(data.clone());
        }
        if let Some(secs) = command.timeout {
            options = options.timeout(Duration::from_secs(secs));
        }

        Ok(RequestArgs {
            method,
            url: command.url.clone(),
            ttl,
            options,
            include: command.include,
        })
    }
}
