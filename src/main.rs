use chat_export_html::error::ExportError;
#[cfg(not(feature = "sequential"))]
use chat_export_html::parallel;
#[cfg(feature = "sequential")]
use chat_export_html::sequential;
use chat_export_html::utils;
use clap::Parser;
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Convert a ChatGPT conversation export into HTML files with a chat/SMS theme.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the zip file containing the conversation export.
    #[arg(value_name = "ZIP_FILE")]
    zip_file: PathBuf,

    /// Directory to write the HTML pages to.
    /// Defaults to ./Conversations_HTML if not set in config.
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Number of worker threads. Defaults to the number of CPUs.
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    jobs: Option<u16>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/chat-export-html/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print each page written.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress standard output (progress bar and summary).
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    output_dir: Option<PathBuf>,
    jobs: Option<usize>,
}

const DEFAULT_OUTPUT_DIR: &str = "Conversations_HTML";

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        // Search: XDG/OS config dir, then nothing
        dirs::config_dir()
            .map(|d| d.join("chat-export-html/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

fn run(cli: Cli) -> Result<utils::ExportSummary, ExportError> {
    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref()).map_err(ExportError::Config)?;

    // 2. Resolve output_dir (CLI > Config > Default), relative to the working directory
    let output_dir = cli
        .output_dir
        .or(file_cfg.output_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let output_dir = if output_dir.is_absolute() {
        output_dir
    } else {
        std::env::current_dir()
            .wrap_err("Failed to read current directory")
            .map_err(ExportError::Output)?
            .join(output_dir)
    };

    // 3. Resolve worker count (CLI > Config > CPU count)
    let jobs = cli
        .jobs
        .map(usize::from)
        .or(file_cfg.jobs)
        .filter(|&n| n > 0);

    // 4. Build the Export Config
    let config = utils::ExportConfig {
        zip_path: cli.zip_file,
        output_dir,
        jobs,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    // 5. Run the Business Logic
    #[cfg(feature = "sequential")]
    return sequential::execute(&config);

    #[cfg(not(feature = "sequential"))]
    parallel::execute(&config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
