mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CACHE_ERROR, EXIT_DESCRIPTOR_ERROR, EXIT_FAILURE};
use keel_core::config::CONFIG_FILE_NAME;
use keel_core::KernelConfig;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "keel",
    version,
    about = "Kernel component resolver with a persistent resolution cache"
)]
struct Cli {
    /// Configuration file (default: <install-dir>/keel.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Installation directory holding lib/ and the feature descriptors.
    #[arg(long, global = true)]
    install_dir: Option<PathBuf>,

    /// Cache file, overriding the configured one.
    #[arg(long, global = true)]
    cache_file: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve the kernel: boot classpath, components, and clean-start decision.
    Resolve {
        /// Ignore the existing cache and force a clean start.
        #[arg(long, default_value_t = false)]
        clean: bool,
        /// Record boot artifacts at their install locations instead of selecting jars.
        #[arg(long, default_value_t = false)]
        boot: bool,
    },
    /// Show the contents of the resolution cache.
    Inspect,
    /// Check every cached feature against the descriptors on disk.
    Verify,
    /// Delete the resolution cache file.
    Purge,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("KEEL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;
    let config = || {
        load_config(
            cli.config.as_deref(),
            cli.install_dir.as_deref(),
            cli.cache_file.as_deref(),
        )
    };
    let result = match cli.command {
        Commands::Resolve { clean, boot } => {
            config().and_then(|c| commands::resolve::run(c, clean, boot, json_output))
        }
        Commands::Inspect => config().and_then(|c| commands::inspect::run(&c, json_output)),
        Commands::Verify => config().and_then(|c| commands::verify::run(&c, json_output)),
        Commands::Purge => config().and_then(|c| commands::purge::run(&c, json_output)),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("descriptor error")
                || msg.starts_with("feature descriptor not found")
                || msg.starts_with("inclusion cycle")
            {
                EXIT_DESCRIPTOR_ERROR
            } else if msg.starts_with("store error:") || msg.starts_with("cache lock:") {
                EXIT_CACHE_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

/// Build the effective configuration: explicit file, else `keel.toml` in the
/// install directory when present, else defaults. Flags win over the file.
fn load_config(
    config_path: Option<&Path>,
    install_dir: Option<&Path>,
    cache_file: Option<&Path>,
) -> Result<KernelConfig, String> {
    let implicit = install_dir
        .unwrap_or_else(|| Path::new("."))
        .join(CONFIG_FILE_NAME);
    let mut config = match config_path {
        Some(path) => KernelConfig::load(path).map_err(|e| e.to_string())?,
        None if implicit.is_file() => KernelConfig::load(&implicit).map_err(|e| e.to_string())?,
        None => KernelConfig::default(),
    };
    if let Some(dir) = install_dir {
        config.install_dir = dir.to_path_buf();
    }
    if let Some(file) = cache_file {
        config.cache_file = file.to_path_buf();
    }
    Ok(config)
}
