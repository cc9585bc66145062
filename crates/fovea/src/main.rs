//! Fovea launcher.
//!
//! One process hosts the HTTP ingress and the background worker; they
//! share the job table and must never be split into separate processes
//! against the same database file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use fovea_logging::{init_logging, LogConfig};
use fovea_plugins::{builtin, PluginContext, PluginRegistry};

use fovea::config::{self, ConfigArgs, FileSettings};
use fovea::runtime::Runtime;

#[derive(Parser)]
#[command(name = "fovea", version, about = "Media analysis plugin server")]
struct Cli {
    /// Mirror the log file on stderr at full verbosity
    #[arg(long, global = true)]
    verbose: bool,

    /// Optional TOML settings file; its values override the environment
    #[arg(long, global = true, env = "FOVEA_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    settings: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server and the background worker
    Serve,
    /// List the plugins that load with the current configuration
    Plugins,
    /// Resolve and print the configuration, then exit
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let file_settings = match &cli.config {
        Some(path) => match config::load_file(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("fovea: {e:#}");
                return ExitCode::FAILURE;
            }
        },
        None => FileSettings::default(),
    };

    let result = match cli.command {
        Command::Serve => serve(&cli, file_settings),
        Command::Plugins => plugins(&cli),
        Command::Config => print_config(&cli, file_settings),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("fovea: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn serve(cli: &Cli, file_settings: FileSettings) -> Result<()> {
    let system = config::resolve(&cli.settings, file_settings)?;

    init_logging(LogConfig {
        app_name: "fovea",
        log_dir: system.data_root.join("logs"),
        verbose: cli.verbose,
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let runtime = Runtime::build(system).await?;
        runtime.serve().await
    })
}

fn plugins(cli: &Cli) -> Result<()> {
    let ctx = PluginContext {
        search_path: cli
            .settings
            .plugin_search_path
            .as_deref()
            .map(|raw| raw.split(':').map(PathBuf::from).collect())
            .unwrap_or_default(),
    };
    let registry = PluginRegistry::load_all(builtin::all(), &ctx);

    for summary in registry.list() {
        println!("{}  v{}  {}", summary.id, summary.version, summary.description);
        let manifest = registry
            .manifest(&summary.id)
            .expect("listed plugin has a manifest");
        for tool in manifest.tools {
            let kinds: Vec<&str> = tool.input_kinds.iter().map(|k| k.as_str()).collect();
            println!("    {}  [{}]  {}", tool.name, kinds.join(", "), tool.description);
        }
    }
    Ok(())
}

fn print_config(cli: &Cli, file_settings: FileSettings) -> Result<()> {
    let system = config::resolve(&cli.settings, file_settings)?;
    println!("{system:#?}");
    Ok(())
}
