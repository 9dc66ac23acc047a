use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use iaito::config::Config;
use iaito::decompiler::{parse_address, AnnotationKind, Decompiler, PdcDecompiler};
use iaito::engine::R2Engine;
use iaito::plugins::{PluginManager, PluginPaths};

/// Iaito - plugin host and decompiler front-end for radare2
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect and load plugins
    Plugins {
        #[command(subcommand)]
        action: PluginsAction,
    },

    /// Decompile the function at ADDRESS with radare2's pdc
    Decompile {
        /// Binary to open in radare2
        binary: String,

        /// Address, decimal or 0x-prefixed hex
        address: String,
    },
}

#[derive(Subcommand, Debug)]
enum PluginsAction {
    /// List the plugin directories in search order
    Dirs,

    /// Load every plugin, list what loaded and shut them down again
    Load {
        /// Do not load any plugin
        #[arg(long)]
        disable: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so command output stays clean
    let log_level = if args.debug { "debug" } else { "info" };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global default subscriber")?;

    let config = if let Some(config_path) = args.config {
        Config::load_from_file(&config_path)?
    } else {
        Config::load_default()?
    };

    match args.command {
        Command::Plugins { action } => run_plugins(&config, action),
        Command::Decompile { binary, address } => {
            let address = parse_address(&address)
                .with_context(|| format!("Invalid address: {address}"))?;
            run_decompile(&config, &binary, address).await
        }
    }
}

fn run_plugins(config: &Config, action: PluginsAction) -> Result<()> {
    let mut manager = PluginManager::new(PluginPaths::from_environment(
        &config.plugins.extra_dirs,
    ));

    match action {
        PluginsAction::Dirs => {
            match manager.user_plugins_directory() {
                Some(dir) => println!("user: {}", dir.display()),
                None => println!("user: (none)"),
            }
            for dir in manager.plugin_directories() {
                println!("{}", dir.display());
            }
        }
        PluginsAction::Load { disable } => {
            manager.load_plugins(config.plugins.enabled && !disable);
            println!("{} plugin(s) loaded", manager.len());
            for name in manager.plugin_names() {
                println!("  {name}");
            }
            manager.destroy_plugins();
        }
    }

    Ok(())
}

async fn run_decompile(config: &Config, binary: &str, address: u64) -> Result<()> {
    let engine = Arc::new(R2Engine::new(binary, &config.decompiler)?);
    let (decompiler, mut finished) = PdcDecompiler::new(engine);

    if !decompiler.is_available().await {
        bail!("the {} decompiler is not available in this radare2", decompiler.name());
    }

    decompiler.decompile_at(address);
    let code = finished
        .recv()
        .await
        .context("Decompiler finished without a result")?;

    print!("{}", code.code);
    if !code.code.ends_with('\n') {
        println!();
    }
    for annotation in &code.annotations {
        match annotation.kind {
            AnnotationKind::Offset { offset } => {
                println!("[{}, {}) -> {:#x}", annotation.start, annotation.end, offset);
            }
        }
    }

    Ok(())
}
