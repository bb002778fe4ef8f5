//! Keep Layout CLI
//!
//! Usage:
//!   keep-layout [OPTIONS] [FILE]
//!
//! Options:
//!   -c, --config <FILE>  Layout configuration (TOML format)
//!   -v, --verbose        Log constraint changes (repeat for more detail)
//!   -h, --help           Print help

use std::io::{self, Read};
use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use keep_layout::{layout_scene_file, layout_scene_with_config, LayoutConfig, SceneError};

#[derive(Parser)]
#[command(name = "keep-layout")]
#[command(about = "Lay out a scene of views from declarative keep rules")]
struct Cli {
    /// Scene file (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Layout configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log constraint changes; -vv also logs ancestor resolution
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
    if result.is_err() {
        eprintln!("keep-layout: tracing subscriber failed to initialize");
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.input {
        Some(path) => layout_scene_file(path, cli.config.as_deref()),
        None => {
            let mut buffer = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut buffer) {
                eprintln!("Error reading from stdin: {}", e);
                std::process::exit(1);
            }
            match &cli.config {
                Some(path) => LayoutConfig::from_file(path)
                    .map_err(SceneError::from)
                    .and_then(|config| layout_scene_with_config(&buffer, config)),
                None => layout_scene_with_config(&buffer, LayoutConfig::default()),
            }
        }
    };

    match result {
        Ok(report) => print!("{}", report),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
