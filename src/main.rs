mod commands;
mod fs_config;

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use commands::{dir, doctor, pack, DirArgs, PackArgs};
use fs_config::GitzipConfig;

#[derive(Parser, Debug)]
#[command(
    name = "gitzip",
    version,
    about = "Package a directory of a git repository as a ZIP archive",
    long_about = None
)]
struct Cli {
    /// Config file (defaults to ./gitzip.toml when present)
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check out a branch into a temp dir and zip a subdirectory of it
    Pack(PackArgs),
    /// Zip a local directory
    Dir(DirArgs),
    /// Report whether git and the config file are usable
    Doctor,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Some(command) => {
            let loaded = match &cli.config {
                Some(path) => GitzipConfig::load_from_path(path),
                None => GitzipConfig::load_default(),
            };
            match command {
                Commands::Pack(args) => pack::run(&loaded?, args),
                Commands::Dir(args) => dir::run(&loaded?, args),
                Commands::Doctor => doctor::run(loaded),
            }
        }
        None => {
            print_top_level_help();
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_top_level_help() {
    println!("gitzip: package part of a git repository as a ZIP\n");
    println!("Common workflows:");
    println!("  gitzip pack --origin <url> --subdir src --output src.zip");
    println!("  gitzip dir ./build --prefix app --output app.zip");
    println!("  gitzip doctor\n");
    println!("For full help: gitzip --help or gitzip help <command>.");
}
