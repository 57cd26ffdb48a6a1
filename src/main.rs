use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;

use hid_remapper_config::transport::HidTransport;
use hid_remapper_config::{Config, Error, Session, Usage, document};

#[derive(Parser)]
#[command(
    name = "HID Remapper config tool",
    about = "Command-line configuration tool for HID Remapper devices",
    version
)]
struct Cli {
    /// Log every frame exchanged with the device
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get info about the connected device
    Info {},
    /// Read the configuration from the device as JSON
    Get {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a JSON configuration to the device and persist it
    Set {
        /// Version 3 or 4 config document
        path: PathBuf,
    },
    /// List usages the device supports beyond a known catalog
    Usages {
        /// JSON list of known usages, e.g. ["0x00070004", ...]
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Usage to leave out of the listing
        #[arg(long)]
        ignore: Vec<Usage>,
    },
    /// Upgrade a config document to the current version
    Migrate {
        path: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the default configuration
    Default {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Reboot the device into firmware flashing mode
    Bootsel {},
    /// Flash side B with the firmware of side A
    FlashBSide {},
    /// Start pairing a new Bluetooth device
    Pair {},
    /// Forget all paired Bluetooth devices
    ClearBonds {},
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    pb
}

fn open_session() -> Result<Session<HidTransport>> {
    match Session::new_from_hid() {
        Ok(session) => Ok(session),
        Err(e @ Error::LegacyDevice { .. }) => Err(e).context(
            "The firmware is older than this tool; upgrade it or use a matching older config tool",
        ),
        Err(e) => Err(e.into()),
    }
}

fn emit(config: &Config, output: Option<PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            document::write_to_file(&path, config)?;
            log::info!("Wrote {}", path.display());
        }
        None => println!("{}", document::to_json(config)?),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = simplelog::TermLogger::init(
        if cli.verbose {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Info
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    );

    match cli.command {
        Commands::Info {} => {
            let n = HidTransport::scan_devices()?;
            log::info!("Found {} HID Remapper device(s)", n);
            let mut session = open_session()?;
            session.dump_info()?;
        }
        Commands::Get { output } => {
            let mut session = open_session()?;
            let pb = spinner("Reading config from device");
            let config = session.load_config();
            pb.finish_and_clear();
            emit(&config?, output)?;
        }
        Commands::Set { path } => {
            let config = document::read_from_file(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            let mut session = open_session()?;
            let pb = spinner("Writing config to device");
            let saved = session.save_config(&config);
            pb.finish_and_clear();
            saved.context("Save failed, the device may hold a partial configuration")?;
        }
        Commands::Usages { catalog, ignore } => {
            let known: BTreeSet<Usage> = match catalog {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)?;
                    serde_json::from_str(&raw)
                        .with_context(|| format!("Failed to parse {}", path.display()))?
                }
                None => BTreeSet::new(),
            };
            let ignored: BTreeSet<Usage> = ignore.into_iter().collect();
            let mut session = open_session()?;
            let pb = spinner("Reading usages from device");
            let extra = session.extra_usages(&known, &ignored);
            pb.finish_and_clear();
            for usage in extra? {
                println!("{}", usage);
            }
        }
        Commands::Migrate { path, output } => {
            let config = document::read_from_file(&path)?;
            emit(&config, output)?;
        }
        Commands::Default { output } => {
            emit(&Config::default(), output)?;
        }
        Commands::Bootsel {} => {
            open_session()?.reset_into_bootsel()?;
        }
        Commands::FlashBSide {} => {
            open_session()?.flash_b_side()?;
        }
        Commands::Pair {} => {
            open_session()?.pair_new_device()?;
            log::info!("Pairing started");
        }
        Commands::ClearBonds {} => {
            open_session()?.clear_bonds()?;
            log::info!("Bonds cleared");
        }
    }

    Ok(())
}
