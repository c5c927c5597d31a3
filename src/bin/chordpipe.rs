// Chordpipe CLI
// Runs the configured pipeline from JSON lines on stdin to JSON lines on stdout

use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use chordpipe_core::config::{default_config_content, Config};
use chordpipe_core::event::{write_events, LineSource, Pipeline};

/// Chording, macro and AltGr key event pipeline
#[derive(Parser, Debug)]
#[command(name = "chordpipe")]
#[command(version)]
#[command(about = "Chording, macro and AltGr key event pipeline", long_about = None)]
struct Args {
    /// TOML configuration file (defaults to ~/.config/chordpipe/config.toml)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Macro file, overriding [macro] file
    #[arg(short, long, value_name = "FILE")]
    macro_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate config and exit
    #[arg(long)]
    check_config: bool,

    /// Print a starter config and exit
    #[arg(long)]
    print_default_config: bool,
}

/// Main application state
struct Application {
    config: Config,
    /// Set on the first SIGINT/SIGTERM; the source ends the stream
    interrupted: Arc<AtomicBool>,
}

impl Application {
    fn new(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Config::from_toml_path(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => Config::load_default().context("failed to load default config")?,
        };
        if let Some(file) = &args.macro_file {
            match config.macros.as_mut() {
                Some(macros) => {
                    macros.file = Some(file.clone());
                    macros.no_file = false;
                }
                None => log::warn!("--macro-file given but no [macro] section is configured"),
            }
        }
        Ok(Self {
            config,
            interrupted: Arc::new(AtomicBool::new(false)),
        })
    }

    /// First signal ends the stream cleanly, a second one exits immediately
    fn install_signal_handlers(&self) -> Result<()> {
        use signal_hook::consts::TERM_SIGNALS;
        use signal_hook::flag;

        for &signal in TERM_SIGNALS {
            flag::register_conditional_shutdown(signal, 1, Arc::clone(&self.interrupted))
                .context("failed to register shutdown handler")?;
            flag::register(signal, Arc::clone(&self.interrupted))
                .context("failed to register signal handler")?;
        }
        Ok(())
    }

    fn run(self) -> Result<()> {
        self.install_signal_handlers()?;

        let stages = self.config.build_stages();
        info!("chordpipe running with {} stages", stages.len());

        let source = LineSource::new(BufReader::new(io::stdin()))
            .with_interrupt(Arc::clone(&self.interrupted));
        let pipeline = Pipeline::new(source).stages(stages);

        let stdout = io::stdout();
        let written = write_events(pipeline, stdout.lock()).context("failed to write events")?;
        debug!("wrote {} events", written);
        Ok(())
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.print_default_config {
        io::stdout().write_all(default_config_content().as_bytes())?;
        return Ok(());
    }

    let app = Application::new(&args)?;

    if args.check_config {
        let stages = app.config.build_stages();
        println!("Configuration is valid ({} stages)", stages.len());
        return Ok(());
    }

    app.run()
}
