use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use strum_macros::EnumString;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod command;
mod render;

#[derive(Clone, Copy, Debug, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Parser)]
#[clap(name = "yotsuba", version = env!("CARGO_PKG_VERSION"))]
struct Opt {
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count, help = "Verbosity")]
    verbosity: u8,

    #[clap(flatten)]
    general_options: GeneralOptions,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
pub struct GeneralOptions {
    #[clap(long = "config", help = "Specify sites config file to use")]
    config: Option<PathBuf>,

    #[clap(long = "color", default_value = "auto", help = "Color output (auto|always|never)")]
    color: ColorMode,
}

#[derive(Debug, Parser)]
enum Command {
    #[clap(name = "thread", about = "Load a thread once and print it")]
    Thread {
        #[clap(help = "URL of thread to load")]
        url: String,
    },
    #[clap(name = "catalog", about = "Load a board catalog once and print it")]
    Catalog {
        #[clap(help = "Catalog URL, or site/board shorthand (e.g. 4chan/g)")]
        board: String,
    },
    #[clap(name = "watch", about = "Watch a thread, printing new posts as they arrive")]
    Watch {
        #[clap(help = "URL of thread to watch")]
        url: String,
    },
}

fn main() {
    let opt = Opt::parse();

    initialize_logging(opt.verbosity);

    debug!("Debug logging enabled.");

    // Cancellation boolean.
    let cancel = Arc::new(AtomicBool::new(false));

    // Set break (Ctrl-C) handler.
    ctrlc::set_handler({
        let cancel = Arc::clone(&cancel);

        move || {
            info!("Cancellation requested by user.");
            cancel.store(true, Ordering::SeqCst);
        }
    })
    .unwrap_or_else(|err| error!("Error setting Ctrl-C handler: {}", err));

    let cmd_result = match opt.command {
        Command::Thread { url } => command::thread(&url, &opt.general_options),
        Command::Catalog { board } => command::catalog(&board, &opt.general_options),
        Command::Watch { url } => command::watch(&url, &opt.general_options, &cancel),
    };

    if let Err(err) = cmd_result {
        // Print error description to stderr
        eprintln!("{}", err.description);

        // Return the exit code that corresponds to the error kind
        std::process::exit(err.kind.exit_code());
    }
}

fn initialize_logging(verbosity: u8) {
    // Vary the output based on how many times the user used the "verbose" flag
    // (i.e. 'yotsuba -v -v -v' or 'yotsuba -vvv' vs 'yotsuba -v'
    let directive = match verbosity {
        0 => "off",
        1 => "error",
        2 => "warn",
        3 => "info",
        4 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
