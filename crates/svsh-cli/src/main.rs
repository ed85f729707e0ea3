mod config;
mod output;
mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use svsh_core::{connect, Signal, SuiteKind, Supervisor};
use tracing::Level;

use config::{Overrides, Settings};
use output::View;

#[derive(Debug, Parser)]
#[command(name = "svsh", version, about = "Process supervision shell for runit, s6 and perp")]
struct Cli {
	/// Supervision suite to talk to (runit, s6 or perp)
	#[arg(short, long)]
	suite: Option<SuiteKind>,

	/// Service directory (defaults to the suite's usual location)
	#[arg(short = 'd', long)]
	basedir: Option<PathBuf>,

	/// Directory holding the suite's programs, if not on PATH
	#[arg(short = 'b', long)]
	bindir: Option<PathBuf>,

	/// Fold numbered instances (worker-1, worker-2) into one row
	#[arg(short, long)]
	collapse: bool,

	/// Fail on unparseable status output and log every command
	#[arg(long)]
	debug: bool,

	/// Print status as JSON
	#[arg(long)]
	json: bool,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Show the status of every service
	#[command(alias = "st")]
	Status,
	/// Start services
	Start {
		#[arg(required = true)]
		services: Vec<String>,
	},
	/// Stop services
	Stop {
		#[arg(required = true)]
		services: Vec<String>,
	},
	/// Restart services
	Restart {
		#[arg(required = true)]
		services: Vec<String>,
	},
	/// Send a signal to services
	#[command(alias = "sig")]
	Signal {
		signal: Signal,
		#[arg(required = true)]
		services: Vec<String>,
	},
	/// Follow a service's log until interrupted
	Fg { service: String },
	/// Make the scanner look for new service directories
	#[command(alias = "update")]
	Rescan,
	/// Stop the scanner and every service under it
	#[command(alias = "shutdown")]
	Terminate,
	/// Enable services (perp)
	Enable {
		#[arg(required = true)]
		services: Vec<String>,
	},
	/// Disable services (perp)
	Disable {
		#[arg(required = true)]
		services: Vec<String>,
	},
	/// Print the version
	Version,
}

fn main() {
	let cli = Cli::parse();

	if let Some(Command::Version) = cli.command {
		print_version();
		return;
	}

	let settings = Settings::resolve(
		config::load_config(),
		Overrides {
			suite: cli.suite,
			basedir: cli.basedir,
			bindir: cli.bindir,
			collapse: cli.collapse,
			debug: cli.debug,
		},
	);
	init_logging(settings.debug);

	let kind = match settings.suite {
		Some(kind) => kind,
		None => {
			let config_file = config::config_dir().join("config.toml");
			eprintln!("pass --suite <runit|s6|perp> or set `suite` in {}", config_file.display());
			fail("no supervision suite selected");
		}
	};

	let sv = match connect(kind, settings.session()) {
		Ok(sv) => sv,
		Err(e) => fail(e),
	};

	let mut view = View {
		collapse: settings.collapse,
		json: cli.json,
	};

	match cli.command {
		Some(command) => {
			if let Err(e) = execute(sv.as_ref(), command, &view) {
				fail(e);
			}
		}
		None => {
			if let Err(e) = execute(sv.as_ref(), Command::Status, &view) {
				eprintln!("{} {}", "error:".red(), e);
			}
			if let Err(e) = shell::run(sv.as_ref(), &mut view) {
				fail(e);
			}
		}
	}
}

fn init_logging(debug: bool) {
	let level = if debug { Level::DEBUG } else { Level::WARN };
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_max_level(level)
		.without_time()
		.init();
}

fn fail(e: impl std::fmt::Display) -> ! {
	eprintln!("{} {}", "error:".red(), e);
	std::process::exit(1);
}

fn print_version() {
	println!("svsh {}", env!("CARGO_PKG_VERSION"));
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
	#[error(transparent)]
	Supervisor(#[from] svsh_core::Error),
	#[error("failed to render status: {0}")]
	Output(#[from] serde_json::Error),
}

/// Run one command against the session's supervisor.
pub fn execute(sv: &dyn Supervisor, command: Command, view: &View) -> Result<(), ExecError> {
	match command {
		Command::Status => output::print_listing(&sv.status()?, *view)?,
		Command::Start { services } => sv.start(&services)?,
		Command::Stop { services } => sv.stop(&services)?,
		Command::Restart { services } => sv.restart(&services)?,
		Command::Signal { signal, services } => sv.signal(signal, &services)?,
		Command::Fg { service } => sv.fg(&service)?,
		Command::Rescan => sv.rescan()?,
		Command::Terminate => sv.terminate()?,
		Command::Enable { services } => sv.enable(&services)?,
		Command::Disable { services } => sv.disable(&services)?,
		Command::Version => print_version(),
	}
	Ok(())
}
