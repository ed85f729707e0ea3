//! Error types shared by every suite adapter.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
	/// The control program could not be started at all.
	#[error("failed to run {program}: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},

	/// The control program ran but did not succeed.
	#[error("{program} failed ({status}): {output}")]
	CommandFailed {
		program: String,
		status: ExitStatus,
		output: String,
	},

	#[error("failed parsing {service:?} status output: {raw:?}")]
	Parse { service: String, raw: String },

	#[error("signal {signal:?} is not supported by {suite}")]
	UnsupportedSignal { signal: String, suite: &'static str },

	#[error("command {command:?} is not supported by {suite}")]
	UnsupportedCommand {
		command: &'static str,
		suite: &'static str,
	},

	#[error("no log file found for {service}")]
	LogNotFound { service: String },

	#[error("process {pid} not found")]
	ProcessNotFound { pid: u32 },

	#[error("unknown supervision suite {name:?} (expected runit, s6 or perp)")]
	UnknownSuite { name: String },

	#[error("failed reading base directory {}: {source}", dir.display())]
	BaseDir {
		dir: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("no {suite} service directory found, pass one explicitly")]
	NoBaseDir { suite: &'static str },

	#[error("tail exited unexpectedly ({status})")]
	TailFailed { status: ExitStatus },

	#[error("{service}: {source}")]
	Service {
		service: String,
		#[source]
		source: Box<Error>,
	},

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Nix(#[from] nix::Error),
}

impl Error {
	/// Attach the name of the service an operation was working on.
	pub fn for_service(self, service: impl Into<String>) -> Self {
		Error::Service {
			service: service.into(),
			source: Box::new(self),
		}
	}

	/// The innermost error, skipping service-name context.
	pub fn root(&self) -> &Error {
		match self {
			Error::Service { source, .. } => source.root(),
			other => other,
		}
	}
}
