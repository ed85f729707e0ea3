use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::perp::Perp;
use crate::runit::Runit;
use crate::s6::S6;
use crate::types::*;

/// The control surface every suite adapter offers.
///
/// Each adapter implements all of it on its own; the suites' text formats
/// and flag letters only look alike.
pub trait Supervisor {
	fn kind(&self) -> SuiteKind;

	fn base_dir(&self) -> &Path;

	/// Re-derived from scratch on every call.
	fn status(&self) -> Result<StatusListing>;

	fn start(&self, services: &[String]) -> Result<()>;

	fn stop(&self, services: &[String]) -> Result<()>;

	fn restart(&self, services: &[String]) -> Result<()>;

	/// Fails with [`Error::UnsupportedSignal`] before running anything when
	/// the suite has no equivalent of `signal`.
	fn signal(&self, signal: Signal, services: &[String]) -> Result<()>;

	/// Follow the service's live log on stdout until interrupted.
	fn fg(&self, service: &str) -> Result<()>;

	fn rescan(&self) -> Result<()>;

	fn terminate(&self) -> Result<()>;

	fn enable(&self, _services: &[String]) -> Result<()> {
		Err(Error::UnsupportedCommand {
			command: "enable",
			suite: self.kind().name(),
		})
	}

	fn disable(&self, _services: &[String]) -> Result<()> {
		Err(Error::UnsupportedCommand {
			command: "disable",
			suite: self.kind().name(),
		})
	}

	fn service_names(&self) -> Result<Vec<String>> {
		service_dirs(self.base_dir())
	}
}

/// What a session is bound to for its lifetime.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
	pub base_dir: Option<PathBuf>,
	pub bin_dir: Option<PathBuf>,
	pub debug: bool,
}

/// Build the adapter for `kind`, falling back to the suite's usual service
/// directory when none is given.
pub fn connect(kind: SuiteKind, options: SessionOptions) -> Result<Box<dyn Supervisor>> {
	let SessionOptions {
		base_dir,
		bin_dir,
		debug: debug_mode,
	} = options;

	let base_dir = base_dir
		.or_else(|| default_dir(kind))
		.ok_or(Error::NoBaseDir { suite: kind.name() })?;
	tracing::debug!(suite = %kind, dir = %base_dir.display(), debug_mode, "session bound");

	let supervisor: Box<dyn Supervisor> = match kind {
		SuiteKind::Runit => Box::new(
			Runit::new(base_dir)
				.with_bin_dir(bin_dir)
				.with_debug(debug_mode),
		),
		SuiteKind::S6 => Box::new(S6::new(base_dir).with_bin_dir(bin_dir).with_debug(debug_mode)),
		SuiteKind::Perp => Box::new(Perp::new(base_dir).with_bin_dir(bin_dir)),
	};
	Ok(supervisor)
}

pub fn default_dir(kind: SuiteKind) -> Option<PathBuf> {
	match kind {
		SuiteKind::Runit => Runit::find_default_dir(),
		SuiteKind::S6 => S6::find_default_dir(),
		SuiteKind::Perp => Perp::find_default_dir(),
	}
}

pub(crate) fn first_existing(candidates: &[&str]) -> Option<PathBuf> {
	candidates
		.iter()
		.map(PathBuf::from)
		.find(|dir| dir.is_dir())
}

/// Names of the service directories directly under `base_dir`, sorted.
/// Symlinked directories count; dot-directories (such as s6's
/// `.s6-svscan`) do not.
pub fn service_dirs(base_dir: &Path) -> Result<Vec<String>> {
	let entries = fs::read_dir(base_dir).map_err(|source| Error::BaseDir {
		dir: base_dir.to_path_buf(),
		source,
	})?;

	let mut dirs: Vec<String> = entries
		.flatten()
		.filter(|entry| entry.path().is_dir())
		.filter_map(|entry| entry.file_name().into_string().ok())
		.filter(|name| !name.starts_with('.'))
		.collect();
	dirs.sort();
	Ok(dirs)
}

pub fn complete_service(names: &[String], prefix: &str) -> Vec<String> {
	let prefix = prefix.to_lowercase();
	names
		.iter()
		.filter(|name| name.to_lowercase().starts_with(&prefix))
		.cloned()
		.collect()
}

pub fn complete_signal(prefix: &str) -> Vec<&'static str> {
	let prefix = prefix.to_lowercase();
	Signal::ALL
		.iter()
		.map(|sig| sig.name())
		.filter(|name| name.starts_with(&prefix))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn completes_services_case_insensitively() {
		let names = vec!["Web".to_string(), "worker-1".to_string(), "db".to_string()];
		assert_eq!(complete_service(&names, "w"), vec!["Web", "worker-1"]);
		assert_eq!(complete_service(&names, ""), names);
		assert!(complete_service(&names, "x").is_empty());
	}

	#[test]
	fn completes_signals() {
		assert_eq!(complete_signal("us"), vec!["usr1", "usr2"]);
		assert_eq!(complete_signal("K"), vec!["kill"]);
		assert_eq!(complete_signal("").len(), Signal::ALL.len());
	}

	#[test]
	fn missing_base_dir_is_reported() {
		let err = service_dirs(Path::new("/nonexistent/svsh-base")).unwrap_err();
		assert!(matches!(err, Error::BaseDir { .. }));
	}
}
