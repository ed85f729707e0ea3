//! Adapter for perp (<http://b0llix.net/perp/>).
//!
//! `perpls` output is already meant for people and is handed through
//! untouched. Control is whatever `perpctl` offers for a batch of names.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::exec::{CommandRunner, Invocation, SystemRunner};
use crate::logs::{self, CURRENT_LOG};
use crate::supervisor::{first_existing, Supervisor};
use crate::tail;
use crate::types::*;

const LOOKUP_DIRS: [&str; 1] = ["/etc/perp"];

const RC_LOG: &str = "rc.log";

/// Spellings of the service name inside an rc.log script. perp passes the
/// name as the second argument.
const NAME_PLACEHOLDERS: [&str; 4] = ["${SVNAME}", "$SVNAME", "${2}", "$2"];

pub struct Perp<R = SystemRunner> {
	base_dir: PathBuf,
	bin_dir: Option<PathBuf>,
	runner: R,
}

impl Perp {
	pub fn new(base_dir: impl Into<PathBuf>) -> Self {
		Self {
			base_dir: base_dir.into(),
			bin_dir: None,
			runner: SystemRunner,
		}
	}

	pub fn find_default_dir() -> Option<PathBuf> {
		first_existing(&LOOKUP_DIRS)
	}
}

impl<R: CommandRunner> Perp<R> {
	pub fn with_bin_dir(mut self, bin_dir: Option<PathBuf>) -> Self {
		self.bin_dir = bin_dir;
		self
	}

	pub fn with_runner<R2: CommandRunner>(self, runner: R2) -> Perp<R2> {
		Perp {
			base_dir: self.base_dir,
			bin_dir: self.bin_dir,
			runner,
		}
	}

	fn invocation(&self, program: &str) -> Invocation {
		Invocation::in_bin_dir(self.bin_dir.as_deref(), program)
			.arg("-b")
			.arg(self.base_dir.display().to_string())
	}

	fn perpctl(&self, command: &str, services: &[String]) -> Result<()> {
		if services.is_empty() {
			return Ok(());
		}
		let invocation = self.invocation("perpctl").arg(command).args(services.iter().cloned());
		self.runner
			.run(&invocation)
			.map(|_| ())
			.map_err(|e| e.for_service(services.join(", ")))
	}

	/// Where the service's logger keeps its active segment, according to
	/// the service's `rc.log`.
	pub fn log_file(&self, service: &str) -> Result<Option<PathBuf>> {
		let rc_log = self.base_dir.join(service).join(RC_LOG);
		let script = match fs::read_to_string(&rc_log) {
			Ok(s) => s,
			Err(e) if e.kind() == ErrorKind::NotFound => {
				tracing::debug!(path = %rc_log.display(), "no rc.log");
				return Ok(None);
			}
			Err(e) => return Err(Error::from(e).for_service(service)),
		};
		Ok(log_dir_from_rc_log(&script, service).map(|dir| dir.join(CURRENT_LOG)))
	}
}

impl<R: CommandRunner> Supervisor for Perp<R> {
	fn kind(&self) -> SuiteKind {
		SuiteKind::Perp
	}

	fn base_dir(&self) -> &Path {
		&self.base_dir
	}

	fn status(&self) -> Result<StatusListing> {
		let output = self.runner.run(&self.invocation("perpls"))?;
		Ok(StatusListing::Text(String::from_utf8_lossy(&output).into_owned()))
	}

	fn start(&self, services: &[String]) -> Result<()> {
		self.perpctl("U", services)
	}

	fn stop(&self, services: &[String]) -> Result<()> {
		self.perpctl("D", services)
	}

	fn restart(&self, services: &[String]) -> Result<()> {
		self.perpctl("D", services)?;
		self.perpctl("U", services)
	}

	fn signal(&self, signal: Signal, _services: &[String]) -> Result<()> {
		Err(Error::UnsupportedSignal {
			signal: signal.name().to_string(),
			suite: "perp",
		})
	}

	fn fg(&self, service: &str) -> Result<()> {
		let file = self.log_file(service)?.ok_or_else(|| Error::LogNotFound {
			service: service.to_string(),
		})?;
		let runtime = tokio::runtime::Runtime::new()?;
		runtime.block_on(tail::follow(&file))
	}

	fn rescan(&self) -> Result<()> {
		Err(Error::UnsupportedCommand {
			command: "rescan",
			suite: "perp",
		})
	}

	fn terminate(&self) -> Result<()> {
		Err(Error::UnsupportedCommand {
			command: "terminate",
			suite: "perp",
		})
	}

	fn enable(&self, services: &[String]) -> Result<()> {
		self.perpctl("A", services)
	}

	fn disable(&self, services: &[String]) -> Result<()> {
		self.perpctl("X", services)
	}
}

/// Find the directory handed to the logger in an rc.log script.
///
/// Takes the first absolute path following a known logger name on a
/// non-comment line, with the service-name placeholder filled in.
pub fn log_dir_from_rc_log(script: &str, service: &str) -> Option<PathBuf> {
	for line in script.lines() {
		let line = line.trim();
		if line.starts_with('#') {
			continue;
		}

		let mut words = line.split_whitespace();
		let found_logger = words.by_ref().any(|word| {
			let program = word.rsplit('/').next().unwrap_or(word);
			logs::is_logger(program)
		});
		if !found_logger {
			continue;
		}

		let path = words
			.map(|word| word.trim_matches(|c| c == '"' || c == '\'' || c == ';'))
			.find(|word| word.starts_with('/'));
		if let Some(path) = path {
			let mut resolved = path.to_string();
			for placeholder in NAME_PLACEHOLDERS {
				resolved = resolved.replace(placeholder, service);
			}
			return Some(PathBuf::from(resolved));
		}
	}
	None
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reads_tinylog_directory() {
		let script = "#!/bin/sh\nexec tinylog -k 8 -s 100000 -t -z /var/log/perp/${2}\n";
		assert_eq!(
			log_dir_from_rc_log(script, "web"),
			Some(PathBuf::from("/var/log/perp/web"))
		);
	}

	#[test]
	fn accepts_logger_given_by_path() {
		let script = "exec /usr/sbin/svlogd -tt \"/var/log/$SVNAME\"";
		assert_eq!(
			log_dir_from_rc_log(script, "db"),
			Some(PathBuf::from("/var/log/db"))
		);
	}

	#[test]
	fn skips_comments_and_other_lines() {
		let script = "\
#!/bin/sh
# exec multilog t /var/log/old/$2
start() {
  exec multilog t s999999 /var/log/$2 ;
}
";
		assert_eq!(
			log_dir_from_rc_log(script, "cache"),
			Some(PathBuf::from("/var/log/cache"))
		);
	}

	#[test]
	fn no_logger_means_no_directory() {
		assert_eq!(log_dir_from_rc_log("exec cat > /dev/null\n", "web"), None);
		assert_eq!(log_dir_from_rc_log("exec tinylog -k 8\n", "web"), None);
		assert_eq!(log_dir_from_rc_log("", "web"), None);
	}
}
