use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::procfs::ProcessTable;

/// Loggers that keep the active segment in a file called `current`.
pub const LOGGERS: [&str; 4] = ["tinylog", "s6-log", "svlogd", "multilog"];

pub const CURRENT_LOG: &str = "current";

pub fn is_logger(program: &str) -> bool {
	LOGGERS.contains(&program)
}

/// Find the live log file a logger process is writing to.
///
/// `Ok(None)` covers every "nothing to tail" case: the process is not one of
/// the known loggers, it holds no `current` file open, or it exited while we
/// were looking.
pub fn find_log_file<P: ProcessTable + ?Sized>(procs: &P, pid: u32) -> Result<Option<PathBuf>> {
	let exe = match procs.executable_of(pid) {
		Ok(exe) => exe,
		Err(Error::ProcessNotFound { .. }) => {
			tracing::warn!(pid, "logger process is gone");
			return Ok(None);
		}
		Err(e) => return Err(e),
	};

	let name = exe.file_name().and_then(|n| n.to_str()).unwrap_or_default();
	if !is_logger(name) {
		tracing::debug!(pid, exe = %exe.display(), "not a known logger");
		return Ok(None);
	}

	let descriptors = match procs.open_descriptors_of(pid) {
		Ok(d) => d,
		Err(Error::ProcessNotFound { .. }) => {
			tracing::warn!(pid, "logger process is gone");
			return Ok(None);
		}
		Err(e) => return Err(e),
	};

	Ok(descriptors
		.into_iter()
		.find(|d| d.file_name() == Some(CURRENT_LOG))
		.map(|d| d.target))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn known_loggers() {
		assert!(is_logger("svlogd"));
		assert!(is_logger("s6-log"));
		assert!(is_logger("multilog"));
		assert!(is_logger("tinylog"));
		assert!(!is_logger("logger"));
		assert!(!is_logger("sv"));
	}
}
