//! Process introspection through a `/proc`-style filesystem.
//!
//! Used only where a suite offers no native way to reach a log stream or
//! its root scanner process.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::error::{Error, Result};

/// An open descriptor of some process and what it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
	pub fd: u32,
	/// A filesystem path, or pseudo targets such as `pipe:[1234]`.
	pub target: PathBuf,
}

impl Descriptor {
	/// The file name of the target, if the target is a real path.
	pub fn file_name(&self) -> Option<&str> {
		if !self.target.is_absolute() {
			return None;
		}
		self.target.file_name().and_then(|n| n.to_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
	pub pid: u32,
	/// Arguments joined with single spaces.
	pub cmdline: String,
}

pub trait ProcessTable {
	/// Path of the binary a process is running. Fails with
	/// [`Error::ProcessNotFound`] once the process is gone.
	fn executable_of(&self, pid: u32) -> Result<PathBuf>;

	fn open_descriptors_of(&self, pid: u32) -> Result<Vec<Descriptor>>;

	/// Every process on the host. Processes that exit mid-scan are left out.
	fn list_processes(&self) -> Result<Vec<ProcessInfo>>;

	fn send_signal(&self, pid: u32, signal: Signal) -> Result<()>;
}

impl<P: ProcessTable + ?Sized> ProcessTable for &P {
	fn executable_of(&self, pid: u32) -> Result<PathBuf> {
		(**self).executable_of(pid)
	}

	fn open_descriptors_of(&self, pid: u32) -> Result<Vec<Descriptor>> {
		(**self).open_descriptors_of(pid)
	}

	fn list_processes(&self) -> Result<Vec<ProcessInfo>> {
		(**self).list_processes()
	}

	fn send_signal(&self, pid: u32, signal: Signal) -> Result<()> {
		(**self).send_signal(pid, signal)
	}
}

#[derive(Debug, Clone)]
pub struct ProcFs {
	root: PathBuf,
}

impl Default for ProcFs {
	fn default() -> Self {
		Self::new()
	}
}

impl ProcFs {
	pub fn new() -> Self {
		Self::with_root("/proc")
	}

	/// Read process state from a directory laid out like `/proc`.
	pub fn with_root(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	fn pid_dir(&self, pid: u32) -> PathBuf {
		self.root.join(pid.to_string())
	}
}

impl ProcessTable for ProcFs {
	fn executable_of(&self, pid: u32) -> Result<PathBuf> {
		let exe = self.pid_dir(pid).join("exe");
		fs::read_link(&exe).map_err(|e| not_found_as_gone(e, pid))
	}

	fn open_descriptors_of(&self, pid: u32) -> Result<Vec<Descriptor>> {
		let fd_dir = self.pid_dir(pid).join("fd");
		let entries = fs::read_dir(&fd_dir).map_err(|e| not_found_as_gone(e, pid))?;

		let mut descriptors = Vec::new();
		for entry in entries.flatten() {
			let fd = match entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) {
				Some(fd) => fd,
				None => continue,
			};
			// Descriptors close while we look at them.
			let target = match fs::read_link(entry.path()) {
				Ok(t) => t,
				Err(e) if e.kind() == ErrorKind::NotFound => continue,
				Err(e) => return Err(e.into()),
			};
			descriptors.push(Descriptor { fd, target });
		}
		descriptors.sort_by_key(|d| d.fd);
		Ok(descriptors)
	}

	fn list_processes(&self) -> Result<Vec<ProcessInfo>> {
		let entries = fs::read_dir(&self.root)?;

		let mut processes = Vec::new();
		for entry in entries.flatten() {
			let pid = match entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) {
				Some(pid) => pid,
				None => continue,
			};
			match read_cmdline(&entry.path()) {
				Ok(cmdline) => processes.push(ProcessInfo { pid, cmdline }),
				Err(e) if e.kind() == ErrorKind::NotFound => {
					tracing::warn!(pid, "process exited during scan");
				}
				Err(e) => {
					tracing::debug!(pid, error = %e, "skipping unreadable process");
				}
			}
		}
		processes.sort_by_key(|p| p.pid);
		Ok(processes)
	}

	fn send_signal(&self, pid: u32, signal: Signal) -> Result<()> {
		kill(Pid::from_raw(pid as i32), signal)?;
		Ok(())
	}
}

fn read_cmdline(pid_dir: &Path) -> std::io::Result<String> {
	let raw = fs::read(pid_dir.join("cmdline"))?;
	let args: Vec<String> = raw
		.split(|b| *b == 0)
		.filter(|arg| !arg.is_empty())
		.map(|arg| String::from_utf8_lossy(arg).into_owned())
		.collect();
	Ok(args.join(" "))
}

fn not_found_as_gone(err: std::io::Error, pid: u32) -> Error {
	if err.kind() == ErrorKind::NotFound {
		Error::ProcessNotFound { pid }
	} else {
		err.into()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn descriptor_file_name_ignores_pseudo_targets() {
		let pipe = Descriptor { fd: 0, target: PathBuf::from("pipe:[4242]") };
		assert_eq!(pipe.file_name(), None);

		let socket = Descriptor { fd: 3, target: PathBuf::from("socket:[99]") };
		assert_eq!(socket.file_name(), None);

		let file = Descriptor { fd: 4, target: PathBuf::from("/var/log/web/current") };
		assert_eq!(file.file_name(), Some("current"));
	}

	#[test]
	fn own_process_is_visible() {
		let procfs = ProcFs::new();
		let pid = std::process::id();

		let exe = procfs.executable_of(pid).unwrap();
		assert!(exe.is_absolute());

		let fds = procfs.open_descriptors_of(pid).unwrap();
		assert!(!fds.is_empty());

		let processes = procfs.list_processes().unwrap();
		assert!(processes.iter().any(|p| p.pid == pid));
	}

	#[test]
	fn missing_process_is_not_found() {
		let procfs = ProcFs::with_root("/nonexistent-proc-root");
		assert!(matches!(
			procfs.executable_of(1),
			Err(Error::ProcessNotFound { pid: 1 })
		));
		assert!(matches!(
			procfs.open_descriptors_of(1),
			Err(Error::ProcessNotFound { pid: 1 })
		));
	}
}
