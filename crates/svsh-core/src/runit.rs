//! Adapter for runit (<http://smarden.org/runit/>).
//!
//! Everything goes through `sv`, with `SVDIR` naming the base directory.
//! runit has no command to stop `runsvdir` itself, so termination finds it
//! in the process table.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use nix::sys::signal::Signal as SysSignal;
use regex::bytes::Regex;

use crate::error::{Error, Result};
use crate::exec::{CommandRunner, Invocation, SystemRunner};
use crate::logs;
use crate::procfs::{ProcFs, ProcessTable};
use crate::supervisor::{first_existing, service_dirs, Supervisor};
use crate::tail;
use crate::types::*;

/// Traditionally `/etc/service`; runit 1.9.0 moved the default to
/// `/service`. FHS systems keep `/etc/service`, distributions often link
/// `/etc/sv`.
const LOOKUP_DIRS: [&str; 3] = ["/etc/sv", "/etc/service", "/service"];

/// `<state>: <name>: (pid <N>) <M>s` with the name and pid parts optional.
static STATUS_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^([^:]+):(?:[^:]+:)?(?: \(pid (\d+)\))? (\d+)s")
		.expect("valid runit status pattern")
});

static LOGGER_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"log: \(pid (\d+)\)").expect("valid runit logger pattern"));

pub struct Runit<R = SystemRunner, P = ProcFs> {
	base_dir: PathBuf,
	bin_dir: Option<PathBuf>,
	debug: bool,
	runner: R,
	procs: P,
}

impl Runit {
	pub fn new(base_dir: impl Into<PathBuf>) -> Self {
		Self {
			base_dir: base_dir.into(),
			bin_dir: None,
			debug: false,
			runner: SystemRunner,
			procs: ProcFs::new(),
		}
	}

	pub fn find_default_dir() -> Option<PathBuf> {
		first_existing(&LOOKUP_DIRS)
	}
}

impl<R: CommandRunner, P: ProcessTable> Runit<R, P> {
	pub fn with_bin_dir(mut self, bin_dir: Option<PathBuf>) -> Self {
		self.bin_dir = bin_dir;
		self
	}

	pub fn with_debug(mut self, debug: bool) -> Self {
		self.debug = debug;
		self
	}

	pub fn with_runner<R2: CommandRunner>(self, runner: R2) -> Runit<R2, P> {
		Runit {
			base_dir: self.base_dir,
			bin_dir: self.bin_dir,
			debug: self.debug,
			runner,
			procs: self.procs,
		}
	}

	pub fn with_process_table<P2: ProcessTable>(self, procs: P2) -> Runit<R, P2> {
		Runit {
			base_dir: self.base_dir,
			bin_dir: self.bin_dir,
			debug: self.debug,
			runner: self.runner,
			procs,
		}
	}

	fn sv(&self, command: &str, args: &[String]) -> Result<Vec<u8>> {
		let invocation = Invocation::in_bin_dir(self.bin_dir.as_deref(), "sv")
			.arg(command)
			.args(args.iter().cloned())
			.env("SVDIR", self.base_dir.display().to_string());
		self.runner.run(&invocation)
	}

	fn full_paths(&self, services: &[String]) -> Vec<String> {
		services
			.iter()
			.map(|s| self.base_dir.join(s).display().to_string())
			.collect()
	}

	/// `sv` takes every target in one go, so a failure is reported against
	/// the whole batch.
	fn batch(&self, command: &str, services: &[String]) -> Result<()> {
		if services.is_empty() {
			return Ok(());
		}
		self.sv(command, &self.full_paths(services))
			.map(|_| ())
			.map_err(|e| e.for_service(services.join(", ")))
	}

	fn service_status(&self, name: &str) -> Result<Service> {
		let raw = self.sv("status", &[name.to_string()])?;
		parse_status(name, &raw, self.debug)
	}

	/// Path of the `current` file the service's logger writes to.
	pub fn log_file(&self, service: &str) -> Result<Option<PathBuf>> {
		let raw = self
			.sv("status", &[service.to_string()])
			.map_err(|e| e.for_service(service))?;

		let pid = match logger_pid(&raw) {
			Some(pid) => pid,
			None => {
				tracing::debug!(service, "no logger pid in status output");
				return Ok(None);
			}
		};
		logs::find_log_file(&self.procs, pid)
	}

	/// Every process running `runsvdir <base_dir>`.
	///
	/// This is a plain substring match on the command line, so a base
	/// directory that is a prefix of another one (`/etc/sv` and `/etc/sv2`)
	/// matches both scanners. Scanners started with options before the
	/// directory, such as `runsvdir -P /etc/service`, are not found.
	pub fn scanner_pids(&self) -> Result<Vec<u32>> {
		let base = self.base_dir.display().to_string();
		let trimmed = base.trim_end_matches('/');
		let needle = format!("runsvdir {}", if trimmed.is_empty() { "/" } else { trimmed });
		Ok(self
			.procs
			.list_processes()?
			.into_iter()
			.filter(|p| p.cmdline.contains(&needle))
			.map(|p| p.pid)
			.collect())
	}
}

impl<R: CommandRunner, P: ProcessTable> Supervisor for Runit<R, P> {
	fn kind(&self) -> SuiteKind {
		SuiteKind::Runit
	}

	fn base_dir(&self) -> &Path {
		&self.base_dir
	}

	fn status(&self) -> Result<StatusListing> {
		let mut services = Vec::new();

		for name in service_dirs(&self.base_dir)? {
			match self.service_status(&name) {
				Ok(svc) => services.push(svc),
				Err(e) if self.debug => return Err(e.for_service(name)),
				Err(e) => tracing::debug!(service = %name, error = %e, "skipping service"),
			}
		}

		Ok(StatusListing::Services(services))
	}

	fn start(&self, services: &[String]) -> Result<()> {
		self.batch("up", services)
	}

	fn stop(&self, services: &[String]) -> Result<()> {
		self.batch("down", services)
	}

	fn restart(&self, services: &[String]) -> Result<()> {
		self.batch("quit", services)
	}

	fn signal(&self, signal: Signal, services: &[String]) -> Result<()> {
		let command = signal_command(signal).ok_or_else(|| Error::UnsupportedSignal {
			signal: signal.name().to_string(),
			suite: "runit",
		})?;
		self.batch(command, services)
	}

	fn fg(&self, service: &str) -> Result<()> {
		let file = self.log_file(service)?.ok_or_else(|| Error::LogNotFound {
			service: service.to_string(),
		})?;
		let runtime = tokio::runtime::Runtime::new()?;
		runtime.block_on(tail::follow(&file))
	}

	fn rescan(&self) -> Result<()> {
		// runsvdir rescans on its own every five seconds.
		Err(Error::UnsupportedCommand {
			command: "rescan",
			suite: "runit",
		})
	}

	fn terminate(&self) -> Result<()> {
		for pid in self.scanner_pids()? {
			tracing::info!(pid, "sending SIGHUP to runsvdir");
			match self.procs.send_signal(pid, SysSignal::SIGHUP) {
				Ok(()) => {}
				// Gone already; that is what we wanted.
				Err(Error::Nix(nix::errno::Errno::ESRCH)) => {}
				Err(e) => return Err(e),
			}
		}
		Ok(())
	}
}

/// `sv` command for each signal it can deliver.
pub fn signal_command(signal: Signal) -> Option<&'static str> {
	match signal {
		Signal::Stop => Some("pause"),
		Signal::Cont => Some("cont"),
		Signal::Hup => Some("hup"),
		Signal::Alrm => Some("alarm"),
		Signal::Int => Some("interrupt"),
		Signal::Quit => Some("quit"),
		Signal::Usr1 => Some("1"),
		Signal::Usr2 => Some("2"),
		Signal::Term => Some("term"),
		Signal::Kill => Some("kill"),
		Signal::Winch | Signal::Abrt => None,
	}
}

/// Parse one `sv status` line. Outside debug mode an unrecognised state is
/// kept as [`Status::Unknown`]; in debug mode it is an error.
pub fn parse_status(name: &str, raw: &[u8], debug: bool) -> Result<Service> {
	let parse_error = || Error::Parse {
		service: name.to_string(),
		raw: String::from_utf8_lossy(raw).trim_end().to_string(),
	};

	let caps = STATUS_RE.captures(raw).ok_or_else(parse_error)?;

	let status = match &caps[1] {
		b"run" => Status::Up,
		b"down" => Status::Down,
		b"backoff" => Status::Backoff,
		b"disabled" => Status::Disabled,
		_ if debug => return Err(parse_error()),
		_ => Status::Unknown,
	};

	let mut svc = Service::new(name, status);
	// runit still prints the pid of a process that is finishing or being
	// taken down.
	if status == Status::Up {
		svc.pid = caps
			.get(2)
			.and_then(|m| std::str::from_utf8(m.as_bytes()).ok())
			.and_then(|s| s.parse().ok());
	}
	svc.duration = std::str::from_utf8(&caps[3])
		.ok()
		.and_then(|s| s.parse().ok())
		.map(Duration::from_secs)
		.unwrap_or_default();

	Ok(svc)
}

pub fn logger_pid(raw: &[u8]) -> Option<u32> {
	let caps = LOGGER_RE.captures(raw)?;
	std::str::from_utf8(&caps[1]).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_running_service() {
		let raw = b"run: web: (pid 123) 45s; run: log: (pid 124) 45s\n";
		let svc = parse_status("web", raw, false).unwrap();
		assert_eq!(svc.status, Status::Up);
		assert_eq!(svc.pid, Some(123));
		assert_eq!(svc.duration, Duration::from_secs(45));
	}

	#[test]
	fn parses_short_form() {
		let svc = parse_status("web", b"run: (pid 123) 45s", false).unwrap();
		assert_eq!(svc.status, Status::Up);
		assert_eq!(svc.pid, Some(123));
		assert_eq!(svc.duration, Duration::from_secs(45));

		let svc = parse_status("db", b"down: 12s", false).unwrap();
		assert_eq!(svc.status, Status::Down);
		assert_eq!(svc.pid, None);
		assert_eq!(svc.duration, Duration::from_secs(12));
	}

	#[test]
	fn missing_pid_is_not_an_error() {
		let svc = parse_status("db", b"down: /etc/sv/db: 7s, normally up\n", false).unwrap();
		assert_eq!(svc.status, Status::Down);
		assert_eq!(svc.pid, None);
		assert_eq!(svc.duration, Duration::from_secs(7));
	}

	#[test]
	fn pid_only_reported_while_up() {
		let raw = b"down: web: (pid 5) 3s, normally up, want up";
		let svc = parse_status("web", raw, false).unwrap();
		assert_eq!(svc.status, Status::Down);
		assert_eq!(svc.pid, None);
		assert_eq!(svc.duration, Duration::from_secs(3));

		let svc = parse_status("web", b"backoff: web: (pid 6) 1s", false).unwrap();
		assert_eq!(svc.status, Status::Backoff);
		assert_eq!(svc.pid, None);
	}

	#[test]
	fn parses_backoff_and_disabled() {
		assert_eq!(
			parse_status("a", b"backoff: a: 3s", false).unwrap().status,
			Status::Backoff
		);
		assert_eq!(
			parse_status("b", b"disabled: b: 0s", false).unwrap().status,
			Status::Disabled
		);
	}

	#[test]
	fn unknown_state_depends_on_debug() {
		let raw = b"finish: web: (pid 9) 1s";
		let svc = parse_status("web", raw, false).unwrap();
		assert_eq!(svc.status, Status::Unknown);
		assert_eq!(svc.pid, None);

		let err = parse_status("web", raw, true).unwrap_err();
		match err {
			Error::Parse { service, raw } => {
				assert_eq!(service, "web");
				assert_eq!(raw, "finish: web: (pid 9) 1s");
			}
			other => panic!("unexpected error: {other}"),
		}
	}

	#[test]
	fn garbage_is_a_parse_error() {
		let raw = b"warning: web: unable to open supervise/ok: file does not exist\n";
		assert!(matches!(
			parse_status("web", raw, false),
			Err(Error::Parse { .. })
		));
	}

	#[test]
	fn parsing_is_deterministic() {
		let raw = b"run: web: (pid 321) 99s; run: log: (pid 322) 99s";
		let first = parse_status("web", raw, true).unwrap();
		for _ in 0..10 {
			assert_eq!(parse_status("web", raw, true).unwrap(), first);
		}
	}

	#[test]
	fn finds_logger_pid() {
		let raw = b"run: web: (pid 123) 45s; run: log: (pid 124) 45s";
		assert_eq!(logger_pid(raw), Some(124));
		assert_eq!(logger_pid(b"run: web: (pid 123) 45s"), None);
		assert_eq!(logger_pid(b"run: web: (pid 123) 45s; down: log: 3s"), None);
	}

	#[test]
	fn signal_table() {
		let supported: Vec<Signal> = Signal::ALL
			.iter()
			.copied()
			.filter(|s| signal_command(*s).is_some())
			.collect();
		assert_eq!(supported.len(), 10);
		assert_eq!(signal_command(Signal::Stop), Some("pause"));
		assert_eq!(signal_command(Signal::Alrm), Some("alarm"));
		assert_eq!(signal_command(Signal::Int), Some("interrupt"));
		assert_eq!(signal_command(Signal::Usr1), Some("1"));
		assert_eq!(signal_command(Signal::Usr2), Some("2"));
		assert_eq!(signal_command(Signal::Winch), None);
		assert_eq!(signal_command(Signal::Abrt), None);
	}
}
