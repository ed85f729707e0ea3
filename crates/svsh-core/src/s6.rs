//! Adapter for s6 (<https://skarnet.org/software/s6/>).

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::bytes::Regex;

use crate::error::{Error, Result};
use crate::exec::{CommandRunner, Invocation, SystemRunner};
use crate::logs;
use crate::procfs::{ProcFs, ProcessTable};
use crate::supervisor::{first_existing, service_dirs, Supervisor};
use crate::tail;
use crate::types::*;

const LOOKUP_DIRS: [&str; 2] = ["/run/service", "/service"];

static STATUS_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(up|down) \(([^)]+)\) (\d+)/").expect("valid s6 status pattern")
});

static PID_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"pid (\d+)").expect("valid s6 pid pattern"));

pub struct S6<R = SystemRunner, P = ProcFs> {
	base_dir: PathBuf,
	bin_dir: Option<PathBuf>,
	debug: bool,
	runner: R,
	procs: P,
}

impl S6 {
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

impl<R: CommandRunner, P: ProcessTable> S6<R, P> {
	pub fn with_bin_dir(mut self, bin_dir: Option<PathBuf>) -> Self {
		self.bin_dir = bin_dir;
		self
	}

	pub fn with_debug(mut self, debug: bool) -> Self {
		self.debug = debug;
		self
	}

	pub fn with_runner<R2: CommandRunner>(self, runner: R2) -> S6<R2, P> {
		S6 {
			base_dir: self.base_dir,
			bin_dir: self.bin_dir,
			debug: self.debug,
			runner,
			procs: self.procs,
		}
	}

	pub fn with_process_table<P2: ProcessTable>(self, procs: P2) -> S6<R, P2> {
		S6 {
			base_dir: self.base_dir,
			bin_dir: self.bin_dir,
			debug: self.debug,
			runner: self.runner,
			procs,
		}
	}

	fn run(&self, program: &str, args: &[&str]) -> Result<Vec<u8>> {
		let invocation =
			Invocation::in_bin_dir(self.bin_dir.as_deref(), program).args(args.iter().copied());
		self.runner.run(&invocation)
	}

	fn service_path(&self, service: &str) -> String {
		self.base_dir.join(service).display().to_string()
	}

	/// `s6-svc` addresses one service directory per call.
	fn svc_each(&self, flag: &str, services: &[String]) -> Result<()> {
		for service in services {
			let path = self.service_path(service);
			self.run("s6-svc", &[flag, path.as_str()])
				.map_err(|e| e.for_service(service.as_str()))?;
		}
		Ok(())
	}

	fn service_status(&self, name: &str) -> Result<Service> {
		let path = self.service_path(name);
		let raw = self.run("s6-svstat", &[path.as_str()])?;
		parse_status(name, &raw)
	}

	/// The logger runs as its own service under `<service>/log`.
	pub fn log_file(&self, service: &str) -> Result<Option<PathBuf>> {
		let log_dir = self.base_dir.join(service).join("log").display().to_string();
		let raw = self
			.run("s6-svstat", &[log_dir.as_str()])
			.map_err(|e| e.for_service(service))?;

		let pid = match extract_pid(&raw) {
			Some(pid) => pid,
			None => {
				tracing::debug!(service, "logger is not running");
				return Ok(None);
			}
		};
		logs::find_log_file(&self.procs, pid)
	}
}

impl<R: CommandRunner, P: ProcessTable> Supervisor for S6<R, P> {
	fn kind(&self) -> SuiteKind {
		SuiteKind::S6
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
		self.svc_each("-u", services)
	}

	fn stop(&self, services: &[String]) -> Result<()> {
		self.svc_each("-Dd", services)
	}

	fn restart(&self, services: &[String]) -> Result<()> {
		self.svc_each("-q", services)
	}

	fn signal(&self, signal: Signal, services: &[String]) -> Result<()> {
		let flag = signal_flag(signal).ok_or_else(|| Error::UnsupportedSignal {
			signal: signal.name().to_string(),
			suite: "s6",
		})?;
		self.svc_each(flag, services)
	}

	fn fg(&self, service: &str) -> Result<()> {
		let file = self.log_file(service)?.ok_or_else(|| Error::LogNotFound {
			service: service.to_string(),
		})?;
		let runtime = tokio::runtime::Runtime::new()?;
		runtime.block_on(tail::follow(&file))
	}

	fn rescan(&self) -> Result<()> {
		let base = self.base_dir.display().to_string();
		self.run("s6-svscanctl", &["-a", base.as_str()])?;
		Ok(())
	}

	fn terminate(&self) -> Result<()> {
		let base = self.base_dir.display().to_string();
		self.run("s6-svscanctl", &["-t", base.as_str()])?;
		Ok(())
	}
}

/// `s6-svc` flag for each signal it can deliver.
pub fn signal_flag(signal: Signal) -> Option<&'static str> {
	match signal {
		Signal::Alrm => Some("-a"),
		Signal::Abrt => Some("-b"),
		Signal::Quit => Some("-q"),
		Signal::Hup => Some("-h"),
		Signal::Kill => Some("-k"),
		Signal::Term => Some("-t"),
		Signal::Int => Some("-i"),
		Signal::Usr1 => Some("-1"),
		Signal::Usr2 => Some("-2"),
		Signal::Cont => Some("-c"),
		Signal::Winch => Some("-y"),
		Signal::Stop => None,
	}
}

/// Parse one `s6-svstat` line: state, a parenthesised detail blob that may
/// carry the pid, then the seconds in that state.
pub fn parse_status(name: &str, raw: &[u8]) -> Result<Service> {
	let parse_error = || Error::Parse {
		service: name.to_string(),
		raw: String::from_utf8_lossy(raw).trim_end().to_string(),
	};

	let caps = STATUS_RE.captures(raw).ok_or_else(parse_error)?;

	let status = match &caps[1] {
		b"up" => Status::Up,
		b"down" => Status::Down,
		_ => Status::Unknown,
	};

	let mut svc = Service::new(name, status);
	if status == Status::Up {
		svc.pid = extract_pid(&caps[2]);
	}
	svc.duration = std::str::from_utf8(&caps[3])
		.ok()
		.and_then(|s| s.parse().ok())
		.map(Duration::from_secs)
		.unwrap_or_default();

	Ok(svc)
}

fn extract_pid(raw: &[u8]) -> Option<u32> {
	let caps = PID_RE.captures(raw)?;
	std::str::from_utf8(&caps[1]).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_up_service() {
		let svc = parse_status("web", b"up (pid 123) 45/").unwrap();
		assert_eq!(svc.status, Status::Up);
		assert_eq!(svc.pid, Some(123));
		assert_eq!(svc.duration, Duration::from_secs(45));
	}

	#[test]
	fn pid_is_optional_inside_details() {
		let svc = parse_status("db", b"down (exitcode 0) 12/ ready").unwrap();
		assert_eq!(svc.status, Status::Down);
		assert_eq!(svc.pid, None);
		assert_eq!(svc.duration, Duration::from_secs(12));
	}

	#[test]
	fn pid_found_among_other_details() {
		let svc = parse_status("web", b"up (pid 77, want down) 3/").unwrap();
		assert_eq!(svc.pid, Some(77));
	}

	#[test]
	fn down_service_has_no_pid() {
		let svc = parse_status("web", b"down (pid 77, signal SIGTERM) 1/").unwrap();
		assert_eq!(svc.status, Status::Down);
		assert_eq!(svc.pid, None);
	}

	#[test]
	fn output_without_trailing_slash_does_not_parse() {
		let err = parse_status("web", b"up (pid 123) 45 seconds\n").unwrap_err();
		match err {
			Error::Parse { service, raw } => {
				assert_eq!(service, "web");
				assert_eq!(raw, "up (pid 123) 45 seconds");
			}
			other => panic!("unexpected error: {other}"),
		}
	}

	#[test]
	fn signal_table() {
		let supported = Signal::ALL
			.iter()
			.filter(|s| signal_flag(**s).is_some())
			.count();
		assert_eq!(supported, 11);
		assert_eq!(signal_flag(Signal::Usr1), Some("-1"));
		assert_eq!(signal_flag(Signal::Winch), Some("-y"));
		assert_eq!(signal_flag(Signal::Abrt), Some("-b"));
		assert_eq!(signal_flag(Signal::Alrm), Some("-a"));
		assert_eq!(signal_flag(Signal::Stop), None);
	}

	#[test]
	fn flag_letters_differ_from_runit() {
		assert_ne!(
			signal_flag(Signal::Int).map(|f| f.trim_start_matches('-')),
			crate::runit::signal_command(Signal::Int)
		);
		assert_ne!(
			signal_flag(Signal::Alrm).map(|f| f.trim_start_matches('-')),
			crate::runit::signal_command(Signal::Alrm)
		);
	}
}
