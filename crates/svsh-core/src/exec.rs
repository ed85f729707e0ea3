use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// A single short-lived control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
	pub program: PathBuf,
	pub args: Vec<String>,
	/// Replaces the inherited environment entirely when set.
	pub env: Option<Vec<(String, String)>>,
}

impl Invocation {
	pub fn new(program: impl Into<PathBuf>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
			env: None,
		}
	}

	/// Resolve `program` under `bin_dir` when one is configured.
	pub fn in_bin_dir(bin_dir: Option<&Path>, program: &str) -> Self {
		match bin_dir {
			Some(dir) => Self::new(dir.join(program)),
			None => Self::new(program),
		}
	}

	pub fn arg(mut self, arg: impl Into<String>) -> Self {
		self.args.push(arg.into());
		self
	}

	pub fn args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.args.extend(args.into_iter().map(Into::into));
		self
	}

	pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.env
			.get_or_insert_with(Vec::new)
			.push((key.into(), value.into()));
		self
	}

	pub fn program_name(&self) -> String {
		self.program.display().to_string()
	}
}

/// Runs control commands to completion. Adapters never spawn anything
/// long-lived through this; the log tail has its own path.
pub trait CommandRunner {
	/// Returns stdout and stderr interleaved, or an error when the program
	/// is missing or does not exit successfully.
	fn run(&self, invocation: &Invocation) -> Result<Vec<u8>>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
	fn run(&self, invocation: &Invocation) -> Result<Vec<u8>> {
		(**self).run(invocation)
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
	fn run(&self, invocation: &Invocation) -> Result<Vec<u8>> {
		let program = invocation.program_name();
		tracing::debug!(%program, args = ?invocation.args, "running control command");

		// One pipe for both streams keeps their output in write order.
		let (mut reader, writer) = std::io::pipe()?;
		let stderr_writer = writer.try_clone()?;

		let mut cmd = match &invocation.env {
			// The replacement environment has no PATH of its own, so look the
			// program up against ours before clearing it.
			Some(_) => Command::new(resolve_program(&invocation.program)),
			None => Command::new(&invocation.program),
		};
		cmd.args(&invocation.args)
			.stdin(Stdio::null())
			.stdout(writer)
			.stderr(stderr_writer);

		if let Some(env) = &invocation.env {
			cmd.env_clear();
			for (key, val) in env {
				cmd.env(key, val);
			}
		}

		let mut child = cmd.spawn().map_err(|source| Error::Spawn {
			program: program.clone(),
			source,
		})?;
		// The command still holds the write ends; reading would never hit EOF.
		drop(cmd);

		let mut output = Vec::new();
		reader.read_to_end(&mut output)?;
		let status = child.wait()?;

		if !status.success() {
			return Err(Error::CommandFailed {
				program,
				status,
				output: String::from_utf8_lossy(&output).trim().to_string(),
			});
		}

		Ok(output)
	}
}

fn resolve_program(program: &Path) -> PathBuf {
	if program.components().count() > 1 {
		return program.to_path_buf();
	}
	std::env::var_os("PATH")
		.and_then(|paths| {
			std::env::split_paths(&paths)
				.map(|dir| dir.join(program))
				.find(|candidate| candidate.is_file())
		})
		.unwrap_or_else(|| program.to_path_buf())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn invocation_builder() {
		let inv = Invocation::in_bin_dir(Some(Path::new("/opt/runit/bin")), "sv")
			.arg("status")
			.args(["web", "db"])
			.env("SVDIR", "/etc/sv");
		assert_eq!(inv.program, PathBuf::from("/opt/runit/bin/sv"));
		assert_eq!(inv.args, vec!["status", "web", "db"]);
		assert_eq!(inv.env, Some(vec![("SVDIR".to_string(), "/etc/sv".to_string())]));
	}

	#[test]
	fn invocation_without_bin_dir_uses_path_lookup() {
		let inv = Invocation::in_bin_dir(None, "s6-svc");
		assert_eq!(inv.program, PathBuf::from("s6-svc"));
		assert!(inv.env.is_none());
	}

	#[test]
	fn system_runner_combines_streams() {
		let inv = Invocation::new("sh").args(["-c", "echo out; echo err 1>&2"]);
		let output = SystemRunner.run(&inv).unwrap();
		assert_eq!(String::from_utf8_lossy(&output), "out\nerr\n");
	}

	#[test]
	fn system_runner_reports_failure_with_output() {
		let inv = Invocation::new("sh").args(["-c", "echo nope; exit 3"]);
		match SystemRunner.run(&inv) {
			Err(Error::CommandFailed { output, status, .. }) => {
				assert_eq!(output, "nope");
				assert_eq!(status.code(), Some(3));
			}
			other => panic!("unexpected result: {:?}", other),
		}
	}

	#[test]
	fn system_runner_reports_missing_binary() {
		let inv = Invocation::new("/nonexistent/svsh-test-binary");
		assert!(matches!(SystemRunner.run(&inv), Err(Error::Spawn { .. })));
	}

	#[test]
	fn system_runner_replaces_environment() {
		let inv = Invocation::new("sh")
			.args(["-c", "echo \"$SVDIR:$HOME\""])
			.env("SVDIR", "/etc/sv");
		let output = SystemRunner.run(&inv).unwrap();
		assert_eq!(String::from_utf8_lossy(&output), "/etc/sv:\n");
	}
}
