//! Following a live log file until the user interrupts.
//!
//! Two tasks cooperate: one waits for SIGINT/SIGTERM to reach us and sends
//! it over a single-slot channel, the other owns the `tail` child, forwards
//! whatever arrives on that channel and waits for the child to exit.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// The child side of a follow: something that can be waited on and
/// signalled.
#[allow(async_fn_in_trait)]
pub trait Follower {
	async fn wait(&mut self) -> io::Result<ExitStatus>;
	fn forward(&mut self, signal: Signal) -> Result<()>;
}

pub struct TailProcess {
	child: Child,
}

impl TailProcess {
	pub fn spawn(file: &Path) -> Result<Self> {
		tracing::debug!(file = %file.display(), "following log");
		let child = Command::new("tail")
			.arg("-f")
			.arg(file)
			.stdin(Stdio::null())
			.stdout(Stdio::inherit())
			.stderr(Stdio::inherit())
			.kill_on_drop(true)
			.spawn()
			.map_err(|source| Error::Spawn {
				program: "tail".to_string(),
				source,
			})?;
		Ok(Self { child })
	}
}

impl Follower for TailProcess {
	async fn wait(&mut self) -> io::Result<ExitStatus> {
		self.child.wait().await
	}

	fn forward(&mut self, signal: Signal) -> Result<()> {
		match self.child.id() {
			Some(pid) => {
				kill(Pid::from_raw(pid as i32), signal)?;
				Ok(())
			}
			// Already reaped; nothing left to tell.
			None => Ok(()),
		}
	}
}

/// Tail `file` to our stdout until interrupted.
pub async fn follow(file: &Path) -> Result<()> {
	// Our handlers must be in place before tail exists.
	let (interrupt, listener) = listen_for_interrupt()?;
	let child = match TailProcess::spawn(file) {
		Ok(child) => child,
		Err(e) => {
			listener.abort();
			return Err(e);
		}
	};

	let result = supervise(child, interrupt).await;
	listener.abort();
	result
}

/// Take over SIGINT and SIGTERM right away and hand the first one that
/// arrives to the returned channel.
fn listen_for_interrupt() -> Result<(oneshot::Receiver<Signal>, JoinHandle<()>)> {
	let mut interrupt = signal(SignalKind::interrupt())?;
	let mut terminate = signal(SignalKind::terminate())?;
	let (tx, rx) = oneshot::channel();

	let listener = tokio::spawn(async move {
		let sig = tokio::select! {
			_ = interrupt.recv() => Signal::SIGINT,
			_ = terminate.recv() => Signal::SIGTERM,
		};
		let _ = tx.send(sig);
	});
	Ok((rx, listener))
}

/// Wait on `child`, forwarding at most one interrupt to it.
///
/// Exiting after a forwarded interrupt is a normal end of the follow. Exiting
/// on its own is an error unless the child succeeded or was killed by a
/// signal.
pub async fn supervise<F: Follower>(
	mut child: F,
	interrupt: oneshot::Receiver<Signal>,
) -> Result<()> {
	let forwarded = tokio::select! {
		status = child.wait() => return settle(status?, false),
		sig = interrupt => match sig {
			Ok(sig) => {
				tracing::debug!(signal = %sig, "forwarding interrupt to tail");
				child.forward(sig)?;
				true
			}
			// The listener went away without a delivery.
			Err(_) => false,
		},
	};

	let status = child.wait().await?;
	settle(status, forwarded)
}

fn settle(status: ExitStatus, forwarded: bool) -> Result<()> {
	if forwarded || status.success() || status.signal().is_some() {
		Ok(())
	} else {
		Err(Error::TailFailed { status })
	}
}
