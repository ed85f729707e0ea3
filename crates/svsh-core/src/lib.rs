//! # svsh-core
//!
//! One control surface over three process supervision suites: runit, s6
//! and perp.
//!
//! Each suite gets its own adapter implementing [`Supervisor`]. Adapters
//! drive the suite's own command-line tools and read `/proc` where the
//! tools fall short (finding a service's log file, finding `runsvdir`).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use svsh_core::{connect, SessionOptions, StatusListing, SuiteKind};
//!
//! # fn main() -> svsh_core::Result<()> {
//! let sv = connect(SuiteKind::Runit, SessionOptions::default())?;
//!
//! if let StatusListing::Services(services) = sv.status()? {
//!     for svc in services {
//!         println!("{} {} {:?}", svc.name, svc.status, svc.pid);
//!     }
//! }
//!
//! sv.restart(&["web".to_string()])?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod exec;
pub mod logs;
pub mod perp;
pub mod procfs;
pub mod runit;
pub mod s6;
pub mod supervisor;
pub mod tail;
pub mod types;

pub use error::{Error, Result};
pub use exec::{CommandRunner, Invocation, SystemRunner};
pub use perp::Perp;
pub use procfs::{ProcFs, ProcessTable};
pub use runit::Runit;
pub use s6::S6;
pub use supervisor::{
	complete_service, complete_signal, connect, default_dir, service_dirs, SessionOptions,
	Supervisor,
};
pub use types::*;
