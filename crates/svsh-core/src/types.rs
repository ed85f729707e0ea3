use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Status {
	Up = 0,
	Down = 1,
	Resetting = 2,
	Backoff = 3,
	Disabled = 4,
	Unknown = 5,
}

impl Status {
	pub fn as_str(&self) -> &'static str {
		match self {
			Status::Up => "up",
			Status::Down => "down",
			Status::Resetting => "resetting",
			Status::Backoff => "backoff",
			Status::Disabled => "disabled",
			Status::Unknown => "unknown",
		}
	}

	pub fn is_up(&self) -> bool {
		matches!(self, Status::Up)
	}
}

/// Out-of-range values fall back to [`Status::Unknown`].
impl From<u8> for Status {
	fn from(value: u8) -> Self {
		match value {
			0 => Status::Up,
			1 => Status::Down,
			2 => Status::Resetting,
			3 => Status::Backoff,
			4 => Status::Disabled,
			_ => Status::Unknown,
		}
	}
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.pad(self.as_str())
	}
}

/// One service directory, as reported by its suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
	pub name: String,
	pub status: Status,
	pub pid: Option<u32>,
	#[serde(rename = "duration_secs", with = "secs")]
	pub duration: Duration,
}

impl Service {
	pub fn new(name: impl Into<String>, status: Status) -> Self {
		Self {
			name: name.into(),
			status,
			pid: None,
			duration: Duration::ZERO,
		}
	}

	pub fn is_running(&self) -> bool {
		self.status.is_up()
	}
}

/// What a suite hands back for a status request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusListing {
	/// Parsed, one entry per service directory, sorted by name.
	Services(Vec<Service>),
	/// The suite's own listing, passed through as-is.
	Text(String),
}

impl StatusListing {
	pub fn services(&self) -> &[Service] {
		match self {
			StatusListing::Services(services) => services,
			StatusListing::Text(_) => &[],
		}
	}

	pub fn into_services(self) -> Option<Vec<Service>> {
		match self {
			StatusListing::Services(services) => Some(services),
			StatusListing::Text(_) => None,
		}
	}
}

/// Signal names understood by every adapter. Each suite maps a subset of
/// these onto its own control vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
	Hup,
	Int,
	Quit,
	Kill,
	Usr1,
	Usr2,
	Alrm,
	Term,
	Cont,
	Winch,
	Stop,
	Abrt,
}

impl Signal {
	pub const ALL: [Signal; 12] = [
		Signal::Hup,
		Signal::Int,
		Signal::Quit,
		Signal::Kill,
		Signal::Usr1,
		Signal::Usr2,
		Signal::Alrm,
		Signal::Term,
		Signal::Cont,
		Signal::Winch,
		Signal::Stop,
		Signal::Abrt,
	];

	pub fn name(&self) -> &'static str {
		match self {
			Signal::Hup => "hup",
			Signal::Int => "int",
			Signal::Quit => "quit",
			Signal::Kill => "kill",
			Signal::Usr1 => "usr1",
			Signal::Usr2 => "usr2",
			Signal::Alrm => "alrm",
			Signal::Term => "term",
			Signal::Cont => "cont",
			Signal::Winch => "winch",
			Signal::Stop => "stop",
			Signal::Abrt => "abrt",
		}
	}
}

impl fmt::Display for Signal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for Signal {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let lower = s.to_ascii_lowercase();
		Signal::ALL
			.iter()
			.copied()
			.find(|sig| sig.name() == lower)
			.ok_or_else(|| Error::UnsupportedSignal {
				signal: s.to_string(),
				suite: "svsh",
			})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteKind {
	Runit,
	S6,
	Perp,
}

impl SuiteKind {
	pub fn name(&self) -> &'static str {
		match self {
			SuiteKind::Runit => "runit",
			SuiteKind::S6 => "s6",
			SuiteKind::Perp => "perp",
		}
	}
}

impl fmt::Display for SuiteKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for SuiteKind {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"runit" => Ok(SuiteKind::Runit),
			"s6" => Ok(SuiteKind::S6),
			"perp" => Ok(SuiteKind::Perp),
			_ => Err(Error::UnknownSuite { name: s.to_string() }),
		}
	}
}

mod secs {
	use serde::{Deserialize, Deserializer, Serializer};
	use std::time::Duration;

	pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(duration.as_secs())
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_secs)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_names() {
		assert_eq!(Status::Up.to_string(), "up");
		assert_eq!(Status::Resetting.to_string(), "resetting");
		assert_eq!(Status::Disabled.to_string(), "disabled");
		assert_eq!(format!("{:>6}", Status::Down), "  down");
	}

	#[test]
	fn unknown_numeric_status_renders_unknown() {
		assert_eq!(Status::from(3), Status::Backoff);
		assert_eq!(Status::from(6), Status::Unknown);
		assert_eq!(Status::from(200).to_string(), "unknown");
	}

	#[test]
	fn signal_parse_ignores_case() {
		assert_eq!("usr1".parse::<Signal>().unwrap(), Signal::Usr1);
		assert_eq!("HUP".parse::<Signal>().unwrap(), Signal::Hup);
		assert_eq!("Winch".parse::<Signal>().unwrap(), Signal::Winch);
	}

	#[test]
	fn signal_parse_rejects_unknown_names() {
		let err = "sigfoo".parse::<Signal>().unwrap_err();
		assert!(matches!(err, Error::UnsupportedSignal { .. }));
		assert!("pipe".parse::<Signal>().is_err());
	}

	#[test]
	fn suite_kind_parse() {
		assert_eq!("runit".parse::<SuiteKind>().unwrap(), SuiteKind::Runit);
		assert_eq!("S6".parse::<SuiteKind>().unwrap(), SuiteKind::S6);
		assert_eq!("perp".parse::<SuiteKind>().unwrap(), SuiteKind::Perp);
		assert!(matches!(
			"systemd".parse::<SuiteKind>(),
			Err(Error::UnknownSuite { .. })
		));
	}

	#[test]
	fn service_serializes_duration_as_seconds() {
		let mut svc = Service::new("web", Status::Up);
		svc.pid = Some(123);
		svc.duration = Duration::from_secs(45);
		let json = serde_json::to_value(&svc).unwrap();
		assert_eq!(json["status"], "up");
		assert_eq!(json["pid"], 123);
		assert_eq!(json["duration_secs"], 45);
	}
}
