use serde::Deserialize;
use std::path::{Path, PathBuf};
use svsh_core::{SessionOptions, SuiteKind};

const APP_NAME: &str = "svsh";

// ── ~/.config/svsh/config.toml ──────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
	pub suite: Option<SuiteKind>,
	pub basedir: Option<String>,
	pub bindir: Option<String>,
	#[serde(default)]
	pub collapse: bool,
	#[serde(default)]
	pub debug: bool,
}

pub fn config_dir() -> PathBuf {
	if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
		PathBuf::from(dir).join(APP_NAME)
	} else if let Ok(home) = std::env::var("HOME") {
		PathBuf::from(home).join(".config").join(APP_NAME)
	} else {
		PathBuf::from("/tmp").join(APP_NAME).join("config")
	}
}

pub fn load_config() -> Config {
	load_config_from(&config_dir().join("config.toml"))
}

/// Runs before logging is set up, so problems go straight to stderr.
pub fn load_config_from(path: &Path) -> Config {
	if path.exists() {
		match std::fs::read_to_string(path) {
			Ok(content) => match toml::from_str(&content) {
				Ok(config) => return config,
				Err(e) => eprintln!("warning: failed to parse {}: {}", path.display(), e),
			},
			Err(e) => eprintln!("warning: failed to read {}: {}", path.display(), e),
		}
	}
	Config::default()
}

// ── Command-line flags layered over the file ────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Overrides {
	pub suite: Option<SuiteKind>,
	pub basedir: Option<PathBuf>,
	pub bindir: Option<PathBuf>,
	pub collapse: bool,
	pub debug: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
	pub suite: Option<SuiteKind>,
	pub base_dir: Option<PathBuf>,
	pub bin_dir: Option<PathBuf>,
	pub collapse: bool,
	pub debug: bool,
}

impl Settings {
	/// Flags win over the file. Boolean flags can only switch things on.
	pub fn resolve(file: Config, flags: Overrides) -> Self {
		Self {
			suite: flags.suite.or(file.suite),
			base_dir: flags.basedir.or_else(|| file.basedir.as_deref().map(expand_tilde)),
			bin_dir: flags.bindir.or_else(|| file.bindir.as_deref().map(expand_tilde)),
			collapse: flags.collapse || file.collapse,
			debug: flags.debug || file.debug,
		}
	}

	pub fn session(&self) -> SessionOptions {
		SessionOptions {
			base_dir: self.base_dir.clone(),
			bin_dir: self.bin_dir.clone(),
			debug: self.debug,
		}
	}
}

fn expand_tilde(path: &str) -> PathBuf {
	if let Some(rest) = path.strip_prefix("~/") {
		if let Ok(home) = std::env::var("HOME") {
			return PathBuf::from(home).join(rest);
		}
	}
	PathBuf::from(path)
}
