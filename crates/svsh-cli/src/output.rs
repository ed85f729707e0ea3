use std::collections::HashMap;
use std::time::Duration;

use owo_colors::OwoColorize;
use svsh_core::{Service, Status, StatusListing};

/// How listings are shown. The shell can flip `collapse` at runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct View {
	pub collapse: bool,
	pub json: bool,
}

/// One line of the status table.
#[derive(Debug, PartialEq)]
pub enum Row<'a> {
	Single(&'a Service),
	/// Instances of a numbered service, e.g. `worker-1`, `worker-2`.
	Group { name: String, up: usize, total: usize },
}

impl Row<'_> {
	fn name(&self) -> String {
		match self {
			Row::Single(svc) => svc.name.clone(),
			Row::Group { name, .. } => format!("{}*", name),
		}
	}
}

pub fn print_listing(listing: &StatusListing, view: View) -> serde_json::Result<()> {
	match listing {
		StatusListing::Services(services) if view.json => {
			println!("{}", serde_json::to_string_pretty(services)?);
		}
		StatusListing::Text(text) if view.json => {
			println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "text": text }))?);
		}
		StatusListing::Services(services) => {
			let rows = if view.collapse {
				collapse(services)
			} else {
				services.iter().map(Row::Single).collect()
			};
			print_rows(&rows);
		}
		StatusListing::Text(text) => print!("{}", text),
	}
	Ok(())
}

fn print_rows(rows: &[Row<'_>]) {
	if rows.is_empty() {
		eprintln!("no services");
		return;
	}

	let name_width = rows.iter().map(|r| r.name().len()).max().unwrap_or(0).max("process".len());
	println!(
		"{}",
		format!("{:<name_width$} {:<9} {:<8} {}", "process", "status", "duration", "pid").dimmed()
	);

	for row in rows {
		match row {
			Row::Single(svc) => {
				let pid = svc.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
				println!(
					"{:<name_width$} {} {:<8} {}",
					svc.name,
					status_cell(svc.status),
					format_duration(svc.duration),
					pid,
				);
			}
			Row::Group { up, total, .. } => {
				let summary = format!("{:<9}", format!("{}/{} up", up, total));
				let summary = if up == total {
					summary.green().to_string()
				} else if *up > 0 {
					summary.yellow().to_string()
				} else {
					summary.red().to_string()
				};
				println!("{:<name_width$} {} {:<8} {}", row.name(), summary, "-", "-");
			}
		}
	}
}

fn status_cell(status: Status) -> String {
	let cell = format!("{:<9}", status);
	match status {
		Status::Up => cell.green().to_string(),
		Status::Resetting => cell.yellow().to_string(),
		_ => cell.red().to_string(),
	}
}

/// Fold services that differ only by a trailing number into one row.
/// A number with no siblings stays a normal row.
pub fn collapse(services: &[Service]) -> Vec<Row<'_>> {
	let mut groups: Vec<(Option<&str>, Vec<&Service>)> = Vec::new();
	let mut index: HashMap<&str, usize> = HashMap::new();

	for svc in services {
		match numbered_stem(&svc.name) {
			Some(stem) => match index.get(stem) {
				Some(&i) => groups[i].1.push(svc),
				None => {
					index.insert(stem, groups.len());
					groups.push((Some(stem), vec![svc]));
				}
			},
			None => groups.push((None, vec![svc])),
		}
	}

	groups
		.into_iter()
		.map(|(stem, members)| match (stem, members.as_slice()) {
			(Some(stem), [_, _, ..]) => Row::Group {
				name: stem.to_string(),
				up: members.iter().filter(|s| s.is_running()).count(),
				total: members.len(),
			},
			_ => Row::Single(members[0]),
		})
		.collect()
}

fn numbered_stem(name: &str) -> Option<&str> {
	let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
	if stem.len() == name.len() || stem.is_empty() {
		None
	} else {
		Some(stem)
	}
}

pub fn format_duration(duration: Duration) -> String {
	let secs = duration.as_secs();
	if secs < 60 {
		format!("{}s", secs)
	} else if secs < 3600 {
		let m = secs / 60;
		let s = secs % 60;
		if s == 0 { format!("{}m", m) } else { format!("{}m{}s", m, s) }
	} else if secs < 86400 {
		let h = secs / 3600;
		let m = (secs % 3600) / 60;
		if m == 0 { format!("{}h", h) } else { format!("{}h{}m", h, m) }
	} else {
		let d = secs / 86400;
		let h = (secs % 86400) / 3600;
		if h == 0 { format!("{}d", d) } else { format!("{}d{}h", d, h) }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn svc(name: &str, status: Status) -> Service {
		Service::new(name, status)
	}

	#[test]
	fn durations() {
		assert_eq!(format_duration(Duration::ZERO), "0s");
		assert_eq!(format_duration(Duration::from_secs(45)), "45s");
		assert_eq!(format_duration(Duration::from_secs(192)), "3m12s");
		assert_eq!(format_duration(Duration::from_secs(120)), "2m");
		assert_eq!(format_duration(Duration::from_secs(2 * 3600 + 5 * 60 + 9)), "2h5m");
		assert_eq!(format_duration(Duration::from_secs(86400 + 3 * 3600)), "1d3h");
		assert_eq!(format_duration(Duration::from_secs(2 * 86400)), "2d");
	}

	#[test]
	fn collapses_numbered_instances() {
		let services = vec![
			svc("db", Status::Up),
			svc("worker-1", Status::Up),
			svc("worker-2", Status::Down),
			svc("worker-3", Status::Up),
		];
		let rows = collapse(&services);
		assert_eq!(rows.len(), 2);
		assert_eq!(rows[0], Row::Single(&services[0]));
		assert_eq!(
			rows[1],
			Row::Group {
				name: "worker-".to_string(),
				up: 2,
				total: 3
			}
		);
		assert_eq!(rows[1].name(), "worker-*");
	}

	#[test]
	fn lone_numbered_service_is_not_grouped() {
		let services = vec![svc("cache2", Status::Up), svc("web", Status::Down)];
		let rows = collapse(&services);
		assert_eq!(rows, vec![Row::Single(&services[0]), Row::Single(&services[1])]);
	}

	#[test]
	fn all_digit_names_are_not_grouped() {
		let services = vec![svc("1", Status::Up), svc("2", Status::Up)];
		assert_eq!(collapse(&services).len(), 2);
	}

	#[test]
	fn stems() {
		assert_eq!(numbered_stem("worker-12"), Some("worker-"));
		assert_eq!(numbered_stem("tty1"), Some("tty"));
		assert_eq!(numbered_stem("web"), None);
		assert_eq!(numbered_stem("42"), None);
	}
}
