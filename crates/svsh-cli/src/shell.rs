use std::io::{self, BufRead, Write};

use clap::Parser;
use owo_colors::OwoColorize;
use svsh_core::{complete_service, complete_signal, Supervisor};

use crate::output::View;
use crate::Command;

const PROMPT: &str = "svsh> ";

/// A shell line is a subcommand without the program name.
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_help_subcommand = true)]
struct Line {
	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, PartialEq)]
enum Input<'a> {
	Empty,
	Quit,
	Help(&'a str),
	ToggleCollapse,
	Command(Vec<&'a str>),
}

fn classify(line: &str) -> Input<'_> {
	let words: Vec<&str> = line.split_whitespace().collect();
	match words.as_slice() {
		[] => Input::Empty,
		["quit" | "exit"] => Input::Quit,
		["help"] => Input::Help(""),
		["help", prefix] => Input::Help(*prefix),
		["toggle", "collapse"] => Input::ToggleCollapse,
		_ => Input::Command(words.to_vec()),
	}
}

pub fn run(sv: &dyn Supervisor, view: &mut View) -> io::Result<()> {
	let stdin = io::stdin();
	let mut line = String::new();

	loop {
		print!("{}", PROMPT);
		io::stdout().flush()?;

		line.clear();
		if stdin.lock().read_line(&mut line)? == 0 {
			println!();
			return Ok(());
		}

		match classify(&line) {
			Input::Empty => {}
			Input::Quit => return Ok(()),
			Input::Help(prefix) => print_help(sv, prefix),
			Input::ToggleCollapse => {
				view.collapse = !view.collapse;
				eprintln!("collapse {}", if view.collapse { "on" } else { "off" });
			}
			Input::Command(words) => match Line::try_parse_from(words) {
				Ok(parsed) => {
					if let Err(e) = crate::execute(sv, parsed.command, view) {
						eprintln!("{} {}", "error:".red(), e);
					}
				}
				Err(e) => eprintln!("{}", e),
			},
		}
	}
}

fn print_help(sv: &dyn Supervisor, prefix: &str) {
	eprintln!("{}", "commands".cyan().bold());
	eprintln!("  {}                       Show every service", "status".bold());
	eprintln!("  {} <names..>              Start services", "start".bold());
	eprintln!("  {} <names..>               Stop services", "stop".bold());
	eprintln!("  {} <names..>            Restart services", "restart".bold());
	eprintln!("  {} <sig> <names..>       Send a signal", "signal".bold());
	eprintln!("  {} <name>                   Follow a service's log", "fg".bold());
	eprintln!("  {}                       Rescan service directories", "rescan".bold());
	eprintln!("  {}                    Stop the scanner", "terminate".bold());
	eprintln!("  {} <names..>   Enable/disable services", "enable|disable".bold());
	eprintln!("  {}              Fold numbered instances", "toggle collapse".bold());
	eprintln!("  {}                    Leave the shell", "quit|exit".bold());
	eprintln!();

	match sv.service_names() {
		Ok(names) => {
			let matches = complete_service(&names, prefix);
			eprintln!("{} {}", "services:".cyan().bold(), matches.join(" "));
		}
		Err(e) => eprintln!("{} {}", "error:".red(), e),
	}
	eprintln!("{} {}", "signals:".cyan().bold(), complete_signal(prefix).join(" "));
}
