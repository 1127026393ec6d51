mod domain;
mod paths;
mod storage;
mod ui;

use std::error::Error;
use std::path::PathBuf;

use chrono::{Local, Utc};
use clap::{Parser, Subcommand};

use crate::domain::{format_elapsed, Tracker};
use crate::paths::resolve_data_dir;
use crate::storage::{export_file_name, load_tracker, read_import, save_tracker, write_export, Store};
use crate::ui::run_dashboard;

#[derive(Debug, Parser)]
#[command(name = "activity-tracker", about = "Terminal activity timer with history and analytics")]
struct Cli {
	#[arg(long)]
	data_dir: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Interactive dashboard (the default)
	Dashboard,
	AddTask {
		#[arg(long)]
		name: String,
	},
	Tasks,
	History {
		#[arg(long, default_value_t = 50)]
		limit: usize,
	},
	Analytics,
	Export {
		#[arg(long)]
		path: Option<PathBuf>,
	},
	Import {
		#[arg(long)]
		path: PathBuf,
	},
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();
	let store = Store::open(resolve_data_dir(cli.data_dir));
	let mut tracker = load_tracker(&store);

	match cli.command.unwrap_or(Command::Dashboard) {
		Command::Dashboard => {
			run_dashboard(&mut tracker, &store)?;
		}
		Command::AddTask { name } => {
			match tracker.add_task(&name, Utc::now())? {
				Some(task) => {
					save_tracker(&store, &tracker)?;
					println!("added task {} ({})", task.name, task.id);
				}
				None => println!("nothing added: task name is empty"),
			}
		}
		Command::Tasks => {
			print_tasks(&tracker);
		}
		Command::History { limit } => {
			print_history(&tracker, limit);
		}
		Command::Analytics => {
			print_analytics(&tracker);
		}
		Command::Export { path } => {
			let path = path
				.unwrap_or_else(|| PathBuf::from(export_file_name(Local::now().date_naive())));
			write_export(&path, &tracker.export_snapshot())?;
			println!("exported to {}", path.display());
		}
		Command::Import { path } => {
			let document = read_import(&path)?;
			tracker.import_snapshot(&document)?;
			save_tracker(&store, &tracker)?;
			println!(
				"imported {} tasks and {} history entries (previous data overwritten)",
				tracker.tasks.len(),
				tracker.history.len()
			);
		}
	}

	Ok(())
}

fn print_tasks(tracker: &Tracker) {
	if tracker.tasks.is_empty() {
		println!("no tasks yet");
		return;
	}

	for task in &tracker.tasks {
		println!("{} | {}", task.id, task.name);
	}
}

fn print_history(tracker: &Tracker, limit: usize) {
	if tracker.history.is_empty() {
		println!("no activity recorded yet");
		return;
	}

	let mut printed = 0usize;
	for (day, entries) in tracker.group_by_local_day() {
		if printed >= limit {
			break;
		}
		println!("{}", day.format("%A, %d %B %Y"));
		for entry in entries {
			if printed >= limit {
				break;
			}
			println!("  {} | {}", format_elapsed(entry.duration), entry.task_name);
			printed += 1;
		}
	}
}

fn print_analytics(tracker: &Tracker) {
	let per_day = tracker.per_day_totals();
	println!("total tracked: {}", format_elapsed(tracker.total_time()));
	println!(
		"average per day: {} (over {} active days)",
		format_elapsed(tracker.average_daily_time()),
		per_day.len()
	);

	println!("\nby task:");
	let per_task = tracker.per_task_totals();
	if per_task.is_empty() {
		println!("(none)");
	}
	for (name, total) in &per_task {
		println!("{} | {}", format_elapsed(*total), name);
	}

	println!("\nby day:");
	if per_day.is_empty() {
		println!("(none)");
	}
	for (day, total) in &per_day {
		println!("{} | {}", day.format("%Y-%m-%d"), format_elapsed(*total));
	}
}
