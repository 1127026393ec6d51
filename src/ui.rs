use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Local, Utc};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};

use crate::domain::{format_elapsed, Tracker};
use crate::storage::{export_file_name, read_import, save_tracker, write_export, Store};

const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);

pub fn run_dashboard(tracker: &mut Tracker, store: &Store) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, tracker, store);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	tracker: &mut Tracker,
	store: &Store,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::default();

	loop {
		let now = Utc::now();
		app.clamp_selection(tracker);
		terminal.draw(|frame| draw_dashboard(frame, &app, tracker, store, now))?;

		// The 250ms poll doubles as the display tick: elapsed time is a pure
		// projection of the start timestamp, so there is no interval to cancel
		// when tracking stops or the loop exits.
		if event::poll(StdDuration::from_millis(250))? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				let should_quit = match &app.mode {
					InputMode::Prompt(_) => handle_prompt_key(&mut app, key.code, tracker, store),
					InputMode::Normal => handle_normal_key(&mut app, key.code, tracker, store),
				};

				if should_quit {
					break;
				}
			}
		}
	}

	Ok(())
}

fn draw_dashboard(frame: &mut Frame, app: &App, tracker: &Tracker, store: &Store, now: DateTime<Utc>) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(3), Constraint::Min(10), Constraint::Length(4)])
		.split(frame.area());

	render_page_bar(frame, layout[0], app.page);
	match app.page {
		Page::Tracker => render_tracker_page(frame, layout[1], app, tracker, now),
		Page::History => render_history_page(frame, layout[1], app, tracker),
		Page::Analytics => render_analytics_page(frame, layout[1], tracker),
		Page::Settings => render_settings_page(frame, layout[1], store),
	}
	render_footer(frame, layout[2], app);
}

fn render_page_bar(frame: &mut Frame, area: Rect, current: Page) {
	let mut spans = Vec::new();
	for (index, page) in Page::ALL.iter().enumerate() {
		let label = format!(" {} {} ", index + 1, page.title());
		let style = if *page == current {
			Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD)
		} else {
			Style::default().fg(Color::Gray)
		};
		spans.push(Span::styled(label, style));
		spans.push(Span::raw(" "));
	}

	let bar = Paragraph::new(Line::from(spans))
		.block(Block::default().borders(Borders::ALL).title("Activity Tracker"));
	frame.render_widget(bar, area);
}

fn render_tracker_page(frame: &mut Frame, area: Rect, app: &App, tracker: &Tracker, now: DateTime<Utc>) {
	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
		.split(area);

	render_task_list(frame, body[0], app, tracker);
	render_session_panel(frame, body[1], tracker, now);
}

fn render_task_list(frame: &mut Frame, area: Rect, app: &App, tracker: &Tracker) {
	let selected_id = tracker.selected_task().map(|task| task.id.clone());
	let items = tracker
		.tasks
		.iter()
		.map(|task| {
			let marker = if selected_id.as_deref() == Some(task.id.as_str()) {
				">"
			} else {
				" "
			};
			ListItem::new(format!("{marker} {}", task.name))
		})
		.collect::<Vec<_>>();

	let mut state = ListState::default();
	if !tracker.tasks.is_empty() {
		state.select(Some(app.task_index.min(tracker.tasks.len() - 1)));
	}

	let block = Block::default()
		.borders(Borders::ALL)
		.title(format!("Tasks ({})", tracker.tasks.len()));
	let list = List::new(if items.is_empty() {
		vec![ListItem::new("(no tasks yet, press 'a' to add one)")]
	} else {
		items
	})
	.block(block)
	.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));

	frame.render_stateful_widget(list, area, &mut state);
}

fn render_session_panel(frame: &mut Frame, area: Rect, tracker: &Tracker, now: DateTime<Utc>) {
	let mut lines = Vec::new();
	match tracker.selected_task() {
		Some(task) => {
			lines.push(Line::from(vec![
				Span::raw("Tracking: "),
				Span::styled(task.name.clone(), Style::default().fg(Color::LightBlue).add_modifier(Modifier::BOLD)),
			]));
			lines.push(Line::from(""));
			let elapsed = format_elapsed(tracker.elapsed_seconds(now));
			lines.push(Line::from(Span::styled(
				format!("  {elapsed}"),
				Style::default().add_modifier(Modifier::BOLD),
			)));
			lines.push(Line::from(""));
			if tracker.is_tracking() {
				lines.push(Line::from(Span::styled(
					"RUNNING - press space to stop",
					Style::default().fg(Color::LightRed),
				)));
			} else {
				lines.push(Line::from(Span::styled(
					"idle - press space to start",
					Style::default().fg(Color::LightGreen),
				)));
			}
		}
		None => {
			lines.push(Line::from("Select a task (Enter) or add a new one ('a')"));
			lines.push(Line::from("to begin tracking."));
		}
	}

	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Current Activity"));
	frame.render_widget(panel, area);
}

fn render_history_page(frame: &mut Frame, area: Rect, app: &App, tracker: &Tracker) {
	let mut items = Vec::new();
	for (day, entries) in tracker.group_by_local_day() {
		items.push(ListItem::new(Line::from(Span::styled(
			day.format("%A, %d %B %Y").to_string(),
			Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
		))));
		for entry in entries {
			items.push(ListItem::new(format!(
				"  {} | {}",
				format_elapsed(entry.duration),
				entry.task_name
			)));
		}
	}

	if items.is_empty() {
		items.push(ListItem::new("(no activity recorded yet)"));
	}

	let mut state = ListState::default();
	state.select(Some(app.history_index.min(items.len() - 1)));

	let list = List::new(items)
		.block(Block::default().borders(Borders::ALL).title("Activity History"))
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));
	frame.render_stateful_widget(list, area, &mut state);
}

fn render_analytics_page(frame: &mut Frame, area: Rect, tracker: &Tracker) {
	let per_day = tracker.per_day_totals();
	let mut lines = Vec::new();
	lines.push(Line::from(format!("Total tracked: {}", format_elapsed(tracker.total_time()))));
	lines.push(Line::from(format!(
		"Average per day: {} (over {} active days)",
		format_elapsed(tracker.average_daily_time()),
		per_day.len()
	)));
	lines.push(Line::from(""));

	lines.push(Line::from(Span::styled(
		"Time per task",
		Style::default().add_modifier(Modifier::BOLD),
	)));
	let per_task = tracker.per_task_totals();
	if per_task.is_empty() {
		lines.push(Line::from("(none)"));
	}
	for (name, total) in &per_task {
		lines.push(Line::from(format!("{:>9}  {}", format_elapsed(*total), name)));
	}
	lines.push(Line::from(""));

	lines.push(Line::from(Span::styled(
		"Daily activity",
		Style::default().add_modifier(Modifier::BOLD),
	)));
	if per_day.is_empty() {
		lines.push(Line::from("(none)"));
	}
	let max_seconds = per_day.values().copied().max().unwrap_or(0).max(1);
	for (day, total) in per_day.iter().rev() {
		let width = ((*total as f64 / max_seconds as f64) * 20.0).round() as usize;
		lines.push(Line::from(format!(
			"{} {:>9} {}",
			day.format("%Y-%m-%d"),
			format_elapsed(*total),
			"=".repeat(width.max(1))
		)));
	}

	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Analytics"));
	frame.render_widget(panel, area);
}

fn render_settings_page(frame: &mut Frame, area: Rect, store: &Store) {
	let lines = vec![
		Line::from(format!("Store directory: {}", store.dir().display())),
		Line::from(""),
		Line::from("e  export tasks and history as pretty-printed JSON"),
		Line::from("i  import a previously exported JSON file"),
		Line::from(""),
		Line::from("Importing overwrites all existing tasks and history."),
	];

	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Settings"));
	frame.render_widget(panel, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
	let footer_lines = match &app.mode {
		InputMode::Normal => vec![
			Line::from("Tab/1-4 page | j/k move | Enter select task | space start/stop | a add task"),
			Line::from("e export | i import | q quit"),
			Line::from(app.status.clone()),
		],
		InputMode::Prompt(prompt) => vec![
			Line::from(prompt.title.clone()),
			Line::from(format!("> {}", prompt.input)),
			Line::from("Enter submit | Esc cancel"),
		],
	};

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn handle_normal_key(app: &mut App, code: KeyCode, tracker: &mut Tracker, store: &Store) -> bool {
	match code {
		KeyCode::Char('q') | KeyCode::Esc => return true,
		KeyCode::Tab => {
			app.page = app.page.next();
		}
		KeyCode::BackTab => {
			app.page = app.page.prev();
		}
		KeyCode::Char('1') => app.page = Page::Tracker,
		KeyCode::Char('2') => app.page = Page::History,
		KeyCode::Char('3') => app.page = Page::Analytics,
		KeyCode::Char('4') => app.page = Page::Settings,
		KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1, tracker),
		KeyCode::Down | KeyCode::Char('j') => app.move_selection(1, tracker),
		KeyCode::Enter => {
			if app.page == Page::Tracker {
				select_task_under_cursor(app, tracker);
			}
		}
		KeyCode::Char(' ') => {
			if app.page == Page::Tracker {
				toggle_tracking(app, tracker, store);
			}
		}
		KeyCode::Char('a') => {
			app.mode = InputMode::Prompt(PromptState::new("New task name", PromptKind::AddTask));
		}
		KeyCode::Char('e') => {
			let suggested = export_file_name(Local::now().date_naive());
			app.mode = InputMode::Prompt(PromptState::new(
				format!("Export path (empty for ./{suggested})"),
				PromptKind::ExportPath,
			));
		}
		KeyCode::Char('i') => {
			app.mode = InputMode::Prompt(PromptState::new("Import path", PromptKind::ImportPath));
		}
		_ => {}
	}

	false
}

fn select_task_under_cursor(app: &mut App, tracker: &mut Tracker) {
	let Some(task_id) = tracker.tasks.get(app.task_index).map(|task| task.id.clone()) else {
		app.status = "No task under the cursor".to_string();
		return;
	};

	match tracker.select_task(&task_id) {
		Ok(Some(task)) => app.status = format!("Selected: {}", task.name),
		Ok(None) => app.status = "Selection cleared".to_string(),
		Err(err) => app.status = format!("error: {err}"),
	}
}

fn toggle_tracking(app: &mut App, tracker: &mut Tracker, store: &Store) {
	let now = Utc::now();
	if tracker.is_tracking() {
		match tracker.stop(now) {
			Ok(Some(entry)) => {
				if let Err(err) = persist(store, tracker) {
					app.status = format!("error: {err}");
					return;
				}
				app.status = format!(
					"Recorded {} for {}",
					entry.task_name,
					format_elapsed(entry.duration)
				);
			}
			Ok(None) => app.status = "Nothing recorded (session under one second)".to_string(),
			Err(err) => app.status = format!("error: {err}"),
		}
	} else {
		match tracker.start(now) {
			Ok(()) => {
				let name = tracker
					.selected_task()
					.map(|task| task.name.clone())
					.unwrap_or_default();
				app.status = format!("Started tracking: {name}");
			}
			Err(err) => app.status = format!("error: {err}"),
		}
	}
}

fn handle_prompt_key(app: &mut App, code: KeyCode, tracker: &mut Tracker, store: &Store) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Input cancelled".to_string();
		}
		KeyCode::Backspace => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.pop();
			}
		}
		KeyCode::Char(value) => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.push(value);
			}
		}
		KeyCode::Enter => {
			let prompt = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Prompt(prompt) => prompt,
				InputMode::Normal => return false,
			};

			match submit_prompt(&prompt, tracker, store) {
				Ok(message) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Prompt(prompt);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn submit_prompt(prompt: &PromptState, tracker: &mut Tracker, store: &Store) -> Result<String, String> {
	match prompt.kind {
		PromptKind::AddTask => {
			let added = tracker
				.add_task(&prompt.input, Utc::now())
				.map_err(|err| err.to_string())?;
			let Some(task) = added else {
				return Ok("Nothing added: task name is empty".to_string());
			};
			persist(store, tracker)?;
			Ok(format!("Added task: {}", task.name))
		}
		PromptKind::ExportPath => {
			let path = if prompt.input.trim().is_empty() {
				PathBuf::from(export_file_name(Local::now().date_naive()))
			} else {
				PathBuf::from(prompt.input.trim())
			};
			write_export(&path, &tracker.export_snapshot()).map_err(|err| err.to_string())?;
			Ok(format!("Exported to {}", path.display()))
		}
		PromptKind::ImportPath => {
			let path = PathBuf::from(prompt.input.trim());
			let document = read_import(&path).map_err(|err| err.to_string())?;
			tracker.import_snapshot(&document).map_err(|err| err.to_string())?;
			persist(store, tracker)?;
			Ok(format!(
				"Imported {} tasks and {} history entries (previous data overwritten)",
				tracker.tasks.len(),
				tracker.history.len()
			))
		}
	}
}

fn persist(store: &Store, tracker: &Tracker) -> Result<(), String> {
	save_tracker(store, tracker).map_err(|err| err.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
	Tracker,
	History,
	Analytics,
	Settings,
}

impl Page {
	const ALL: [Page; 4] = [Page::Tracker, Page::History, Page::Analytics, Page::Settings];

	fn title(self) -> &'static str {
		match self {
			Page::Tracker => "Tracker",
			Page::History => "History",
			Page::Analytics => "Analytics",
			Page::Settings => "Settings",
		}
	}

	fn next(self) -> Self {
		match self {
			Page::Tracker => Page::History,
			Page::History => Page::Analytics,
			Page::Analytics => Page::Settings,
			Page::Settings => Page::Tracker,
		}
	}

	fn prev(self) -> Self {
		match self {
			Page::Tracker => Page::Settings,
			Page::History => Page::Tracker,
			Page::Analytics => Page::History,
			Page::Settings => Page::Analytics,
		}
	}
}

#[derive(Debug, Clone)]
enum InputMode {
	Normal,
	Prompt(PromptState),
}

#[derive(Debug, Clone)]
struct PromptState {
	title: String,
	input: String,
	kind: PromptKind,
}

impl PromptState {
	fn new(title: impl Into<String>, kind: PromptKind) -> Self {
		Self {
			title: title.into(),
			input: String::new(),
			kind,
		}
	}
}

#[derive(Debug, Clone, Copy)]
enum PromptKind {
	AddTask,
	ExportPath,
	ImportPath,
}

#[derive(Debug, Clone)]
struct App {
	page: Page,
	task_index: usize,
	history_index: usize,
	mode: InputMode,
	status: String,
}

impl Default for App {
	fn default() -> Self {
		Self {
			page: Page::Tracker,
			task_index: 0,
			history_index: 0,
			mode: InputMode::Normal,
			status: "Ready".to_string(),
		}
	}
}

impl App {
	fn clamp_selection(&mut self, tracker: &Tracker) {
		if tracker.tasks.is_empty() {
			self.task_index = 0;
		} else {
			self.task_index = self.task_index.min(tracker.tasks.len() - 1);
		}
	}

	fn move_selection(&mut self, delta: i32, tracker: &Tracker) {
		match self.page {
			Page::Tracker => {
				if tracker.tasks.is_empty() {
					self.task_index = 0;
					return;
				}
				if delta > 0 {
					self.task_index = (self.task_index + delta as usize).min(tracker.tasks.len() - 1);
				} else {
					self.task_index = self.task_index.saturating_sub(delta.unsigned_abs() as usize);
				}
			}
			Page::History => {
				if delta > 0 {
					self.history_index = self.history_index.saturating_add(delta as usize);
				} else {
					self.history_index = self.history_index.saturating_sub(delta.unsigned_abs() as usize);
				}
			}
			Page::Analytics | Page::Settings => {}
		}
	}
}
