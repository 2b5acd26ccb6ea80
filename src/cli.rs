//! Command-line interface module for sortling.
//!
//! This module handles everything the user sees:
//! - Argument parsing
//! - Loading persisted configuration and plugins at startup
//! - The interactive triage shell
//! - Saving configuration and unloading plugins at exit

use crate::assignment::AssignmentStore;
use crate::config::{ConfigStore, CoreConfig, DEFAULT_CONFIG_DIR};
use crate::output::{OutputFormatter, display_name};
use crate::plugin::{DEFAULT_PLUGIN_DIR, PluginHost, PluginRegistry};
use crate::preview::{self, FileKind, PreviewSize};
use crate::session::{HostContext, Session, SessionEvent};
use clap::Parser;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Preview files one at a time and sort them into destination folders.
#[derive(Debug, Clone, Parser)]
#[command(name = "sortling", version, about)]
pub struct Args {
    /// Folder to triage
    pub source: Option<PathBuf>,

    /// Destination folder (repeatable)
    #[arg(short = 'd', long = "dest")]
    pub destinations: Vec<PathBuf>,

    /// Regex over file names; overrides the saved filter
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Directory holding persisted configuration
    #[arg(long, default_value = DEFAULT_CONFIG_DIR)]
    pub config_dir: PathBuf,

    /// Directory holding plugin manifests
    #[arg(long, default_value = DEFAULT_PLUGIN_DIR)]
    pub plugin_dir: PathBuf,

    /// Log filter used when RUST_LOG is not set (e.g. "debug")
    #[arg(long)]
    pub log_level: Option<String>,
}

/// A single line typed into the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Next,
    Previous,
    /// Jump to a file (1-based).
    GoTo(usize),
    /// Toggle the current file's assignment to a destination (1-based).
    Assign(usize),
    Unassign,
    Undo,
    Redo,
    Filter(String),
    Refresh,
    /// Open a source folder, or close it with no argument.
    Open(Option<PathBuf>),
    AddDestination(PathBuf),
    /// Remove a destination (1-based).
    RemoveDestination(usize),
    Destinations,
    Assignments,
    Apply,
    Clear,
    Delete,
    ZoomIn,
    ZoomOut,
    Show,
    List,
    Plugins,
    Run { plugin: String, action: String },
    History,
    Help,
    Quit,
}

impl ShellCommand {
    /// Parses a shell line. A bare digit assigns to that destination, with `0`
    /// meaning the tenth.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        if word.len() == 1
            && rest.is_empty()
            && let Some(digit) = word.chars().next().and_then(|c| c.to_digit(10))
        {
            return Ok(Self::Assign(if digit == 0 { 10 } else { digit as usize }));
        }

        let command = match word {
            "n" | "next" => Self::Next,
            "p" | "prev" | "previous" => Self::Previous,
            "g" | "goto" => Self::GoTo(parse_index(rest)?),
            "a" | "assign" => Self::Assign(parse_index(rest)?),
            "u" | "unassign" => Self::Unassign,
            "undo" | "z" => Self::Undo,
            "redo" | "y" => Self::Redo,
            "filter" | "f" => {
                if rest.is_empty() {
                    return Err("Usage: filter <regex>".to_string());
                }
                Self::Filter(rest.to_string())
            }
            "refresh" | "r" => Self::Refresh,
            "open" => Self::Open((!rest.is_empty()).then(|| PathBuf::from(rest))),
            "dest" | "d" => return Self::parse_dest(rest),
            "dests" => Self::Destinations,
            "assignments" | "pending" => Self::Assignments,
            "apply" => Self::Apply,
            "clear" => Self::Clear,
            "delete" | "del" => Self::Delete,
            "+" | "zoom-in" => Self::ZoomIn,
            "-" | "zoom-out" => Self::ZoomOut,
            "show" | "s" | "" => Self::Show,
            "ls" | "list" => Self::List,
            "plugins" => Self::Plugins,
            "run" => {
                let Some((plugin, action)) = rest.split_once(char::is_whitespace) else {
                    return Err("Usage: run <plugin> <action>".to_string());
                };
                Self::Run {
                    plugin: plugin.to_string(),
                    action: action.trim().to_string(),
                }
            }
            "history" => Self::History,
            "help" | "h" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            other => return Err(format!("Unknown command '{}'. Type 'help'.", other)),
        };
        Ok(command)
    }

    fn parse_dest(rest: &str) -> Result<Self, String> {
        let (sub, arg) = match rest.split_once(char::is_whitespace) {
            Some((sub, arg)) => (sub, arg.trim()),
            None => (rest, ""),
        };
        match sub {
            "" | "list" => Ok(Self::Destinations),
            "add" if !arg.is_empty() => Ok(Self::AddDestination(PathBuf::from(arg))),
            "rm" | "remove" => Ok(Self::RemoveDestination(parse_index(arg)?)),
            _ => Err("Usage: dest [list | add <path> | rm <n>]".to_string()),
        }
    }
}

fn parse_index(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("Expected a number starting at 1, got '{}'", arg)),
    }
}

const HELP: &str = "\
Navigation:   n/next  p/prev  g <n>  ls  s/show  + / - (zoom)
Assigning:    <digit> or a <n> (toggle)  u/unassign  pending  clear
Destinations: dests  dest add <path>  dest rm <n>
Source:       open [path]  filter <regex>  refresh  delete
History:      undo  redo  history
Commit:       apply
Plugins:      plugins  run <plugin> <action>
Other:        help  quit";

/// The interactive triage shell.
pub struct Shell {
    session: Session,
    host: PluginHost,
}

impl Shell {
    pub fn new(session: Session, host: PluginHost) -> Self {
        Self { session, host }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Loads plugins into the session.
    pub fn load_plugins(&mut self) -> Vec<String> {
        let loaded = self.host.load_all(&mut self.session);
        self.dispatch_events();
        loaded
    }

    /// Reads commands from `input` until `quit` or end of input.
    pub fn run<R: BufRead>(&mut self, input: &mut R) {
        self.show_current();
        loop {
            OutputFormatter::prompt(">");
            let Some(line) = read_line(input) else {
                OutputFormatter::plain("");
                break;
            };

            let command = match ShellCommand::parse(&line) {
                Ok(command) => command,
                Err(e) => {
                    OutputFormatter::error(&e);
                    continue;
                }
            };
            if command == ShellCommand::Quit {
                break;
            }

            debug!(?command, "shell command");
            self.execute(command, input);
            self.dispatch_events();
        }
    }

    /// Forwards pending session events to plugins and redraws if needed.
    fn dispatch_events(&mut self) {
        // Plugins may fire further events while handling these.
        for _ in 0..4 {
            let events = self.session.take_events();
            if events.is_empty() {
                break;
            }
            self.host.notify(&events, &mut self.session);
            if events.contains(&SessionEvent::FullReload) {
                self.show_current();
            }
        }
    }

    /// Runs one command, prompting on `input` for confirmations.
    pub fn execute<R: BufRead>(&mut self, command: ShellCommand, input: &mut R) {
        match command {
            ShellCommand::Next => {
                self.session.next();
                self.show_current();
            }
            ShellCommand::Previous => {
                self.session.previous();
                self.show_current();
            }
            ShellCommand::GoTo(n) => {
                self.session.go_to(n - 1);
                self.show_current();
            }
            ShellCommand::Assign(n) => self.assign(n),
            ShellCommand::Unassign => {
                if self.session.unassign_current() {
                    OutputFormatter::success("Assignment removed");
                } else {
                    OutputFormatter::info("Current file is not assigned");
                }
            }
            ShellCommand::Undo => match self.session.undo() {
                Ok(Some(what)) => OutputFormatter::success(&format!("Undid: {}", what)),
                Ok(None) => OutputFormatter::info("Nothing to undo"),
                Err(e) => OutputFormatter::error(&format!("Undo failed: {}", e)),
            },
            ShellCommand::Redo => match self.session.redo() {
                Ok(Some(what)) => OutputFormatter::success(&format!("Redid: {}", what)),
                Ok(None) => OutputFormatter::info("Nothing to redo"),
                Err(e) => OutputFormatter::error(&format!("Redo failed: {}", e)),
            },
            ShellCommand::Filter(pattern) => match self.session.set_filter(&pattern) {
                Ok(()) => {
                    OutputFormatter::success(&format!(
                        "Filter set, {} matching file(s)",
                        self.session.source_files().len()
                    ));
                    self.show_current();
                }
                Err(e) => OutputFormatter::error(&e.to_string()),
            },
            ShellCommand::Refresh => match self.session.refresh() {
                Ok(()) => self.show_current(),
                Err(e) => OutputFormatter::error(&e.to_string()),
            },
            ShellCommand::Open(folder) => match self.session.open_source(folder.as_deref()) {
                Ok(()) => self.show_current(),
                Err(e) => OutputFormatter::error(&e.to_string()),
            },
            ShellCommand::AddDestination(path) => match self.session.add_destination(&path) {
                Ok(true) => OutputFormatter::success(&format!(
                    "Added destination [{}] {}",
                    self.session.store().destinations().len(),
                    path.display()
                )),
                Ok(false) => OutputFormatter::info("Destination already registered"),
                Err(e) => OutputFormatter::error(&e.to_string()),
            },
            ShellCommand::RemoveDestination(n) => {
                let Some(path) = self.destination(n) else {
                    return;
                };
                match self.session.remove_destination(&path) {
                    Ok(_) => OutputFormatter::success(&format!("Removed {}", path.display())),
                    Err(e) => OutputFormatter::error(&e.to_string()),
                }
            }
            ShellCommand::Destinations => self.show_destinations(),
            ShellCommand::Assignments => self.show_assignments(),
            ShellCommand::Apply => self.apply(input),
            ShellCommand::Clear => {
                let count = self.session.store().assignment_count();
                if count == 0 {
                    OutputFormatter::info("No pending assignments");
                } else if confirm(input, &format!("Clear {} pending assignment(s)?", count)) {
                    self.session.clear_assignments();
                    OutputFormatter::success("Assignments cleared");
                }
            }
            ShellCommand::Delete => {
                let Some(current) = self.session.current_file().map(Path::to_path_buf) else {
                    OutputFormatter::info("No file selected");
                    return;
                };
                if confirm(input, &format!("Delete {} permanently?", current.display())) {
                    match self.session.delete_current() {
                        Ok(path) => {
                            OutputFormatter::success(&format!("Deleted {}", path.display()));
                            self.show_current();
                        }
                        Err(e) => OutputFormatter::error(&e.to_string()),
                    }
                }
            }
            ShellCommand::ZoomIn => {
                self.session.zoom_in();
                self.show_current();
            }
            ShellCommand::ZoomOut => {
                self.session.zoom_out();
                self.show_current();
            }
            ShellCommand::Show => self.show_current(),
            ShellCommand::List => self.show_listing(),
            ShellCommand::Plugins => self.show_plugins(),
            ShellCommand::Run { plugin, action } => {
                if confirm(input, &format!("Run '{}' from plugin '{}'?", action, plugin)) {
                    match self.host.invoke(&plugin, &action, &mut self.session) {
                        Ok(()) => OutputFormatter::success("Done"),
                        Err(e) => OutputFormatter::error(&e.to_string()),
                    }
                }
            }
            ShellCommand::History => self.show_history(),
            ShellCommand::Help => OutputFormatter::plain(HELP),
            ShellCommand::Quit => {}
        }
    }

    fn destination(&self, n: usize) -> Option<PathBuf> {
        let found = self.session.store().destinations().get(n - 1).cloned();
        if found.is_none() {
            OutputFormatter::error(&format!("No destination [{}]", n));
        }
        found
    }

    fn assign(&mut self, n: usize) {
        if self.session.current_file().is_none() {
            OutputFormatter::info("No file selected");
            return;
        }
        let Some(destination) = self.destination(n) else {
            return;
        };
        match self.session.toggle_assignment(&destination) {
            Ok(Some(dest)) => OutputFormatter::success(&format!("→ {}", display_name(&dest))),
            Ok(None) => OutputFormatter::success("Assignment removed"),
            Err(e) => OutputFormatter::error(&e.to_string()),
        }
    }

    fn apply<R: BufRead>(&mut self, input: &mut R) {
        let count = self.session.store().assignment_count();
        if count == 0 {
            OutputFormatter::info("No pending assignments");
            return;
        }
        self.show_assignments();
        if !confirm(input, &format!("Move {} file(s) now?", count)) {
            return;
        }

        let pb = OutputFormatter::create_progress_bar(count as u64);
        let result = self.session.apply(|moved| {
            pb.set_message(display_name(&moved.original_path));
            pb.inc(1);
        });
        pb.finish_and_clear();

        match result {
            Ok(report) => {
                OutputFormatter::success(&format!("Moved {} file(s)", report.moved_count()));
            }
            Err(e) => {
                OutputFormatter::error(&e.to_string());
                OutputFormatter::warning(&format!(
                    "Files already moved stay moved; {} assignment(s) still pending",
                    self.session.store().assignment_count()
                ));
            }
        }
        self.show_current();
    }

    fn show_current(&self) {
        let store = self.session.store();
        let Some(file) = self.session.current_file() else {
            match store.source_folder() {
                None => OutputFormatter::info("No source folder. Use 'open <path>'."),
                Some(_) => OutputFormatter::info("NO MATCHING FILES FOUND"),
            }
            return;
        };

        let description = preview::describe(file);
        let preview = self.session.preview();
        let (w, h) = preview.dimensions();
        let kind = match &description.kind {
            FileKind::Image { mime } => format!("{} {}x{} @{:.2}x", mime, w, h, preview.zoom()),
            FileKind::Other { mime } => mime.clone(),
            FileKind::Unknown => "unknown type".to_string(),
        };

        OutputFormatter::header(&format!(
            "[{}/{}] {}",
            self.session.current_index() + 1,
            store.len(),
            display_name(file)
        ));
        OutputFormatter::plain(&format!("  {} · {} bytes", kind, description.size_bytes));
        match store.assignment(file) {
            Some(dest) => OutputFormatter::plain(&format!("  assigned → {}", dest.display())),
            None => OutputFormatter::plain("  unassigned"),
        }
        self.show_destinations_inline(store.assignment(file));
    }

    fn show_destinations_inline(&self, current: Option<&Path>) {
        let line: Vec<String> = self
            .session
            .store()
            .destinations()
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let label = format!("[{}] {}", (i + 1) % 10, display_name(d));
                if Some(d.as_path()) == current {
                    format!("*{}*", label)
                } else {
                    label
                }
            })
            .collect();
        if !line.is_empty() {
            OutputFormatter::plain(&format!("  {}", line.join("  ")));
        }
    }

    fn show_listing(&self) {
        let store = self.session.store();
        OutputFormatter::header(&format!("Files matching '{}'", store.filter_pattern()));
        for (i, file) in store.source_files().iter().enumerate() {
            let marker = if i == self.session.current_index() { ">" } else { " " };
            let dest = store
                .assignment(file)
                .map(|d| format!(" → {}", display_name(d)))
                .unwrap_or_default();
            OutputFormatter::plain(&format!("{} {:>3}. {}{}", marker, i + 1, display_name(file), dest));
        }
    }

    fn show_destinations(&self) {
        let destinations = self.session.store().destinations();
        if destinations.is_empty() {
            OutputFormatter::info("No destinations. Use 'dest add <path>'.");
            return;
        }
        OutputFormatter::header("Destinations");
        for (i, d) in destinations.iter().enumerate() {
            OutputFormatter::plain(&format!("  [{}] {}", i + 1, d.display()));
        }
    }

    fn show_assignments(&self) {
        let store = self.session.store();
        let mut counts: BTreeMap<&Path, usize> = BTreeMap::new();
        for (_, dest) in store.assignments() {
            *counts.entry(dest).or_insert(0) += 1;
        }
        let rows: Vec<(&Path, usize)> = store
            .destinations()
            .iter()
            .map(|d| (d.as_path(), counts.get(d.as_path()).copied().unwrap_or(0)))
            .collect();
        OutputFormatter::summary_table(&rows);
    }

    fn show_plugins(&self) {
        let plugins = self.host.plugins();
        if plugins.is_empty() {
            OutputFormatter::info(&format!(
                "No plugins loaded from {}",
                self.host.plugin_dir().display()
            ));
            return;
        }
        OutputFormatter::header("Plugins");
        for (name, state, info) in plugins {
            OutputFormatter::plain(&format!("  {} ({:?}) - {}", name, state, info.name));
        }
        for panel in self.session.panels() {
            OutputFormatter::plain(&format!(
                "  run {} {}",
                panel.plugin,
                panel.actions.join(" | ")
            ));
        }
    }

    fn show_history(&self) {
        let entries = self.session.history().entries();
        if entries.is_empty() {
            OutputFormatter::info("History is empty");
            return;
        }
        OutputFormatter::header("History (oldest first)");
        for record in entries {
            OutputFormatter::plain(&format!(
                "  {} {}",
                record.recorded_at.format("%H:%M:%S"),
                record.command
            ));
        }
    }

    /// Unloads plugins and hands back the session.
    pub fn finish(mut self) -> Session {
        self.host.unload_all(&mut self.session);
        self.session
    }
}

fn read_line<R: BufRead>(input: &mut R) -> Option<String> {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
    }
}

/// Asks a yes/no question; anything but `y`/`yes` is a no.
fn confirm<R: BufRead>(input: &mut R, question: &str) -> bool {
    OutputFormatter::prompt(&format!("{} [y/N]", question));
    read_line(input)
        .map(|answer| matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
        .unwrap_or(false)
}

/// Runs the whole application for parsed arguments, reading commands from `input`.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use sortling::cli::{Args, run_cli};
///
/// let args = Args::parse_from(["sortling", "/photos/inbox", "-d", "/photos/keep"]);
/// let mut stdin = std::io::stdin().lock();
/// if let Err(e) = run_cli(&args, &mut stdin) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli<R: BufRead>(args: &Args, input: &mut R) -> Result<(), String> {
    let config_store = ConfigStore::open(&args.config_dir)
        .map_err(|e| format!("Error opening configuration: {}", e))?;
    let mut core = CoreConfig::load_or_default(&config_store)
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    crate::logging::init_tracing(args.log_level.as_deref().unwrap_or(&core.log_level));

    let mut store = AssignmentStore::new();
    let filter = args.filter.clone().unwrap_or_else(|| core.filter.clone());
    if let Err(e) = store.set_filter(&filter) {
        OutputFormatter::warning(&format!("{}; showing all files", e));
    }
    if let Some(source) = &args.source {
        store.set_source_folder(Some(source.as_path())).map_err(|e| e.to_string())?;
    }
    for dest in &args.destinations {
        if let Err(e) = store.add_destination(dest) {
            OutputFormatter::warning(&e.to_string());
        }
    }

    let session = Session::new(store, PreviewSize::with_zoom(core.zoom));
    let host = PluginHost::new(&args.plugin_dir, PluginRegistry::builtin());
    let mut shell = Shell::new(session, host);

    let loaded = shell.load_plugins();
    if !loaded.is_empty() {
        OutputFormatter::info(&format!("Loaded plugins: {}", loaded.join(", ")));
    }

    shell.run(input);
    let session = shell.finish();

    core.filter = session.store().filter_pattern().to_string();
    core.zoom = session.preview().zoom();
    if let Err(e) = core.save(&config_store) {
        warn!(error = %e, "could not save configuration");
        OutputFormatter::warning(&format!("Could not save configuration: {}", e));
    }

    let pending = session.store().assignment_count();
    if pending > 0 {
        OutputFormatter::warning(&format!(
            "{} assignment(s) were not applied and are discarded",
            pending
        ));
    }
    Ok(())
}
