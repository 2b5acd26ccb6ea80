//! The composed triage session and the capability surface plugins see.
//!
//! `Session` ties the assignment store, the action history, the current-file
//! cursor and the preview scale together. Every user mutation goes through it
//! so that it can be recorded for undo and announced to whoever draws the
//! screen. Plugins never get the session itself, only `&mut dyn HostContext`.

use crate::assignment::{ApplyReport, AssignmentResult, AssignmentStore, MovedFile};
use crate::command::TriageCommand;
use crate::history::ActionHistory;
use crate::preview::PreviewSize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Notifications fired after a mutation invalidates what is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SourcesChanged,
    DestinationsChanged,
    FullReload,
}

/// A block of UI contributed by a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    /// Name of the plugin that owns the panel.
    pub plugin: String,
    pub title: String,
    pub description: String,
    /// Actions the panel offers, invoked by name.
    pub actions: Vec<String>,
}

/// What a plugin is allowed to see and do.
pub trait HostContext {
    /// The filtered source listing.
    fn source_files(&self) -> &[PathBuf];

    /// Index of the file being previewed.
    fn current_index(&self) -> usize;

    /// Path of the file being previewed, if any.
    fn current_file(&self) -> Option<&Path>;

    fn assignment(&self, file: &Path) -> Option<&Path>;

    /// Every pending assignment, ordered by file path.
    fn assignments(&self) -> Box<dyn Iterator<Item = (&Path, &Path)> + '_>;

    fn assign(&mut self, file: &Path, destination: &Path) -> AssignmentResult<Option<PathBuf>>;

    fn unassign(&mut self, file: &Path) -> Option<PathBuf>;

    /// Replaces a listing entry, e.g. after converting a file in place.
    ///
    /// Recorded history that referred to the old path follows the new one.
    fn set_file_at(&mut self, index: usize, path: PathBuf) -> AssignmentResult<()>;

    /// Asks the presentation layer to redraw everything.
    fn request_reload(&mut self);

    /// Adds a panel to the plugin area.
    fn register_panel(&mut self, panel: Panel);
}

/// Application state for one triage run.
#[derive(Debug, Default)]
pub struct Session {
    store: AssignmentStore,
    history: ActionHistory<TriageCommand>,
    current_index: usize,
    preview: PreviewSize,
    events: Vec<SessionEvent>,
    panels: Vec<Panel>,
}

impl Session {
    pub fn new(store: AssignmentStore, preview: PreviewSize) -> Self {
        Self {
            store,
            preview,
            ..Self::default()
        }
    }

    pub fn store(&self) -> &AssignmentStore {
        &self.store
    }

    pub fn history(&self) -> &ActionHistory<TriageCommand> {
        &self.history
    }

    pub fn preview(&self) -> PreviewSize {
        self.preview
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    /// Returns and clears the events fired since the last call.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: SessionEvent) {
        if !self.events.contains(&event) {
            self.events.push(event);
        }
    }

    /// Keeps the cursor inside the listing after it changed.
    fn clamp_index(&mut self) {
        let len = self.store.len();
        if len == 0 {
            self.current_index = 0;
        } else if self.current_index >= len {
            self.current_index = len - 1;
        }
    }

    fn sources_changed(&mut self) {
        self.clamp_index();
        self.emit(SessionEvent::SourcesChanged);
    }

    pub fn next(&mut self) {
        let len = self.store.len();
        if len > 0 {
            self.current_index = (self.current_index + 1) % len;
            self.emit(SessionEvent::SourcesChanged);
        }
    }

    pub fn previous(&mut self) {
        let len = self.store.len();
        if len > 0 {
            self.current_index = (self.current_index + len - 1) % len;
            self.emit(SessionEvent::SourcesChanged);
        }
    }

    /// Jumps to `index`, wrapping around the listing.
    pub fn go_to(&mut self, index: usize) {
        let len = self.store.len();
        if len > 0 {
            self.current_index = index % len;
            self.emit(SessionEvent::SourcesChanged);
        }
    }

    /// Switches to another source folder (or none) and resets the cursor.
    pub fn open_source(&mut self, folder: Option<&Path>) -> AssignmentResult<()> {
        let previous = self.store.source_folder().map(Path::to_path_buf);
        self.store.set_source_folder(folder)?;
        self.history.record(TriageCommand::SetSource {
            previous,
            next: folder.map(Path::to_path_buf),
        });
        self.current_index = 0;
        info!(source = ?folder, files = self.store.len(), "opened source folder");
        self.sources_changed();
        Ok(())
    }

    /// Sets the filter and re-lists the source folder.
    pub fn set_filter(&mut self, pattern: &str) -> AssignmentResult<()> {
        let previous = self.store.filter_pattern().to_string();
        self.store.set_filter(pattern)?;
        if let Err(e) = self.store.refresh() {
            // Keep the store consistent with the listing it still shows.
            self.store.set_filter(&previous)?;
            return Err(e);
        }
        self.history.record(TriageCommand::SetFilter {
            previous,
            next: pattern.to_string(),
        });
        self.sources_changed();
        Ok(())
    }

    /// Re-reads the source folder without recording anything.
    pub fn refresh(&mut self) -> AssignmentResult<()> {
        self.store.refresh()?;
        self.sources_changed();
        Ok(())
    }

    /// Assigns the current file to `destination`, or unassigns it if it is
    /// already assigned there. Returns the new assignment.
    pub fn toggle_assignment(&mut self, destination: &Path) -> AssignmentResult<Option<PathBuf>> {
        let Some(file) = self.store.file_at(self.current_index).map(Path::to_path_buf) else {
            return Ok(None);
        };

        let next = if self.store.assignment(&file) == Some(destination) {
            None
        } else {
            Some(destination.to_path_buf())
        };
        let previous = match &next {
            Some(dest) => self.store.assign(&file, dest)?,
            None => self.store.unassign(&file),
        };

        debug!(file = %file.display(), ?next, "changed assignment");
        self.history.record(TriageCommand::Assign {
            file,
            previous,
            next: next.clone(),
        });
        self.emit(SessionEvent::SourcesChanged);
        Ok(next)
    }

    /// Removes the assignment of the current file. Returns `false` if there was none.
    pub fn unassign_current(&mut self) -> bool {
        let Some(file) = self.store.file_at(self.current_index).map(Path::to_path_buf) else {
            return false;
        };
        let Some(previous) = self.store.unassign(&file) else {
            return false;
        };
        self.history.record(TriageCommand::Assign {
            file,
            previous: Some(previous),
            next: None,
        });
        self.emit(SessionEvent::SourcesChanged);
        true
    }

    /// Registers a destination. Returns `false` if it was already registered.
    pub fn add_destination(&mut self, path: &Path) -> AssignmentResult<bool> {
        let added = self.store.add_destination(path)?;
        if added {
            self.history.record(TriageCommand::AddDestination {
                path: path.to_path_buf(),
            });
            self.emit(SessionEvent::DestinationsChanged);
        }
        Ok(added)
    }

    /// Unregisters a destination. Returns `false` if it was not registered.
    pub fn remove_destination(&mut self, path: &Path) -> AssignmentResult<bool> {
        let Some(index) = self.store.remove_destination(path)? else {
            return Ok(false);
        };
        self.history.record(TriageCommand::RemoveDestination {
            path: path.to_path_buf(),
            index,
        });
        self.emit(SessionEvent::DestinationsChanged);
        Ok(true)
    }

    /// Drops every pending assignment. Returns how many were dropped.
    pub fn clear_assignments(&mut self) -> usize {
        let cleared = self.store.clear_assignments();
        let count = cleared.len();
        if count > 0 {
            self.history.record(TriageCommand::ClearAssignments { cleared });
            self.emit(SessionEvent::SourcesChanged);
        }
        count
    }

    /// Commits all assignments as file moves and re-lists the source folder.
    ///
    /// The history is cleared only when every move succeeded, since the
    /// recorded commands no longer describe files that exist.
    pub fn apply(&mut self, on_moved: impl FnMut(&MovedFile)) -> AssignmentResult<ApplyReport> {
        let result = self.store.apply_assignments_with(on_moved);
        if result.is_ok() {
            self.store.clear_assignments();
            self.history.clear();
        }
        // Some files may have moved even on failure.
        let refreshed = self.store.refresh();
        self.sources_changed();
        let report = result?;
        refreshed?;
        Ok(report)
    }

    /// Deletes the current file from disk. Not undoable.
    pub fn delete_current(&mut self) -> AssignmentResult<PathBuf> {
        let deleted = self.store.delete_file(self.current_index)?;
        info!(file = %deleted.display(), "deleted file");
        self.sources_changed();
        Ok(deleted)
    }

    /// Undoes the last recorded command. Returns its description, or `None`
    /// if there was nothing to undo.
    pub fn undo(&mut self) -> AssignmentResult<Option<String>> {
        let undone = self.history.undo(&mut self.store)?.map(|c| c.to_string());
        if undone.is_some() {
            self.after_history_step();
        }
        Ok(undone)
    }

    /// Redoes the last undone command.
    pub fn redo(&mut self) -> AssignmentResult<Option<String>> {
        let redone = self.history.redo(&mut self.store)?.map(|c| c.to_string());
        if redone.is_some() {
            self.after_history_step();
        }
        Ok(redone)
    }

    fn after_history_step(&mut self) {
        self.clamp_index();
        self.emit(SessionEvent::FullReload);
    }

    pub fn zoom_in(&mut self) {
        self.preview.zoom_in();
        self.emit(SessionEvent::SourcesChanged);
    }

    pub fn zoom_out(&mut self) {
        self.preview.zoom_out();
        self.emit(SessionEvent::SourcesChanged);
    }
}

impl HostContext for Session {
    fn source_files(&self) -> &[PathBuf] {
        self.store.source_files()
    }

    fn current_index(&self) -> usize {
        self.current_index
    }

    fn current_file(&self) -> Option<&Path> {
        self.store.file_at(self.current_index)
    }

    fn assignment(&self, file: &Path) -> Option<&Path> {
        self.store.assignment(file)
    }

    fn assignments(&self) -> Box<dyn Iterator<Item = (&Path, &Path)> + '_> {
        Box::new(self.store.assignments())
    }

    fn assign(&mut self, file: &Path, destination: &Path) -> AssignmentResult<Option<PathBuf>> {
        let previous = self.store.assign(file, destination)?;
        self.emit(SessionEvent::SourcesChanged);
        Ok(previous)
    }

    fn unassign(&mut self, file: &Path) -> Option<PathBuf> {
        let previous = self.store.unassign(file);
        if previous.is_some() {
            self.emit(SessionEvent::SourcesChanged);
        }
        previous
    }

    fn set_file_at(&mut self, index: usize, path: PathBuf) -> AssignmentResult<()> {
        let old = self.store.file_at(index).map(Path::to_path_buf);
        self.store.set_file_at(index, path.clone())?;
        if let Some(old) = old.filter(|old| *old != path) {
            self.history.rewrite(|command| command.rename_file(&old, &path));
            debug!(from = %old.display(), to = %path.display(), "retargeted history");
        }
        self.emit(SessionEvent::SourcesChanged);
        Ok(())
    }

    fn request_reload(&mut self) {
        self.emit(SessionEvent::FullReload);
    }

    fn register_panel(&mut self, panel: Panel) {
        debug!(plugin = %panel.plugin, title = %panel.title, "registered panel");
        self.panels.push(panel);
    }
}
