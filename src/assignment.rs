/// Pending file assignments and the bulk move that commits them.
///
/// This module owns everything the triage session knows about the filesystem:
/// the listing of the current source folder (filtered by a regex over base
/// names), the set of destination folders, and the map of files waiting to be
/// moved. Nothing touches the disk until `apply_assignments` is called.
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Pattern used when no filter has been configured.
pub const DEFAULT_FILTER: &str = ".*";

/// Errors that can occur while listing, assigning or moving files.
#[derive(Debug, Error)]
pub enum AssignmentError {
    /// The requested source folder is not a directory.
    #[error("Invalid source folder {}: not a directory", path.display())]
    InvalidSource { path: PathBuf },

    /// The filter pattern does not compile.
    #[error("Invalid filter pattern '{pattern}': {reason}")]
    InvalidFilter { pattern: String, reason: String },

    /// The requested destination is not a directory.
    #[error("Invalid destination {}: not a directory", path.display())]
    InvalidDestination { path: PathBuf },

    /// A file was assigned to a folder that is not a registered destination.
    #[error("{} is not a registered destination", path.display())]
    UnknownDestination { path: PathBuf },

    /// The destination is still referenced by at least one assignment.
    #[error("Destination {} is in use by {count} assignment(s)", path.display())]
    DestinationInUse { path: PathBuf, count: usize },

    /// A file with the same name already exists in the destination.
    #[error("Cannot move {}: {} already exists", file.display(), target.display())]
    MoveConflict { file: PathBuf, target: PathBuf },

    /// The rename itself failed.
    #[error("Failed to move {} to {}: {source}", file.display(), target.display())]
    MoveFailed {
        file: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An index into the source listing was out of range.
    #[error("Index {index} is out of range for {len} source file(s)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Any other filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for assignment operations.
pub type AssignmentResult<T> = Result<T, AssignmentError>;

/// A single file moved by `apply_assignments`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedFile {
    /// Where the file was before the move.
    pub original_path: PathBuf,
    /// Where the file is now.
    pub new_path: PathBuf,
}

/// Summary of a completed apply.
#[derive(Debug, Default, Clone)]
pub struct ApplyReport {
    /// Every move performed, in order.
    pub moved: Vec<MovedFile>,
}

impl ApplyReport {
    /// Number of files moved.
    pub fn moved_count(&self) -> usize {
        self.moved.len()
    }
}

/// In-memory triage state for one source folder.
///
/// The listing is re-read from disk on `set_source_folder` and `refresh`; all
/// other operations only touch memory, except `apply_assignments` and
/// `delete_file`.
#[derive(Debug)]
pub struct AssignmentStore {
    source_folder: Option<PathBuf>,
    filter: Regex,
    source_files: Vec<PathBuf>,
    destinations: Vec<PathBuf>,
    assignments: BTreeMap<PathBuf, PathBuf>,
}

impl Default for AssignmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AssignmentStore {
    /// Creates an empty store with the match-everything filter.
    pub fn new() -> Self {
        Self {
            source_folder: None,
            filter: Regex::new(DEFAULT_FILTER).expect("default filter is a valid regex"),
            source_files: Vec::new(),
            destinations: Vec::new(),
            assignments: BTreeMap::new(),
        }
    }

    /// Switches to a new source folder and re-lists it with the current filter.
    ///
    /// Passing `None` clears the listing. On error the store is left unchanged.
    pub fn set_source_folder(&mut self, folder: Option<&Path>) -> AssignmentResult<()> {
        match folder {
            Some(path) => {
                if !path.is_dir() {
                    return Err(AssignmentError::InvalidSource {
                        path: path.to_path_buf(),
                    });
                }
                let files = self.list(path)?;
                self.source_folder = Some(path.to_path_buf());
                self.source_files = files;
            }
            None => {
                self.source_folder = None;
                self.source_files.clear();
            }
        }
        Ok(())
    }

    /// Replaces the filter. The listing is not touched until `refresh`.
    pub fn set_filter(&mut self, pattern: &str) -> AssignmentResult<()> {
        let regex = Regex::new(pattern).map_err(|e| AssignmentError::InvalidFilter {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        self.filter = regex;
        Ok(())
    }

    /// Re-lists the current source folder using the current filter.
    pub fn refresh(&mut self) -> AssignmentResult<()> {
        let Some(folder) = self.source_folder.clone() else {
            self.source_files.clear();
            return Ok(());
        };
        if !folder.is_dir() {
            return Err(AssignmentError::InvalidSource { path: folder });
        }
        self.source_files = self.list(&folder)?;
        Ok(())
    }

    /// Lists regular files in `folder` whose base name matches the filter,
    /// sorted by file name.
    fn list(&self, folder: &Path) -> AssignmentResult<Vec<PathBuf>> {
        let entries = fs::read_dir(folder).map_err(|e| AssignmentError::Io {
            path: folder.to_path_buf(),
            source: e,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(folder = %folder.display(), error = %e, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| self.filter.is_match(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.path())
            // `is_file` follows symlinks, so links to regular files are listed.
            .filter(|path| path.is_file())
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        debug!(folder = %folder.display(), count = files.len(), "listed source folder");
        Ok(files)
    }

    /// Registers a destination folder. Returns `false` if it was already registered.
    pub fn add_destination(&mut self, path: &Path) -> AssignmentResult<bool> {
        if !path.is_dir() {
            return Err(AssignmentError::InvalidDestination {
                path: path.to_path_buf(),
            });
        }
        if self.destinations.iter().any(|d| d == path) {
            return Ok(false);
        }
        self.destinations.push(path.to_path_buf());
        Ok(true)
    }

    /// Puts a destination back at a given position (clamped to the end).
    ///
    /// Used to restore a removed destination; does not re-check the disk.
    pub fn insert_destination(&mut self, index: usize, path: PathBuf) {
        if self.destinations.contains(&path) {
            return;
        }
        let index = index.min(self.destinations.len());
        self.destinations.insert(index, path);
    }

    /// Unregisters a destination, returning the position it held.
    ///
    /// Fails with `DestinationInUse` while any assignment points at it.
    pub fn remove_destination(&mut self, path: &Path) -> AssignmentResult<Option<usize>> {
        let count = self
            .assignments
            .values()
            .filter(|dest| dest.as_path() == path)
            .count();
        if count > 0 {
            return Err(AssignmentError::DestinationInUse {
                path: path.to_path_buf(),
                count,
            });
        }

        let position = self.destinations.iter().position(|d| d == path);
        if let Some(index) = position {
            self.destinations.remove(index);
        }
        Ok(position)
    }

    /// Assigns `file` to `destination`, returning the previous destination.
    pub fn assign(&mut self, file: &Path, destination: &Path) -> AssignmentResult<Option<PathBuf>> {
        if !self.destinations.iter().any(|d| d == destination) {
            return Err(AssignmentError::UnknownDestination {
                path: destination.to_path_buf(),
            });
        }
        Ok(self
            .assignments
            .insert(file.to_path_buf(), destination.to_path_buf()))
    }

    /// Removes the assignment for `file`, returning the destination it had.
    pub fn unassign(&mut self, file: &Path) -> Option<PathBuf> {
        self.assignments.remove(file)
    }

    /// Returns the destination `file` is assigned to, if any.
    pub fn assignment(&self, file: &Path) -> Option<&Path> {
        self.assignments.get(file).map(PathBuf::as_path)
    }

    /// Drops every assignment, returning what was removed.
    pub fn clear_assignments(&mut self) -> Vec<(PathBuf, PathBuf)> {
        std::mem::take(&mut self.assignments).into_iter().collect()
    }

    /// Moves every assigned file into its destination folder.
    ///
    /// See `apply_assignments_with`.
    pub fn apply_assignments(&mut self) -> AssignmentResult<ApplyReport> {
        self.apply_assignments_with(|_| {})
    }

    /// Moves every assigned file into its destination, keeping its base name,
    /// and calls `on_moved` after each successful move.
    ///
    /// Stops at the first failure. Files already moved stay moved and leave the
    /// map; the failing entry and everything after it stay assigned.
    ///
    /// # Errors
    ///
    /// * `MoveConflict` if the target path already exists
    /// * `MoveFailed` if the rename itself fails (missing source, permissions,
    ///   cross-device move)
    pub fn apply_assignments_with(
        &mut self,
        mut on_moved: impl FnMut(&MovedFile),
    ) -> AssignmentResult<ApplyReport> {
        let pending: Vec<(PathBuf, PathBuf)> = self
            .assignments
            .iter()
            .map(|(file, dest)| (file.clone(), dest.clone()))
            .collect();

        let mut report = ApplyReport::default();
        for (file, destination) in pending {
            let moved = Self::move_into(&file, &destination)?;
            self.assignments.remove(&file);
            on_moved(&moved);
            report.moved.push(moved);
        }

        info!(moved = report.moved_count(), "applied assignments");
        Ok(report)
    }

    /// Renames `file` to `destination/<file name>` unless that path exists.
    fn move_into(file: &Path, destination: &Path) -> AssignmentResult<MovedFile> {
        let file_name = file.file_name().ok_or_else(|| AssignmentError::MoveFailed {
            file: file.to_path_buf(),
            target: destination.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "file has no name component",
            ),
        })?;
        let target = destination.join(file_name);

        if target.exists() {
            return Err(AssignmentError::MoveConflict {
                file: file.to_path_buf(),
                target,
            });
        }

        fs::rename(file, &target).map_err(|e| AssignmentError::MoveFailed {
            file: file.to_path_buf(),
            target: target.clone(),
            source: e,
        })?;

        Ok(MovedFile {
            original_path: file.to_path_buf(),
            new_path: target,
        })
    }

    /// Deletes the file at `index` from disk and forgets it.
    pub fn delete_file(&mut self, index: usize) -> AssignmentResult<PathBuf> {
        let path = self
            .file_at(index)
            .ok_or(AssignmentError::IndexOutOfRange {
                index,
                len: self.source_files.len(),
            })?
            .to_path_buf();

        fs::remove_file(&path).map_err(|e| AssignmentError::Io {
            path: path.clone(),
            source: e,
        })?;

        self.source_files.remove(index);
        self.assignments.remove(&path);
        Ok(path)
    }

    /// Returns the source file at `index`.
    pub fn file_at(&self, index: usize) -> Option<&Path> {
        self.source_files.get(index).map(PathBuf::as_path)
    }

    /// Replaces the listing entry at `index`, e.g. after a file was converted
    /// to another format in place.
    pub fn set_file_at(&mut self, index: usize, path: PathBuf) -> AssignmentResult<()> {
        let len = self.source_files.len();
        let slot = self
            .source_files
            .get_mut(index)
            .ok_or(AssignmentError::IndexOutOfRange { index, len })?;
        *slot = path;
        Ok(())
    }

    pub fn source_files(&self) -> &[PathBuf] {
        &self.source_files
    }

    pub fn len(&self) -> usize {
        self.source_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source_files.is_empty()
    }

    pub fn source_folder(&self) -> Option<&Path> {
        self.source_folder.as_deref()
    }

    pub fn filter_pattern(&self) -> &str {
        self.filter.as_str()
    }

    /// Registered destinations in insertion order.
    pub fn destinations(&self) -> &[PathBuf] {
        &self.destinations
    }

    /// Pending assignments, ordered by file path.
    pub fn assignments(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.assignments
            .iter()
            .map(|(file, dest)| (file.as_path(), dest.as_path()))
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }
}
