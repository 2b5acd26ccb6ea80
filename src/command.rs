//! Commands recorded in the triage history.

use crate::assignment::{AssignmentError, AssignmentStore};
use crate::history::Command;
use std::fmt;
use std::path::{Path, PathBuf};

/// Every mutation of an `AssignmentStore` that can be undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageCommand {
    /// Switched the source folder.
    SetSource {
        previous: Option<PathBuf>,
        next: Option<PathBuf>,
    },
    /// Changed the filter and refreshed the listing.
    SetFilter { previous: String, next: String },
    /// Changed the assignment of one file. `None` means unassigned.
    Assign {
        file: PathBuf,
        previous: Option<PathBuf>,
        next: Option<PathBuf>,
    },
    AddDestination { path: PathBuf },
    RemoveDestination { path: PathBuf, index: usize },
    /// Dropped all pending assignments.
    ClearAssignments { cleared: Vec<(PathBuf, PathBuf)> },
}

impl TriageCommand {
    /// Sets `file` to `to`, whatever it was before.
    fn set_assignment(
        store: &mut AssignmentStore,
        file: &Path,
        to: Option<&PathBuf>,
    ) -> Result<(), AssignmentError> {
        match to {
            Some(dest) => store.assign(file, dest).map(|_| ()),
            None => {
                store.unassign(file);
                Ok(())
            }
        }
    }

    /// Makes the command refer to `to` wherever it referred to the file `from`.
    pub fn rename_file(&mut self, from: &Path, to: &Path) {
        match self {
            Self::Assign { file, .. } if file.as_path() == from => *file = to.to_path_buf(),
            Self::ClearAssignments { cleared } => {
                for (file, _) in cleared.iter_mut().filter(|(file, _)| file.as_path() == from) {
                    *file = to.to_path_buf();
                }
            }
            _ => {}
        }
    }

    fn set_filter(store: &mut AssignmentStore, pattern: &str) -> Result<(), AssignmentError> {
        store.set_filter(pattern)?;
        store.refresh()
    }
}

impl Command for TriageCommand {
    type Target = AssignmentStore;
    type Error = AssignmentError;

    fn execute(&self, store: &mut AssignmentStore) -> Result<(), AssignmentError> {
        match self {
            Self::SetSource { next, .. } => store.set_source_folder(next.as_deref()),
            Self::SetFilter { next, .. } => Self::set_filter(store, next),
            Self::Assign { file, next, .. } => Self::set_assignment(store, file, next.as_ref()),
            Self::AddDestination { path } => store.add_destination(path).map(|_| ()),
            Self::RemoveDestination { path, .. } => store.remove_destination(path).map(|_| ()),
            Self::ClearAssignments { .. } => {
                store.clear_assignments();
                Ok(())
            }
        }
    }

    fn revert(&self, store: &mut AssignmentStore) -> Result<(), AssignmentError> {
        match self {
            Self::SetSource { previous, .. } => store.set_source_folder(previous.as_deref()),
            Self::SetFilter { previous, .. } => Self::set_filter(store, previous),
            Self::Assign { file, previous, .. } => Self::set_assignment(store, file, previous.as_ref()),
            Self::AddDestination { path } => store.remove_destination(path).map(|_| ()),
            Self::RemoveDestination { path, index } => {
                store.insert_destination(*index, path.clone());
                Ok(())
            }
            Self::ClearAssignments { cleared } => {
                for (file, dest) in cleared {
                    store.assign(file, dest)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for TriageCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetSource { next: Some(path), .. } => {
                write!(f, "open source {}", path.display())
            }
            Self::SetSource { next: None, .. } => write!(f, "close source"),
            Self::SetFilter { next, .. } => write!(f, "set filter '{}'", next),
            Self::Assign {
                file,
                next: Some(dest),
                ..
            } => write!(f, "assign {} -> {}", file.display(), dest.display()),
            Self::Assign {
                file, next: None, ..
            } => write!(f, "unassign {}", file.display()),
            Self::AddDestination { path } => write!(f, "add destination {}", path.display()),
            Self::RemoveDestination { path, .. } => {
                write!(f, "remove destination {}", path.display())
            }
            Self::ClearAssignments { cleared } => {
                write!(f, "clear {} assignment(s)", cleared.len())
            }
        }
    }
}
