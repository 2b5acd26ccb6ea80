/// Linear undo/redo history of reversible commands.
///
/// The history does not know what a command means. It only knows that each
/// recorded command can be executed or reverted against some target, and keeps
/// the two stacks in the usual order: recording a new command throws away
/// anything that could have been redone.
use chrono::{DateTime, Local};
use tracing::info;

/// A reversible operation against a `Target`.
///
/// Implementations carry all the data they need by value, so a recorded
/// command stays valid no matter what the caller does afterwards.
pub trait Command {
    type Target;
    type Error;

    /// Performs the operation (used for redo).
    fn execute(&self, target: &mut Self::Target) -> Result<(), Self::Error>;

    /// Undoes the operation.
    fn revert(&self, target: &mut Self::Target) -> Result<(), Self::Error>;
}

/// A recorded command with the time it was recorded.
#[derive(Debug, Clone)]
pub struct ActionRecord<C> {
    pub command: C,
    pub recorded_at: DateTime<Local>,
}

/// Undo and redo stacks for commands of type `C`.
#[derive(Debug)]
pub struct ActionHistory<C> {
    undo_stack: Vec<ActionRecord<C>>,
    redo_stack: Vec<ActionRecord<C>>,
}

impl<C> Default for ActionHistory<C> {
    fn default() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }
}

impl<C: Command> ActionHistory<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a command that has already been performed.
    pub fn record(&mut self, command: C) {
        self.undo_stack.push(ActionRecord {
            command,
            recorded_at: Local::now(),
        });
        self.redo_stack.clear();
    }

    /// Reverts the most recent command and moves it to the redo stack.
    ///
    /// Returns `Ok(None)` when there is nothing to undo. If the revert fails the
    /// record stays on the undo stack.
    pub fn undo(&mut self, target: &mut C::Target) -> Result<Option<&C>, C::Error> {
        let Some(record) = self.undo_stack.pop() else {
            info!("Nothing to undo");
            return Ok(None);
        };

        if let Err(e) = record.command.revert(target) {
            self.undo_stack.push(record);
            return Err(e);
        }

        self.redo_stack.push(record);
        Ok(self.redo_stack.last().map(|r| &r.command))
    }

    /// Re-executes the most recently undone command and moves it back to the
    /// undo stack.
    ///
    /// Returns `Ok(None)` when there is nothing to redo. If the execution fails
    /// the record stays on the redo stack.
    pub fn redo(&mut self, target: &mut C::Target) -> Result<Option<&C>, C::Error> {
        let Some(record) = self.redo_stack.pop() else {
            info!("Nothing to redo");
            return Ok(None);
        };

        if let Err(e) = record.command.execute(target) {
            self.redo_stack.push(record);
            return Err(e);
        }

        self.undo_stack.push(record);
        Ok(self.undo_stack.last().map(|r| &r.command))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Applies `f` to every recorded command on both stacks.
    ///
    /// Used when something outside the history renames what the commands
    /// refer to.
    pub fn rewrite(&mut self, mut f: impl FnMut(&mut C)) {
        for record in self.undo_stack.iter_mut().chain(self.redo_stack.iter_mut()) {
            f(&mut record.command);
        }
    }

    /// Undoable records, oldest first.
    pub fn entries(&self) -> &[ActionRecord<C>] {
        &self.undo_stack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Adds a number to a counter; fails to revert below zero.
    #[derive(Debug, Clone, PartialEq)]
    struct Add(i32);

    impl Command for Add {
        type Target = i32;
        type Error = String;

        fn execute(&self, target: &mut i32) -> Result<(), String> {
            *target += self.0;
            Ok(())
        }

        fn revert(&self, target: &mut i32) -> Result<(), String> {
            if *target - self.0 < 0 {
                return Err("would go negative".to_string());
            }
            *target -= self.0;
            Ok(())
        }
    }

    #[test]
    fn test_undo_empty_is_noop() {
        let mut history: ActionHistory<Add> = ActionHistory::new();
        let mut value = 3;

        assert_eq!(history.undo(&mut value), Ok(None));
        assert_eq!(history.redo(&mut value), Ok(None));
        assert_eq!(value, 3);
    }

    #[test]
    fn test_undo_then_redo() {
        let mut history = ActionHistory::new();
        let mut value = 0;

        value += 5;
        history.record(Add(5));
        value += 2;
        history.record(Add(2));

        assert_eq!(history.undo(&mut value), Ok(Some(&Add(2))));
        assert_eq!(value, 5);
        assert_eq!(history.undo(&mut value), Ok(Some(&Add(5))));
        assert_eq!(value, 0);
        assert!(!history.can_undo());

        history.redo(&mut value).unwrap();
        assert_eq!(value, 5);
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.redo_len(), 1);
    }

    #[test]
    fn test_record_discards_redo_stack() {
        let mut history = ActionHistory::new();
        let mut value = 0;

        value += 1;
        history.record(Add(1));
        history.undo(&mut value).unwrap();
        assert!(history.can_redo());

        value += 7;
        history.record(Add(7));

        assert!(!history.can_redo());
        assert_eq!(history.redo(&mut value), Ok(None));
        assert_eq!(value, 7);
    }

    #[test]
    fn test_failed_revert_keeps_record() {
        let mut history = ActionHistory::new();
        let mut value = 0;

        history.record(Add(4));
        assert!(history.undo(&mut value).is_err());

        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.redo_len(), 0);
        assert_eq!(value, 0);
    }

    #[test]
    fn test_entries_oldest_first() {
        let mut history = ActionHistory::new();
        history.record(Add(1));
        history.record(Add(2));

        let commands: Vec<_> = history.entries().iter().map(|r| r.command.clone()).collect();
        assert_eq!(commands, vec![Add(1), Add(2)]);

        history.clear();
        assert!(history.entries().is_empty());
    }
}
