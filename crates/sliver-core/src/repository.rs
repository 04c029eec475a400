use std::cell::{Cell, RefCell};

use crate::error::PersistenceError;
use crate::habit::HabitState;

/// Load/save boundary for the single habit record.
pub trait HabitRepository {
    fn load(&self) -> Result<Option<HabitState>, PersistenceError>;
    fn save(&self, state: &HabitState) -> Result<(), PersistenceError>;
    fn clear(&self) -> Result<(), PersistenceError>;
}

impl<R: HabitRepository + ?Sized> HabitRepository for &R {
    fn load(&self) -> Result<Option<HabitState>, PersistenceError> {
        (**self).load()
    }

    fn save(&self, state: &HabitState) -> Result<(), PersistenceError> {
        (**self).save(state)
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        (**self).clear()
    }
}

/// Process-local repository. Writes can be made to fail to exercise
/// persistence error paths.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    record: RefCell<Option<HabitState>>,
    fail_writes: Cell<bool>,
    writes: Cell<usize>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: HabitState) -> Self {
        let repo = Self::default();
        repo.record.replace(Some(state));
        repo
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Successful `save` + `clear` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    pub fn snapshot(&self) -> Option<HabitState> {
        self.record.borrow().clone()
    }

    fn check_writable(&self) -> Result<(), PersistenceError> {
        if self.fail_writes.get() {
            return Err(PersistenceError("store unavailable".to_string()));
        }
        Ok(())
    }
}

impl HabitRepository for MemoryRepository {
    fn load(&self) -> Result<Option<HabitState>, PersistenceError> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &HabitState) -> Result<(), PersistenceError> {
        self.check_writable()?;
        self.record.replace(Some(state.clone()));
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        self.check_writable()?;
        self.record.replace(None);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}
