//! Shared "gated section finished" state.
//!
//! One [`CompletionWriter`] exists per gated section and is owned by that section's sequencer.
//! Any number of [`CompletionReader`]s observe it (pinning, handoff, the stage).

use std::{cell::Cell, rc::Rc};

#[derive(Debug, Default)]
struct Shared {
    completed: Cell<bool>,
    epoch: Cell<u64>,
}

/// Creates the writer/reader pair for one gated section, initially incomplete.
pub fn section_completion() -> (CompletionWriter, CompletionReader) {
    let shared = Rc::new(Shared::default());
    (
        CompletionWriter {
            shared: Rc::clone(&shared),
        },
        CompletionReader { shared },
    )
}

/// Sole writer. Deliberately not `Clone`.
#[derive(Debug)]
pub struct CompletionWriter {
    shared: Rc<Shared>,
}

impl CompletionWriter {
    pub fn reset(&self) {
        self.shared.completed.set(false);
    }

    /// Marks the section complete. Bumps the refresh epoch on the false→true edge so readers
    /// know region boundaries must be recomputed.
    pub fn complete(&self) {
        if !self.shared.completed.replace(true) {
            self.shared.epoch.set(self.shared.epoch.get() + 1);
        }
    }

    pub fn reader(&self) -> CompletionReader {
        CompletionReader {
            shared: Rc::clone(&self.shared),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CompletionReader {
    shared: Rc<Shared>,
}

impl CompletionReader {
    pub fn is_complete(&self) -> bool {
        self.shared.completed.get()
    }

    pub fn epoch(&self) -> u64 {
        self.shared.epoch.get()
    }
}
