use crate::chart::ChartPatch;
use std::collections::VecDeque;

/// One undoable step: what was applied and what reverts it.
#[derive(Debug, Clone)]
pub(crate) struct Step {
    pub forward: Vec<ChartPatch>,
    pub inverse: Vec<ChartPatch>,
}

/// Linear undo/redo history over patch pairs.
///
/// `cursor` counts the steps currently applied. Steps at or beyond the
/// cursor form the redo branch and are discarded on the next push.
#[derive(Debug, Clone)]
pub(crate) struct History {
    steps: VecDeque<Step>,
    cursor: usize,
    limit: usize,
    /// Cursor position matching the last chart acknowledged by the store of record.
    clean_at: Option<usize>,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            steps: VecDeque::new(),
            cursor: 0,
            limit: limit.max(1),
            clean_at: Some(0),
        }
    }

    pub fn push(&mut self, step: Step) {
        self.steps.truncate(self.cursor);
        if self.clean_at.is_some_and(|clean| clean > self.cursor) {
            self.clean_at = None;
        }
        self.steps.push_back(step);
        self.cursor += 1;

        while self.steps.len() > self.limit {
            self.steps.pop_front();
            self.cursor -= 1;
            self.clean_at = self.clean_at.and_then(|clean| clean.checked_sub(1));
        }
    }

    /// Patches reverting the most recent applied step; moves the cursor back.
    pub fn undo(&mut self) -> Option<&[ChartPatch]> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.steps.get(self.cursor).map(|s| s.inverse.as_slice())
    }

    /// Patches re-applying the next undone step; moves the cursor forward.
    pub fn redo(&mut self) -> Option<&[ChartPatch]> {
        let step = self.steps.get(self.cursor)?;
        self.cursor += 1;
        Some(step.forward.as_slice())
    }

    /// Puts the cursor back after a failed replay.
    pub fn revert_undo(&mut self) {
        self.cursor += 1;
    }

    pub fn revert_redo(&mut self) {
        self.cursor -= 1;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.steps.len()
    }

    pub fn mark_clean(&mut self) {
        self.clean_at = Some(self.cursor);
    }

    pub fn mark_dirty(&mut self) {
        self.clean_at = None;
    }

    pub fn is_dirty(&self) -> bool {
        self.clean_at != Some(self.cursor)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.steps.len()
    }
}
