/// Row accounting owned by the controller.
///
/// Always `skipped <= processed` and `error <= complete <= processed`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub processed: u64,
    pub skipped: u64,
    pub complete: u64,
    pub error: u64,
}

impl Counters {
    /// Rows handed to the loader that have not completed yet.
    pub fn lead(&self) -> u64 {
        self.processed
            .saturating_sub(self.complete)
            .saturating_sub(self.skipped)
    }

    /// Every processed row is either complete or skipped.
    pub fn is_terminal(&self) -> bool {
        self.complete + self.skipped == self.processed
    }

    pub fn loaded(&self) -> u64 {
        self.complete - self.error
    }

    pub fn holds_invariants(&self) -> bool {
        self.skipped <= self.processed
            && self.error <= self.complete
            && self.complete <= self.processed
    }
}
