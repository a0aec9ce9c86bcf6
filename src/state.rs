//! Sliding context window used during generation.

/// The `(previous, current)` token pair the model conditions on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow {
    pub previous: usize,
    pub current: usize,
}

impl ContextWindow {
    /// Generation starts from a single token, so it fills both slots.
    pub fn bootstrap(start: usize) -> Self {
        ContextWindow {
            previous: start,
            current: start,
        }
    }

    /// Shift in the next token, dropping the oldest.
    #[inline]
    pub fn advance(&mut self, next: usize) {
        self.previous = self.current;
        self.current = next;
    }
}
