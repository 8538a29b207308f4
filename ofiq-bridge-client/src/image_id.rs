//! Per-client image identifiers.

/// Hands out image ids for PROCESS_IMAGE requests.
///
/// Ids start at 1 and wrap from `u32::MAX` to 0.
#[derive(Debug, Clone, Default)]
pub struct ImageIdCounter {
    last: u32,
}

impl ImageIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the counter so that the next id is `last + 1`.
    pub fn starting_after(last: u32) -> Self {
        Self { last }
    }

    pub fn next(&mut self) -> u32 {
        self.last = self.last.wrapping_add(1);
        self.last
    }

    /// The most recently issued id, or 0 before the first call to [`next`](Self::next).
    pub fn last(&self) -> u32 {
        self.last
    }
}
