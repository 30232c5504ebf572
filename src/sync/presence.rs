//! Presence tracking.

/// Number of connected participants, as last reported by the server.
///
/// Overwritten wholesale by every `user_count`; the local session's own
/// connect/disconnect never adjusts it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceTracker {
    count: u32,
}

impl PresenceTracker {
    /// Start at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last reported count.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Overwrite the count. Returns `true` if it changed.
    pub fn update(&mut self, count: u32) -> bool {
        let changed = self.count != count;
        self.count = count;
        changed
    }
}
