/// Monotonic version counter used to mark binding-table changes.
///
/// A consumer remembers the version it last synchronised with and compares
/// on the next frame; any mutation in between bumps the counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeTracker {
    version: u64,
}

impl ChangeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self { version: 0 }
    }

    /// Records one mutation.
    pub fn changed(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// True if something changed since `seen` was read.
    #[inline]
    #[must_use]
    pub fn changed_since(&self, seen: u64) -> bool {
        self.version != seen
    }
}
