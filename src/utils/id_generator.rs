//! Identifier generation for threads, checkpoints, and branches.

use uuid::Uuid;

/// Generates the run-scoped identifiers the engine needs.
///
/// All ids are UUIDv4-derived; checkpoint ids are never reused, which is
/// what lets the checkpoint store treat writes as append-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdGenerator;

impl IdGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Fresh thread id.
    #[must_use]
    pub fn thread_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Fresh checkpoint id.
    #[must_use]
    pub fn checkpoint_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Branch thread id derived from the original, keeping the lineage
    /// visible in listings: `{thread}__branch__{8 hex chars}`.
    #[must_use]
    pub fn branch_thread_id(&self, original: &str) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{original}__branch__{}", &suffix[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_ids_carry_lineage() {
        let ids = IdGenerator::new();
        let branch = ids.branch_thread_id("thread-1");
        assert!(branch.starts_with("thread-1__branch__"));
        assert_eq!(branch.len(), "thread-1__branch__".len() + 8);
    }

    #[test]
    fn checkpoint_ids_are_unique() {
        let ids = IdGenerator::new();
        assert_ne!(ids.checkpoint_id(), ids.checkpoint_id());
    }
}
