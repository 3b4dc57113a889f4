//! Order write stages.

use serde::{Deserialize, Serialize};

/// How far a single order write has progressed.
///
/// State transitions:
/// ```text
/// Created ──► ItemsPending ──► ItemsCommitted ──► StockAdjusted
///                  │                 │
///                  └─────────────────┴──► RolledBack
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WriteStage {
    /// The order row exists; no lines yet.
    #[default]
    Created,

    /// The line batch has been sent.
    ItemsPending,

    /// Every line is written; stock not yet touched.
    ItemsCommitted,

    /// Every line's stock has been adjusted (terminal state).
    StockAdjusted,

    /// The write failed and its rows were removed (terminal state).
    RolledBack,
}

impl WriteStage {
    /// Returns true if a failure at this stage must undo earlier writes.
    pub fn needs_rollback(&self) -> bool {
        matches!(self, WriteStage::ItemsPending | WriteStage::ItemsCommitted)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WriteStage::StockAdjusted | WriteStage::RolledBack)
    }

    /// Returns the stage name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteStage::Created => "created",
            WriteStage::ItemsPending => "items_pending",
            WriteStage::ItemsCommitted => "items_committed",
            WriteStage::StockAdjusted => "stock_adjusted",
            WriteStage::RolledBack => "rolled_back",
        }
    }
}

impl std::fmt::Display for WriteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stage_is_created() {
        assert_eq!(WriteStage::default(), WriteStage::Created);
    }

    #[test]
    fn test_needs_rollback() {
        assert!(!WriteStage::Created.needs_rollback());
        assert!(WriteStage::ItemsPending.needs_rollback());
        assert!(WriteStage::ItemsCommitted.needs_rollback());
        assert!(!WriteStage::StockAdjusted.needs_rollback());
        assert!(!WriteStage::RolledBack.needs_rollback());
    }

    #[test]
    fn test_terminal_stages() {
        assert!(!WriteStage::Created.is_terminal());
        assert!(!WriteStage::ItemsPending.is_terminal());
        assert!(!WriteStage::ItemsCommitted.is_terminal());
        assert!(WriteStage::StockAdjusted.is_terminal());
        assert!(WriteStage::RolledBack.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(WriteStage::ItemsCommitted.to_string(), "items_committed");
        assert_eq!(WriteStage::RolledBack.to_string(), "rolled_back");
    }
}
