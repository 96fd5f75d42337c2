use std::collections::HashSet;
use std::fmt;

/// State of one unit of work within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Pending => "pending",
            ItemState::InFlight => "in-flight",
            ItemState::Succeeded => "succeeded",
            ItemState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemState::Succeeded | ItemState::Failed)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of work: a key plus its processing state.
///
/// The scheduler moves an item Pending → InFlight on dispatch; the retry
/// controller owns the attempt counter and the terminal transition.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub key: String,
    pub state: ItemState,
    /// Attempts made so far (0 until the first attempt starts).
    pub attempt: u32,
}

impl WorkItem {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: ItemState::Pending,
            attempt: 0,
        }
    }
}

/// Deduplicate raw input keys, preserving first-occurrence order and
/// dropping blank entries.
pub fn dedupe_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for key in keys {
        let key = key.as_ref().trim();
        if key.is_empty() {
            continue;
        }
        if seen.insert(key.to_string()) {
            out.push(key.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!ItemState::Pending.is_terminal());
        assert!(!ItemState::InFlight.is_terminal());
        assert!(ItemState::Succeeded.is_terminal());
        assert!(ItemState::Failed.is_terminal());
    }

    #[test]
    fn test_new_item_starts_pending() {
        let item = WorkItem::new("学习");
        assert_eq!(item.state, ItemState::Pending);
        assert_eq!(item.attempt, 0);
    }

    #[test]
    fn test_dedupe_preserves_first_occurrence_order() {
        let keys = dedupe_keys(["a", "b", "a", "c", "b"]);
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dedupe_drops_blank_keys() {
        let keys = dedupe_keys(["a", "", "  ", "b"]);
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_dedupe_is_case_sensitive() {
        let keys = dedupe_keys(["Ma", "ma"]);
        assert_eq!(keys, vec!["Ma", "ma"]);
    }
}
