//! Append-only card history with a navigable cursor.

use crate::card::Card;

/// Every card produced in a session, oldest first.
///
/// Entries are never removed or reordered. Moving the cursor back and then
/// appending does not discard the entries after the cursor.
#[derive(Debug, Clone, Default)]
pub struct CardHistory {
    entries: Vec<Card>,
    cursor: usize,
}

impl CardHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `card` and move the cursor to it. Returns the new index.
    pub fn push(&mut self, card: Card) -> usize {
        self.entries.push(card);
        self.cursor = self.entries.len() - 1;
        self.cursor
    }

    /// Step toward the oldest entry. `None` when already there or empty.
    pub fn back(&mut self) -> Option<&Card> {
        if self.cursor == 0 || self.entries.is_empty() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    /// Step toward the newest entry. `None` when already there or empty.
    pub fn forward(&mut self) -> Option<&Card> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor)
    }

    pub fn current(&self) -> Option<&Card> {
        self.entries.get(self.cursor)
    }

    /// Cursor index, or `None` while the history is empty.
    pub fn cursor(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Card] {
        &self.entries
    }

    /// One-based position label such as `"2/3"`.
    pub fn position(&self) -> String {
        match self.cursor() {
            Some(cursor) => format!("{}/{}", cursor + 1, self.entries.len()),
            None => "0/0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(n: usize) -> Card {
        Card::new(format!("Q{n}"), format!("A{n}"))
    }

    #[test]
    fn empty_history_has_no_cursor() {
        let mut history = CardHistory::new();
        assert_eq!(history.cursor(), None);
        assert!(history.current().is_none());
        assert!(history.back().is_none());
        assert!(history.forward().is_none());
        assert_eq!(history.position(), "0/0");
    }

    #[test]
    fn push_moves_cursor_to_tail() {
        let mut history = CardHistory::new();
        for n in 0..3 {
            assert_eq!(history.push(card(n)), n);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), Some(2));
        assert_eq!(history.current().unwrap().front, "Q2");
    }

    #[test]
    fn navigation_is_clamped() {
        let mut history = CardHistory::new();
        for n in 0..3 {
            history.push(card(n));
        }
        assert_eq!(history.back().unwrap().front, "Q1");
        assert_eq!(history.back().unwrap().front, "Q0");
        assert!(history.back().is_none());
        assert_eq!(history.cursor(), Some(0));

        assert_eq!(history.forward().unwrap().front, "Q1");
        assert_eq!(history.forward().unwrap().front, "Q2");
        assert!(history.forward().is_none());
        assert_eq!(history.cursor(), Some(2));
    }

    #[test]
    fn push_after_back_keeps_forward_entries() {
        let mut history = CardHistory::new();
        history.push(card(0));
        history.push(card(1));
        history.back();
        history.push(card(2));

        let fronts: Vec<_> = history.entries().iter().map(|c| c.front.as_str()).collect();
        assert_eq!(fronts, ["Q0", "Q1", "Q2"]);
        assert_eq!(history.position(), "3/3");
    }
}
