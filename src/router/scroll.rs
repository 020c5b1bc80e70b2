//! Scroll records keyed by navigation id.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::host::ScrollPosition;

/// Scroll offset last seen for each history entry.
#[derive(Debug, Default)]
pub struct ScrollHistory {
    positions: Mutex<HashMap<u64, ScrollPosition>>,
}

impl ScrollHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: u64, position: ScrollPosition) {
        self.positions.lock().insert(id, position);
    }

    pub fn get(&self, id: u64) -> Option<ScrollPosition> {
        self.positions.lock().get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.lock().is_empty()
    }
}

/// Where to scroll once a navigation has rendered. A fragment that names an
/// existing element wins over the recorded position.
pub(crate) fn scroll_target(
    recorded: Option<ScrollPosition>,
    fragment_position: Option<ScrollPosition>,
) -> ScrollPosition {
    match fragment_position {
        Some(element) => ScrollPosition::new(0.0, element.y),
        None => recorded.unwrap_or(ScrollPosition::TOP),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_overwrite_per_id() {
        let history = ScrollHistory::new();
        history.record(1, ScrollPosition::new(0.0, 100.0));
        history.record(1, ScrollPosition::new(0.0, 250.0));
        history.record(2, ScrollPosition::TOP);
        assert_eq!(history.get(1), Some(ScrollPosition::new(0.0, 250.0)));
        assert_eq!(history.len(), 2);
        assert_eq!(history.get(3), None);
    }

    #[test]
    fn fragment_wins_over_record() {
        let recorded = Some(ScrollPosition::new(0.0, 300.0));
        assert_eq!(scroll_target(recorded, None), ScrollPosition::new(0.0, 300.0));
        assert_eq!(
            scroll_target(recorded, Some(ScrollPosition::new(40.0, 900.0))),
            ScrollPosition::new(0.0, 900.0)
        );
        assert_eq!(scroll_target(None, None), ScrollPosition::TOP);
    }
}
