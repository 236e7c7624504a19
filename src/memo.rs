use crate::period::FilterSelection;
use std::collections::HashMap;

/// Results computed for a (view, selection) pair, reused until cleared.
///
/// Keys carry the whole selection, so changing any filter computes afresh.
#[derive(Debug, Clone)]
pub struct RenderMemo<T> {
    entries: HashMap<(String, FilterSelection), T>,
}

impl<T> Default for RenderMemo<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> RenderMemo<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, view: &str, selection: &FilterSelection) -> Option<&T> {
        self.entries.get(&(view.to_string(), selection.clone()))
    }

    pub fn get_or_insert_with<F>(&mut self, view: &str, selection: &FilterSelection, compute: F) -> &T
    where
        F: FnOnce() -> T,
    {
        self.entries
            .entry((view.to_string(), selection.clone()))
            .or_insert_with(compute)
    }

    /// Forgets every result computed for `view`.
    pub fn invalidate_view(&mut self, view: &str) {
        self.entries.retain(|(v, _), _| v != view);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::MonthSelection;

    #[test]
    fn test_memo_reuses_results_per_selection() {
        let mut memo = RenderMemo::new();
        let january = FilterSelection::new(2025, MonthSelection::Month(1));
        let all = FilterSelection::new(2025, MonthSelection::All);
        let mut computed = 0;

        memo.get_or_insert_with("vw_ventas", &january, || {
            computed += 1;
            10.0
        });
        let value = *memo.get_or_insert_with("vw_ventas", &january, || {
            computed += 1;
            99.0
        });
        assert_eq!(value, 10.0);
        assert_eq!(computed, 1);

        memo.get_or_insert_with("vw_ventas", &all, || 20.0);
        memo.get_or_insert_with("vw_compras", &all, || 30.0);
        assert_eq!(memo.len(), 3);

        memo.invalidate_view("vw_ventas");
        assert_eq!(memo.len(), 1);
        assert_eq!(memo.get("vw_compras", &all), Some(&30.0));

        memo.clear();
        assert!(memo.is_empty());
    }
}
