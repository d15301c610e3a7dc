use std::sync::Arc;

use crate::model::stats::MonthlySnapshot;
use crate::time::MonthKey;

/// What the stats screen can show.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsView {
    /// Nothing to show yet for this month.
    Loading,
    /// From the cache, or kept after a failed refresh.
    StaleButAvailable(Arc<MonthlySnapshot>),
    Fresh(Arc<MonthlySnapshot>),
}

impl StatsView {
    pub fn snapshot(&self) -> Option<&MonthlySnapshot> {
        match self {
            StatsView::Loading => None,
            StatsView::StaleButAvailable(s) | StatsView::Fresh(s) => Some(s),
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, StatsView::Fresh(_))
    }
}

/// Observable state of one mess+month stats view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub month: MonthKey,
    pub view: StatsView,
    pub last_error: Option<String>,
    /// Sequence number of the run that produced the current snapshot.
    pub generation: u64,
    pub refreshing: bool,
}

impl ViewState {
    pub fn new(month: MonthKey) -> Self {
        Self {
            month,
            view: StatsView::Loading,
            last_error: None,
            generation: 0,
            refreshing: false,
        }
    }

    /// Switch to another month, optionally seeded with its cached snapshot.
    pub fn switch_month(&mut self, month: MonthKey, cached: Option<MonthlySnapshot>) {
        self.month = month;
        self.last_error = None;
        self.view = match cached {
            Some(snapshot) if snapshot.month == month => StatsView::StaleButAvailable(Arc::new(snapshot)),
            _ => StatsView::Loading,
        };
    }

    /// Cache hits never replace a snapshot that is already on screen.
    pub fn apply_cached(&mut self, snapshot: MonthlySnapshot) {
        if matches!(self.view, StatsView::Loading) && snapshot.month == self.month {
            self.view = StatsView::StaleButAvailable(Arc::new(snapshot));
        }
    }

    pub fn apply_fresh(&mut self, generation: u64, snapshot: MonthlySnapshot) {
        self.generation = generation;
        self.last_error = None;
        self.view = StatsView::Fresh(Arc::new(snapshot));
    }

    /// The last snapshot stays visible, marked stale.
    pub fn apply_failure(&mut self, message: String) {
        self.last_error = Some(message);
        if let StatsView::Fresh(snapshot) = &self.view {
            self.view = StatsView::StaleButAvailable(Arc::clone(snapshot));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::stats::HouseStats;

    fn snapshot(month: MonthKey, total_meal: u32) -> MonthlySnapshot {
        MonthlySnapshot {
            mess_id: "home".into(),
            month,
            house: HouseStats {
                total_meal,
                ..Default::default()
            },
            members: Vec::new(),
        }
    }

    #[test]
    fn test_failure_keeps_last_good_snapshot() {
        let month = MonthKey::new(2026, 10).unwrap();
        let mut state = ViewState::new(month);
        state.apply_fresh(1, snapshot(month, 15));
        state.apply_failure("transactions unavailable".into());

        assert!(!state.view.is_fresh());
        assert_eq!(state.view.snapshot().unwrap().house.total_meal, 15);
        assert_eq!(state.last_error.as_deref(), Some("transactions unavailable"));
        assert_eq!(state.generation, 1);
    }

    #[test]
    fn test_failure_while_loading_stays_loading() {
        let month = MonthKey::new(2026, 10).unwrap();
        let mut state = ViewState::new(month);
        state.apply_failure("meals unavailable".into());
        assert_eq!(state.view, StatsView::Loading);
    }

    #[test]
    fn test_cached_does_not_override_fresh() {
        let month = MonthKey::new(2026, 10).unwrap();
        let mut state = ViewState::new(month);
        state.apply_fresh(2, snapshot(month, 20));
        state.apply_cached(snapshot(month, 5));
        assert!(state.view.is_fresh());
        assert_eq!(state.view.snapshot().unwrap().house.total_meal, 20);
    }

    #[test]
    fn test_switch_month_discards_previous_snapshot() {
        let oct = MonthKey::new(2026, 10).unwrap();
        let mut state = ViewState::new(oct);
        state.apply_fresh(1, snapshot(oct, 15));

        state.switch_month(oct.next(), None);
        assert_eq!(state.view, StatsView::Loading);

        state.switch_month(oct, Some(snapshot(oct, 15)));
        assert!(matches!(state.view, StatsView::StaleButAvailable(_)));
    }
}
