//! Session accumulator — merge successive scans into one restore state.
//!
//! `accumulate` takes a state by value and returns its successor; nothing is
//! retained between calls.  Merging is idempotent:
//!
//! - `Fragment(f)` stores `f` under `f.order` (last write wins).
//! - `TargetList(t)` replaces the targets wholesale.
//! - `TextHint(s)` replaces the hint wholesale.
//!
//! Completion depends on fragment coverage alone.  Targets and hint are
//! independent enrichments that never gate it.

use std::collections::BTreeMap;

use crate::codec::OrderedFragment;
use crate::recovery::classify::{AuxiliaryTargets, ScanItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    fragment_count: u32,
    fragments:      BTreeMap<u32, OrderedFragment>,
    targets:        AuxiliaryTargets,
    hint:           String,
}

impl SessionState {
    /// Empty state for a backup split into `fragment_count` fragments.
    pub fn new(fragment_count: u32) -> Self {
        Self {
            fragment_count,
            fragments: BTreeMap::new(),
            targets:   AuxiliaryTargets::default(),
            hint:      String::new(),
        }
    }

    /// Merge one classified scan.
    ///
    /// A fragment whose order lies outside `1..=fragment_count` cannot belong
    /// to this backup and leaves the state unchanged.
    #[must_use]
    pub fn accumulate(mut self, item: ScanItem) -> Self {
        match item {
            ScanItem::Fragment(f) => {
                if (1..=self.fragment_count).contains(&f.order) {
                    self.fragments.insert(f.order, f);
                } else {
                    log::warn!(
                        "ignoring fragment {} outside 1..={}",
                        f.order,
                        self.fragment_count
                    );
                }
            }
            ScanItem::TargetList(t) => self.targets = t,
            ScanItem::TextHint(s)   => self.hint = s,
        }
        self
    }

    /// A state created with a fragment count of zero never completes.
    pub fn is_complete(&self) -> bool {
        self.fragment_count > 0
            && (1..=self.fragment_count).all(|o| self.fragments.contains_key(&o))
    }

    pub fn fragment_count(&self) -> u32 {
        self.fragment_count
    }

    /// Number of distinct fragment orders collected so far.
    pub fn collected(&self) -> usize {
        self.fragments.len()
    }

    /// Orders in `1..=fragment_count` not yet scanned.
    pub fn missing(&self) -> Vec<u32> {
        (1..=self.fragment_count)
            .filter(|o| !self.fragments.contains_key(o))
            .collect()
    }

    /// Collected fragments in ascending order.
    pub fn fragments(&self) -> Vec<OrderedFragment> {
        self.fragments.values().cloned().collect()
    }

    pub fn targets(&self) -> &AuxiliaryTargets {
        &self.targets
    }

    pub fn hint(&self) -> &str {
        &self.hint
    }
}

/// Free-function form of [`SessionState::accumulate`].
pub fn accumulate(state: SessionState, item: ScanItem) -> SessionState {
    state.accumulate(item)
}

/// Free-function form of [`SessionState::is_complete`].
pub fn is_complete(state: &SessionState) -> bool {
    state.is_complete()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frag(order: u32) -> ScanItem {
        ScanItem::Fragment(OrderedFragment::new(order, format!("p{order}")))
    }

    #[test]
    fn accumulate_is_idempotent() {
        let items = [
            frag(2),
            ScanItem::TextHint("hint".into()),
            ScanItem::TargetList(AuxiliaryTargets::parse(["https://a.example"]).unwrap()),
        ];
        let base = SessionState::new(4).accumulate(frag(1));
        for item in items {
            let once  = base.clone().accumulate(item.clone());
            let twice = once.clone().accumulate(item);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn three_of_four_is_not_complete() {
        let s = SessionState::new(4).accumulate(frag(1)).accumulate(frag(2)).accumulate(frag(3));
        assert!(!s.is_complete());
        assert_eq!(s.missing(), [4]);
        let s = s.accumulate(frag(4));
        assert!(s.is_complete());
        assert!(s.missing().is_empty());
    }

    #[test]
    fn completion_ignores_targets_and_hint() {
        let s = SessionState::new(2)
            .accumulate(ScanItem::TextHint("h".into()))
            .accumulate(ScanItem::TargetList(AuxiliaryTargets::default()));
        assert!(!s.is_complete());
        let s = s.accumulate(frag(2)).accumulate(frag(1));
        assert!(is_complete(&s));
        assert_eq!(s.hint(), "h");
    }

    #[test]
    fn rescanned_targets_and_hint_replace() {
        let first  = AuxiliaryTargets::parse(["https://a.example"]).unwrap();
        let second = AuxiliaryTargets::parse(["https://b.example", "https://c.example"]).unwrap();
        let s = SessionState::new(4)
            .accumulate(ScanItem::TargetList(first))
            .accumulate(ScanItem::TextHint("old".into()))
            .accumulate(ScanItem::TargetList(second.clone()))
            .accumulate(ScanItem::TextHint("new".into()));
        assert_eq!(s.targets(), &second);
        assert_eq!(s.hint(), "new");
    }

    #[test]
    fn out_of_range_fragment_is_ignored() {
        let s = SessionState::new(4);
        let after = accumulate(s.clone(), frag(5));
        assert_eq!(after, s);
    }

    #[test]
    fn zero_fragment_state_never_completes() {
        let s = SessionState::new(0);
        assert!(!s.is_complete());
        assert!(!s.accumulate(frag(1)).is_complete());
    }

    #[test]
    fn fragments_come_back_in_order() {
        let s = SessionState::new(3).accumulate(frag(3)).accumulate(frag(1)).accumulate(frag(2));
        let orders: Vec<u32> = s.fragments().iter().map(|f| f.order).collect();
        assert_eq!(orders, [1, 2, 3]);
    }

    proptest! {
        #[test]
        fn fragment_scan_order_does_not_matter(perm in Just(vec![1u32, 2, 3, 4]).prop_shuffle()) {
            let forward = (1..=4).fold(SessionState::new(4), |s, o| s.accumulate(frag(o)));
            let shuffled = perm.iter().fold(SessionState::new(4), |s, &o| s.accumulate(frag(o)));
            prop_assert!(shuffled.is_complete());
            prop_assert_eq!(shuffled, forward);
        }
    }
}
