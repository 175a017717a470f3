use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

/// Identifies one concrete element instance. A new token for the same id
/// means the element was replaced and its observation starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityChange<K> {
    pub id: K,
    pub visible: bool,
}

#[derive(Debug)]
struct Observation {
    element: ElementRef,
    reported: Option<bool>,
    pending: Option<(bool, Instant)>,
}

impl Observation {
    fn new(element: ElementRef) -> Self {
        Self {
            element,
            reported: None,
            pending: None,
        }
    }
}

/// Debounced visible/hidden transitions for a set of observed elements.
///
/// Raw visibility is pushed with [`report`](Self::report) as often as the
/// caller likes; [`poll`](Self::poll) hands out a transition once the new
/// state has held for the debounce delay.
#[derive(Debug)]
pub struct VisibilityTracker<K: Ord + Clone> {
    delay: Duration,
    observations: BTreeMap<K, Observation>,
}

impl<K: Ord + Clone> Default for VisibilityTracker<K> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl<K: Ord + Clone> VisibilityTracker<K> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            observations: BTreeMap::new(),
        }
    }

    /// Starts observing `id`. Re-observing with the same element keeps the
    /// current state; a different element replaces the observation.
    pub fn observe(&mut self, element: ElementRef, id: K) {
        match self.observations.get_mut(&id) {
            Some(existing) if existing.element == element => {}
            Some(existing) => *existing = Observation::new(element),
            None => {
                self.observations.insert(id, Observation::new(element));
            }
        }
    }

    pub fn unobserve(&mut self, id: &K) {
        self.observations.remove(id);
    }

    /// Drops every observation whose id fails `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.observations.retain(|id, _| keep(id));
    }

    pub fn disconnect(&mut self) {
        self.observations.clear();
    }

    pub fn is_observing(&self, id: &K) -> bool {
        self.observations.contains_key(id)
    }

    pub fn has_pending(&self) -> bool {
        self.observations.values().any(|o| o.pending.is_some())
    }

    /// Records the raw state of an observed element. Unobserved ids are ignored.
    pub fn report(&mut self, id: &K, visible: bool, now: Instant) {
        let Some(observation) = self.observations.get_mut(id) else {
            return;
        };

        match observation.pending {
            Some((pending, _)) if pending == visible => {}
            _ if observation.reported == Some(visible) => observation.pending = None,
            _ => observation.pending = Some((visible, now)),
        }
    }

    /// Returns the transitions whose debounce delay has elapsed.
    pub fn poll(&mut self, now: Instant) -> Vec<VisibilityChange<K>> {
        let mut changes = Vec::new();
        for (id, observation) in self.observations.iter_mut() {
            let Some((visible, since)) = observation.pending else {
                continue;
            };
            if now.saturating_duration_since(since) >= self.delay {
                observation.pending = None;
                observation.reported = Some(visible);
                changes.push(VisibilityChange {
                    id: id.clone(),
                    visible,
                });
            }
        }
        changes
    }
}
