use crate::listeners::Owner;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct TimerId(pub u64);

#[derive(Clone, Copy, Debug)]
struct Pending {
    id: TimerId,
    owner: Owner,
    due_ms: f64,
}

/// One-shot timers on the stage clock (`setTimeout` equivalent).
#[derive(Debug, Default)]
pub struct Timers {
    next_id: u64,
    pending: Vec<Pending>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, owner: Owner, now_ms: f64, after_ms: f64) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.push(Pending {
            id,
            owner,
            due_ms: now_ms + after_ms.max(0.0),
        });
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.id != id);
        before != self.pending.len()
    }

    pub fn cancel_all_for(&mut self, owner: Owner) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| p.owner != owner);
        before - self.pending.len()
    }

    /// Removes and returns every timer due at `now_ms`, earliest first.
    pub fn due(&mut self, now_ms: f64) -> Vec<(Owner, TimerId)> {
        let mut fired: Vec<Pending> = Vec::new();
        self.pending.retain(|p| {
            if p.due_ms <= now_ms {
                fired.push(*p);
                false
            } else {
                true
            }
        });
        fired.sort_by(|a, b| a.due_ms.total_cmp(&b.due_ms).then(a.id.cmp(&b.id)));
        fired.into_iter().map(|p| (p.owner, p.id)).collect()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.iter().any(|p| p.id == id)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_for(&self, owner: Owner) -> usize {
        self.pending.iter().filter(|p| p.owner == owner).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_due_order_and_only_once() {
        let owner = Owner(1);
        let mut t = Timers::new();
        let late = t.schedule(owner, 0.0, 30.0);
        let early = t.schedule(owner, 0.0, 10.0);
        assert!(t.due(5.0).is_empty());
        assert_eq!(t.due(40.0), vec![(owner, early), (owner, late)]);
        assert!(t.due(100.0).is_empty());
    }

    #[test]
    fn cancel_by_owner_leaves_others() {
        let mut t = Timers::new();
        t.schedule(Owner(1), 0.0, 10.0);
        let keep = t.schedule(Owner(2), 0.0, 10.0);
        assert_eq!(t.cancel_all_for(Owner(1)), 1);
        assert_eq!(t.pending(), 1);
        assert!(t.is_pending(keep));
        assert!(t.cancel(keep));
        assert!(!t.cancel(keep));
    }
}
