use std::collections::BTreeSet;

/// Identity of a mounted component, used to attribute listeners and timers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct Owner(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub enum ListenerKind {
    PointerMove,
    PointerEnter,
    PointerLeave,
    Wheel,
    TouchStart,
    TouchEnd,
    Key,
    Resize,
    Scroll,
    Click,
    Frame,
}

/// Book-keeping of which component listens to which input.
///
/// Input is routed only to owners registered here, so a listener left behind after unmount
/// shows up as a duplicate delivery after re-mount.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    entries: BTreeSet<(Owner, ListenerKind)>,
    next_owner: u32,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_owner(&mut self) -> Owner {
        self.next_owner += 1;
        Owner(self.next_owner)
    }

    pub fn add(&mut self, owner: Owner, kind: ListenerKind) -> bool {
        self.entries.insert((owner, kind))
    }

    pub fn add_all(&mut self, owner: Owner, kinds: &[ListenerKind]) {
        for &k in kinds {
            self.add(owner, k);
        }
    }

    pub fn remove(&mut self, owner: Owner, kind: ListenerKind) -> bool {
        self.entries.remove(&(owner, kind))
    }

    pub fn remove_all(&mut self, owner: Owner) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(o, _)| *o != owner);
        before - self.entries.len()
    }

    pub fn has(&self, owner: Owner, kind: ListenerKind) -> bool {
        self.entries.contains(&(owner, kind))
    }

    #[cfg(test)]
    pub fn owners_of(&self, kind: ListenerKind) -> Vec<Owner> {
        self.entries
            .iter()
            .filter(|(_, k)| *k == kind)
            .map(|(o, _)| *o)
            .collect()
    }

    pub fn count_for(&self, owner: Owner) -> usize {
        self.entries.iter().filter(|(o, _)| *o == owner).count()
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }
}
