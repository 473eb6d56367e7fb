// src/session/handles.rs

//! Handle arena.
//!
//! RM handles are opaque tokens for objects the driver owns. The session
//! keeps one typed record per successful allocation, indexed by a
//! [`HandleId`] it generates itself, with an explicit link to the parent
//! record. A `HandleId` only exists for handles whose allocation succeeded,
//! which is what lets the allocator and query dispatcher accept it as a
//! parent or target without re-checking.

use crate::rm::{ObjectKind, RawHandle};

/// Index into a [`HandleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Live,
    /// A free request was issued. Whether it succeeded does not matter: the
    /// handle is never freed again.
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleRecord {
    pub kind: ObjectKind,
    pub raw: RawHandle,
    pub parent: Option<HandleId>,
    /// Owning unit; `None` for the session client.
    pub unit: Option<u32>,
    pub state: HandleState,
}

#[derive(Debug, Default)]
pub struct HandleTable {
    records: Vec<HandleRecord>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a handle the driver just confirmed. Ids grow with creation
    /// order.
    pub fn insert(
        &mut self,
        kind: ObjectKind,
        raw: RawHandle,
        parent: Option<HandleId>,
        unit: Option<u32>,
    ) -> HandleId {
        let id = HandleId(self.records.len());
        self.records.push(HandleRecord { kind, raw, parent, unit, state: HandleState::Live });
        id
    }

    pub fn get(&self, id: HandleId) -> &HandleRecord {
        &self.records[id.0]
    }

    pub fn raw(&self, id: HandleId) -> RawHandle {
        self.get(id).raw
    }

    /// Raw handle of the parent record, or 0 for a root.
    pub fn parent_raw(&self, id: HandleId) -> RawHandle {
        self.get(id).parent.map_or(0, |p| self.raw(p))
    }

    pub fn is_live(&self, id: HandleId) -> bool {
        self.get(id).state == HandleState::Live
    }

    /// Flip a live record to released. Returns `false` if it already was,
    /// in which case no free request may be sent.
    pub fn release(&mut self, id: HandleId) -> bool {
        let rec = &mut self.records[id.0];
        match rec.state {
            HandleState::Live => {
                rec.state = HandleState::Released;
                true
            }
            HandleState::Released => false,
        }
    }

    /// Live handles of `unit`, newest first: the order they must be freed in.
    pub fn live_for_unit_newest_first(&self, unit: u32) -> Vec<HandleId> {
        (0..self.records.len())
            .rev()
            .map(HandleId)
            .filter(|&id| {
                let rec = self.get(id);
                rec.unit == Some(unit) && rec.state == HandleState::Live
            })
            .collect()
    }

    /// Live children of `id`.
    pub fn live_children(&self, id: HandleId) -> impl Iterator<Item = HandleId> + '_ {
        (0..self.records.len())
            .map(HandleId)
            .filter(move |&c| self.get(c).parent == Some(id) && self.is_live(c))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> (HandleTable, HandleId, HandleId, HandleId) {
        let mut t = HandleTable::new();
        let client = t.insert(ObjectKind::Client, 0xc1d0_0001, None, None);
        let dev = t.insert(ObjectKind::Device, 0x5c00_0001, Some(client), Some(0));
        let sub = t.insert(ObjectKind::Subdevice, 0x5c00_0002, Some(dev), Some(0));
        (t, client, dev, sub)
    }

    #[test]
    fn unit_handles_come_back_newest_first() {
        let (mut t, client, dev, sub) = table();
        let dev1 = t.insert(ObjectKind::Device, 0x5c00_0003, Some(client), Some(1));

        assert_eq!(t.live_for_unit_newest_first(0), vec![sub, dev]);
        assert_eq!(t.live_for_unit_newest_first(1), vec![dev1]);
        assert_eq!(t.parent_raw(sub), 0x5c00_0001);
        assert_eq!(t.parent_raw(client), 0);
    }

    #[test]
    fn release_is_one_shot() {
        let (mut t, _client, dev, sub) = table();
        assert!(t.release(sub));
        assert!(!t.release(sub));
        assert_eq!(t.live_for_unit_newest_first(0), vec![dev]);
        assert_eq!(t.live_children(dev).count(), 0);
    }

    #[test]
    fn children_follow_parent_links() {
        let (t, client, dev, sub) = table();
        assert_eq!(t.live_children(client).collect::<Vec<_>>(), vec![dev]);
        assert_eq!(t.live_children(dev).collect::<Vec<_>>(), vec![sub]);
        assert_eq!(t.len(), 3);
    }
}
