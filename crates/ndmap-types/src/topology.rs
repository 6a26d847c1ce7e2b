// Copyright (c) Node Map Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

/// Stable identifier into a [`TopologyRegistry`]; equal to the topology's
/// own `index` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopologyHandle(pub usize);

impl TopologyHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Topology {
    pub index: i32,
    pub signature: String,
    /// Opaque hardware descriptor; the hwloc-equivalent library is out of
    /// scope, so this is carried as bytes without interpretation.
    pub topo: Vec<u8>,
    /// User data a caller may attach to a newly-registered topology
    /// (SPEC_FULL.md §4.3: "compute a summary ... attach it as the
    /// topology's user data"). Computing the summary itself is out of
    /// scope; callers that want one set this field after `insert`.
    pub summary: Option<Vec<u8>>,
}

impl Topology {
    pub fn new(index: i32, signature: impl Into<String>, topo: Vec<u8>) -> Self {
        Self { index, signature: signature.into(), topo, summary: None }
    }
}

/// Process-wide registry of hardware topologies, indexed by `index`. Entry
/// 0 is always the master's topology (SPEC_FULL.md §3).
#[derive(Debug, Default)]
pub struct TopologyRegistry {
    entries: Vec<Option<Topology>>,
}

impl TopologyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts (or replaces) the entry at `index`, returning the previous
    /// occupant if one existed so the caller can apply the
    /// local-signature-preservation rule from SPEC_FULL.md §4.3 before it
    /// is dropped.
    pub fn insert(&mut self, index: usize, topo: Topology) -> (TopologyHandle, Option<Topology>) {
        if index >= self.entries.len() {
            self.entries.resize_with(index + 1, || None);
        }
        let prev = self.entries[index].take();
        self.entries[index] = Some(topo);
        (TopologyHandle(index), prev)
    }

    pub fn get(&self, handle: TopologyHandle) -> Option<&Topology> {
        self.entries.get(handle.0).and_then(|e| e.as_ref())
    }

    pub fn get_mut(&mut self, handle: TopologyHandle) -> Option<&mut Topology> {
        self.entries.get_mut(handle.0).and_then(|e| e.as_mut())
    }

    pub fn get_by_index(&self, index: usize) -> Option<&Topology> {
        self.entries.get(index).and_then(|e| e.as_ref())
    }

    pub fn first_present(&self) -> Option<TopologyHandle> {
        self.entries.iter().position(|e| e.is_some()).map(TopologyHandle)
    }

    pub fn present_from(&self, start: usize) -> impl Iterator<Item = (usize, &Topology)> {
        self.entries
            .iter()
            .enumerate()
            .skip(start)
            .filter_map(|(i, e)| e.as_ref().map(|t| (i, t)))
    }

    pub fn count_present_from(&self, start: usize) -> usize {
        self.present_from(start).count()
    }
}
