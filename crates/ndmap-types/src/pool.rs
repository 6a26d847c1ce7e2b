// Copyright (c) Node Map Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::node::{Node, NodeHandle};

/// The densely-indexed, possibly-sparse array of all nodes in the
/// allocation. Indices are stable identifiers shared across NIDMAP,
/// NODEINFO, and PPN (SPEC_FULL.md §3).
#[derive(Debug, Default)]
pub struct NodePool {
    slots: Vec<Option<Node>>,
}

impl NodePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Grows the pool with empty slots if needed and installs `node` at
    /// `index`, returning its handle.
    pub fn set(&mut self, index: usize, node: Node) -> NodeHandle {
        self.ensure_len(index + 1);
        self.slots[index] = Some(node);
        NodeHandle(index)
    }

    pub fn ensure_len(&mut self, len: usize) {
        if len > self.slots.len() {
            self.slots.resize_with(len, || None);
        }
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&Node> {
        self.slots.get(handle.0).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.slots.get_mut(handle.0).and_then(|s| s.as_mut())
    }

    pub fn get_by_index(&self, index: usize) -> Option<&Node> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    pub fn get_mut_by_index(&mut self, index: usize) -> Option<&mut Node> {
        self.slots.get_mut(index).and_then(|s| s.as_mut())
    }

    pub fn present(&self) -> impl Iterator<Item = &Node> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    pub fn present_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.slots.iter_mut().filter_map(|s| s.as_mut())
    }

    /// Iterates every slot, present or not, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<&Node>)> {
        self.slots.iter().enumerate().map(|(i, s)| (i, s.as_ref()))
    }

    pub fn count_present(&self) -> usize {
        self.present().count()
    }

    /// Handles of every present node, in index order. Used where the wire
    /// format packs one value per present node (e.g. NODEINFO's per-node
    /// topology assignment array, SPEC_FULL.md §4.3).
    pub fn present_handles(&self) -> Vec<NodeHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| NodeHandle(i)))
            .collect()
    }
}
