// Copyright (c) Node Map Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! NODEINFO codec: per-node hardware topologies, slot counts, and
//! slots-given flags, each with its own uniformity shortcut
//! (SPEC_FULL.md §4.3).

use ndmap_compress::{read_blob_body, read_blob_variant_a, write_blob_body, write_blob_variant_a, Compressor};
use ndmap_types::node::NodeHandle;
use ndmap_types::runtime::Runtime;
use ndmap_types::topology::{Topology, TopologyHandle};
use ndmap_types::{Error, Result};
use ndmap_wire::TaggedBuffer;

/// The `i16` slots discriminator, collapsed into an enum per SPEC_FULL.md
/// §9 instead of scattering the negative/0/1 convention across call sites.
enum SlotsWire {
    Uniform(u16),
    Raw,
    Compressed,
}

impl SlotsWire {
    fn tag(&self) -> i16 {
        match self {
            SlotsWire::Uniform(v) => -(*v as i16),
            SlotsWire::Raw => 0,
            SlotsWire::Compressed => 1,
        }
    }

    fn from_tag(tag: i16) -> Self {
        if tag < 0 {
            SlotsWire::Uniform((-tag) as u16)
        } else if tag == 1 {
            SlotsWire::Compressed
        } else {
            SlotsWire::Raw
        }
    }
}

/// The `i8` slots-given discriminator, same idea as [`SlotsWire`].
enum FlagsWire {
    Uniform(bool),
    Raw,
    Compressed,
}

impl FlagsWire {
    fn tag(&self) -> i8 {
        match self {
            FlagsWire::Uniform(true) => -1,
            FlagsWire::Uniform(false) => -2,
            FlagsWire::Raw => 3,
            FlagsWire::Compressed => 2,
        }
    }

    fn from_tag(tag: i8) -> Self {
        if tag < 0 {
            FlagsWire::Uniform(tag + 2 != 0)
        } else if tag == 2 {
            FlagsWire::Compressed
        } else {
            FlagsWire::Raw
        }
    }
}

fn topology_scan_start(runtime: &Runtime) -> usize {
    let master_hosts_app_procs = runtime.hnp_is_allocated && runtime.allow_master_procs;
    if master_hosts_app_procs {
        0
    } else {
        1
    }
}

pub fn encode_nodeinfo(runtime: &Runtime, buf: &mut TaggedBuffer, compressor: &dyn Compressor) -> Result<()> {
    tracing::debug!(pool_len = runtime.node_pool.len(), "encoding nodeinfo");
    encode_topologies(runtime, buf, compressor);
    encode_slots(runtime, buf, compressor);
    encode_flags(runtime, buf, compressor);
    Ok(())
}

fn encode_topologies(runtime: &Runtime, buf: &mut TaggedBuffer, compressor: &dyn Compressor) {
    let start = topology_scan_start(runtime);
    let ntopos = runtime.topology_registry.count_present_from(start);
    buf.pack_i8(ntopos as i8);

    if ntopos <= 1 {
        return;
    }

    let mut scratch = TaggedBuffer::new();
    for (index, topo) in runtime.topology_registry.present_from(start) {
        scratch.pack_i32(index as i32);
        scratch.pack_string(&topo.signature);
        scratch.pack_bytes(&topo.topo);
    }
    write_blob_variant_a(buf, compressor, &scratch.unload());

    let mut assignments = TaggedBuffer::new();
    for node in runtime.node_pool.present() {
        let idx = node.topology.map(|h| h.index() as i8).unwrap_or(-1);
        assignments.pack_i8(idx);
    }
    write_blob_variant_a(buf, compressor, &assignments.unload());
}

fn encode_slots(runtime: &Runtime, buf: &mut TaggedBuffer, compressor: &dyn Compressor) {
    let mut representative: Option<u16> = None;
    let mut unislots = true;
    for node in runtime.node_pool.present() {
        match representative {
            None => representative = Some(node.slots),
            Some(v) if v != node.slots => {
                unislots = false;
                break;
            }
            _ => {}
        }
    }

    if unislots {
        let wire = SlotsWire::Uniform(representative.unwrap_or(0));
        buf.pack_i16(wire.tag());
        return;
    }

    let mut raw = TaggedBuffer::new();
    for (_, node) in runtime.node_pool.iter() {
        raw.pack_u16(node.map(|n| n.slots).unwrap_or(0));
    }
    let data = raw.unload();

    match compressor.compress(&data) {
        Some(payload) => {
            buf.pack_i16(SlotsWire::Compressed.tag());
            write_blob_body(buf, Some(data.len()), &payload);
        }
        None => {
            buf.pack_i16(SlotsWire::Raw.tag());
            write_blob_body(buf, None, &data);
        }
    }
}

fn encode_flags(runtime: &Runtime, buf: &mut TaggedBuffer, compressor: &dyn Compressor) {
    let mut representative: Option<bool> = None;
    let mut uniflags = true;
    for node in runtime.node_pool.present() {
        match representative {
            None => representative = Some(node.slots_given),
            Some(v) if v != node.slots_given => {
                uniflags = false;
                break;
            }
            _ => {}
        }
    }

    if uniflags {
        let wire = FlagsWire::Uniform(representative.unwrap_or(false));
        buf.pack_i8(wire.tag());
        return;
    }

    // One byte per node, matching the decoder (SPEC_FULL.md §9: the
    // original's bit-packed encode and byte-indexed decode disagreed; this
    // rewrite standardizes on one byte per node on both sides).
    let mut raw = TaggedBuffer::new();
    for (_, node) in runtime.node_pool.iter() {
        raw.pack_u8(node.map(|n| n.slots_given).unwrap_or(false) as u8);
    }
    let data = raw.unload();

    match compressor.compress(&data) {
        Some(payload) => {
            buf.pack_i8(FlagsWire::Compressed.tag());
            write_blob_body(buf, Some(data.len()), &payload);
        }
        None => {
            buf.pack_i8(FlagsWire::Raw.tag());
            write_blob_body(buf, None, &data);
        }
    }
}

pub fn decode_nodeinfo(runtime: &mut Runtime, buf: &mut TaggedBuffer, compressor: &dyn Compressor) -> Result<()> {
    tracing::debug!(buf_len = buf.len(), "decoding nodeinfo");
    decode_nodeinfo_inner(runtime, buf, compressor).inspect_err(|error| {
        tracing::error!(%error, "nodeinfo decode failed");
    })
}

fn decode_nodeinfo_inner(runtime: &mut Runtime, buf: &mut TaggedBuffer, compressor: &dyn Compressor) -> Result<()> {
    decode_topologies(runtime, buf, compressor)?;
    decode_slots(runtime, buf, compressor)?;
    decode_flags(runtime, buf, compressor)?;
    Ok(())
}

fn decode_topologies(runtime: &mut Runtime, buf: &mut TaggedBuffer, compressor: &dyn Compressor) -> Result<()> {
    let ntopos = buf.unpack_i8("nodeinfo.ntopos")?;
    if ntopos <= 1 {
        return Ok(());
    }

    let topo_bytes = read_blob_variant_a(buf, compressor, "nodeinfo.topologies")?;
    let mut scratch = TaggedBuffer::load(topo_bytes);
    for _ in 0..ntopos {
        let index = scratch.unpack_i32("nodeinfo.topology.index")?;
        let signature = scratch.unpack_string("nodeinfo.topology.signature")?;
        let topo_payload = scratch.unpack_bytes("nodeinfo.topology.topo")?;
        let topology = Topology::new(index, signature, topo_payload);

        if index < 0 {
            return Err(Error::UnpackFail { field: "nodeinfo.topology.index" });
        }
        let (_, replaced) = runtime.topology_registry.insert(index as usize, topology);
        // The replaced entry's bytes are simply dropped; if it was the
        // local topology, there is nothing to null out by hand (SPEC_FULL.md
        // §4.3, §9) — Rust's ownership model means the old value was never
        // aliased to begin with.
        if let Some(prev) = &replaced {
            if prev.signature == runtime.local_topo_signature {
                tracing::debug!(index, "replaced the local topology's registry slot");
            }
        }
    }

    let assignments_bytes = read_blob_variant_a(buf, compressor, "nodeinfo.topology_assignments")?;
    let mut assign_buf = TaggedBuffer::load(assignments_bytes);
    let present_handles: Vec<NodeHandle> = runtime.node_pool.present_handles();
    for handle in present_handles {
        let idx = assign_buf.unpack_i8("nodeinfo.topology_assignment")?;
        if idx >= 0 {
            if let Some(node) = runtime.node_pool.get_mut(handle) {
                node.topology = Some(TopologyHandle(idx as usize));
            }
        }
    }

    Ok(())
}

fn decode_slots(runtime: &mut Runtime, buf: &mut TaggedBuffer, compressor: &dyn Compressor) -> Result<()> {
    let tag = buf.unpack_i16("nodeinfo.slots")?;
    match SlotsWire::from_tag(tag) {
        SlotsWire::Uniform(slot) => {
            for node in runtime.node_pool.present_mut() {
                node.slots = slot;
            }
        }
        other => {
            let compressed = matches!(other, SlotsWire::Compressed);
            let data = read_blob_body(buf, compressor, "nodeinfo.slots", compressed)?;
            let mut cursor = TaggedBuffer::load(data);
            let pool_len = runtime.node_pool.len();
            let mut values = Vec::with_capacity(pool_len);
            for _ in 0..pool_len {
                values.push(cursor.unpack_u16("nodeinfo.slots.entry")?);
            }
            for (i, value) in values.into_iter().enumerate() {
                if let Some(node) = runtime.node_pool.get_mut_by_index(i) {
                    node.slots = value;
                }
            }
        }
    }
    Ok(())
}

fn decode_flags(runtime: &mut Runtime, buf: &mut TaggedBuffer, compressor: &dyn Compressor) -> Result<()> {
    let tag = buf.unpack_i8("nodeinfo.flags")?;
    match FlagsWire::from_tag(tag) {
        FlagsWire::Uniform(given) => {
            for node in runtime.node_pool.present_mut() {
                node.slots_given = given;
            }
        }
        other => {
            let compressed = matches!(other, FlagsWire::Compressed);
            let data = read_blob_body(buf, compressor, "nodeinfo.flags", compressed)?;
            let mut cursor = TaggedBuffer::load(data);
            let pool_len = runtime.node_pool.len();
            let mut values = Vec::with_capacity(pool_len);
            for _ in 0..pool_len {
                values.push(cursor.unpack_u8("nodeinfo.flags.entry")? != 0);
            }
            for (i, value) in values.into_iter().enumerate() {
                if let Some(node) = runtime.node_pool.get_mut_by_index(i) {
                    node.slots_given = value;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndmap_compress::Lz4Compressor;
    use ndmap_types::node::Node;

    fn pool_with_slots(slots: &[u16]) -> Runtime {
        let mut rt = Runtime::new("n0");
        for (i, &s) in slots.iter().enumerate() {
            let mut node = Node::new(i, format!("n{i}"));
            node.slots = s;
            node.slots_given = true;
            rt.node_pool.set(i, node);
        }
        rt.topology_registry.insert(0, Topology::new(0, "sig-0", vec![1, 2, 3]));
        for node in rt.node_pool.present_mut() {
            node.topology = Some(TopologyHandle(0));
        }
        rt
    }

    #[test]
    fn uniform_slots_occupy_three_bytes() {
        let rt = pool_with_slots(&[4, 4, 4]);
        let compressor = Lz4Compressor::default();
        let mut buf = TaggedBuffer::new();
        encode_nodeinfo(&rt, &mut buf, &compressor).unwrap();
        let bytes = buf.unload();
        // i8 ntopos(=1) + i16 slots(-4) + i8 flags(-1) = 1 + 2 + 1 = 4 bytes.
        assert_eq!(bytes.len(), 4);
        assert_eq!(bytes[0], 1);
        assert_eq!(i16::from_le_bytes([bytes[1], bytes[2]]), -4);
        assert_eq!(bytes[3] as i8, -1);
    }

    #[test]
    fn heterogeneous_slots_round_trip() {
        let mut rt = pool_with_slots(&[4, 8, 4, 8, 8]);
        rt.node_pool.get_mut_by_index(1).unwrap().slots_given = false;

        let compressor = Lz4Compressor::default();
        let mut buf = TaggedBuffer::new();
        encode_nodeinfo(&rt, &mut buf, &compressor).unwrap();

        let mut peer = Runtime::new("peer");
        for i in 0..5 {
            peer.node_pool.set(i, Node::new(i, format!("n{i}")));
        }
        let mut rx = TaggedBuffer::load(buf.unload());
        decode_nodeinfo(&mut peer, &mut rx, &compressor).unwrap();

        for i in [0usize, 2, 3, 4] {
            assert!(peer.node_pool.get_by_index(i).unwrap().slots_given);
        }
        assert!(!peer.node_pool.get_by_index(1).unwrap().slots_given);
        assert_eq!(peer.node_pool.get_by_index(0).unwrap().slots, 4);
        assert_eq!(peer.node_pool.get_by_index(1).unwrap().slots, 8);
    }

    #[test]
    fn non_uniform_topologies_assign_per_node() {
        let mut rt = Runtime::new("n0");
        rt.topology_registry.insert(0, Topology::new(0, "sig-0", vec![0]));
        rt.topology_registry.insert(1, Topology::new(1, "sig-1", vec![1]));
        for i in 0..2 {
            let mut node = Node::new(i, format!("n{i}"));
            node.topology = Some(TopologyHandle(i));
            node.slots = 4;
            node.slots_given = true;
            rt.node_pool.set(i, node);
        }

        let compressor = Lz4Compressor::default();
        let mut buf = TaggedBuffer::new();
        encode_nodeinfo(&rt, &mut buf, &compressor).unwrap();

        let mut peer = Runtime::new("peer");
        for i in 0..2 {
            peer.node_pool.set(i, Node::new(i, format!("n{i}")));
        }
        let mut rx = TaggedBuffer::load(buf.unload());
        decode_nodeinfo(&mut peer, &mut rx, &compressor).unwrap();

        assert_eq!(peer.topology_registry.get_by_index(0).unwrap().signature, "sig-0");
        assert_eq!(peer.topology_registry.get_by_index(1).unwrap().signature, "sig-1");
        assert_eq!(peer.node_pool.get_by_index(0).unwrap().topology, Some(TopologyHandle(0)));
        assert_eq!(peer.node_pool.get_by_index(1).unwrap().topology, Some(TopologyHandle(1)));
    }

    #[test]
    fn master_not_in_allocation_scans_from_index_one() {
        let mut rt = Runtime::new("n0");
        rt.hnp_is_allocated = false;
        rt.topology_registry.insert(0, Topology::new(0, "master-sig", vec![]));
        rt.topology_registry.insert(1, Topology::new(1, "compute-sig", vec![]));
        let mut node = Node::new(0, "n0");
        node.topology = Some(TopologyHandle(1));
        rt.node_pool.set(0, node);

        let compressor = Lz4Compressor::default();
        let mut buf = TaggedBuffer::new();
        encode_nodeinfo(&rt, &mut buf, &compressor).unwrap();
        let bytes = buf.unload();
        // Only one present topology at/after index 1, so ntopos == 1 and
        // nothing further is emitted for topologies.
        assert_eq!(bytes[0] as i8, 1);
    }
}
