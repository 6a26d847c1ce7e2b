// Copyright (c) Node Map Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! NIDMAP codec: the node inventory message (SPEC_FULL.md §4.2). Encodes
//! the node pool's hostnames and per-node daemon vpid; decode reconstructs
//! the peer's node pool and materializes daemon `Process`es.

use std::mem;

use ndmap_compress::{read_blob_variant_a, read_blob_variant_b, write_blob_variant_a, write_blob_variant_b, Compressor};
use ndmap_types::node::{AttributeValue, Node, NODE_ALIAS_ATTR};
use ndmap_types::process::Process;
use ndmap_types::routing::NoopRoutingPlan;
use ndmap_types::runtime::{Runtime, DAEMON_JOBID};
use ndmap_types::{Error, Result};
use ndmap_wire::TaggedBuffer;

/// Smallest width in `{1, 2, 4}` bytes such that `pool_len <= 2^(8*nbytes)`
/// (SPEC_FULL.md §4.2, "Width selection").
fn vpid_width(pool_len: usize) -> u8 {
    if pool_len <= (1usize << 8) {
        1
    } else if pool_len <= (1usize << 16) {
        2
    } else {
        4
    }
}

fn sentinel_for_width(nbytes: u8) -> u32 {
    match nbytes {
        1 => u8::MAX as u32,
        2 => u16::MAX as u32,
        _ => u32::MAX,
    }
}

pub fn encode_nidmap(runtime: &Runtime, buf: &mut TaggedBuffer, compressor: &dyn Compressor) -> Result<()> {
    tracing::debug!(pool_len = runtime.node_pool.len(), "encoding nidmap");

    buf.pack_bool(runtime.hnp_is_allocated);
    buf.pack_bool(runtime.managed_allocation);

    let nbytes = vpid_width(runtime.node_pool.len());
    let sentinel = sentinel_for_width(nbytes);

    let mut names: Vec<&str> = Vec::new();
    let mut vpids: Vec<u32> = Vec::new();
    for (_, node) in runtime.node_pool.iter() {
        let Some(node) = node else { continue };
        names.push(node.name.as_str());
        let vpid = node.daemon.map(|handle| runtime.daemon_job.procs.get(handle).vpid.unwrap_or(sentinel));
        vpids.push(vpid.unwrap_or(sentinel));
    }

    let mut name_bytes = names.join(",").into_bytes();
    name_bytes.push(0);
    write_blob_variant_a(buf, compressor, &name_bytes);

    let mut vpid_bytes = Vec::with_capacity(vpids.len() * nbytes as usize);
    for v in &vpids {
        match nbytes {
            1 => vpid_bytes.push(*v as u8),
            2 => vpid_bytes.extend_from_slice(&(*v as u16).to_le_bytes()),
            _ => vpid_bytes.extend_from_slice(&v.to_le_bytes()),
        }
    }
    write_blob_variant_b(buf, compressor, nbytes, &vpid_bytes);

    Ok(())
}

fn decode_vpids(bytes: &[u8], nbytes: u8) -> Result<Vec<u32>> {
    let width = nbytes as usize;
    if width == 0 || bytes.len() % width != 0 {
        return Err(Error::UnpackFail { field: "nidmap.vpids" });
    }
    Ok(bytes
        .chunks(width)
        .map(|chunk| match nbytes {
            1 => chunk[0] as u32,
            2 => u16::from_le_bytes([chunk[0], chunk[1]]) as u32,
            _ => u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
        })
        .collect())
}

pub fn decode_nidmap(runtime: &mut Runtime, buf: &mut TaggedBuffer, compressor: &dyn Compressor) -> Result<()> {
    tracing::debug!(buf_len = buf.len(), "decoding nidmap");
    decode_nidmap_inner(runtime, buf, compressor).inspect_err(|error| {
        tracing::error!(%error, "nidmap decode failed");
    })
}

fn decode_nidmap_inner(runtime: &mut Runtime, buf: &mut TaggedBuffer, compressor: &dyn Compressor) -> Result<()> {
    runtime.hnp_is_allocated = buf.unpack_bool("nidmap.hnp_is_allocated")?;
    runtime.managed_allocation = buf.unpack_bool("nidmap.managed_allocation")?;

    let names_blob = read_blob_variant_a(buf, compressor, "nidmap.names")?;
    let (nbytes, vpids_blob) = read_blob_variant_b(buf, compressor, "nidmap.vpids")?;

    if runtime.am_i_master {
        tracing::debug!("master short-circuit: nidmap decode is a no-op");
        return Ok(());
    }

    let names_str = String::from_utf8(names_blob).map_err(|_| Error::UnpackFail { field: "nidmap.names" })?;
    let names_str = names_str.trim_end_matches('\0');
    let names: Vec<&str> = if names_str.is_empty() { Vec::new() } else { names_str.split(',').collect() };

    let vpids = decode_vpids(&vpids_blob, nbytes)?;
    if vpids.len() != names.len() {
        return Err(Error::UnpackFail { field: "nidmap.vpids" });
    }

    let sentinel = sentinel_for_width(nbytes);
    runtime.node_pool.ensure_len(names.len());

    let mut num_daemons = 0u32;
    for (n, name) in names.iter().enumerate() {
        let topology = runtime.topology_registry.first_present();
        let mut node = Node::new(n, *name);
        node.topology = topology;

        if *name == runtime.local_hostname {
            node.set_attribute(NODE_ALIAS_ATTR, AttributeValue::Str(runtime.local_aliases.join(",")));
        }

        let node_handle = runtime.node_pool.set(n, node);

        let vpid = vpids[n];
        if vpid != sentinel {
            num_daemons += 1;
            let daemon_handle = match runtime.daemon_job.daemon_for_vpid(vpid) {
                Some(handle) => handle,
                None => runtime.daemon_job.add_process(Process::new_daemon(DAEMON_JOBID, vpid, node_handle)),
            };
            runtime.node_pool.get_mut(node_handle).expect("just inserted").daemon = Some(daemon_handle);
        }
    }

    runtime.num_daemons = num_daemons;

    let routing_plan = mem::replace(&mut runtime.routing_plan, Box::new(NoopRoutingPlan));
    routing_plan.update(runtime);
    runtime.routing_plan = routing_plan;

    Ok(())
}
