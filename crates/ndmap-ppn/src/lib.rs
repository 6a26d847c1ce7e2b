// Copyright (c) Node Map Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! PPN codec: per-app, per-node process counts (SPEC_FULL.md §4.4). Encode
//! walks a job's map counting live processes per `(node, app)` pair; decode
//! rebuilds the job map and materializes application `Process`es with
//! vpid assignment deferred to a later, out-of-scope ranking pass.

use std::ops::{Deref, DerefMut};

use ndmap_compress::{read_blob_variant_a, write_blob_variant_a, Compressor};
use ndmap_types::job::Job;
use ndmap_types::node::NodeHandle;
use ndmap_types::process::Process;
use ndmap_types::runtime::Runtime;
use ndmap_types::{Error, Result};
use ndmap_wire::TaggedBuffer;

fn count_ppn(job: &Job, node_handle: NodeHandle, app_idx: i32) -> u32 {
    job.procs.iter().filter(|(_, p)| p.node == Some(node_handle) && p.app_idx == app_idx).count() as u32
}

pub fn encode_ppn(runtime: &Runtime, jobid: u32, buf: &mut TaggedBuffer, compressor: &dyn Compressor) -> Result<()> {
    let job = runtime
        .job(jobid)
        .ok_or_else(|| Error::NotFound { what: "job", detail: jobid.to_string() })?;
    tracing::debug!(jobid, num_apps = job.num_apps, "encoding ppn");

    // The source reuses one scratch buffer across apps by resetting it
    // between iterations; `TaggedBuffer::clear` exists for exactly that
    // (SPEC_FULL.md §4.4), but since each app's blob is handed off to
    // `unload` immediately after, a fresh buffer per app is equivalent here
    // and avoids holding onto the emptied-out allocation pointlessly.
    for app_idx in 0..job.num_apps {
        let mut scratch = TaggedBuffer::new();
        for &node_handle in &job.map.nodes {
            let Some(node) = runtime.node_pool.get(node_handle) else { continue };
            if node.daemon.is_none() {
                continue;
            }
            let ppn = count_ppn(job, node_handle, app_idx as i32);
            if ppn > 0 {
                scratch.pack_i32(node.index as i32);
                scratch.pack_u16(ppn as u16);
            }
        }
        write_blob_variant_a(buf, compressor, &scratch.unload());
    }
    Ok(())
}

/// Scope guard clearing the `mapped` flag on every node touched by this
/// job's map on both success and error exit (SPEC_FULL.md §4.4, §7).
struct MappedGuard<'a> {
    runtime: &'a mut Runtime,
    jobid: u32,
}

impl<'a> Deref for MappedGuard<'a> {
    type Target = Runtime;
    fn deref(&self) -> &Runtime {
        self.runtime
    }
}

impl<'a> DerefMut for MappedGuard<'a> {
    fn deref_mut(&mut self) -> &mut Runtime {
        self.runtime
    }
}

impl<'a> Drop for MappedGuard<'a> {
    fn drop(&mut self) {
        let Some(job) = self.runtime.jobs.get(&self.jobid) else { return };
        let handles = job.map.nodes.clone();
        for handle in handles {
            if let Some(node) = self.runtime.node_pool.get_mut(handle) {
                node.mapped = false;
            }
        }
    }
}

pub fn decode_ppn(
    runtime: &mut Runtime,
    jobid: u32,
    num_apps: usize,
    buf: &mut TaggedBuffer,
    compressor: &dyn Compressor,
) -> Result<()> {
    tracing::debug!(jobid, num_apps, "decoding ppn");
    decode_ppn_inner(runtime, jobid, num_apps, buf, compressor).inspect_err(|error| {
        tracing::error!(%error, "ppn decode failed");
    })
}

fn decode_ppn_inner(
    runtime: &mut Runtime,
    jobid: u32,
    num_apps: usize,
    buf: &mut TaggedBuffer,
    compressor: &dyn Compressor,
) -> Result<()> {
    let mut guard = MappedGuard { runtime, jobid };
    guard.job_mut(jobid).num_apps = num_apps;

    for app_idx in 0..num_apps {
        let payload = read_blob_variant_a(buf, compressor, "ppn.app")?;
        if guard.am_i_master {
            continue;
        }
        decode_app_pairs(&mut guard, jobid, app_idx as i32, payload)?;
    }
    Ok(())
}

fn decode_app_pairs(guard: &mut MappedGuard<'_>, jobid: u32, app_idx: i32, payload: Vec<u8>) -> Result<()> {
    let mut cursor = TaggedBuffer::load(payload);
    loop {
        let node_index = match cursor.unpack_i32("ppn.pair.index") {
            Ok(v) => v,
            Err(Error::ReadPastEndOfBuffer { .. }) => break,
            Err(other) => return Err(other),
        };
        let ppn = cursor.unpack_u16("ppn.pair.count")?;

        let handle = NodeHandle(node_index as usize);
        if guard.node_pool.get(handle).is_none() {
            return Err(Error::NotFound { what: "node", detail: node_index.to_string() });
        }

        let parent_vpid = guard
            .node_pool
            .get(handle)
            .and_then(|node| node.daemon)
            .and_then(|daemon| guard.daemon_job.procs.get(daemon).vpid)
            .unwrap_or(0);

        let already_mapped = guard.node_pool.get(handle).map(|n| n.mapped).unwrap_or(false);
        if !already_mapped {
            guard.node_pool.get_mut(handle).expect("checked above").mapped = true;
            guard.job_mut(jobid).map.nodes.push(handle);
        }

        for _ in 0..ppn {
            let process = Process::new_app(jobid, app_idx, parent_vpid, handle);
            let proc_handle = guard.job_mut(jobid).add_process(process);
            let node = guard.node_pool.get_mut(handle).expect("checked above");
            node.procs.push(proc_handle);
            node.num_procs += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndmap_compress::Lz4Compressor;
    use ndmap_types::node::Node;
    use ndmap_types::process::ProcessState;
    use ndmap_types::runtime::DAEMON_JOBID;

    const JOBID: u32 = 7;

    fn populated_pool(n: usize) -> Runtime {
        let mut rt = Runtime::new("n0");
        for i in 0..n {
            let handle = rt.node_pool.set(i, Node::new(i, format!("n{i}")));
            let daemon = rt.daemon_job.add_process(Process::new_daemon(DAEMON_JOBID, i as u32, handle));
            rt.node_pool.get_mut(handle).unwrap().daemon = Some(daemon);
        }
        rt
    }

    #[test]
    fn round_trip_creates_expected_process_counts() {
        let mut rt = populated_pool(4);
        let job = rt.job_mut(JOBID);
        job.num_apps = 1;
        let h0 = NodeHandle(0);
        let h3 = NodeHandle(3);
        job.map.nodes = vec![h0, h3];
        for _ in 0..2 {
            job.add_process(Process::new_app(JOBID, 0, 0, h0));
        }
        job.add_process(Process::new_app(JOBID, 0, 3, h3));

        let compressor = Lz4Compressor::default();
        let mut buf = TaggedBuffer::new();
        encode_ppn(&rt, JOBID, &mut buf, &compressor).unwrap();

        let mut peer = populated_pool(4);
        let mut rx = TaggedBuffer::load(buf.unload());
        decode_ppn(&mut peer, JOBID, 1, &mut rx, &compressor).unwrap();

        let peer_job = peer.job(JOBID).unwrap();
        assert_eq!(peer_job.procs.len(), 3);
        let procs_on_0 = peer.node_pool.get_by_index(0).unwrap().procs.len();
        let procs_on_3 = peer.node_pool.get_by_index(3).unwrap().procs.len();
        assert_eq!(procs_on_0, 2);
        assert_eq!(procs_on_3, 1);
        for (_, p) in peer_job.procs.iter() {
            assert_eq!(p.state, ProcessState::Init);
            assert!(p.vpid.is_none());
        }
        assert!(peer.node_pool.present().all(|n| !n.mapped));
    }

    #[test]
    fn master_discards_payload_without_mutating_map() {
        let mut rt = populated_pool(2);
        let job = rt.job_mut(JOBID);
        job.num_apps = 1;
        job.map.nodes = vec![NodeHandle(0)];
        job.add_process(Process::new_app(JOBID, 0, 0, NodeHandle(0)));

        let compressor = Lz4Compressor::default();
        let mut buf = TaggedBuffer::new();
        encode_ppn(&rt, JOBID, &mut buf, &compressor).unwrap();

        let mut master = populated_pool(2);
        master.am_i_master = true;
        let mut rx = TaggedBuffer::load(buf.unload());
        decode_ppn(&mut master, JOBID, 1, &mut rx, &compressor).unwrap();

        assert!(master.job(JOBID).unwrap().map.nodes.is_empty());
    }

    #[test]
    fn unknown_node_index_is_not_found() {
        let compressor = Lz4Compressor::default();
        let mut buf = TaggedBuffer::new();
        buf.pack_i32(99);
        buf.pack_u16(1);
        let payload = buf.unload();

        let mut app_buf = TaggedBuffer::new();
        write_blob_variant_a(&mut app_buf, &compressor, &payload);

        let mut peer = populated_pool(2);
        let mut rx = TaggedBuffer::load(app_buf.unload());
        let err = decode_ppn(&mut peer, JOBID, 1, &mut rx, &compressor).unwrap_err();
        assert!(matches!(err, Error::NotFound { what: "node", .. }));
    }
}
