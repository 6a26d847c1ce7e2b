// Copyright (c) Node Map Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Top-level sequencing over a shared [`Runtime`](ndmap_types::runtime::Runtime)
//! plus ambient logging bootstrap. This crate is the one place in the
//! workspace that wires up a concrete `tracing-subscriber` layer; every
//! codec crate below it depends only on the `tracing` facade (SPEC_FULL.md
//! §4.7).

use ndmap_compress::{Compressor, Lz4Compressor};
use ndmap_config::RuntimeConfig;
use ndmap_types::runtime::Runtime;
use ndmap_types::Result;
use ndmap_wire::TaggedBuffer;
use tracing_subscriber::EnvFilter;

/// Output format for the installed `tracing-subscriber` layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Installs a global `tracing` subscriber. Idempotent-safe to call more
/// than once per process only in the sense that later calls are ignored
/// (the underlying `tracing` global dispatcher can only be set once);
/// errors from a second call are deliberately swallowed since they just
/// mean a subscriber is already installed.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = match format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
    if let Err(error) = result {
        tracing::debug!(%error, "tracing subscriber already installed");
    }
}

/// Builds the one `Compressor` this workspace ships, parameterized by
/// `RuntimeConfig` (SPEC_FULL.md §4.6).
pub fn compressor_from_config(config: &RuntimeConfig) -> Lz4Compressor {
    Lz4Compressor { min_bytes_to_compress: config.compression.min_bytes_to_compress }
}

/// Encodes NIDMAP, NODEINFO, and PPN (for `jobid`) onto one outbound buffer
/// in the fixed wire order, against `runtime` as it stands right now
/// (SPEC_FULL.md §2, §5).
pub fn encode_allocation_update(
    runtime: &Runtime,
    jobid: u32,
    compressor: &dyn Compressor,
) -> Result<Vec<u8>> {
    let mut buf = TaggedBuffer::new();
    ndmap_nidmap::encode_nidmap(runtime, &mut buf, compressor)?;
    ndmap_nodeinfo::encode_nodeinfo(runtime, &mut buf, compressor)?;
    ndmap_ppn::encode_ppn(runtime, jobid, &mut buf, compressor)?;
    Ok(buf.unload())
}

/// Decodes a buffer produced by [`encode_allocation_update`] in the same
/// fixed order, mutating `runtime` in place. `num_apps` must already be
/// known to the caller (established by the out-of-scope job-definition
/// message that precedes PPN on the wire in the full protocol).
pub fn decode_allocation_update(
    runtime: &mut Runtime,
    jobid: u32,
    num_apps: usize,
    bytes: Vec<u8>,
    compressor: &dyn Compressor,
) -> Result<()> {
    let mut buf = TaggedBuffer::load(bytes);
    ndmap_nidmap::decode_nidmap(runtime, &mut buf, compressor)?;
    ndmap_nodeinfo::decode_nodeinfo(runtime, &mut buf, compressor)?;
    ndmap_ppn::decode_ppn(runtime, jobid, num_apps, &mut buf, compressor)?;
    Ok(())
}
