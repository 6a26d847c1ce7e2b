// Copyright (c) Node Map Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared data model for the node-map serialization core: the node pool,
//! process and topology arenas, the daemon/application job objects, and the
//! `Runtime` context the wire-format codec crates (`ndmap-nidmap`,
//! `ndmap-nodeinfo`, `ndmap-ppn`) read from and mutate.

pub mod arena;
pub mod error;
pub mod job;
pub mod node;
pub mod pool;
pub mod process;
pub mod routing;
pub mod runtime;
pub mod topology;

pub use error::{Error, Result};
