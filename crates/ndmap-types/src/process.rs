// Copyright (c) Node Map Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::arena::Handle;
use crate::node::NodeHandle;

pub type ProcessHandle = Handle<Process>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Init,
    Running,
    Killed,
    Terminated,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Process {
    pub jobid: u32,
    pub vpid: Option<u32>,
    pub state: ProcessState,
    pub alive: bool,
    /// Index into the owning job's `apps[]`; `-1` for daemons, which do not
    /// belong to an application.
    pub app_idx: i32,
    /// The parent daemon's vpid. `None` for daemons themselves.
    pub parent: Option<u32>,
    pub node: Option<NodeHandle>,
}

impl Process {
    /// A daemon materialized by NIDMAP decode (SPEC_FULL.md §4.2).
    pub fn new_daemon(jobid: u32, vpid: u32, node: NodeHandle) -> Self {
        Self {
            jobid,
            vpid: Some(vpid),
            state: ProcessState::Running,
            alive: true,
            app_idx: -1,
            parent: None,
            node: Some(node),
        }
    }

    /// An application process materialized by PPN decode (SPEC_FULL.md
    /// §4.4). Vpid assignment is deferred to a later ranking pass, out of
    /// scope here.
    pub fn new_app(jobid: u32, app_idx: i32, parent_vpid: u32, node: NodeHandle) -> Self {
        Self {
            jobid,
            vpid: None,
            state: ProcessState::Init,
            alive: true,
            app_idx,
            parent: Some(parent_vpid),
            node: Some(node),
        }
    }
}
