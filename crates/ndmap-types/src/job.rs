// Copyright (c) Node Map Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::arena::Arena;
use crate::node::NodeHandle;
use crate::process::{Process, ProcessHandle};

/// The subset of nodes assigned to a job and the per-node placement
/// decisions (SPEC_FULL.md §3, glossary "Job map").
#[derive(Debug, Default)]
pub struct JobMap {
    pub nodes: Vec<NodeHandle>,
}

impl JobMap {
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains(&handle)
    }
}

#[derive(Debug)]
pub struct Job {
    pub jobid: u32,
    pub num_apps: usize,
    pub apps: Vec<i32>,
    pub map: JobMap,
    pub procs: Arena<Process>,
}

impl Job {
    pub fn new(jobid: u32) -> Self {
        Self { jobid, num_apps: 0, apps: Vec::new(), map: JobMap::default(), procs: Arena::new() }
    }

    pub fn daemon_for_vpid(&self, vpid: u32) -> Option<ProcessHandle> {
        self.procs.iter().find(|(_, p)| p.vpid == Some(vpid)).map(|(h, _)| h)
    }

    pub fn add_process(&mut self, process: Process) -> ProcessHandle {
        self.procs.insert(process)
    }
}
