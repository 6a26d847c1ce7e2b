// Copyright (c) Node Map Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use crate::job::Job;
use crate::pool::NodePool;
use crate::routing::{NoopRoutingPlan, RoutingPlan};
use crate::topology::TopologyRegistry;

/// jobid reserved for the distinguished daemon job (SPEC_FULL.md §3, §4.2).
pub const DAEMON_JOBID: u32 = 0;

/// Process-wide state the three codecs read and mutate, collected into an
/// explicit context instead of module-level statics (SPEC_FULL.md §9,
/// "Runtime context"). Callers hold `&mut Runtime` for the duration of one
/// encode/decode call and are responsible for serializing access to it
/// themselves; this crate does no internal locking (SPEC_FULL.md §5).
pub struct Runtime {
    pub node_pool: NodePool,
    pub topology_registry: TopologyRegistry,
    pub daemon_job: Job,
    pub jobs: HashMap<u32, Job>,

    pub hnp_is_allocated: bool,
    pub managed_allocation: bool,
    pub num_daemons: u32,

    /// Whether this process is the master (HNP). Gates the NIDMAP/PPN
    /// decode short-circuit (SPEC_FULL.md §4.2, §4.4).
    pub am_i_master: bool,
    pub local_hostname: String,
    pub local_aliases: Vec<String>,
    /// The local topology's signature, used by NODEINFO decode to avoid
    /// discarding locally-owned topology data when a registry slot is
    /// replaced (SPEC_FULL.md §4.3).
    pub local_topo_signature: String,
    /// Whether the master hosts application procs; feeds the NODEINFO
    /// topology-scan starting index (SPEC_FULL.md §4.3, `ndmap-config`).
    pub allow_master_procs: bool,

    pub routing_plan: Box<dyn RoutingPlan>,
}

impl Runtime {
    pub fn new(local_hostname: impl Into<String>) -> Self {
        Self {
            node_pool: NodePool::new(),
            topology_registry: TopologyRegistry::new(),
            daemon_job: Job::new(DAEMON_JOBID),
            jobs: HashMap::new(),
            hnp_is_allocated: false,
            managed_allocation: false,
            num_daemons: 0,
            am_i_master: false,
            local_hostname: local_hostname.into(),
            local_aliases: Vec::new(),
            local_topo_signature: String::new(),
            allow_master_procs: false,
            routing_plan: Box::new(NoopRoutingPlan),
        }
    }

    pub fn job_mut(&mut self, jobid: u32) -> &mut Job {
        self.jobs.entry(jobid).or_insert_with(|| Job::new(jobid))
    }

    pub fn job(&self, jobid: u32) -> Option<&Job> {
        self.jobs.get(&jobid)
    }
}
