// Copyright (c) Node Map Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::runtime::Runtime;

/// Hook invoked at the end of NIDMAP decode once the node pool and daemon
/// job have been updated (SPEC_FULL.md §4.0, §4.2). Real routing-plan
/// construction is out of scope; embedders supply their own implementation.
pub trait RoutingPlan {
    fn update(&self, runtime: &Runtime);
}

/// Default hook that does nothing beyond logging that it ran.
#[derive(Debug, Default)]
pub struct NoopRoutingPlan;

impl RoutingPlan for NoopRoutingPlan {
    fn update(&self, runtime: &Runtime) {
        tracing::debug!(num_daemons = runtime.num_daemons, "routing plan update: no-op");
    }
}
