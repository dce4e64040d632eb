/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Parasitic nets: logical nets which clustering absorbed into a cluster, but
//! which the fabric still carries over routing once a cluster forwards them
//! (eg. a LUT configured as a buffer).
//!
//! Every iteration pushes the logical nets of cluster outputs over the routed
//! trees of the routing graph and re-runs local net propagation, until no
//! cluster input changes. A cluster input which keeps changing means a
//! combinational loop through clusters.

use crate::common::*;
use crate::error::{AnnotationError, Result};
use crate::fabric::Fabric;
#[allow(unused)]
use crate::log::*;
use crate::rr_graph::RrGraph;

impl RrGraph {
    /// Copies the logical net of `from` to every node reached from it over
    /// selected drivers. Returns the number of nodes which changed.
    pub fn forward_logical_net(&mut self, from: RrNodeId) -> usize {
        let logical = self.nodes[from.0].logical_net;
        let mut updated = 0;
        let mut stack = vec![from];

        while let Some(node) = stack.pop() {
            let fanout: Vec<RrNodeId> = self.selected_fanout(node).collect();
            for next in fanout {
                let n = &mut self.nodes[next.0];
                if n.logical_net != logical {
                    n.logical_net = logical;
                    updated += 1;
                }
                stack.push(next);
            }
        }

        updated
    }
}

impl Fabric {
    /// Iteration cap used when none is configured: one round per cluster in
    /// a chain, plus one per hierarchy level.
    pub fn default_parasitic_cap(&self) -> usize {
        self.clusters.len() + self.max_cluster_depth() + 2
    }

    /// Moves the logical nets of cluster outputs to their routing graph pins
    /// and further down the routed trees. Returns the number of routing
    /// nodes which changed.
    pub fn export_cluster_outputs(&mut self) -> usize {
        let mut updated = 0;
        for cluster in &self.clusters {
            let pb = &self.pb_graphs[cluster.pb_graph.0];
            for (pin, node) in &cluster.local.rr_pins {
                if pb.pin(*pin).kind.is_input() {
                    continue;
                }
                let logical = match cluster.local.pin(*pin).logical_net {
                    Some(logical) => logical,
                    None => continue,
                };
                let opin = self.rr_graph.node_mut(*node);
                if opin.logical_net != Some(logical) {
                    opin.logical_net = Some(logical);
                    updated += 1;
                }
                updated += self.rr_graph.forward_logical_net(*node);
            }
        }
        updated
    }

    /// One propagation round. Returns the number of cluster input pins
    /// whose logical net changed.
    pub fn parasitic_iteration(&mut self) -> usize {
        let exported = self.export_cluster_outputs();
        let changed = self.propagate_cluster_nets();
        dbg_log!(
            DBG_EXTRA2,
            "Parasitic round: {} routing nodes updated, {} cluster pins changed",
            exported,
            changed
        );
        changed
    }

    fn changing_pins(&self) -> Vec<String> {
        let mut pending = Vec::new();
        for cluster in &self.clusters {
            let pb = &self.pb_graphs[cluster.pb_graph.0];
            for pin in cluster.local.changed_pins() {
                pending.push(format!("{}: {}", cluster.name, pb.pin_name(pin)));
            }
        }
        pending
    }

    /// Iterates until no cluster input changes. Returns the number of
    /// iterations run.
    pub fn propagate_parasitic_nets(&mut self, max_iterations: usize) -> Result<usize> {
        for iteration in 1 ..= max_iterations {
            if self.parasitic_iteration() == 0 {
                dbg_log!(DBG_INFO, "Parasitic nets settled after {} iterations", iteration);
                return Ok(iteration);
            }
        }

        let pending = self.changing_pins();
        dbg_log!(DBG_CRITICAL, "Net propagation diverged, still changing: {:?}", pending);
        Err(AnnotationError::PropagationDiverged { iterations: max_iterations, pending })
    }

    /// Routing nodes whose logical net differs from the logical net of the
    /// fabric net routed through them
    pub fn parasitic_nodes(&self) -> Vec<RrNodeId> {
        self.rr_graph.node_ids()
            .filter(|id| {
                let node = self.rr_graph.node(*id);
                let routed = node.global_net.map(|net| self.nets.logical_of(net));
                node.logical_net.is_some() && node.logical_net != routed
            })
            .collect()
    }
}
