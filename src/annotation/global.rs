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

//! Global pass: routed traces to selected drivers of the routing graph.

use serde::Serialize;
use crate::common::*;
use crate::error::{AnnotationError, Result};
use crate::fabric::NetTable;
#[allow(unused)]
use crate::log::*;
use crate::rr_graph::{RrGraph, RrNodeKind, SelectedDriver};

#[derive(Clone, Copy, Default, Debug, Serialize)]
pub struct GlobalPassStats {
    pub routed_nets: usize,
    pub skipped_nets: usize,
    pub annotated_nodes: usize,
}

impl RrGraph {
    /* Assigns `net` to `node`. Each node belongs to at most one net. */
    fn claim(&mut self, node: RrNodeId, net: GlobalNetId, nets: &NetTable) -> Result<bool> {
        match self.nodes[node.0].global_net {
            Some(existing) if existing != net => Err(AnnotationError::NetConflict {
                node: self.describe(node),
                existing: nets.global_name(existing),
                new: nets.global_name(net),
            }),
            Some(_) => Ok(false),
            None => {
                let n = &mut self.nodes[node.0];
                n.global_net = Some(net);
                n.logical_net = Some(nets.logical_of(net));
                Ok(true)
            },
        }
    }

    fn select_driver(&mut self, node: RrNodeId, driver: RrNodeId, net: GlobalNetId, nets: &NetTable)
        -> Result<()>
    {
        let path_id = self.path_id(node, driver)
            .ok_or_else(|| AnnotationError::DriverNotFound {
                net: nets.global_name(net),
                driver: self.describe(driver),
                node: self.describe(node),
            })?;
        let edge = self.nodes[node.0].drivers[path_id].edge;
        let selected = SelectedDriver { driver, edge, path_id };

        match self.nodes[node.0].selected {
            Some(existing) if existing != selected => Err(AnnotationError::MultipleDrivers {
                net: nets.global_name(net),
                node: self.describe(node),
            }),
            _ => {
                self.nodes[node.0].selected = Some(selected);
                Ok(())
            },
        }
    }

    /// Walks one routing trace. Returns the number of nodes newly claimed by
    /// the net.
    fn annotate_trace(&mut self, net: GlobalNetId, trace: &[RrNodeId], nets: &NetTable)
        -> Result<usize>
    {
        let mut claimed = 0;
        let mut prev: Option<RrNodeId> = None;

        for (idx, node) in trace.iter().copied().enumerate() {
            if node.0 >= self.nodes.len() {
                return Err(AnnotationError::UnknownTraceNode {
                    net: nets.global_name(net),
                    node,
                });
            }

            match prev {
                Some(driver) => {
                    if self.claim(node, net, nets)? {
                        claimed += 1;
                    }
                    self.select_driver(node, driver, net, nets)?;
                },
                None if idx == 0 => {
                    if self.claim(node, net, nets)? {
                        claimed += 1;
                    }
                },
                /* New branch, must fork from the part of the tree already seen */
                None => if self.nodes[node.0].global_net != Some(net) {
                    return Err(AnnotationError::BranchNotOnTree {
                        net: nets.global_name(net),
                        node: self.describe(node),
                    });
                },
            }

            prev = if self.nodes[node.0].kind == RrNodeKind::Sink { None } else { Some(node) };
        }

        Ok(claimed)
    }

    /// Resets all annotations and marks every node used by a routed net with
    /// its driver and net ids.
    pub fn annotate_routing(&mut self, nets: &NetTable, skip_global_nets: bool)
        -> Result<GlobalPassStats>
    {
        self.reset_annotations();
        let mut stats = GlobalPassStats::default();

        for (idx, net) in nets.global.iter().enumerate() {
            if net.is_global && skip_global_nets {
                dbg_log!(DBG_EXTRA1, "Skipping global net {}", net.name);
                stats.skipped_nets += 1;
                continue;
            }
            if net.trace.is_empty() {
                return Err(AnnotationError::EmptyTrace { net: net.name.clone() });
            }

            stats.annotated_nodes += self.annotate_trace(GlobalNetId(idx), &net.trace, nets)?;
            stats.routed_nets += 1;
        }

        dbg_log!(
            DBG_INFO,
            "Global pass: {} nets routed over {} nodes, {} global nets skipped",
            stats.routed_nets,
            stats.annotated_nodes,
            stats.skipped_nets
        );

        Ok(stats)
    }
}
