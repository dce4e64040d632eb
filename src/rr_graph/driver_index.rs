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

//! Reverse adjacency of the routing resource graph.

use crate::error::{AnnotationError, Result};
#[allow(unused)]
use crate::log::*;
use super::*;

impl RrGraph {
    /// Fills `drivers` of every node by inverting each edge of the graph once.
    ///
    /// The number of inverted edges reaching a node must match the fan-in the
    /// RRG builder declared for it. Anything else means the graph is
    /// structurally broken.
    pub fn build_driver_index(&mut self) -> Result<()> {
        let node_cnt = self.nodes.len();
        let mut drivers: Vec<Vec<RrDriver>> = self.nodes.iter()
            .map(|node| Vec::with_capacity(node.fan_in))
            .collect();

        for (from, node) in self.nodes.iter().enumerate() {
            for (edge, e) in node.edges.iter().enumerate() {
                if e.sink.0 >= node_cnt {
                    return Err(AnnotationError::DanglingEdge {
                        node: self.describe(RrNodeId(from)),
                        sink: e.sink,
                    });
                }
                drivers[e.sink.0].push(RrDriver {
                    node: RrNodeId(from),
                    edge,
                    switch: e.switch,
                });
            }
        }

        for (idx, drivers) in drivers.into_iter().enumerate() {
            let declared = self.nodes[idx].fan_in;
            if drivers.len() != declared {
                return Err(AnnotationError::FanInMismatch {
                    node: self.describe(RrNodeId(idx)),
                    declared,
                    found: drivers.len(),
                });
            }
            self.nodes[idx].drivers = drivers;
        }

        dbg_log!(
            DBG_INFO,
            "Driver index built for {} nodes, {} edges",
            node_cnt,
            self.edge_count()
        );

        Ok(())
    }

    /// Assigns `driver_switch` of `id`. Every driver of a node has to reach
    /// it through the same switch type.
    pub fn identify_driver_switch(&mut self, id: RrNodeId) -> Result<()> {
        let node = &self.nodes[id.0];

        if node.kind.is_wire() && node.direction == Some(Direction::Bi) {
            return Err(AnnotationError::BidirectionalWire { node: self.describe(id) });
        }

        let mut switch = None;
        for driver in &node.drivers {
            match switch {
                None => switch = Some(driver.switch),
                Some(first) if first != driver.switch => {
                    return Err(AnnotationError::InconsistentDriverSwitch {
                        node: self.describe(id),
                        first,
                        second: driver.switch,
                    });
                },
                Some(_) => (),
            }
        }

        self.nodes[id.0].driver_switch = switch;
        Ok(())
    }

    pub fn identify_driver_switches(&mut self) -> Result<()> {
        for id in 0 .. self.nodes.len() {
            self.identify_driver_switch(RrNodeId(id))?;
        }
        Ok(())
    }

    /// Path id of `driver` among the drivers of `node`
    pub fn path_id(&self, node: RrNodeId, driver: RrNodeId) -> Option<usize> {
        self.nodes[node.0].drivers.iter().position(|d| d.node == driver)
    }
}
