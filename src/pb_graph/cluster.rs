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

use serde::{Serialize, Deserialize};
use crate::error::{AnnotationError, Result};
use crate::rr_graph::{RrGraph, RrNodeKind};
use super::*;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub struct LocalDriver {
    pub pin: PbPinId,
    pub edge: PbEdgeId,
    /// Position of `edge` among the active input edges of the driven pin
    pub path_id: usize,
    /// Number of active input edges of the driven pin
    pub fan_in: usize,
}

#[derive(Clone, Default, Debug, Serialize)]
pub struct LocalPinState {
    pub selected: Option<LocalDriver>,
    pub global_net: Option<GlobalNetId>,
    pub logical_net: Option<LogicalNetId>,
    /// No active interconnect reaches the pin
    pub open: bool,
    /// `logical_net` differs from the previous propagation round
    pub changed: bool,
}

/// Per-instance mirror of the cluster type's pb-graph.
#[derive(Clone, Default, Debug, Serialize)]
pub struct ClusterLocalGraph {
    pub pins: Vec<LocalPinState>,
    /// Pins in an order where every pin comes after its selected driver
    pub order: Vec<PbPinId>,
    /// Routing graph pins bound to the cluster boundary pins
    pub rr_pins: Vec<(PbPinId, RrNodeId)>,
}

impl ClusterLocalGraph {
    pub fn new(pin_count: usize) -> Self {
        Self {
            pins: vec![Default::default(); pin_count],
            order: Vec::new(),
            rr_pins: Vec::new(),
        }
    }

    #[inline]
    pub fn pin(&self, id: PbPinId) -> &LocalPinState {
        &self.pins[id.0]
    }

    #[inline]
    pub fn pin_mut(&mut self, id: PbPinId) -> &mut LocalPinState {
        &mut self.pins[id.0]
    }

    /// Routing graph pin bound to a cluster boundary pin
    pub fn rr_pin(&self, pin: PbPinId) -> Option<RrNodeId> {
        self.rr_pins.iter()
            .find(|(p, _)| *p == pin)
            .map(|(_, node)| *node)
    }

    pub fn changed_pins(&self) -> impl Iterator<Item = PbPinId> + '_ {
        self.pins.iter()
            .enumerate()
            .filter(|(_, p)| p.changed)
            .map(|(idx, _)| PbPinId(idx))
    }
}

/// A placed instance of a cluster type together with its clustering result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterInstance {
    pub name: String,
    pub pb_graph: PbGraphId,
    pub x: usize,
    pub y: usize,
    /// Selected mode of every pb-graph node, `None` for unused nodes
    #[serde(default)]
    pub modes: Vec<Option<usize>>,
    /// Nets assigned to pins by the clusterer's intra-cluster routing
    #[serde(default)]
    pub pin_nets: Vec<Option<GlobalNetId>>,
    /// Primitive outputs which only forward one of the primitive's inputs,
    /// as `(output, input)`
    #[serde(default)]
    pub route_throughs: Vec<(PbPinId, PbPinId)>,
    #[serde(skip)]
    pub local: ClusterLocalGraph,
}

impl ClusterInstance {
    pub fn new<S: ToString>(name: S, pb_graph: PbGraphId, pb: &PbGraph, at: (usize, usize))
        -> Self
    {
        Self {
            name: name.to_string(),
            pb_graph,
            x: at.0,
            y: at.1,
            modes: vec![None; pb.nodes.len()],
            pin_nets: vec![None; pb.pins.len()],
            route_throughs: Vec::new(),
            local: ClusterLocalGraph::new(pb.pins.len()),
        }
    }

    pub fn set_mode(&mut self, node: PbNodeId, mode: usize) {
        self.modes[node.0] = Some(mode);
    }

    pub fn set_pin_net(&mut self, pin: PbPinId, net: GlobalNetId) {
        self.pin_nets[pin.0] = Some(net);
    }

    pub fn pin_net(&self, pin: PbPinId) -> Option<GlobalNetId> {
        self.pin_nets.get(pin.0).copied().flatten()
    }

    pub fn route_through(&self, output: PbPinId) -> Option<PbPinId> {
        self.route_throughs.iter()
            .find(|(out, _)| *out == output)
            .map(|(_, input)| *input)
    }

    /* Pin and net ids coming with the snapshot */
    fn check_indices(&self, pb: &PbGraph, global_nets: usize) -> Result<()> {
        let invalid = |what, index| AnnotationError::InvalidClusterIndex {
            cluster: self.name.clone(),
            what,
            index,
        };
        for (output, input) in &self.route_throughs {
            for pin in [output, input] {
                if pin.0 >= pb.pins.len() {
                    return Err(invalid("route-through pin", pin.0));
                }
            }
        }
        for net in self.pin_nets.iter().flatten() {
            if net.0 >= global_nets {
                return Err(invalid("net", net.0));
            }
        }
        Ok(())
    }

    /// Sizes the per-pin tables to the pb-graph, checks the selected modes and
    /// the snapshot's pin and net ids, and binds the boundary pins to the
    /// routing graph. `global_nets` is the number of nets of the fabric.
    pub fn prepare(&mut self, pb: &PbGraph, rr: &RrGraph, global_nets: usize) -> Result<()> {
        self.modes.resize(pb.nodes.len(), None);
        self.pin_nets.resize(pb.pins.len(), None);
        self.check_indices(pb, global_nets)?;

        for (idx, mode) in self.modes.iter().enumerate() {
            if let Some(mode) = mode {
                if *mode >= pb.nodes[idx].modes.len() {
                    return Err(AnnotationError::InvalidMode {
                        cluster: self.name.clone(),
                        node: pb.node_path(PbNodeId(idx)),
                        mode: *mode,
                    });
                }
            }
        }

        let mut local = ClusterLocalGraph::new(pb.pins.len());
        for pin_id in &pb.root().pins {
            let pin = pb.pin(*pin_id);
            let ptc = match pin.top_ptc {
                Some(ptc) => ptc,
                None => continue,
            };
            let kind = if pin.kind.is_input() { RrNodeKind::IPin } else { RrNodeKind::OPin };
            let rr_pin = rr.find_pin(kind, self.x, self.y, ptc)
                .ok_or_else(|| AnnotationError::UnboundClusterPin {
                    cluster: self.name.clone(),
                    pb_type: pb.name.clone(),
                    pin: pb.pin_name(*pin_id),
                })?;
            local.rr_pins.push((*pin_id, rr_pin));
        }
        self.local = local;

        Ok(())
    }
}
