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

use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use crate::common::*;
use crate::error::{AnnotationError, Result};

pub mod cluster;


pub use cluster::*;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum PbPortKind {
    Input,
    Output,
    Clock,
}

impl PbPortKind {
    /// Inputs and clocks are both fed from outside of the owning block
    pub fn is_input(self) -> bool {
        matches!(self, Self::Input | Self::Clock)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum InterconnectKind {
    /// One-to-one connection. No configuration.
    Wire,
    /// Every input reaches every output through a multiplexer
    FullMux,
    /// Multiplexer over a declared subset of input-output pairs
    RestrictedMux,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Interconnect {
    pub name: String,
    pub kind: InterconnectKind,
    /// Node whose mode declares this interconnect
    pub owner: PbNodeId,
    pub mode: usize,
    pub edges: Vec<PbEdgeId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PbGraphEdge {
    pub from: PbPinId,
    pub to: PbPinId,
    pub interconnect: InterconnectId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PbMode {
    pub name: String,
    pub children: Vec<PbNodeId>,
    pub interconnects: Vec<InterconnectId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PbGraphNode {
    /// Instance name, eg. `fle[3]`
    pub name: String,
    pub pb_type: String,
    /// Parent node and the parent's mode this node is instantiated in
    pub parent: Option<(PbNodeId, usize)>,
    pub depth: usize,
    pub modes: Vec<PbMode>,
    pub pins: Vec<PbPinId>,
}

impl PbGraphNode {
    pub fn is_primitive(&self) -> bool {
        self.modes.is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PbGraphPin {
    pub node: PbNodeId,
    pub port: String,
    pub bit: usize,
    pub kind: PbPortKind,
    /// Pin number on the cluster boundary. Only set for pins of the root node
    /// and equal to the `ptc` of the matching routing graph pin.
    pub top_ptc: Option<usize>,
    pub input_edges: Vec<PbEdgeId>,
    pub output_edges: Vec<PbEdgeId>,
}

/// Routing graph of one cluster type (a "pb-graph"): the hierarchy of
/// physical blocks, their modes, and the interconnect between their pins.
/// Pins are indexed by their position in the cluster, which is what
/// `PbPinId` holds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PbGraph {
    pub name: String,
    pub nodes: Vec<PbGraphNode>,
    pub pins: Vec<PbGraphPin>,
    pub edges: Vec<PbGraphEdge>,
    pub interconnects: Vec<Interconnect>,
}

pub const PB_ROOT: PbNodeId = PbNodeId(0);

impl PbGraph {
    pub fn new<S: ToString>(name: S) -> Self {
        let name = name.to_string();
        Self {
            nodes: vec![PbGraphNode {
                name: name.clone(),
                pb_type: name.clone(),
                parent: None,
                depth: 0,
                modes: Vec::new(),
                pins: Vec::new(),
            }],
            name,
            pins: Vec::new(),
            edges: Vec::new(),
            interconnects: Vec::new(),
        }
    }

    pub fn add_mode<S: ToString>(&mut self, node: PbNodeId, name: S) -> usize {
        let modes = &mut self.nodes[node.0].modes;
        modes.push(PbMode {
            name: name.to_string(),
            children: Vec::new(),
            interconnects: Vec::new(),
        });
        modes.len() - 1
    }

    pub fn add_child<S: ToString, T: ToString>(
        &mut self,
        parent: PbNodeId,
        mode: usize,
        pb_type: S,
        name: T
    )
        -> PbNodeId
    {
        let id = PbNodeId(self.nodes.len());
        let depth = self.nodes[parent.0].depth + 1;
        self.nodes[parent.0].modes[mode].children.push(id);
        self.nodes.push(PbGraphNode {
            name: name.to_string(),
            pb_type: pb_type.to_string(),
            parent: Some((parent, mode)),
            depth,
            modes: Vec::new(),
            pins: Vec::new(),
        });
        id
    }

    /// Adds a `width`-bit port to `node`. Ports of the root node are numbered
    /// on the cluster boundary in creation order.
    pub fn add_port<S: ToString>(
        &mut self,
        node: PbNodeId,
        kind: PbPortKind,
        port: S,
        width: usize
    )
        -> Vec<PbPinId>
    {
        let port = port.to_string();
        let mut next_ptc = self.nodes[PB_ROOT.0].pins.len();
        let mut added = Vec::with_capacity(width);
        for bit in 0 .. width {
            let id = PbPinId(self.pins.len());
            let top_ptc = (node == PB_ROOT).then(|| {
                next_ptc += 1;
                next_ptc - 1
            });
            self.pins.push(PbGraphPin {
                node,
                port: port.clone(),
                bit,
                kind,
                top_ptc,
                input_edges: Vec::new(),
                output_edges: Vec::new(),
            });
            self.nodes[node.0].pins.push(id);
            added.push(id);
        }
        added
    }

    fn push_interconnect(
        &mut self,
        owner: PbNodeId,
        mode: usize,
        name: String,
        kind: InterconnectKind
    )
        -> InterconnectId
    {
        let id = InterconnectId(self.interconnects.len());
        self.interconnects.push(Interconnect { name, kind, owner, mode, edges: Vec::new() });
        self.nodes[owner.0].modes[mode].interconnects.push(id);
        id
    }

    fn connect(&mut self, ic: InterconnectId, from: PbPinId, to: PbPinId) -> PbEdgeId {
        let id = PbEdgeId(self.edges.len());
        self.edges.push(PbGraphEdge { from, to, interconnect: ic });
        self.pins[from.0].output_edges.push(id);
        self.pins[to.0].input_edges.push(id);
        self.interconnects[ic.0].edges.push(id);
        id
    }

    /// Declares a `Wire` (bit-wise one-to-one) or `FullMux` (every input to
    /// every output) interconnect in `mode` of `owner`.
    pub fn add_interconnect<S: ToString>(
        &mut self,
        owner: PbNodeId,
        mode: usize,
        name: S,
        kind: InterconnectKind,
        inputs: &[PbPinId],
        outputs: &[PbPinId]
    )
        -> InterconnectId
    {
        let ic = self.push_interconnect(owner, mode, name.to_string(), kind);
        match kind {
            InterconnectKind::Wire => {
                assert_eq!(
                    inputs.len(), outputs.len(),
                    "wire interconnect needs matching port widths"
                );
                for (from, to) in inputs.iter().zip(outputs.iter()) {
                    self.connect(ic, *from, *to);
                }
            },
            InterconnectKind::FullMux => {
                for to in outputs {
                    for from in inputs {
                        self.connect(ic, *from, *to);
                    }
                }
            },
            InterconnectKind::RestrictedMux =>
                panic!("Restricted multiplexers are declared with `add_restricted_mux`"),
        }
        ic
    }

    /// Declares a multiplexer which only realizes the listed (from, to)
    /// connections. The order of `connections` is the multiplexer input order.
    pub fn add_restricted_mux<S: ToString>(
        &mut self,
        owner: PbNodeId,
        mode: usize,
        name: S,
        connections: &[(PbPinId, PbPinId)]
    )
        -> InterconnectId
    {
        let ic = self.push_interconnect(
            owner,
            mode,
            name.to_string(),
            InterconnectKind::RestrictedMux
        );
        for (from, to) in connections {
            self.connect(ic, *from, *to);
        }
        ic
    }

    #[inline]
    pub fn pin(&self, id: PbPinId) -> &PbGraphPin {
        &self.pins[id.0]
    }

    #[inline]
    pub fn node(&self, id: PbNodeId) -> &PbGraphNode {
        &self.nodes[id.0]
    }

    #[inline]
    pub fn edge(&self, id: PbEdgeId) -> &PbGraphEdge {
        &self.edges[id.0]
    }

    pub fn root(&self) -> &PbGraphNode {
        &self.nodes[PB_ROOT.0]
    }

    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Hierarchical path of a node, eg. `clb.fle[2].ble4[0]`
    pub fn node_path(&self, node: PbNodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            names.push(self.nodes[id.0].name.as_str());
            current = self.nodes[id.0].parent.map(|(parent, _)| parent);
        }
        names.reverse();
        names.join(".")
    }

    pub fn pin_name(&self, pin: PbPinId) -> String {
        let p = &self.pins[pin.0];
        format!("{}.{}[{}]", self.node_path(p.node), p.port, p.bit)
    }

    /// Interconnect edges of `pin` belonging to the selected modes. `modes`
    /// holds the selected mode of every node; unused nodes (`None`) behave as
    /// if their first mode was selected.
    pub fn active_input_edges<'s>(&'s self, pin: PbPinId, modes: &'s [Option<usize>])
        -> impl Iterator<Item = PbEdgeId> + 's
    {
        self.pins[pin.0].input_edges
            .iter()
            .copied()
            .filter(move |e| {
                let ic = &self.interconnects[self.edges[e.0].interconnect.0];
                let selected = modes.get(ic.owner.0).copied().flatten().unwrap_or(0);
                selected == ic.mode
            })
    }

    /* Every id stored in the graph has to point into it */
    fn check_references(&self) -> Result<()> {
        let dangling = |what, index, target, target_index| AnnotationError::DanglingPbReference {
            pb_type: self.name.clone(),
            what,
            index,
            target,
            target_index,
        };
        for (idx, edge) in self.edges.iter().enumerate() {
            for pin in [edge.from, edge.to] {
                if pin.0 >= self.pins.len() {
                    return Err(dangling("edge", idx, "pin", pin.0));
                }
            }
            if edge.interconnect.0 >= self.interconnects.len() {
                return Err(dangling("edge", idx, "interconnect", edge.interconnect.0));
            }
        }
        for (idx, pin) in self.pins.iter().enumerate() {
            if pin.node.0 >= self.nodes.len() {
                return Err(dangling("pin", idx, "node", pin.node.0));
            }
            for edge in pin.input_edges.iter().chain(pin.output_edges.iter()) {
                if edge.0 >= self.edges.len() {
                    return Err(dangling("pin", idx, "edge", edge.0));
                }
            }
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Some((parent, _)) = node.parent.filter(|(parent, _)| parent.0 >= self.nodes.len()) {
                return Err(dangling("node", idx, "node", parent.0));
            }
        }
        for (idx, ic) in self.interconnects.iter().enumerate() {
            match self.nodes.get(ic.owner.0) {
                Some(owner) if ic.mode < owner.modes.len() => (),
                Some(_) => return Err(dangling("interconnect", idx, "mode", ic.mode)),
                None => return Err(dangling("interconnect", idx, "node", ic.owner.0)),
            }
        }
        Ok(())
    }

    /// Checks that every stored id is in range and that all edges reaching a
    /// pin within one mode come from a single interconnect, so that every
    /// destination pin has exactly one multiplexer size per mode.
    pub fn validate(&self) -> Result<()> {
        self.check_references()?;
        for (pin_idx, pin) in self.pins.iter().enumerate() {
            let mut seen: HashMap<(PbNodeId, usize), InterconnectId> = HashMap::new();
            for edge in &pin.input_edges {
                let ic_id = self.edges[edge.0].interconnect;
                let ic = &self.interconnects[ic_id.0];
                match seen.get(&(ic.owner, ic.mode)) {
                    Some(first) if *first != ic_id => {
                        return Err(AnnotationError::MixedInterconnects {
                            pb_type: self.name.clone(),
                            pin: self.pin_name(PbPinId(pin_idx)),
                            first: self.interconnects[first.0].name.clone(),
                            second: ic.name.clone(),
                        });
                    },
                    Some(_) => (),
                    None => {
                        seen.insert((ic.owner, ic.mode), ic_id);
                    },
                }
            }
        }
        Ok(())
    }
}
