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

pub mod driver_index;


#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum RrNodeKind {
    Source,
    Sink,
    OPin,
    IPin,
    ChanX,
    ChanY,
}

impl RrNodeKind {
    pub fn is_wire(self) -> bool {
        matches!(self, Self::ChanX | Self::ChanY)
    }

    pub fn is_pin(self) -> bool {
        matches!(self, Self::OPin | Self::IPin)
    }
}

impl std::fmt::Display for RrNodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Source => "SOURCE",
            Self::Sink => "SINK",
            Self::OPin => "OPIN",
            Self::IPin => "IPIN",
            Self::ChanX => "CHANX",
            Self::ChanY => "CHANY",
        };
        f.write_str(s)
    }
}

/// Signal direction of a routing wire. `Bi` is only ever read in order to be
/// rejected.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Direction {
    Inc,
    Dec,
    Bi,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RrSwitch {
    pub name: String,
    #[serde(default)]
    pub buffered: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RrEdge {
    pub sink: RrNodeId,
    pub switch: RrSwitchId,
}

/// Reverse adjacency entry. The position of a driver in `RrNode::drivers` is
/// the path id a multiplexer realizing the node has to select.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub struct RrDriver {
    pub node: RrNodeId,
    /// Index of the realizing edge in the driver's `edges`
    pub edge: usize,
    pub switch: RrSwitchId,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub struct SelectedDriver {
    pub driver: RrNodeId,
    pub edge: usize,
    pub path_id: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RrNode {
    pub kind: RrNodeKind,
    pub xlow: usize,
    pub ylow: usize,
    pub xhigh: usize,
    pub yhigh: usize,
    /// Track number for wires, pin number for pins, class number for
    /// sources/sinks
    pub ptc: usize,
    #[serde(default)]
    pub direction: Option<Direction>,
    /// Side of the block a pin sits on
    #[serde(default)]
    pub side: Option<Side>,
    pub fan_in: usize,
    #[serde(default)]
    pub edges: Vec<RrEdge>,

    /* Everything below is derived by this crate */
    #[serde(skip)]
    pub drivers: Vec<RrDriver>,
    #[serde(skip)]
    pub driver_switch: Option<RrSwitchId>,
    #[serde(skip)]
    pub selected: Option<SelectedDriver>,
    #[serde(skip)]
    pub global_net: Option<GlobalNetId>,
    #[serde(skip)]
    pub logical_net: Option<LogicalNetId>,
}

impl RrNode {
    pub fn new(kind: RrNodeKind, low: (usize, usize), high: (usize, usize), ptc: usize) -> Self {
        Self {
            kind,
            xlow: low.0,
            ylow: low.1,
            xhigh: high.0,
            yhigh: high.1,
            ptc,
            direction: None,
            side: None,
            fan_in: 0,
            edges: Vec::new(),
            drivers: Vec::new(),
            driver_switch: None,
            selected: None,
            global_net: None,
            logical_net: None,
        }
    }

    /// Coordinate at which a wire enters the fabric, following its direction.
    pub fn start(&self) -> (usize, usize) {
        match self.direction {
            Some(Direction::Dec) => (self.xhigh, self.yhigh),
            _ => (self.xlow, self.ylow),
        }
    }

    pub fn covers(&self, x: usize, y: usize) -> bool {
        (self.xlow ..= self.xhigh).contains(&x) && (self.ylow ..= self.yhigh).contains(&y)
    }

    pub fn reset_annotation(&mut self) {
        self.selected = None;
        self.global_net = None;
        self.logical_net = None;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct LookupKey {
    kind: RrNodeKind,
    x: usize,
    y: usize,
}

#[derive(Default, Debug, Serialize, Deserialize)]
pub struct RrGraph {
    pub switches: Vec<RrSwitch>,
    pub nodes: Vec<RrNode>,
    /* Spatial index (kind, x, y) -> nodes, see `Self::build_lookup` */
    #[serde(skip)]
    lookup: HashMap<LookupKey, Vec<RrNodeId>>,
}

impl RrGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_switch<S: ToString>(&mut self, name: S, buffered: bool) -> RrSwitchId {
        self.switches.push(RrSwitch { name: name.to_string(), buffered });
        RrSwitchId(self.switches.len() - 1)
    }

    pub fn add_node(&mut self, node: RrNode) -> RrNodeId {
        self.nodes.push(node);
        RrNodeId(self.nodes.len() - 1)
    }

    pub fn add_wire(
        &mut self,
        kind: RrNodeKind,
        low: (usize, usize),
        high: (usize, usize),
        track: usize,
        direction: Direction
    )
        -> RrNodeId
    {
        debug_assert!(kind.is_wire());
        let mut node = RrNode::new(kind, low, high, track);
        node.direction = Some(direction);
        self.add_node(node)
    }

    pub fn add_pin(
        &mut self,
        kind: RrNodeKind,
        at: (usize, usize),
        pin: usize,
        side: Side
    )
        -> RrNodeId
    {
        debug_assert!(kind.is_pin());
        let mut node = RrNode::new(kind, at, at, pin);
        node.side = Some(side);
        self.add_node(node)
    }

    /// Adds an edge and accounts for it in the sink's declared fan-in, the way
    /// an RRG builder would.
    pub fn add_edge(&mut self, from: RrNodeId, to: RrNodeId, switch: RrSwitchId) {
        self.nodes[from.0].edges.push(RrEdge { sink: to, switch });
        self.nodes[to.0].fan_in += 1;
    }

    #[inline]
    pub fn node(&self, id: RrNodeId) -> &RrNode {
        &self.nodes[id.0]
    }

    #[inline]
    pub fn node_mut(&mut self, id: RrNodeId) -> &mut RrNode {
        &mut self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.edges.len()).sum()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = RrNodeId> {
        (0 .. self.nodes.len()).map(RrNodeId)
    }

    /// Human-readable node location used in diagnostics.
    pub fn describe(&self, id: RrNodeId) -> String {
        match self.nodes.get(id.0) {
            Some(node) => format!(
                "{}#{} (ptc {}) at ({},{})..({},{})",
                node.kind, id, node.ptc, node.xlow, node.ylow, node.xhigh, node.yhigh
            ),
            None => format!("<invalid rr node #{}>", id),
        }
    }

    /// (Re)creates the spatial index. Wires are registered at every tile they
    /// span, everything else at its low corner.
    pub fn build_lookup(&mut self) {
        self.lookup.clear();
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.kind.is_wire() {
                for x in node.xlow ..= node.xhigh {
                    for y in node.ylow ..= node.yhigh {
                        self.lookup
                            .entry(LookupKey { kind: node.kind, x, y })
                            .or_insert_with(Vec::new)
                            .push(RrNodeId(idx));
                    }
                }
            } else {
                self.lookup
                    .entry(LookupKey { kind: node.kind, x: node.xlow, y: node.ylow })
                    .or_insert_with(Vec::new)
                    .push(RrNodeId(idx));
            }
        }
        /* Keep channel contents in track order */
        let nodes = &self.nodes;
        for list in self.lookup.values_mut() {
            list.sort_by_key(|id| (nodes[id.0].ptc, id.0));
        }
    }

    pub fn nodes_at(&self, kind: RrNodeKind, x: usize, y: usize) -> &[RrNodeId] {
        self.lookup
            .get(&LookupKey { kind, x, y })
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Pins of block (`x`, `y`) located on `side`
    pub fn pins_at<'s>(&'s self, kind: RrNodeKind, x: usize, y: usize, side: Side)
        -> impl Iterator<Item = RrNodeId> + 's
    {
        self.nodes_at(kind, x, y)
            .iter()
            .copied()
            .filter(move |id| self.nodes[id.0].side == Some(side))
    }

    pub fn find_pin(&self, kind: RrNodeKind, x: usize, y: usize, pin: usize) -> Option<RrNodeId> {
        self.nodes_at(kind, x, y)
            .iter()
            .copied()
            .find(|id| self.nodes[id.0].ptc == pin)
    }

    pub fn reset_annotations(&mut self) {
        for node in &mut self.nodes {
            node.reset_annotation();
        }
    }

    /// Nodes which selected `id` as their driver.
    pub fn selected_fanout<'s>(&'s self, id: RrNodeId) -> impl Iterator<Item = RrNodeId> + 's {
        self.nodes[id.0].edges
            .iter()
            .enumerate()
            .filter(move |(edge_idx, e)| {
                match self.nodes[e.sink.0].selected {
                    Some(s) => s.driver == id && s.edge == *edge_idx,
                    None => false,
                }
            })
            .map(|(_, e)| e.sink)
    }
}
