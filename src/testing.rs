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

//! Small fabrics shared by unit tests.
//!
//! Every block of the grid has the same pins:
//!
//! | ptc | kind | side  | source/sink |
//! |-----|------|-------|-------------|
//! | 0   | IPin | Top   | Sink 0      |
//! | 1   | IPin | Right | Sink 1      |
//! | 2   | OPin | Right | Source 2    |
//! | 3   | OPin | Top   | Source 3    |
//!
//! Channels hold length-1 wires, even tracks increasing and odd tracks
//! decreasing. `CHANX` exists for `x` in `1 ..= nx`, `y` in `0 .. ny`, and
//! `CHANY` for `x` in `0 .. nx`, `y` in `1 ..= ny`. Every wire starting in a
//! switch box is driven by all incoming wires of the other sides and by all
//! block outputs of the box. Every input pin is driven by all wires of its
//! connection box.

use std::collections::{HashMap, VecDeque};
use crate::boxes::{BoxBuilder, ChannelAxis, PortDir, RoutingBox};
use crate::common::*;
use crate::fabric::Grid;
use crate::pb_graph::*;
use crate::rr_graph::*;

pub fn grid_rr_graph(grid: Grid, tracks: usize) -> RrGraph {
    let mut rr = RrGraph::new();
    let delayless = rr.add_switch("__delayless__", false);
    let sb_mux = rr.add_switch("sb_mux", true);
    let cb_mux = rr.add_switch("cb_mux", true);

    for x in 0 .. grid.width {
        for y in 0 .. grid.height {
            let at = (x, y);
            let sinks = [
                rr.add_node(RrNode::new(RrNodeKind::Sink, at, at, 0)),
                rr.add_node(RrNode::new(RrNodeKind::Sink, at, at, 1)),
            ];
            let sources = [
                rr.add_node(RrNode::new(RrNodeKind::Source, at, at, 2)),
                rr.add_node(RrNode::new(RrNodeKind::Source, at, at, 3)),
            ];
            let ipins = [
                rr.add_pin(RrNodeKind::IPin, at, 0, Side::Top),
                rr.add_pin(RrNodeKind::IPin, at, 1, Side::Right),
            ];
            let opins = [
                rr.add_pin(RrNodeKind::OPin, at, 2, Side::Right),
                rr.add_pin(RrNodeKind::OPin, at, 3, Side::Top),
            ];
            for idx in 0 .. 2 {
                rr.add_edge(sources[idx], opins[idx], delayless);
                rr.add_edge(ipins[idx], sinks[idx], delayless);
            }
        }
    }

    let direction = |track: usize| if track % 2 == 0 { Direction::Inc } else { Direction::Dec };
    for x in 1 ..= grid.nx() {
        for y in 0 .. grid.ny() {
            for track in 0 .. tracks {
                rr.add_wire(RrNodeKind::ChanX, (x, y), (x, y), track, direction(track));
            }
        }
    }
    for x in 0 .. grid.nx() {
        for y in 1 ..= grid.ny() {
            for track in 0 .. tracks {
                rr.add_wire(RrNodeKind::ChanY, (x, y), (x, y), track, direction(track));
            }
        }
    }
    rr.build_lookup();

    let mut edges = Vec::new();
    {
        let builder = BoxBuilder::new(&rr, grid);
        for x in 0 ..= grid.nx() {
            for y in 0 ..= grid.ny() {
                let sb = builder.build_switch_box(x, y);
                let opins: Vec<RrNodeId> = sb.sides.iter()
                    .flat_map(|side| side.pins.iter().map(|pin| pin.node))
                    .collect();
                for out_side in Side::ALL {
                    for entry in &sb.side(out_side).channel {
                        if entry.dir != PortDir::Out || entry.passing {
                            continue;
                        }
                        for in_side in Side::ALL.iter().filter(|s| **s != out_side) {
                            for from in &sb.side(*in_side).channel {
                                if from.dir == PortDir::In {
                                    edges.push((from.node, entry.node, sb_mux));
                                }
                            }
                        }
                        for from in &opins {
                            edges.push((*from, entry.node, sb_mux));
                        }
                    }
                }

                for axis in [ChannelAxis::X, ChannelAxis::Y] {
                    let cb = builder.build_connection_box(x, y, axis);
                    let wire_side = match axis {
                        ChannelAxis::X => Side::Left,
                        ChannelAxis::Y => Side::Bottom,
                    };
                    for ipin in cb.mux_nodes() {
                        for wire in &cb.side(wire_side).channel {
                            edges.push((wire.node, ipin, cb_mux));
                        }
                    }
                }
            }
        }
    }
    for (from, to, switch) in edges {
        rr.add_edge(from, to, switch);
    }

    rr
}

pub fn node_at(rr: &RrGraph, kind: RrNodeKind, at: (usize, usize), ptc: usize) -> RrNodeId {
    rr.find_pin(kind, at.0, at.1, ptc)
        .unwrap_or_else(|| panic!("No {} with ptc {} at {:?}", kind, ptc, at))
}

/// Shortest path from `from` to `to` over the forward edges, both ends
/// included.
pub fn route(rr: &RrGraph, from: RrNodeId, to: RrNodeId) -> Vec<RrNodeId> {
    let mut prev: HashMap<RrNodeId, RrNodeId> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    while let Some(node) = queue.pop_front() {
        if node == to {
            let mut path = vec![to];
            let mut current = to;
            while current != from {
                current = prev[&current];
                path.push(current);
            }
            path.reverse();
            return path;
        }
        for edge in &rr.node(node).edges {
            if edge.sink != from && !prev.contains_key(&edge.sink) {
                prev.insert(edge.sink, node);
                queue.push_back(edge.sink);
            }
        }
    }
    panic!("{} can't reach {}", rr.describe(from), rr.describe(to));
}

/// Traceback of a two-terminal net from output pin `opin` of block `from` to
/// input pin `ipin` of block `to`.
pub fn net_trace(
    rr: &RrGraph,
    from: (usize, usize),
    opin: usize,
    to: (usize, usize),
    ipin: usize
)
    -> Vec<RrNodeId>
{
    let mut trace = vec![node_at(rr, RrNodeKind::Source, from, opin)];
    trace.extend(route(
        rr,
        node_at(rr, RrNodeKind::OPin, from, opin),
        node_at(rr, RrNodeKind::IPin, to, ipin)
    ));
    trace.push(node_at(rr, RrNodeKind::Sink, to, ipin));
    trace
}

pub struct LutPins {
    pub i: Vec<PbPinId>,
    pub o: Vec<PbPinId>,
    pub lut: PbNodeId,
    pub lut_in: Vec<PbPinId>,
    pub lut_out: PbPinId,
}

/// Cluster type matching the block pins of `grid_rr_graph`:
///
/// * mode `default`: `I` feeds both LUT inputs through a crossbar, `O[0]` is
///   wired to the LUT output and `O[1]` selects between `I[0]` and the LUT
///   output.
/// * mode `bypass`: `I` wired straight to `O`.
pub fn lut_cluster_type() -> (PbGraph, LutPins) {
    let mut pb = PbGraph::new("clb");
    let i = pb.add_port(PB_ROOT, PbPortKind::Input, "I", 2);
    let o = pb.add_port(PB_ROOT, PbPortKind::Output, "O", 2);

    let default = pb.add_mode(PB_ROOT, "default");
    let lut = pb.add_child(PB_ROOT, default, "lut2", "lut[0]");
    let lut_in = pb.add_port(lut, PbPortKind::Input, "in", 2);
    let lut_out = pb.add_port(lut, PbPortKind::Output, "out", 1)[0];

    pb.add_interconnect(PB_ROOT, default, "crossbar", InterconnectKind::FullMux, &i, &lut_in);
    pb.add_interconnect(PB_ROOT, default, "out0", InterconnectKind::Wire, &[lut_out], &o[0 .. 1]);
    pb.add_interconnect(
        PB_ROOT,
        default,
        "out1",
        InterconnectKind::FullMux,
        &[i[0], lut_out],
        &o[1 .. 2]
    );

    let bypass = pb.add_mode(PB_ROOT, "bypass");
    pb.add_interconnect(PB_ROOT, bypass, "direct", InterconnectKind::Wire, &i, &o);

    (pb, LutPins { i, o, lut, lut_in, lut_out })
}

/// Cluster type crossing its inputs over to its outputs: `I[1] -> O[0]`,
/// `I[0] -> O[1]`.
pub fn xbar_cluster_type() -> (PbGraph, Vec<PbPinId>, Vec<PbPinId>) {
    let mut pb = PbGraph::new("xbar");
    let i = pb.add_port(PB_ROOT, PbPortKind::Input, "I", 2);
    let o = pb.add_port(PB_ROOT, PbPortKind::Output, "O", 2);
    let mode = pb.add_mode(PB_ROOT, "cross");
    pb.add_restricted_mux(PB_ROOT, mode, "cross", &[(i[1], o[0]), (i[0], o[1])]);
    (pb, i, o)
}
