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

//! Per-tile switch box and connection box descriptors.
//!
//! Switch box (x, y) sits at the top-right corner of block (x, y):
//!
//! ```text
//!              block (x, y+1) | CHANY (x, y+1) | block (x+1, y+1)
//!             ----------------+----------------+-----------------
//!              CHANX (x, y)   |    SB (x, y)   | CHANX (x+1, y)
//!             ----------------+----------------+-----------------
//!              block (x, y)   |  CHANY (x, y)  | block (x+1, y)
//! ```
//!
//! Connection box X (x, y) covers `CHANX (x, y)`, between blocks (x, y) and
//! (x, y+1). Connection box Y (x, y) covers `CHANY (x, y)`, between blocks
//! (x, y) and (x+1, y).

use serde::Serialize;
use crate::common::*;
use crate::error::Result;
use crate::fabric::Grid;
#[allow(unused)]
use crate::log::*;
use crate::mux::{MuxCircuit, MuxLibrary};
use crate::rr_graph::{Direction, RrGraph, RrNodeKind};


#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum PortDir {
    /// Signal enters the box
    In,
    /// Signal leaves the box
    Out,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, serde::Deserialize)]
pub enum ChannelAxis {
    X,
    Y,
}

impl ChannelAxis {
    pub fn wire_kind(self) -> RrNodeKind {
        match self {
            ChannelAxis::X => RrNodeKind::ChanX,
            ChannelAxis::Y => RrNodeKind::ChanY,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub struct ChannelEntry {
    pub node: RrNodeId,
    pub dir: PortDir,
    /// The wire is not driven inside this box. Always set in connection boxes.
    pub passing: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub struct BlockPin {
    pub node: RrNodeId,
    pub block: (usize, usize),
    /// Side of `block` the pin sits on
    pub block_side: Side,
}

#[derive(Clone, Default, Debug, Serialize)]
pub struct BoxSide {
    /// Channel segment read by this side, `None` at the fabric boundary
    pub channel_at: Option<(usize, usize)>,
    pub channel: Vec<ChannelEntry>,
    pub pins: Vec<BlockPin>,
}

impl BoxSide {
    pub fn channel_width(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty() && self.pins.is_empty()
    }
}

/// Configuration bits owned by a box: `lsb .. msb` in the fabric-wide
/// configuration chain, plus the number of reserved bits shared by its
/// multiplexers.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug, Serialize)]
pub struct ConfBitSpan {
    pub reserved: usize,
    pub lsb: usize,
    pub msb: usize,
}

impl ConfBitSpan {
    pub fn len(&self) -> usize {
        self.msb - self.lsb
    }

    pub fn is_empty(&self) -> bool {
        self.msb == self.lsb
    }
}

/// Common view of switch and connection boxes used by bit allocation and
/// bitstream assembly.
pub trait RoutingBox {
    fn name(&self) -> String;

    /// Nodes realized by a multiplexer inside the box, in side order
    fn mux_nodes(&self) -> Vec<RrNodeId>;

    fn conf_bits(&self) -> ConfBitSpan;

    fn conf_bits_mut(&mut self) -> &mut ConfBitSpan;

    /// Records the configuration bits of every multiplexer with fan-in of at
    /// least 2, starting at `start`. Returns the first bit after the box.
    fn allocate_conf_bits(
        &mut self,
        rr: &RrGraph,
        start: usize,
        lib: &mut MuxLibrary,
        circuit: MuxCircuit
    )
        -> Result<usize>
    {
        let mut bits = 0;
        let mut reserved = 0;
        for node in self.mux_nodes() {
            let fan_in = rr.node(node).fan_in;
            if fan_in < 2 {
                continue;
            }
            let model = lib.get(fan_in, circuit)?;
            bits += model.num_conf_bits();
            reserved = reserved.max(model.num_reserved_conf_bits());
        }

        *self.conf_bits_mut() = ConfBitSpan { reserved, lsb: start, msb: start + bits };
        Ok(start + bits)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SwitchBoxInfo {
    pub x: usize,
    pub y: usize,
    /// Indexed by `Side::index`
    pub sides: [BoxSide; 4],
    pub conf_bits: ConfBitSpan,
}

impl SwitchBoxInfo {
    pub fn side(&self, side: Side) -> &BoxSide {
        &self.sides[side.index()]
    }

    /// An outgoing wire which does not start at this switch box only passes
    /// through it and owns no multiplexer here.
    pub fn is_passing_wire(&self, side: Side, index: usize) -> bool {
        self.sides[side.index()].channel
            .get(index)
            .map(|entry| entry.dir == PortDir::Out && entry.passing)
            .unwrap_or(false)
    }

    pub fn channel_width(&self, side: Side) -> usize {
        self.sides[side.index()].channel_width()
    }

    pub fn is_empty(&self) -> bool {
        self.sides.iter().all(BoxSide::is_empty)
    }
}

impl RoutingBox for SwitchBoxInfo {
    fn name(&self) -> String {
        format!("sb_{}_{}", self.x, self.y)
    }

    fn mux_nodes(&self) -> Vec<RrNodeId> {
        Side::ALL.iter()
            .flat_map(|side| {
                self.sides[side.index()].channel
                    .iter()
                    .filter(|entry| entry.dir == PortDir::Out && !entry.passing)
                    .map(|entry| entry.node)
            })
            .collect()
    }

    fn conf_bits(&self) -> ConfBitSpan {
        self.conf_bits
    }

    fn conf_bits_mut(&mut self) -> &mut ConfBitSpan {
        &mut self.conf_bits
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ConnectionBoxInfo {
    pub x: usize,
    pub y: usize,
    pub axis: ChannelAxis,
    pub sides: [BoxSide; 4],
    pub conf_bits: ConfBitSpan,
}

impl ConnectionBoxInfo {
    pub fn side(&self, side: Side) -> &BoxSide {
        &self.sides[side.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.sides.iter().all(BoxSide::is_empty)
    }
}

impl RoutingBox for ConnectionBoxInfo {
    fn name(&self) -> String {
        let prefix = match self.axis {
            ChannelAxis::X => "cbx",
            ChannelAxis::Y => "cby",
        };
        format!("{}_{}_{}", prefix, self.x, self.y)
    }

    fn mux_nodes(&self) -> Vec<RrNodeId> {
        Side::ALL.iter()
            .flat_map(|side| self.sides[side.index()].pins.iter().map(|pin| pin.node))
            .collect()
    }

    fn conf_bits(&self) -> ConfBitSpan {
        self.conf_bits
    }

    fn conf_bits_mut(&mut self) -> &mut ConfBitSpan {
        &mut self.conf_bits
    }
}

/// In/Out role of a wire on a box side. Increasing wires leave through the
/// top and right sides, decreasing wires through the bottom and left sides.
pub fn channel_dir(side: Side, direction: Option<Direction>) -> PortDir {
    let increasing = direction == Some(Direction::Inc);
    match side {
        Side::Top | Side::Right => if increasing { PortDir::Out } else { PortDir::In },
        Side::Bottom | Side::Left => if increasing { PortDir::In } else { PortDir::Out },
    }
}

struct SbSideGeometry {
    wire_kind: RrNodeKind,
    /* Offsets from the switch box coordinates */
    channel: (usize, usize),
    pins: [((usize, usize), Side); 2],
}

const SB_GEOMETRY: [SbSideGeometry; 4] = [
    /* Top */
    SbSideGeometry {
        wire_kind: RrNodeKind::ChanY,
        channel: (0, 1),
        pins: [((0, 1), Side::Right), ((1, 1), Side::Left)],
    },
    /* Right */
    SbSideGeometry {
        wire_kind: RrNodeKind::ChanX,
        channel: (1, 0),
        pins: [((1, 1), Side::Bottom), ((1, 0), Side::Top)],
    },
    /* Bottom */
    SbSideGeometry {
        wire_kind: RrNodeKind::ChanY,
        channel: (0, 0),
        pins: [((1, 0), Side::Left), ((0, 0), Side::Right)],
    },
    /* Left */
    SbSideGeometry {
        wire_kind: RrNodeKind::ChanX,
        channel: (0, 0),
        pins: [((0, 0), Side::Top), ((0, 1), Side::Bottom)],
    },
];

/// Builds box descriptors from the routing graph. Requires the graph's
/// spatial lookup.
pub struct BoxBuilder<'a> {
    rr: &'a RrGraph,
    grid: Grid,
}

impl<'a> BoxBuilder<'a> {
    pub fn new(rr: &'a RrGraph, grid: Grid) -> Self {
        Self { rr, grid }
    }

    fn block_pins(&self, kind: RrNodeKind, block: (usize, usize), side: Side) -> Vec<BlockPin> {
        self.rr.pins_at(kind, block.0, block.1, side)
            .map(|node| BlockPin { node, block, block_side: side })
            .collect()
    }

    fn sb_side_is_boundary(&self, x: usize, y: usize, side: Side) -> bool {
        match side {
            Side::Top => y == self.grid.ny(),
            Side::Right => x == self.grid.nx(),
            Side::Bottom => y == 0,
            Side::Left => x == 0,
        }
    }

    pub fn build_switch_box(&self, x: usize, y: usize) -> SwitchBoxInfo {
        let mut sides: [BoxSide; 4] = Default::default();

        for side in Side::ALL {
            if self.sb_side_is_boundary(x, y, side) {
                continue;
            }
            let geometry = &SB_GEOMETRY[side.index()];
            let at = (x + geometry.channel.0, y + geometry.channel.1);

            let channel = self.rr.nodes_at(geometry.wire_kind, at.0, at.1)
                .iter()
                .map(|id| {
                    let node = self.rr.node(*id);
                    let dir = channel_dir(side, node.direction);
                    ChannelEntry {
                        node: *id,
                        dir,
                        passing: dir == PortDir::Out && node.start() != at,
                    }
                })
                .collect();

            let mut pins = Vec::new();
            for (offset, block_side) in &geometry.pins {
                let block = (x + offset.0, y + offset.1);
                pins.extend(self.block_pins(RrNodeKind::OPin, block, *block_side));
            }

            sides[side.index()] = BoxSide { channel_at: Some(at), channel, pins };
        }

        SwitchBoxInfo { x, y, sides, conf_bits: ConfBitSpan::default() }
    }

    pub fn build_connection_box(&self, x: usize, y: usize, axis: ChannelAxis)
        -> ConnectionBoxInfo
    {
        let mut sides: [BoxSide; 4] = Default::default();
        let wires = self.rr.nodes_at(axis.wire_kind(), x, y);

        if !wires.is_empty() {
            let (channel_sides, pin_sides) = match axis {
                ChannelAxis::X => (
                    [Side::Left, Side::Right],
                    [(Side::Top, (x, y + 1), Side::Bottom), (Side::Bottom, (x, y), Side::Top)],
                ),
                ChannelAxis::Y => (
                    [Side::Bottom, Side::Top],
                    [(Side::Right, (x + 1, y), Side::Left), (Side::Left, (x, y), Side::Right)],
                ),
            };

            for side in channel_sides {
                sides[side.index()] = BoxSide {
                    channel_at: Some((x, y)),
                    channel: wires.iter()
                        .map(|id| ChannelEntry {
                            node: *id,
                            dir: channel_dir(side, self.rr.node(*id).direction),
                            passing: true,
                        })
                        .collect(),
                    pins: Vec::new(),
                };
            }
            for (side, block, block_side) in pin_sides {
                sides[side.index()].pins = self.block_pins(RrNodeKind::IPin, block, block_side);
            }
        }

        ConnectionBoxInfo { x, y, axis, sides, conf_bits: ConfBitSpan::default() }
    }

    fn build_columns(&self, columns: std::ops::Range<usize>) -> DeviceBoxes {
        let rows = self.grid.ny() + 1;
        let mut shard = DeviceBoxes {
            columns: columns.len(),
            rows,
            ..Default::default()
        };
        for x in columns {
            for y in 0 .. rows {
                shard.sbs.push(self.build_switch_box(x, y));
                shard.cbx.push(self.build_connection_box(x, y, ChannelAxis::X));
                shard.cby.push(self.build_connection_box(x, y, ChannelAxis::Y));
            }
        }
        shard
    }
}

/// Every switch box and connection box of the device, stored column by
/// column.
#[derive(Clone, Default, Debug, Serialize)]
pub struct DeviceBoxes {
    pub columns: usize,
    pub rows: usize,
    pub sbs: Vec<SwitchBoxInfo>,
    pub cbx: Vec<ConnectionBoxInfo>,
    pub cby: Vec<ConnectionBoxInfo>,
}

impl DeviceBoxes {
    /// Builds all boxes of the grid. With more than one thread, columns are
    /// split between scoped threads sharing the read-only routing graph.
    pub fn build(rr: &RrGraph, grid: Grid, threads: usize) -> Self {
        let builder = BoxBuilder::new(rr, grid);
        let columns = grid.nx() + 1;

        let shards: Vec<DeviceBoxes> = if threads <= 1 {
            vec![builder.build_columns(0 .. columns)]
        } else {
            let builder = &builder;
            std::thread::scope(|scope| {
                let handles: Vec<_> = split_range_nicely(0 .. columns, threads)
                    .map(|range| scope.spawn(move || builder.build_columns(range)))
                    .collect();
                handles.into_iter()
                    .map(|handle| {
                        handle.join().unwrap_or_else(|e| std::panic::resume_unwind(e))
                    })
                    .collect()
            })
        };

        let mut all = DeviceBoxes { columns: 0, rows: grid.ny() + 1, ..Default::default() };
        for shard in shards {
            all.columns += shard.columns;
            all.sbs.extend(shard.sbs);
            all.cbx.extend(shard.cbx);
            all.cby.extend(shard.cby);
        }

        dbg_log!(
            DBG_INFO,
            "Built {} switch boxes and {} connection boxes",
            all.sbs.len(),
            all.cbx.len() + all.cby.len()
        );

        all
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.columns && y < self.rows).then(|| x * self.rows + y)
    }

    pub fn sb(&self, x: usize, y: usize) -> Option<&SwitchBoxInfo> {
        self.index(x, y).map(|idx| &self.sbs[idx])
    }

    pub fn cb(&self, x: usize, y: usize, axis: ChannelAxis) -> Option<&ConnectionBoxInfo> {
        let idx = self.index(x, y)?;
        Some(match axis {
            ChannelAxis::X => &self.cbx[idx],
            ChannelAxis::Y => &self.cby[idx],
        })
    }

    /// Lays out the configuration bits of all boxes: switch boxes first, then
    /// X and Y connection boxes, each in grid order. Returns the total.
    pub fn allocate_conf_bits(
        &mut self,
        rr: &RrGraph,
        lib: &mut MuxLibrary,
        sb_circuit: MuxCircuit,
        cb_circuit: MuxCircuit
    )
        -> Result<usize>
    {
        let mut next = 0;
        for sb in &mut self.sbs {
            next = sb.allocate_conf_bits(rr, next, lib, sb_circuit)?;
        }
        for cb in self.cbx.iter_mut().chain(self.cby.iter_mut()) {
            next = cb.allocate_conf_bits(rr, next, lib, cb_circuit)?;
        }
        Ok(next)
    }
}
