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

/* Arena indices. Every graph in this crate stores its elements in a `Vec` and
 * refers to them by position, so these are plain `usize` wrappers. */
macro_rules! arena_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(
                Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug,
                Serialize, Deserialize
            )]
            #[serde(transparent)]
            pub struct $name(pub usize);

            impl $name {
                #[inline]
                pub fn idx(self) -> usize {
                    self.0
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

arena_id!(
    /// Node of the routing resource graph
    RrNodeId,
    /// Switch type (index into `RrGraph::switches`)
    RrSwitchId,
    /// Post-clustering (fabric) net
    GlobalNetId,
    /// Pre-clustering (logical netlist) net
    LogicalNetId,
    /// Hierarchy node of a pb-graph
    PbNodeId,
    /// Pin of a pb-graph. Equals the pin's position in the cluster.
    PbPinId,
    /// Edge of a pb-graph
    PbEdgeId,
    InterconnectId,
    /// Cluster type (index into `Fabric::pb_graphs`)
    PbGraphId,
    /// Placed cluster instance
    ClusterId,
);

/// Side of a tile, a block or a routing box.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];

    pub fn opposite(self) -> Side {
        match self {
            Side::Top => Side::Bottom,
            Side::Right => Side::Left,
            Side::Bottom => Side::Top,
            Side::Left => Side::Right,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Side::Top => "top",
            Side::Right => "right",
            Side::Bottom => "bottom",
            Side::Left => "left",
        };
        f.write_str(s)
    }
}

/* Splits a range into `slices` possibly even ranges  */
pub fn split_range_nicely(range: std::ops::Range<usize>, slices: usize)
    -> impl Iterator<Item = std::ops::Range<usize>>
{
    let len = range.end - range.start;
    let slices = slices.max(1);
    let split_sz = len / slices;
    let total = split_sz * slices;
    let left = len - total;

    (0 .. slices)
        .scan((range.start, left), move |(current_idx, left), _| {
            let my_len = if *left > 0 {
                *left -= 1;
                split_sz + 1
            } else {
                split_sz
            };
            let range = *current_idx .. (*current_idx + my_len);
            *current_idx += my_len;
            return Some(range);
        })
        .filter(|range| range.start != range.end)
}
