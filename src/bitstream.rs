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

//! Fabric bitstream: configuration bits of every multiplexer of an annotated
//! fabric, grouped by the block owning it.

use serde::{Serialize, Serializer};
use crate::boxes::{ConfBitSpan, DeviceBoxes, RoutingBox};
use crate::common::*;
use crate::config::AnnotationOpts;
use crate::error::{AnnotationError, Result};
use crate::fabric::Fabric;
#[allow(unused)]
use crate::log::*;
use crate::mux::{ConfigBits, MuxCircuit, MuxLibrary};
use crate::pb_graph::{ClusterInstance, PbGraph};
use crate::rr_graph::RrGraph;


fn serialize_bits<S>(bits: &ConfigBits, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer
{
    serializer.collect_str(bits)
}

#[derive(Clone, Debug, Serialize)]
pub struct BlockBits {
    pub name: String,
    /// Position in the configuration chain. Only routing boxes have one.
    pub span: Option<ConfBitSpan>,
    /// Number of multiplexers encoded
    pub muxes: usize,
    #[serde(serialize_with = "serialize_bits")]
    pub bits: ConfigBits,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct FabricBitstream {
    pub boxes: Vec<BlockBits>,
    pub clusters: Vec<BlockBits>,
}

impl FabricBitstream {
    /// Routing box bits in chain order
    pub fn routing_bits(&self) -> ConfigBits {
        let mut all = ConfigBits::default();
        for block in &self.boxes {
            all.append(&block.bits);
        }
        all
    }

    pub fn block(&self, name: &str) -> Option<&BlockBits> {
        self.boxes.iter()
            .chain(self.clusters.iter())
            .find(|b| b.name == name)
    }
}

pub struct BitstreamAssembler<'a> {
    fabric: &'a Fabric,
    opts: &'a AnnotationOpts,
    lib: MuxLibrary,
}

impl<'a> BitstreamAssembler<'a> {
    pub fn new(fabric: &'a Fabric, opts: &'a AnnotationOpts) -> Self {
        Self { fabric, opts, lib: MuxLibrary::new() }
    }

    pub fn library(&self) -> &MuxLibrary {
        &self.lib
    }

    /* Encodes the multiplexers of one routing box. A multiplexer whose node
     * carries no net is set to its default path. */
    fn box_bits<B>(&mut self, rb: &B, rr: &RrGraph, circuit: MuxCircuit) -> Result<BlockBits>
    where
        B: RoutingBox
    {
        let mut bits = ConfigBits::default();
        let mut muxes = 0;
        for node in rb.mux_nodes() {
            let n = rr.node(node);
            if n.fan_in < 2 {
                continue;
            }
            let path = n.selected.map(|s| s.path_id).unwrap_or(0);
            bits.append(&self.lib.encode(n.fan_in, circuit, path)?);
            muxes += 1;
        }

        let span = rb.conf_bits();
        if bits.len() != span.len() {
            return Err(AnnotationError::ConfBitSpanMismatch {
                block: rb.name(),
                expected: span.len(),
                found: bits.len(),
            });
        }

        Ok(BlockBits { name: rb.name(), span: Some(span), muxes, bits })
    }

    fn cluster_bits(&mut self, cluster: &ClusterInstance, pb: &PbGraph) -> Result<BlockBits> {
        let circuit = self.opts.pb_mux;
        let mut bits = ConfigBits::default();
        let mut muxes = 0;
        for idx in 0 .. pb.pins.len() {
            let pin = PbPinId(idx);
            let fan_in = pb.active_input_edges(pin, &cluster.modes).count();
            if fan_in < 2 {
                continue;
            }
            let path = cluster.local.pin(pin).selected.map(|d| d.path_id).unwrap_or(0);
            bits.append(&self.lib.encode(fan_in, circuit, path)?);
            muxes += 1;
        }

        Ok(BlockBits { name: cluster.name.clone(), span: None, muxes, bits })
    }

    /// Lays out the configuration chain of `boxes` and encodes every
    /// multiplexer of the fabric. The fabric must be annotated.
    pub fn assemble(&mut self, boxes: &mut DeviceBoxes) -> Result<FabricBitstream> {
        let fabric = self.fabric;
        let rr = &fabric.rr_graph;
        let total = boxes.allocate_conf_bits(rr, &mut self.lib, self.opts.sb_mux, self.opts.cb_mux)?;

        let mut bitstream = FabricBitstream::default();
        for sb in &boxes.sbs {
            let block = self.box_bits(sb, rr, self.opts.sb_mux)?;
            bitstream.boxes.push(block);
        }
        for cb in boxes.cbx.iter().chain(boxes.cby.iter()) {
            let block = self.box_bits(cb, rr, self.opts.cb_mux)?;
            bitstream.boxes.push(block);
        }

        for cluster in &fabric.clusters {
            let pb = &fabric.pb_graphs[cluster.pb_graph.0];
            let block = self.cluster_bits(cluster, pb)?;
            bitstream.clusters.push(block);
        }

        dbg_log!(
            DBG_INFO,
            "Bitstream: {} routing bits in {} boxes, {} clusters, {} multiplexer models",
            total,
            bitstream.boxes.len(),
            bitstream.clusters.len(),
            self.lib.len()
        );

        Ok(bitstream)
    }
}
