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

//! Back-annotation of a routed fabric: which driver every routing node and
//! every cluster pin selects, and which net it carries.

use serde::Serialize;
use crate::config::AnnotationOpts;
use crate::error::Result;
use crate::fabric::Fabric;
#[allow(unused)]
use crate::log::*;

pub mod global;
pub mod local;
pub mod parasitic;

#[cfg(test)]
mod tests;

pub use global::GlobalPassStats;

#[derive(Clone, Default, Debug, Serialize)]
pub struct AnnotationReport {
    pub global: GlobalPassStats,
    pub clusters: usize,
    pub open_pins: usize,
    pub parasitic_iterations: usize,
    pub parasitic_nodes: usize,
}

pub struct BackAnnotator<'a> {
    opts: &'a AnnotationOpts,
}

impl<'a> BackAnnotator<'a> {
    pub fn new(opts: &'a AnnotationOpts) -> Self {
        Self { opts }
    }

    /// Annotates a prepared fabric. Global pass, both halves of the local
    /// pass for every cluster, then parasitic propagation until it settles.
    /// Annotations are only consistent once this returns `Ok`.
    pub fn run(&self, fabric: &mut Fabric) -> Result<AnnotationReport> {
        let global = fabric.rr_graph.annotate_routing(&fabric.nets, self.opts.skip_global_nets)?;
        fabric.annotate_clusters()?;

        let cap = self.opts.max_parasitic_iterations
            .unwrap_or_else(|| fabric.default_parasitic_cap());
        let parasitic_iterations = fabric.propagate_parasitic_nets(cap)?;

        let report = AnnotationReport {
            global,
            clusters: fabric.clusters.len(),
            open_pins: fabric.clusters.iter()
                .map(|c| c.local.pins.iter().filter(|p| p.open).count())
                .sum(),
            parasitic_iterations,
            parasitic_nodes: fabric.parasitic_nodes().len(),
        };

        dbg_log!(
            DBG_INFO,
            "Back-annotation done: {} clusters, {} parasitic nodes after {} iterations",
            report.clusters,
            report.parasitic_nodes,
            report.parasitic_iterations
        );

        Ok(report)
    }
}
