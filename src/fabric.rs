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
use crate::common::*;
use crate::error::{AnnotationError, Result};
#[allow(unused)]
use crate::log::*;
use crate::pb_graph::{ClusterInstance, PbGraph};
use crate::rr_graph::RrGraph;

/// Block grid of the device. Switch boxes sit at the top-right corner of
/// every block, so they span `0 ..= nx` by `0 ..= ny`.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn nx(&self) -> usize {
        self.width.saturating_sub(1)
    }

    pub fn ny(&self) -> usize {
        self.height.saturating_sub(1)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogicalNet {
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlobalNet {
    pub name: String,
    /// Dedicated-network nets (clocks, resets) which are not routed through
    /// the routing graph
    #[serde(default)]
    pub is_global: bool,
    /// Logical net this fabric net was created from
    pub logical: LogicalNetId,
    /// Routing traceback: consecutive nodes are driver and driven, except
    /// after a `Sink`, where the next node restarts a branch from a node
    /// already on the tree.
    #[serde(default)]
    pub trace: Vec<RrNodeId>,
}

#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct NetTable {
    pub global: Vec<GlobalNet>,
    pub logical: Vec<LogicalNet>,
}

impl NetTable {
    pub fn add_logical<S: ToString>(&mut self, name: S) -> LogicalNetId {
        self.logical.push(LogicalNet { name: name.to_string() });
        LogicalNetId(self.logical.len() - 1)
    }

    pub fn add_global<S: ToString>(
        &mut self,
        name: S,
        logical: LogicalNetId,
        trace: Vec<RrNodeId>
    )
        -> GlobalNetId
    {
        self.global.push(GlobalNet {
            name: name.to_string(),
            is_global: false,
            logical,
            trace,
        });
        GlobalNetId(self.global.len() - 1)
    }

    #[inline]
    pub fn global(&self, id: GlobalNetId) -> &GlobalNet {
        &self.global[id.0]
    }

    /// Logical identity of a fabric net
    pub fn logical_of(&self, id: GlobalNetId) -> LogicalNetId {
        self.global[id.0].logical
    }

    pub fn global_name(&self, id: GlobalNetId) -> String {
        match self.global.get(id.0) {
            Some(net) => net.name.clone(),
            None => format!("<invalid net #{}>", id),
        }
    }

    pub fn logical_name(&self, id: LogicalNetId) -> String {
        match self.logical.get(id.0) {
            Some(net) => net.name.clone(),
            None => format!("<invalid logical net #{}>", id),
        }
    }
}

/// Everything the back-annotation core reads and mutates during one run.
#[derive(Debug, Serialize, Deserialize)]
pub struct Fabric {
    pub grid: Grid,
    pub rr_graph: RrGraph,
    #[serde(default)]
    pub pb_graphs: Vec<PbGraph>,
    #[serde(default)]
    pub clusters: Vec<ClusterInstance>,
    #[serde(default)]
    pub nets: NetTable,
}

impl Fabric {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            rr_graph: RrGraph::new(),
            pb_graphs: Vec::new(),
            clusters: Vec::new(),
            nets: NetTable::default(),
        }
    }

    pub fn add_pb_graph(&mut self, pb: PbGraph) -> PbGraphId {
        self.pb_graphs.push(pb);
        PbGraphId(self.pb_graphs.len() - 1)
    }

    pub fn add_cluster(&mut self, cluster: ClusterInstance) -> ClusterId {
        self.clusters.push(cluster);
        ClusterId(self.clusters.len() - 1)
    }

    pub fn pb_graph_of(&self, cluster: ClusterId) -> &PbGraph {
        &self.pb_graphs[self.clusters[cluster.0].pb_graph.0]
    }

    /// Builds every structure derived from the upstream data: the spatial
    /// lookup, the driver index, driver switches, and the cluster bindings.
    pub fn prepare(&mut self) -> Result<()> {
        self.rr_graph.build_lookup();
        self.rr_graph.build_driver_index()?;
        self.rr_graph.identify_driver_switches()?;

        for pb in &self.pb_graphs {
            pb.validate()?;
        }

        for cluster in &mut self.clusters {
            let pb = self.pb_graphs.get(cluster.pb_graph.0)
                .ok_or_else(|| AnnotationError::InvalidClusterIndex {
                    cluster: cluster.name.clone(),
                    what: "pb-graph",
                    index: cluster.pb_graph.0,
                })?;
            cluster.prepare(pb, &self.rr_graph, self.nets.global.len())?;
        }

        dbg_log!(
            DBG_INFO,
            "Fabric {}x{} prepared: {} rr nodes, {} clusters, {} nets",
            self.grid.width,
            self.grid.height,
            self.rr_graph.node_count(),
            self.clusters.len(),
            self.nets.global.len()
        );

        Ok(())
    }

    /// Deepest pb-graph hierarchy among the cluster types in use
    pub fn max_cluster_depth(&self) -> usize {
        self.pb_graphs.iter().map(|pb| pb.max_depth()).max().unwrap_or(0)
    }
}
