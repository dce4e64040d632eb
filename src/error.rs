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

use crate::common::*;
use crate::loader::OpenWriteError;

pub type Result<T> = std::result::Result<T, AnnotationError>;

/// Structural and consistency errors. All of them indicate malformed upstream
/// data and terminate the current phase; nothing here is retried.
///
/// Node locations are pre-rendered with `RrNode::describe` so that the error
/// stays meaningful after the graph is dropped.
#[derive(thiserror::Error, Debug)]
pub enum AnnotationError {
    #[error("{node} declares fan-in {declared}, but {found} edges drive it")]
    FanInMismatch {
        node: String,
        declared: usize,
        found: usize,
    },
    #[error(
        "{node} is driven through switch types {first} and {second}; \
         only uni-directional routing architectures are supported"
    )]
    InconsistentDriverSwitch {
        node: String,
        first: RrSwitchId,
        second: RrSwitchId,
    },
    #[error("{node} has an edge to non-existent node {sink}")]
    DanglingEdge { node: String, sink: RrNodeId },
    #[error("bi-directional wire {node} is not supported")]
    BidirectionalWire { node: String },
    #[error("net {net}: {driver} is not a driver of {node}")]
    DriverNotFound {
        net: String,
        driver: String,
        node: String,
    },
    #[error("net {net}: branch restarts at {node}, which is not on the routing tree")]
    BranchNotOnTree { net: String, node: String },
    #[error("{node} is claimed by net {existing} and by net {new}")]
    NetConflict {
        node: String,
        existing: String,
        new: String,
    },
    #[error("net {net}: {node} is entered from two different drivers")]
    MultipleDrivers { net: String, node: String },
    #[error("net {net}: empty routing trace")]
    EmptyTrace { net: String },
    #[error("net {net}: routing trace refers to non-existent node {node}")]
    UnknownTraceNode { net: String, node: RrNodeId },
    #[error("cluster {cluster}: pin {pin} of {pb_type} has no pin-map entry in the routing graph")]
    UnboundClusterPin {
        cluster: String,
        pb_type: String,
        pin: String,
    },
    #[error(
        "cluster {cluster}: pin {pin} carries net {net} but none of its {edges} \
         active input edges resolves to it"
    )]
    MissingLocalDriver {
        cluster: String,
        pin: String,
        net: String,
        edges: usize,
    },
    #[error("cluster {cluster}: default drivers form a cycle through pin {pin}")]
    LocalDriverCycle { cluster: String, pin: String },
    #[error("pb-graph {pb_type}: pin {pin} is reached by interconnects {first} and {second} of one mode")]
    MixedInterconnects {
        pb_type: String,
        pin: String,
        first: String,
        second: String,
    },
    #[error("cluster {cluster}: {what} {index} does not exist")]
    InvalidClusterIndex {
        cluster: String,
        what: &'static str,
        index: usize,
    },
    #[error("pb-graph {pb_type}: {what} {index} refers to non-existent {target} {target_index}")]
    DanglingPbReference {
        pb_type: String,
        what: &'static str,
        index: usize,
        target: &'static str,
        target_index: usize,
    },
    #[error("cluster {cluster}: mode {mode} does not exist for {node}")]
    InvalidMode {
        cluster: String,
        node: String,
        mode: usize,
    },
    #[error(
        "net propagation did not settle after {iterations} iterations \
         (combinational cycle?); still changing: {pending:?}"
    )]
    PropagationDiverged {
        iterations: usize,
        pending: Vec<String>,
    },
    #[error("path id {path} is out of range for a {size}-input multiplexer")]
    PathOutOfRange { path: usize, size: usize },
    #[error("{what} cannot be built with {size} inputs")]
    InvalidMuxSize { what: String, size: usize },
    #[error("{block}: encoded {found} configuration bits, but the recorded span holds {expected}")]
    ConfBitSpanMismatch {
        block: String,
        expected: usize,
        found: usize,
    },
    #[error("couldn't load fabric: {0}")]
    Open(#[from] OpenWriteError),
    #[error("couldn't export results: {0}")]
    Export(#[from] std::io::Error),
}
