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

use std::path::Path;
use serde::{Serialize, Deserialize};
use crate::loader::OpenWriteError;
use crate::mux::MuxCircuit;

/// Options of a back-annotation run, usually read from a YAML file:
///
/// ```yaml
/// sb_mux: { topology: tree, technology: pass_transistor_cmos }
/// cb_mux: { topology: one_level, technology: resistive_two_terminal }
/// max_parasitic_iterations: 16
/// threads: 4
/// ```
///
/// Missing keys take their default values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationOpts {
    /// Circuit of switch box multiplexers
    pub sb_mux: MuxCircuit,
    /// Circuit of connection box multiplexers
    pub cb_mux: MuxCircuit,
    /// Circuit of multiplexers inside clusters
    pub pb_mux: MuxCircuit,
    /// Cap on parasitic propagation rounds. When unset, derived from the
    /// number of clusters and the depth of their hierarchy.
    pub max_parasitic_iterations: Option<usize>,
    /// Leave nets routed over dedicated networks (clocks, resets) out of the
    /// global pass
    pub skip_global_nets: bool,
    /// Threads used to build switch and connection boxes
    pub threads: usize,
}

impl Default for AnnotationOpts {
    fn default() -> Self {
        Self {
            sb_mux: MuxCircuit::default(),
            cb_mux: MuxCircuit::default(),
            pb_mux: MuxCircuit::default(),
            max_parasitic_iterations: None,
            skip_global_nets: true,
            threads: 1,
        }
    }
}

impl AnnotationOpts {
    pub fn from_yaml(yaml: &str) -> Result<Self, OpenWriteError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| OpenWriteError::SerdeError(format!("invalid options: {}", e)))
    }

    pub fn load<P>(path: P) -> Result<Self, OpenWriteError> where P: AsRef<Path> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| OpenWriteError::CantOpenFile(format!("{:?}", e)))?;
        Self::from_yaml(&yaml)
    }
}
