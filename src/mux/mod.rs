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

//! Multiplexer structures and the encoding of a selected input into
//! configuration bits.
//!
//! A multiplexer of `size` inputs is modelled as `num_levels` stages of
//! `basis_size`-input sub-multiplexers. Stage 0 is the one closest to the
//! inputs and is controlled by the least significant base-`basis_size` digit
//! of the path id:
//!
//! ```text
//!   in0 ─┐
//!        ├[s0]─┐
//!   in1 ─┘     ├[s1]─┐
//!   in2 ─┐     │     │
//!        ├[s0]─┘     ├[s2]── out
//!   in3 ─┘           │
//!   in4 ─────────────┘
//! ```
//!
//! When `size` is not a power of `basis_size`, the last input does not need
//! the lower stages and is attached directly to the highest stage whose branch
//! holds nothing else (`in4` above). The position of every input is fixed at
//! construction time and does not depend on the selected path.

use std::collections::HashMap;
use bitvec::prelude::*;
use serde::{Serialize, Deserialize};
use crate::error::{AnnotationError, Result};

#[cfg(test)]
mod tests;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuxTopology {
    OneLevel,
    Tree,
    /// Fixed number of stages of equally sized sub-multiplexers
    MultiLevel(usize),
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuxTechnology {
    /// Transmission gates driven by SRAM select lines
    PassTransistorCmos,
    /// Two-terminal resistive switches programmed by row/column pulses
    ResistiveTwoTerminal,
}

/// Multiplexer circuit family used for a class of routing multiplexers
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct MuxCircuit {
    pub topology: MuxTopology,
    pub technology: MuxTechnology,
}

impl Default for MuxCircuit {
    fn default() -> Self {
        Self {
            topology: MuxTopology::Tree,
            technology: MuxTechnology::PassTransistorCmos,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub struct MuxInputPosition {
    pub level: usize,
    pub offset: usize,
}

#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigBits {
    pub bits: BitVec,
}

impl ConfigBits {
    pub fn zeros(len: usize) -> Self {
        Self { bits: BitVec::repeat(false, len) }
    }

    pub fn from_bools(bools: &[bool]) -> Self {
        Self { bits: bools.iter().copied().collect() }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn get(&self, idx: usize) -> bool {
        self.bits[idx]
    }

    pub fn set(&mut self, idx: usize, value: bool) {
        self.bits.set(idx, value);
    }

    pub fn append(&mut self, other: &ConfigBits) {
        self.bits.extend_from_bitslice(&other.bits);
    }

    pub fn count_ones(&self) -> usize {
        self.bits.count_ones()
    }

    fn slice(&self, start: usize, len: usize) -> &BitSlice {
        &self.bits[start .. start + len]
    }
}

impl std::fmt::Display for ConfigBits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for bit in self.bits.iter() {
            f.write_str(if *bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConfigBits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConfigBits({})", self)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MuxModel {
    pub size: usize,
    pub topology: MuxTopology,
    pub technology: MuxTechnology,
    pub num_levels: usize,
    pub basis_size: usize,
    /// Stage and branch every input is attached to
    pub inputs: Vec<MuxInputPosition>,
}

fn ceil_log2(n: usize) -> usize {
    let mut levels = 0;
    while (1usize << levels) < n {
        levels += 1;
    }
    levels
}

/* Smallest basis `b >= 2` with `b^levels >= size` */
fn basis_for_levels(size: usize, levels: u32) -> usize {
    let mut basis = 2usize;
    loop {
        match basis.checked_pow(levels) {
            Some(reach) if reach < size => basis += 1,
            _ => return basis,
        }
    }
}

impl MuxModel {
    pub fn new(size: usize, circuit: MuxCircuit) -> Result<Self> {
        if size < 2 {
            return Err(AnnotationError::InvalidMuxSize {
                what: format!("{:?} multiplexer", circuit.topology),
                size,
            });
        }

        let (num_levels, basis_size) = match circuit.topology {
            MuxTopology::OneLevel => (1, size),
            MuxTopology::Tree => (ceil_log2(size), 2),
            MuxTopology::MultiLevel(0) => return Err(AnnotationError::InvalidMuxSize {
                what: "0-level multiplexer".into(),
                size,
            }),
            MuxTopology::MultiLevel(1) => (1, size),
            MuxTopology::MultiLevel(levels) =>
                (levels, basis_for_levels(size, levels as u32)),
        };

        let mut me = Self {
            size,
            topology: circuit.topology,
            technology: circuit.technology,
            num_levels,
            basis_size,
            inputs: Vec::with_capacity(size),
        };
        me.inputs = (0 .. size).map(|path| me.attach_position(path)).collect();

        Ok(me)
    }

    pub fn circuit(&self) -> MuxCircuit {
        MuxCircuit { topology: self.topology, technology: self.technology }
    }

    /* basis^stage, saturating: a stage beyond the reach of usize covers
     * everything anyway */
    fn stage_span(&self, stage: usize) -> usize {
        self.basis_size.checked_pow(stage as u32).unwrap_or(usize::MAX)
    }

    /// Highest stage whose branch holding `path` holds no other input.
    fn attach_position(&self, path: usize) -> MuxInputPosition {
        let mut position = MuxInputPosition { level: 0, offset: path };
        for stage in 1 .. self.num_levels {
            let span = self.stage_span(stage);
            if path % span != 0 {
                break;
            }
            let branch_end = (path / span).saturating_add(1).saturating_mul(span);
            if branch_end.min(self.size) != path + 1 {
                break;
            }
            position = MuxInputPosition { level: stage, offset: path / span };
        }
        position
    }

    /// Local select of every stage for `path`, stage 0 first
    fn digits(&self, path: usize) -> Vec<usize> {
        let mut rest = path;
        (0 .. self.num_levels)
            .map(|_| {
                let digit = rest % self.basis_size;
                rest /= self.basis_size;
                digit
            })
            .collect()
    }

    /* CMOS stages with two inputs need one select line, others are one-hot */
    fn cmos_bits_per_level(&self) -> usize {
        if self.basis_size == 2 { 1 } else { self.basis_size }
    }

    pub fn num_conf_bits(&self) -> usize {
        use MuxTechnology::*;
        use MuxTopology::*;

        match (self.technology, self.topology) {
            (PassTransistorCmos, OneLevel) => self.size,
            (PassTransistorCmos, Tree) => self.num_levels,
            (PassTransistorCmos, MultiLevel(_)) => self.num_levels * self.cmos_bits_per_level(),
            (ResistiveTwoTerminal, OneLevel) => 2 * self.size,
            (ResistiveTwoTerminal, _) => self.num_levels * 2 * (self.basis_size + 1),
        }
    }

    /// Bits that have to be held active while the multiplexer is programmed.
    /// They are shared by every multiplexer of a block.
    pub fn num_reserved_conf_bits(&self) -> usize {
        use MuxTechnology::*;
        use MuxTopology::*;

        match (self.technology, self.topology) {
            (PassTransistorCmos, _) => 0,
            (ResistiveTwoTerminal, OneLevel) => self.size,
            (ResistiveTwoTerminal, _) => self.basis_size + 1,
        }
    }

    /* Column pulse paired with the row of input `path` in a one-level
     * resistive multiplexer */
    fn rram_column(&self, path: usize) -> usize {
        if path == 0 {
            0
        } else if path == self.size - 1 {
            self.size - 1
        } else {
            path + 1
        }
    }

    /// Configuration bits selecting input `path`.
    pub fn encode(&self, path: usize) -> Result<ConfigBits> {
        use MuxTechnology::*;
        use MuxTopology::*;

        if path >= self.size {
            return Err(AnnotationError::PathOutOfRange { path, size: self.size });
        }

        let mut bits = ConfigBits::zeros(self.num_conf_bits());
        match (self.technology, self.topology) {
            (PassTransistorCmos, OneLevel) => bits.set(path, true),
            (PassTransistorCmos, Tree) => {
                for (level, digit) in self.digits(path).into_iter().enumerate() {
                    bits.set(level, digit == 1);
                }
            },
            (PassTransistorCmos, MultiLevel(_)) => {
                let per_level = self.cmos_bits_per_level();
                for (level, digit) in self.digits(path).into_iter().enumerate() {
                    if per_level == 1 {
                        bits.set(level, digit == 1);
                    } else {
                        bits.set(level * per_level + digit, true);
                    }
                }
            },
            (ResistiveTwoTerminal, OneLevel) => {
                bits.set(path, true);
                bits.set(self.size + self.rram_column(path), true);
            },
            (ResistiveTwoTerminal, _) => {
                let rows = self.basis_size + 1;
                for (level, digit) in self.digits(path).into_iter().enumerate() {
                    let base = level * 2 * rows;
                    bits.set(base + digit, true);
                    bits.set(base + self.basis_size, true);
                    bits.set(base + rows + digit, true);
                }
            },
        }

        Ok(bits)
    }

    /* Index of the only set bit, if exactly one is set */
    fn one_hot(bits: &BitSlice) -> Option<usize> {
        if bits.count_ones() != 1 {
            return None;
        }
        bits.first_one()
    }

    fn decode_digits(&self, bits: &ConfigBits) -> Option<Vec<usize>> {
        use MuxTechnology::*;
        use MuxTopology::*;

        match (self.technology, self.topology) {
            (PassTransistorCmos, OneLevel) =>
                Self::one_hot(&bits.bits).map(|idx| vec![idx]),
            (PassTransistorCmos, Tree) =>
                Some((0 .. self.num_levels).map(|level| bits.get(level) as usize).collect()),
            (PassTransistorCmos, MultiLevel(_)) => {
                let per_level = self.cmos_bits_per_level();
                (0 .. self.num_levels)
                    .map(|level| {
                        if per_level == 1 {
                            Some(bits.get(level) as usize)
                        } else {
                            Self::one_hot(bits.slice(level * per_level, per_level))
                        }
                    })
                    .collect()
            },
            (ResistiveTwoTerminal, OneLevel) => {
                let row = Self::one_hot(bits.slice(0, self.size))?;
                let col = Self::one_hot(bits.slice(self.size, self.size))?;
                (col == self.rram_column(row)).then(|| vec![row])
            },
            (ResistiveTwoTerminal, _) => {
                let rows = self.basis_size + 1;
                (0 .. self.num_levels)
                    .map(|level| {
                        let base = level * 2 * rows;
                        if !bits.get(base + self.basis_size) {
                            return None;
                        }
                        let row = Self::one_hot(bits.slice(base, self.basis_size))?;
                        let col = Self::one_hot(bits.slice(base + rows, rows))?;
                        (col == row).then(|| row)
                    })
                    .collect()
            },
        }
    }

    /// Input selected by `bits`, following the multiplexer from its output
    /// towards the inputs. `None` when the bits do not form a legal
    /// configuration or lead to an unconnected branch.
    pub fn decode(&self, bits: &ConfigBits) -> Option<usize> {
        if bits.len() != self.num_conf_bits() {
            return None;
        }
        let digits = self.decode_digits(bits)?;

        let mut prefix = 0usize;
        for stage in (0 .. self.num_levels).rev() {
            let branch = prefix.checked_mul(self.basis_size)?.checked_add(digits[stage])?;
            let first = branch.checked_mul(self.stage_span(stage))?;
            if first >= self.size {
                return None;
            }
            let pos = self.inputs[first];
            if pos.level == stage && pos.offset == branch {
                return Some(first);
            }
            prefix = branch;
        }
        None
    }
}

/// Multiplexer models shared across the fabric, one per
/// (size, technology, topology).
#[derive(Default, Debug)]
pub struct MuxLibrary {
    models: HashMap<(usize, MuxCircuit), MuxModel>,
}

impl MuxLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, size: usize, circuit: MuxCircuit) -> Result<&MuxModel> {
        let key = (size, circuit);
        if !self.models.contains_key(&key) {
            let model = MuxModel::new(size, circuit)?;
            self.models.insert(key, model);
        }
        Ok(&self.models[&key])
    }

    pub fn encode(&mut self, size: usize, circuit: MuxCircuit, path: usize)
        -> Result<ConfigBits>
    {
        self.get(size, circuit)?.encode(path)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn models(&self) -> impl Iterator<Item = &MuxModel> {
        self.models.values()
    }
}
