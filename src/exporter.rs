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

//! Optional dumps of annotation results. Both exporters take a list of names
//! from the command line and only export the matching items; `:all` selects
//! everything.

use std::path::{Path, PathBuf};
use std::fs::File;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;

use serde::Serialize;

pub trait AsBytes {
    fn as_bytes<'s>(&'s self) -> &'s [u8];
}

impl AsBytes for String {
    fn as_bytes<'s>(&'s self) -> &'s [u8] {
        String::as_bytes(self)
    }
}

impl AsBytes for str {
    fn as_bytes<'s>(&'s self) -> &'s [u8] {
        str::as_bytes(self)
    }
}

#[derive(Default)]
struct ExportChecker {
    export: HashSet<String>,
    export_all: bool,
}

impl ExportChecker {
    fn from_args(arg_list: &Option<Vec<String>>) -> Self {
        let mut checker = Self::default();
        for arg in arg_list.iter().flatten() {
            if arg == ":all" {
                checker.export_all = true;
            } else {
                checker.export.insert(arg.clone());
            }
        }
        checker
    }

    fn should_export(&self, name: &str) -> bool {
        self.export_all || self.export.contains(name)
    }
}

pub trait Exporter<D> {
    /// Calls `exporter` and stores its result if `name` was selected
    fn ignore_or_export<'s, F>(&'s mut self, name: &str, exporter: F)
        -> std::io::Result<()>
    where
        F: FnOnce() -> D + 's;

    fn flush(&mut self) -> std::io::Result<()>;
}

/// Writes every exported item to its own `<prefix>/<name><suffix>` file.
pub struct MultiFileExporter {
    prefix: String,
    suffix: String,
    checker: ExportChecker,
    written: usize,
}

impl MultiFileExporter {
    pub fn new(arg_list: &Option<Vec<String>>, prefix: String, suffix: String) -> Self {
        Self { prefix, suffix, checker: ExportChecker::from_args(arg_list), written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl<D> Exporter<D> for MultiFileExporter where D: AsBytes {
    fn ignore_or_export<'s, F>(&'s mut self, name: &str, exporter: F)
        -> std::io::Result<()>
    where
        F: FnOnce() -> D + 's
    {
        if self.checker.should_export(name) {
            let data = exporter();
            let path = Path::new(&self.prefix)
                .join(Path::new(&(name.to_string() + &self.suffix)));
            let mut file = File::create(path)?;
            file.write_all(data.as_bytes())?;
            self.written += 1;
        }
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Collects exported items and writes them as one JSON object keyed by name
/// on `flush`.
pub struct CompoundJsonExporter<D> where D: Serialize {
    filename: PathBuf,
    data: BTreeMap<String, D>,
    checker: ExportChecker,
}

impl<D> CompoundJsonExporter<D> where D: Serialize {
    pub fn new(arg_list: &Option<Vec<String>>, filename: PathBuf) -> Self {
        Self {
            filename,
            data: BTreeMap::new(),
            checker: ExportChecker::from_args(arg_list),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<D> Exporter<D> for CompoundJsonExporter<D> where D: Serialize {
    fn ignore_or_export<'s, F>(&'s mut self, name: &str, exporter: F)
        -> std::io::Result<()>
    where
        F: FnOnce() -> D + 's
    {
        if self.checker.should_export(name) {
            let data = exporter();
            self.data.insert(name.into(), data);
        }
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if self.data.is_empty() {
            return Ok(());
        }
        let data = serde_json::to_string_pretty(&self.data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = File::create(&self.filename)?;
        file.write_all(data.as_bytes())
    }
}
