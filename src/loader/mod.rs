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

//! Fabric snapshots: a routed `Fabric` stored as JSON, gzip-compressed by
//! default.

use std::path::Path;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use memmap2::Mmap;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use crate::fabric::Fabric;


#[derive(thiserror::Error, Debug, Clone)]
pub enum OpenWriteError {
    #[error("couldn't open file: {0}")]
    CantOpenFile(String),
    #[error("couldn't (de)serialize fabric: {0}")]
    SerdeError(String),
}

#[derive(Default)]
pub struct OpenOpts {
    pub raw: bool,
}

pub struct WriteOpts {
    pub raw: bool,
    pub compression_level: u32,
}

impl Default for WriteOpts {
    fn default() -> Self {
        Self {
            raw: false,
            compression_level: 6,
        }
    }
}

/// Reads a fabric snapshot. Derived data (driver index, lookup, cluster
/// bindings) is not stored, call `Fabric::prepare` before using the result.
pub fn open<P>(path: P, opts: OpenOpts) -> Result<Fabric, OpenWriteError> where
    P: AsRef<Path>,
{
    let file = File::open(path)
        .map_err(|e| OpenWriteError::CantOpenFile(format!("{:?}", e)))?;

    /* RAW mode memory-maps an uncompressed snapshot, which loads much faster
     * in debug builds. */
    let fabric = if opts.raw {
        /* UNSAFE DUE TO A POTENTIAL UB WHEN A FILE IS CHANGED! */
        let mmapped = unsafe { Mmap::map(&file) }
            .map_err(|e| OpenWriteError::CantOpenFile(format!("mmap failed: {:?}", e)))?;
        serde_json::from_slice(&mmapped)
    } else {
        serde_json::from_reader(BufReader::new(GzDecoder::new(file)))
    };

    fabric.map_err(|e| OpenWriteError::SerdeError(format!("{}", e)))
}

pub fn write<P>(path: P, fabric: &Fabric, opts: WriteOpts) -> Result<(), OpenWriteError> where
    P: AsRef<Path>,
{
    let file = File::create(path)
        .map_err(|e| OpenWriteError::CantOpenFile(format!("{:?}", e)))?;
    let serde_err = |e: serde_json::Error| OpenWriteError::SerdeError(format!("{}", e));
    let io_err = |e: std::io::Error| OpenWriteError::CantOpenFile(format!("{:?}", e));

    if opts.raw {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, fabric).map_err(serde_err)?;
        writer.flush().map_err(io_err)?;
    } else {
        let mut encoder = GzEncoder::new(
            BufWriter::new(file),
            Compression::new(opts.compression_level)
        );
        serde_json::to_writer(&mut encoder, fabric).map_err(serde_err)?;
        encoder.finish().map_err(io_err)?.flush().map_err(io_err)?;
    }

    Ok(())
}
