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

#[macro_use]
extern crate lazy_static;

#[macro_use]
pub mod log;
pub mod common;
pub mod error;
pub mod fabric;
pub mod rr_graph;
pub mod pb_graph;
pub mod boxes;
pub mod mux;
pub mod annotation;
pub mod bitstream;
pub mod config;
pub mod loader;
pub mod exporter;

#[cfg(test)]
pub mod testing;
