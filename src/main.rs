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

use clap::Parser;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use rrba::annotation::BackAnnotator;
use rrba::bitstream::BitstreamAssembler;
use rrba::boxes::DeviceBoxes;
use rrba::config::AnnotationOpts;
use rrba::error::AnnotationError;
use rrba::exporter::*;
use rrba::fabric::Fabric;
use rrba::loader::{self, OpenOpts};
use rrba::mux::{MuxCircuit, MuxModel, MuxTechnology, MuxTopology};

#[derive(Parser, Debug)]
#[clap(
    author = "Antmicro",
    version = "0.0.1",
    about = "RRBA - Routing Resource Back-Annotator",
    long_about = None
)]
struct Args {
    #[clap(subcommand)]
    command: SubCommands,
}

#[derive(Parser, Debug)]
struct AnnotateCmd {
    #[clap(help = "Fabric snapshot (placed and routed design on a device)")]
    fabric: String,
    #[clap(long, help = "Use raw (uncompressed) fabric snapshot")]
    raw: bool,
    #[clap(long, help = "Back-annotation options (YAML)")]
    config: Option<String>,
    #[clap(
        long,
        help = "Clusters to have their pin annotations exported to JSON format"
    )]
    json: Option<Vec<String>>,
    #[clap(long, default_value = "", help = "Directory for saving .json files")]
    json_prefix: String,
    #[clap(long, help = "Blocks to have their configuration bits exported")]
    bits: Option<Vec<String>>,
    #[clap(long, default_value = "", help = "Directory for saving .bits files")]
    bits_prefix: String,
    #[clap(long, help = "Number of threads used to build routing boxes (overrides config)")]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct MuxBitsCmd {
    #[clap(help = "Number of multiplexer inputs")]
    size: usize,
    #[clap(help = "Selected input")]
    path: usize,
    #[clap(long, default_value = "tree", help = "one_level, tree or multi_level")]
    topology: String,
    #[clap(long, default_value = "2", help = "Number of levels of a multi_level multiplexer")]
    levels: usize,
    #[clap(long, help = "Use resistive (RRAM) switches instead of CMOS pass transistors")]
    resistive: bool,
}

impl MuxBitsCmd {
    fn circuit(&self) -> Result<MuxCircuit, String> {
        let topology = match self.topology.as_str() {
            "one_level" => MuxTopology::OneLevel,
            "tree" => MuxTopology::Tree,
            "multi_level" => MuxTopology::MultiLevel(self.levels),
            other => return Err(format!("Unknown multiplexer topology {}", other)),
        };
        let technology = if self.resistive {
            MuxTechnology::ResistiveTwoTerminal
        } else {
            MuxTechnology::PassTransistorCmos
        };
        Ok(MuxCircuit { topology, technology })
    }
}

#[derive(Parser, Debug)]
enum SubCommands {
    Annotate(AnnotateCmd),
    MuxBits(MuxBitsCmd),
}

#[derive(Serialize)]
struct PinAnnotation {
    driver: Option<String>,
    path_id: Option<usize>,
    global_net: Option<String>,
    logical_net: Option<String>,
    open: bool,
}

/* Pin annotations of one cluster keyed by hierarchical pin name */
fn cluster_annotation(fabric: &Fabric, idx: usize) -> BTreeMap<String, PinAnnotation> {
    let cluster = &fabric.clusters[idx];
    let pb = &fabric.pb_graphs[cluster.pb_graph.0];
    cluster.local.pins.iter()
        .enumerate()
        .map(|(pin, state)| {
            let annotation = PinAnnotation {
                driver: state.selected.map(|d| pb.pin_name(d.pin)),
                path_id: state.selected.map(|d| d.path_id),
                global_net: state.global_net.map(|net| fabric.nets.global_name(net)),
                logical_net: state.logical_net.map(|net| fabric.nets.logical_name(net)),
                open: state.open,
            };
            (pb.pin_name(rrba::common::PbPinId(pin)), annotation)
        })
        .collect()
}

fn annotate(args: AnnotateCmd, mut fabric: Fabric, mut opts: AnnotationOpts)
    -> Result<(), AnnotationError>
{
    if let Some(threads) = args.threads {
        opts.threads = threads;
    }

    fabric.prepare()?;
    let report = BackAnnotator::new(&opts).run(&mut fabric)?;

    println!(concat!(
        "Back-annotation:\n",
        "    No. of routed nets:                 {}\n",
        "    No. of skipped global nets:         {}\n",
        "    No. of annotated routing nodes:     {}\n",
        "    No. of clusters:                    {}\n",
        "    No. of open cluster pins:           {}\n",
        "    Parasitic propagation iterations:   {}\n",
        "    No. of nodes with parasitic nets:   {}"
        ),
        report.global.routed_nets,
        report.global.skipped_nets,
        report.global.annotated_nodes,
        report.clusters,
        report.open_pins,
        report.parasitic_iterations,
        report.parasitic_nodes
    );

    let mut boxes = DeviceBoxes::build(&fabric.rr_graph, fabric.grid, opts.threads);
    let bitstream = BitstreamAssembler::new(&fabric, &opts).assemble(&mut boxes)?;

    println!(concat!(
        "Bitstream:\n",
        "    No. of routing boxes:               {}\n",
        "    No. of routing configuration bits:  {}\n",
        "    No. of cluster configuration bits:  {}"
        ),
        bitstream.boxes.len(),
        bitstream.routing_bits().len(),
        bitstream.clusters.iter().map(|c| c.bits.len()).sum::<usize>()
    );

    let mut json_exporter = CompoundJsonExporter::new(
        &args.json,
        Path::new(&args.json_prefix).join("cluster_annotation.json")
    );
    for idx in 0 .. fabric.clusters.len() {
        json_exporter.ignore_or_export(&fabric.clusters[idx].name, || {
            cluster_annotation(&fabric, idx)
        })?;
    }
    json_exporter.flush()?;

    let mut bits_exporter =
        MultiFileExporter::new(&args.bits, args.bits_prefix.clone(), ".bits".into());
    for block in bitstream.boxes.iter().chain(bitstream.clusters.iter()) {
        bits_exporter.ignore_or_export(&block.name, || format!("{}\n", block.bits))?;
    }

    Ok(())
}

fn mux_bits(args: MuxBitsCmd) -> Result<(), String> {
    let circuit = args.circuit()?;
    let model = MuxModel::new(args.size, circuit).map_err(|e| e.to_string())?;
    let bits = model.encode(args.path).map_err(|e| e.to_string())?;

    println!(concat!(
        "{}-input multiplexer ({:?}, {:?}):\n",
        "    Levels:         {}\n",
        "    Reserved bits:  {}\n",
        "    Path {}:         {}"
        ),
        args.size,
        circuit.topology,
        circuit.technology,
        model.num_levels,
        model.num_reserved_conf_bits(),
        args.path,
        bits
    );

    Ok(())
}

fn main() {
    let args = Args::parse();

    if let SubCommands::Annotate(AnnotateCmd { threads: Some(0), .. }) = &args.command {
        eprintln!("Thread count must be positive");
        std::process::exit(2);
    }

    let result = match args.command {
        SubCommands::MuxBits(sargs) => mux_bits(sargs),
        SubCommands::Annotate(sargs) => {
            let opts = match &sargs.config {
                Some(path) => AnnotationOpts::load(path),
                None => Ok(AnnotationOpts::default()),
            };
            let fabric = loader::open(Path::new(&sargs.fabric), OpenOpts { raw: sargs.raw });
            opts.and_then(|opts| fabric.map(|fabric| (fabric, opts)))
                .map_err(AnnotationError::from)
                .and_then(|(fabric, opts)| annotate(sargs, fabric, opts))
                .map_err(|e| e.to_string())
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
