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

//! Local pass: drivers and nets of the pins inside cluster instances.
//!
//! The pass is split in two. `select_local_drivers` picks a driving edge for
//! every pin, resolving the candidates' sources on demand, and records an
//! order in which every pin follows the pins it depends on.
//! `propagate_local_nets` then only reads those choices, so it can be re-run
//! by the parasitic net propagation.

use crate::common::*;
use crate::error::{AnnotationError, Result};
use crate::fabric::{Fabric, NetTable};
#[allow(unused)]
use crate::log::*;
use crate::pb_graph::*;
use crate::rr_graph::RrGraph;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Visit {
    Unvisited,
    Visiting,
    Done,
}

struct Frame {
    pin: PbPinId,
    edges: Vec<PbEdgeId>,
    /* Next candidate edge to check */
    cursor: usize,
}

/* What a frame needs before it can finish */
enum Step {
    Descend(PbPinId),
    Finish {
        selected: Option<LocalDriver>,
        resolved: Option<GlobalNetId>,
        open: bool,
    },
    Skip,
}

fn local_driver(frame: &Frame, source: PbPinId, path_id: usize) -> LocalDriver {
    LocalDriver {
        pin: source,
        edge: frame.edges[path_id],
        path_id,
        fan_in: frame.edges.len(),
    }
}

fn is_root_input(pb: &PbGraph, pin: PbPinId) -> bool {
    let p = pb.pin(pin);
    p.node == PB_ROOT && p.kind.is_input()
}

fn is_primitive_output(pb: &PbGraph, pin: PbPinId) -> bool {
    let p = pb.pin(pin);
    !p.kind.is_input() && pb.node(p.node).is_primitive()
}

impl ClusterInstance {
    /* Net a pin is known to carry before looking at its drivers */
    fn known_net(&self, pb: &PbGraph, rr: &RrGraph, pin: PbPinId) -> Option<GlobalNetId> {
        self.pin_net(pin).or_else(|| {
            if is_root_input(pb, pin) {
                self.local.rr_pin(pin).and_then(|node| rr.node(node).global_net)
            } else {
                None
            }
        })
    }

    fn frame(&self, pb: &PbGraph, pin: PbPinId) -> Frame {
        Frame {
            pin,
            edges: pb.active_input_edges(pin, &self.modes).collect(),
            cursor: 0,
        }
    }

    /* Pin whose net `pin` copies in the second half of the pass */
    fn dependency(&self, pb: &PbGraph, pins: &[LocalPinState], pin: PbPinId) -> Option<PbPinId> {
        match pins[pin.0].selected {
            Some(driver) => Some(driver.pin),
            None => self.route_through(pin).filter(|_| is_primitive_output(pb, pin)),
        }
    }

    /* Whether the net of `from` comes from a pin which is still being resolved */
    fn depends_on_pending(&self, pb: &PbGraph, pins: &[LocalPinState], visit: &[Visit], from: PbPinId)
        -> bool
    {
        let mut current = Some(from);
        for _ in 0 ..= pins.len() {
            match current {
                Some(p) if visit[p.0] == Visit::Visiting => return true,
                Some(p) => current = self.dependency(pb, pins, p),
                None => return false,
            }
        }
        false
    }

    /* Net a pin which is still being resolved will end up with, when it
     * doesn't depend on the pins above it. Pins following their first
     * driver do, so for them there is none. */
    fn pending_net(&self, pb: &PbGraph, rr: &RrGraph, pin: PbPinId)
        -> Option<Option<GlobalNetId>>
    {
        let known = self.known_net(pb, rr, pin);
        if known.is_some() || pb.active_input_edges(pin, &self.modes).next().is_none() {
            Some(known)
        } else {
            None
        }
    }

    /* Orders pins so that each one follows the pin it copies its net from.
     * Every pin has at most one such pin, so the walk only follows chains. */
    fn propagation_order(&self, pb: &PbGraph, pins: &[LocalPinState]) -> Result<Vec<PbPinId>> {
        let mut visit = vec![Visit::Unvisited; pins.len()];
        let mut order = Vec::with_capacity(pins.len());

        for start in 0 .. pins.len() {
            let mut chain = Vec::new();
            let mut current = Some(PbPinId(start));
            while let Some(pin) = current {
                match visit[pin.0] {
                    Visit::Done => break,
                    Visit::Visiting => {
                        return Err(AnnotationError::LocalDriverCycle {
                            cluster: self.name.clone(),
                            pin: pb.pin_name(pin),
                        });
                    },
                    Visit::Unvisited => {
                        visit[pin.0] = Visit::Visiting;
                        chain.push(pin);
                        current = self.dependency(pb, pins, pin);
                    },
                }
            }
            for pin in chain.into_iter().rev() {
                visit[pin.0] = Visit::Done;
                order.push(pin);
            }
        }

        Ok(order)
    }

    /// First half of the local pass. For every pin with active input edges,
    /// selects the first edge whose source resolves to the pin's net, or the
    /// first edge when the pin carries no net. Pins that nothing drives in
    /// the selected modes are marked open.
    pub fn select_local_drivers(&mut self, pb: &PbGraph, rr: &RrGraph, nets: &NetTable)
        -> Result<()>
    {
        let pin_cnt = pb.pins.len();
        let mut visit = vec![Visit::Unvisited; pin_cnt];
        let mut resolved: Vec<Option<GlobalNetId>> = vec![None; pin_cnt];
        let mut pins: Vec<LocalPinState> = vec![Default::default(); pin_cnt];
        let mut stack: Vec<Frame> = Vec::new();

        for start in 0 .. pin_cnt {
            if visit[start] != Visit::Unvisited {
                continue;
            }
            visit[start] = Visit::Visiting;
            stack.push(self.frame(pb, PbPinId(start)));

            while let Some(frame) = stack.last_mut() {
                let pin = frame.pin;
                let known = self.known_net(pb, rr, pin);

                let step = if frame.edges.is_empty() {
                    match self.route_through(pin).filter(|_| is_primitive_output(pb, pin)) {
                        Some(input) if visit[input.0] == Visit::Unvisited => Step::Descend(input),
                        /* The input is still being resolved. The output keeps its
                         * own net and is ordered after the input later on. */
                        _ => Step::Finish {
                            selected: None,
                            resolved: known,
                            open: !is_root_input(pb, pin) && !is_primitive_output(pb, pin),
                        },
                    }
                } else if let Some(net) = known {
                    if frame.cursor >= frame.edges.len() {
                        return Err(AnnotationError::MissingLocalDriver {
                            cluster: self.name.clone(),
                            pin: pb.pin_name(pin),
                            net: nets.global_name(net),
                            edges: frame.edges.len(),
                        });
                    }
                    let source = pb.edge(frame.edges[frame.cursor]).from;
                    match visit[source.0] {
                        Visit::Unvisited => Step::Descend(source),
                        Visit::Done if resolved[source.0] == Some(net)
                            && !self.depends_on_pending(pb, &pins, &visit, source) => Step::Finish {
                            selected: Some(local_driver(frame, source, frame.cursor)),
                            resolved: Some(net),
                            open: false,
                        },
                        /* Another net, or a source waiting on this pin or its parents */
                        _ => Step::Skip,
                    }
                } else {
                    let source = pb.edge(frame.edges[0]).from;
                    match visit[source.0] {
                        Visit::Unvisited => Step::Descend(source),
                        Visit::Visiting => match self.pending_net(pb, rr, source) {
                            Some(net) => Step::Finish {
                                selected: Some(local_driver(frame, source, 0)),
                                resolved: net,
                                open: false,
                            },
                            None => {
                                return Err(AnnotationError::LocalDriverCycle {
                                    cluster: self.name.clone(),
                                    pin: pb.pin_name(pin),
                                });
                            },
                        },
                        Visit::Done => Step::Finish {
                            selected: Some(local_driver(frame, source, 0)),
                            resolved: resolved[source.0],
                            open: false,
                        },
                    }
                };

                match step {
                    Step::Descend(next) => {
                        visit[next.0] = Visit::Visiting;
                        let next_frame = self.frame(pb, next);
                        stack.push(next_frame);
                    },
                    Step::Skip => frame.cursor += 1,
                    Step::Finish { selected, resolved: net, open } => {
                        visit[pin.0] = Visit::Done;
                        resolved[pin.0] = net;
                        pins[pin.0].selected = selected;
                        pins[pin.0].open = open;
                        stack.pop();
                    },
                }
            }
        }

        self.local.order = self.propagation_order(pb, &pins)?;
        self.local.pins = pins;

        dbg_log!(
            DBG_EXTRA1,
            "Cluster {}: {} local drivers selected, {} open pins",
            self.name,
            self.local.pins.iter().filter(|p| p.selected.is_some()).count(),
            self.local.pins.iter().filter(|p| p.open).count()
        );

        Ok(())
    }

    /// Second half of the local pass. Moves nets along the selected drivers:
    /// cluster inputs take them from the routing graph, primitive outputs
    /// from the clustering result (or from the forwarded input of a
    /// route-through). Returns the number of input pins whose logical net
    /// changed since the previous call.
    pub fn propagate_local_nets(&mut self, pb: &PbGraph, rr: &RrGraph, nets: &NetTable) -> usize {
        let mut changed = 0;

        for idx in 0 .. self.local.order.len() {
            let pin = self.local.order[idx];
            let pin_net = self.pin_net(pin);

            let (global, logical) = if let Some(driver) = self.local.pin(pin).selected {
                let source = self.local.pin(driver.pin);
                (pin_net.or(source.global_net), source.logical_net)
            } else if is_root_input(pb, pin) {
                match self.local.rr_pin(pin).map(|node| rr.node(node)) {
                    Some(node) if node.global_net.is_some() => (node.global_net, node.logical_net),
                    _ => (pin_net, pin_net.map(|net| nets.logical_of(net))),
                }
            } else if let Some(input) = self.route_through(pin).filter(|_| is_primitive_output(pb, pin)) {
                (pin_net, self.local.pin(input).logical_net)
            } else {
                (pin_net, pin_net.map(|net| nets.logical_of(net)))
            };

            let is_input = pb.pin(pin).kind.is_input();
            let state = self.local.pin_mut(pin);
            state.changed = is_input && state.logical_net != logical;
            if state.changed {
                changed += 1;
            }
            state.global_net = global;
            state.logical_net = logical;
        }

        changed
    }
}

impl Fabric {
    /// Runs both halves of the local pass on every cluster instance.
    pub fn annotate_clusters(&mut self) -> Result<()> {
        let Fabric { pb_graphs, clusters, rr_graph, nets, .. } = self;
        for cluster in clusters.iter_mut() {
            let pb = &pb_graphs[cluster.pb_graph.0];
            cluster.select_local_drivers(pb, rr_graph, nets)?;
            cluster.propagate_local_nets(pb, rr_graph, nets);
        }
        Ok(())
    }

    /// Re-runs net propagation on every cluster instance. Returns the number
    /// of cluster input pins which changed.
    pub fn propagate_cluster_nets(&mut self) -> usize {
        let Fabric { pb_graphs, clusters, rr_graph, nets, .. } = self;
        clusters.iter_mut()
            .map(|cluster| {
                let pb = &pb_graphs[cluster.pb_graph.0];
                cluster.propagate_local_nets(pb, rr_graph, nets)
            })
            .sum()
    }
}
