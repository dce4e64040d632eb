use super::*;
use crate::common::*;
use crate::error::AnnotationError;
use crate::fabric::Grid;
use crate::pb_graph::*;
use crate::rr_graph::{RrGraph, RrNodeKind};
use crate::testing::*;

fn empty_fabric() -> Fabric {
    let grid = Grid::new(3, 3);
    let mut fabric = Fabric::new(grid);
    fabric.rr_graph = grid_rr_graph(grid, 2);
    fabric
}

fn add_net(fabric: &mut Fabric, name: &str, trace: Vec<RrNodeId>) -> GlobalNetId {
    let logical = fabric.nets.add_logical(name);
    fabric.nets.add_global(name, logical, trace)
}

fn selections(rr: &RrGraph) -> Vec<(Option<GlobalNetId>, Option<usize>)> {
    rr.nodes.iter()
        .map(|n| (n.global_net, n.selected.map(|s| s.path_id)))
        .collect()
}

struct RouteThrough {
    fabric: Fabric,
    pins: LutPins,
    gx: GlobalNetId,
    gy: GlobalNetId,
}

/* Cluster `a` at (1, 1) uses its LUT as a buffer from net `x` to net `y`,
 * which is routed on to cluster `b` at (2, 1). */
fn route_through_fabric() -> RouteThrough {
    let mut fabric = empty_fabric();
    let trace_x = net_trace(&fabric.rr_graph, (0, 1), 2, (1, 1), 0);
    let trace_y = net_trace(&fabric.rr_graph, (1, 1), 2, (2, 1), 0);
    let gx = add_net(&mut fabric, "x", trace_x);
    let gy = add_net(&mut fabric, "y", trace_y);

    let (pb, pins) = lut_cluster_type();
    let pb_id = PbGraphId(0);

    let mut a = ClusterInstance::new("a", pb_id, &pb, (1, 1));
    a.set_mode(PB_ROOT, 0);
    a.set_pin_net(pins.i[0], gx);
    a.set_pin_net(pins.lut_in[0], gx);
    a.set_pin_net(pins.lut_out, gy);
    a.set_pin_net(pins.o[0], gy);
    a.route_throughs.push((pins.lut_out, pins.lut_in[0]));

    let mut b = ClusterInstance::new("b", pb_id, &pb, (2, 1));
    b.set_mode(PB_ROOT, 0);
    b.set_pin_net(pins.i[0], gy);
    b.set_pin_net(pins.lut_in[0], gy);

    fabric.add_pb_graph(pb);
    fabric.add_cluster(a);
    fabric.add_cluster(b);
    fabric.prepare().unwrap();

    RouteThrough { fabric, pins, gx, gy }
}

#[test]
fn test_global_pass_selects_drivers() {
    let mut fabric = empty_fabric();
    let trace = net_trace(&fabric.rr_graph, (1, 1), 2, (2, 1), 0);
    let net = add_net(&mut fabric, "n", trace.clone());
    fabric.prepare().unwrap();

    let stats = fabric.rr_graph.annotate_routing(&fabric.nets, true).unwrap();
    assert_eq!(stats.routed_nets, 1);
    assert_eq!(stats.annotated_nodes, trace.len());

    let rr = &fabric.rr_graph;
    assert!(rr.node(trace[0]).selected.is_none());
    for pair in trace.windows(2) {
        let node = rr.node(pair[1]);
        let selected = node.selected.unwrap();
        assert_eq!(selected.driver, pair[0]);
        assert_eq!(Some(selected.path_id), rr.path_id(pair[1], pair[0]));
        assert_eq!(rr.node(pair[0]).edges[selected.edge].sink, pair[1]);
        assert_eq!(node.global_net, Some(net));
        assert_eq!(node.logical_net, Some(fabric.nets.logical_of(net)));
    }

    let used = rr.nodes.iter().filter(|n| n.global_net.is_some()).count();
    assert_eq!(used, trace.len());
}

#[test]
fn test_global_pass_is_idempotent() {
    let mut fabric = empty_fabric();
    let trace_a = net_trace(&fabric.rr_graph, (1, 1), 2, (2, 1), 0);
    let trace_b = net_trace(&fabric.rr_graph, (0, 1), 2, (1, 1), 0);
    add_net(&mut fabric, "a", trace_a);
    add_net(&mut fabric, "b", trace_b);
    fabric.prepare().unwrap();

    fabric.rr_graph.annotate_routing(&fabric.nets, true).unwrap();
    let first = selections(&fabric.rr_graph);
    fabric.rr_graph.annotate_routing(&fabric.nets, true).unwrap();
    assert_eq!(first, selections(&fabric.rr_graph));
}

#[test]
fn test_branches_restart_on_tree() {
    let mut fabric = empty_fabric();
    let rr = &fabric.rr_graph;
    let opin = node_at(rr, RrNodeKind::OPin, (1, 1), 2);
    let far = node_at(rr, RrNodeKind::IPin, (1, 1), 1);

    let mut trace = net_trace(rr, (1, 1), 2, (2, 1), 0);
    trace.extend(route(rr, opin, far));
    trace.push(node_at(rr, RrNodeKind::Sink, (1, 1), 1));
    let net = add_net(&mut fabric, "fanout", trace);
    fabric.prepare().unwrap();

    fabric.rr_graph.annotate_routing(&fabric.nets, true).unwrap();
    let ipin = fabric.rr_graph.node(far);
    assert_eq!(ipin.global_net, Some(net));
    assert_eq!(fabric.rr_graph.node(ipin.selected.unwrap().driver).kind, RrNodeKind::ChanY);
    assert_eq!(fabric.rr_graph.selected_fanout(opin).count(), 2);
}

#[test]
fn test_branch_off_tree_rejected() {
    let mut fabric = empty_fabric();
    let rr = &fabric.rr_graph;
    let stray = node_at(rr, RrNodeKind::OPin, (0, 0), 3);

    let mut trace = net_trace(rr, (1, 1), 2, (2, 1), 0);
    trace.push(stray);
    add_net(&mut fabric, "stray", trace);
    fabric.prepare().unwrap();

    assert!(matches!(
        fabric.rr_graph.annotate_routing(&fabric.nets, true),
        Err(AnnotationError::BranchNotOnTree { .. })
    ));
}

#[test]
fn test_trace_with_missing_driver() {
    let mut fabric = empty_fabric();
    let rr = &fabric.rr_graph;
    let trace = vec![
        node_at(rr, RrNodeKind::Source, (1, 1), 2),
        node_at(rr, RrNodeKind::IPin, (2, 2), 0),
    ];
    add_net(&mut fabric, "bad", trace);
    fabric.prepare().unwrap();

    assert!(matches!(
        fabric.rr_graph.annotate_routing(&fabric.nets, true),
        Err(AnnotationError::DriverNotFound { .. })
    ));
}

#[test]
fn test_shared_node_is_a_conflict() {
    let mut fabric = empty_fabric();
    let trace = net_trace(&fabric.rr_graph, (1, 1), 2, (2, 1), 0);
    add_net(&mut fabric, "first", trace.clone());
    add_net(&mut fabric, "second", trace);
    fabric.prepare().unwrap();

    assert!(matches!(
        fabric.rr_graph.annotate_routing(&fabric.nets, true),
        Err(AnnotationError::NetConflict { .. })
    ));
}

#[test]
fn test_global_nets_skipped() {
    let mut fabric = empty_fabric();
    let clk = add_net(&mut fabric, "clk", Vec::new());
    fabric.nets.global[clk.0].is_global = true;
    fabric.prepare().unwrap();

    let stats = fabric.rr_graph.annotate_routing(&fabric.nets, true).unwrap();
    assert_eq!(stats.skipped_nets, 1);
    assert_eq!(stats.routed_nets, 0);

    assert!(matches!(
        fabric.rr_graph.annotate_routing(&fabric.nets, false),
        Err(AnnotationError::EmptyTrace { .. })
    ));
}

#[test]
fn test_local_drivers_follow_clustered_nets() {
    let RouteThrough { mut fabric, pins, gx, gy } = route_through_fabric();
    fabric.rr_graph.annotate_routing(&fabric.nets, true).unwrap();
    fabric.annotate_clusters().unwrap();

    let a = &fabric.clusters[0].local;
    let lut_in = a.pin(pins.lut_in[0]);
    assert_eq!(lut_in.selected.map(|d| d.pin), Some(pins.i[0]));
    assert_eq!(lut_in.selected.map(|d| d.fan_in), Some(2));
    assert_eq!(lut_in.global_net, Some(gx));

    /* Pins without a net fall back to the first input */
    let o1 = a.pin(pins.o[1]);
    assert_eq!(o1.selected.map(|d| d.path_id), Some(0));
    assert_eq!(o1.global_net, Some(gx));

    let o0 = a.pin(pins.o[0]);
    assert_eq!(o0.selected.map(|d| d.pin), Some(pins.lut_out));
    assert_eq!(o0.global_net, Some(gy));

    /* Every pin comes after its driver */
    let position = |pin: PbPinId| a.order.iter().position(|p| *p == pin).unwrap();
    for pin in &a.order {
        if let Some(driver) = a.pin(*pin).selected {
            assert!(position(driver.pin) < position(*pin));
        }
    }
    assert!(position(pins.lut_in[0]) < position(pins.lut_out));
}

#[test]
fn test_idle_mode_pins_are_open() {
    let mut fabric = empty_fabric();
    let trace = net_trace(&fabric.rr_graph, (0, 1), 2, (1, 1), 0);
    let net = add_net(&mut fabric, "x", trace);

    let (pb, pins) = lut_cluster_type();
    let mut cluster = ClusterInstance::new("a", PbGraphId(0), &pb, (1, 1));
    cluster.set_mode(PB_ROOT, 1);
    fabric.add_pb_graph(pb);
    fabric.add_cluster(cluster);
    fabric.prepare().unwrap();

    let report = BackAnnotator::new(&AnnotationOpts::default()).run(&mut fabric).unwrap();
    assert_eq!(report.open_pins, 2);

    let local = &fabric.clusters[0].local;
    assert!(local.pin(pins.lut_in[0]).open);
    assert!(local.pin(pins.lut_in[1]).selected.is_none());
    assert!(!local.pin(pins.lut_out).open);

    let o0 = local.pin(pins.o[0]);
    assert_eq!(o0.selected.map(|d| (d.pin, d.fan_in)), Some((pins.i[0], 1)));
    assert_eq!(o0.global_net, Some(net));
}

#[test]
fn test_missing_local_driver() {
    let RouteThrough { mut fabric, pins, gy, .. } = route_through_fabric();
    /* Neither cluster input of `a` carries `y` */
    fabric.clusters[0].set_pin_net(pins.lut_in[1], gy);
    fabric.rr_graph.annotate_routing(&fabric.nets, true).unwrap();

    assert!(matches!(
        fabric.annotate_clusters(),
        Err(AnnotationError::MissingLocalDriver { edges: 2, .. })
    ));
}

#[test]
fn test_unknown_cluster_type() {
    let mut fabric = empty_fabric();
    let (pb, _) = lut_cluster_type();
    fabric.add_cluster(ClusterInstance::new("a", PbGraphId(3), &pb, (1, 1)));
    fabric.add_pb_graph(pb);

    assert!(matches!(
        fabric.prepare(),
        Err(AnnotationError::InvalidClusterIndex { what: "pb-graph", index: 3, .. })
    ));
}

#[test]
fn test_default_driver_cycle() {
    let mut pb = PbGraph::new("ring");
    pb.add_port(PB_ROOT, PbPortKind::Input, "I", 1);
    let mode = pb.add_mode(PB_ROOT, "ring");
    let mut ends = Vec::new();
    for idx in 0 .. 2 {
        let buf = pb.add_child(PB_ROOT, mode, "buf", format!("buf[{}]", idx));
        let input = pb.add_port(buf, PbPortKind::Input, "in", 1);
        let output = pb.add_port(buf, PbPortKind::Output, "out", 1);
        let pass = pb.add_mode(buf, "pass");
        pb.add_interconnect(buf, pass, "through", InterconnectKind::Wire, &input, &output);
        ends.push((input, output));
    }
    pb.add_interconnect(PB_ROOT, mode, "ring0", InterconnectKind::Wire, &ends[1].1, &ends[0].0);
    pb.add_interconnect(PB_ROOT, mode, "ring1", InterconnectKind::Wire, &ends[0].1, &ends[1].0);

    let mut fabric = empty_fabric();
    let cluster = ClusterInstance::new("r", PbGraphId(0), &pb, (1, 1));
    fabric.add_pb_graph(pb);
    fabric.add_cluster(cluster);
    fabric.prepare().unwrap();

    assert!(matches!(
        fabric.annotate_clusters(),
        Err(AnnotationError::LocalDriverCycle { .. })
    ));
}

/* LUT pins come before the cluster pins, so the LUT input is resolved first
 * and reaches its own route-through output as the first crossbar input. */
#[test]
fn test_route_through_feedback_is_skipped() {
    let mut pb = PbGraph::new("fb");
    let mode = pb.add_mode(PB_ROOT, "default");
    let lut = pb.add_child(PB_ROOT, mode, "lut1", "lut[0]");
    let lut_in = pb.add_port(lut, PbPortKind::Input, "in", 1)[0];
    let lut_out = pb.add_port(lut, PbPortKind::Output, "out", 1)[0];
    let i = pb.add_port(PB_ROOT, PbPortKind::Input, "I", 2);
    let o = pb.add_port(PB_ROOT, PbPortKind::Output, "O", 2);
    assert_eq!(pb.pin(o[0]).top_ptc, Some(2));
    pb.add_interconnect(PB_ROOT, mode, "crossbar", InterconnectKind::FullMux, &[lut_out, i[0]], &[lut_in]);
    pb.add_interconnect(PB_ROOT, mode, "out0", InterconnectKind::Wire, &[lut_out], &o[0 .. 1]);

    let mut fabric = empty_fabric();
    let trace_x = net_trace(&fabric.rr_graph, (0, 1), 2, (1, 1), 0);
    let trace_y = net_trace(&fabric.rr_graph, (1, 1), 2, (2, 1), 0);
    let gx = add_net(&mut fabric, "x", trace_x);
    let gy = add_net(&mut fabric, "y", trace_y);

    let mut cluster = ClusterInstance::new("f", PbGraphId(0), &pb, (1, 1));
    cluster.set_mode(PB_ROOT, mode);
    cluster.set_pin_net(lut_in, gx);
    cluster.set_pin_net(lut_out, gy);
    cluster.set_pin_net(o[0], gy);
    cluster.route_throughs.push((lut_out, lut_in));
    fabric.add_pb_graph(pb);
    fabric.add_cluster(cluster);
    fabric.prepare().unwrap();

    fabric.rr_graph.annotate_routing(&fabric.nets, true).unwrap();
    fabric.annotate_clusters().unwrap();

    let local = &fabric.clusters[0].local;
    let selected = local.pin(lut_in).selected.map(|d| (d.pin, d.path_id));
    assert_eq!(selected, Some((i[0], 1)));
    assert_eq!(local.pin(lut_in).global_net, Some(gx));
    assert_eq!(local.pin(o[0]).selected.map(|d| d.pin), Some(lut_out));
    assert_eq!(local.pin(lut_out).logical_net, Some(fabric.nets.logical_of(gx)));

    let position = |pin: PbPinId| local.order.iter().position(|p| *p == pin).unwrap();
    assert!(position(i[0]) < position(lut_in));
    assert!(position(lut_in) < position(lut_out));
    assert!(position(lut_out) < position(o[0]));
}

#[test]
fn test_parasitic_net_through_route_through() {
    let RouteThrough { mut fabric, pins, gx, gy } = route_through_fabric();
    let report = BackAnnotator::new(&AnnotationOpts::default()).run(&mut fabric).unwrap();
    let lx = fabric.nets.logical_of(gx);
    let ly = fabric.nets.logical_of(gy);

    assert_eq!(report.global.routed_nets, 2);
    assert_eq!(report.parasitic_iterations, 2);

    /* `y` physically carries `x` from the LUT output onwards */
    let rr = &fabric.rr_graph;
    let opin = rr.node(node_at(rr, RrNodeKind::OPin, (1, 1), 2));
    assert_eq!(opin.global_net, Some(gy));
    assert_eq!(opin.logical_net, Some(lx));
    assert_eq!(rr.node(node_at(rr, RrNodeKind::IPin, (2, 1), 0)).logical_net, Some(lx));
    assert_eq!(rr.node(node_at(rr, RrNodeKind::Source, (1, 1), 2)).logical_net, Some(ly));

    let b = &fabric.clusters[1].local;
    assert_eq!(b.pin(pins.lut_in[0]).global_net, Some(gy));
    assert_eq!(b.pin(pins.lut_in[0]).logical_net, Some(lx));
    assert_eq!(fabric.clusters[0].local.pin(pins.lut_out).logical_net, Some(lx));

    let parasitic = fabric.parasitic_nodes();
    assert!(parasitic.contains(&node_at(rr, RrNodeKind::Sink, (2, 1), 0)));
    assert!(!parasitic.contains(&node_at(rr, RrNodeKind::IPin, (1, 1), 0)));

    /* Fixed point: one more round changes nothing */
    assert_eq!(fabric.parasitic_iteration(), 0);
    assert_eq!(fabric.clusters[1].local.changed_pins().count(), 0);
}

#[test]
fn test_annotation_run_is_repeatable() {
    let RouteThrough { mut fabric, .. } = route_through_fabric();
    let opts = AnnotationOpts::default();
    let first = BackAnnotator::new(&opts).run(&mut fabric).unwrap();
    let snapshot: Vec<_> = fabric.rr_graph.nodes.iter().map(|n| n.logical_net).collect();

    let second = BackAnnotator::new(&opts).run(&mut fabric).unwrap();
    assert_eq!(first.parasitic_iterations, second.parasitic_iterations);
    assert_eq!(first.parasitic_nodes, second.parasitic_nodes);
    let again: Vec<_> = fabric.rr_graph.nodes.iter().map(|n| n.logical_net).collect();
    assert_eq!(snapshot, again);
}

#[test]
fn test_combinational_loop_diverges() {
    let mut fabric = empty_fabric();
    let trace_p = net_trace(&fabric.rr_graph, (1, 1), 2, (1, 1), 0);
    let trace_q = net_trace(&fabric.rr_graph, (1, 1), 3, (1, 1), 1);
    add_net(&mut fabric, "p", trace_p);
    add_net(&mut fabric, "q", trace_q);

    let (pb, _, _) = xbar_cluster_type();
    let cluster = ClusterInstance::new("x", PbGraphId(0), &pb, (1, 1));
    fabric.add_pb_graph(pb);
    fabric.add_cluster(cluster);
    fabric.prepare().unwrap();
    assert_eq!(fabric.default_parasitic_cap(), 3);

    match BackAnnotator::new(&AnnotationOpts::default()).run(&mut fabric) {
        Err(AnnotationError::PropagationDiverged { iterations, pending }) => {
            assert_eq!(iterations, 3);
            assert_eq!(pending, vec!["x: xbar.I[0]".to_string(), "x: xbar.I[1]".to_string()]);
        },
        other => panic!("Expected divergence, got {:?}", other.map(|r| r.parasitic_iterations)),
    }

    let opts = AnnotationOpts { max_parasitic_iterations: Some(10), ..Default::default() };
    assert!(matches!(
        BackAnnotator::new(&opts).run(&mut fabric),
        Err(AnnotationError::PropagationDiverged { iterations: 10, .. })
    ));
}
