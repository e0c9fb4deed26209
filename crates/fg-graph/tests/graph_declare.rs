//! End-to-end declaration scenarios against the public builder API.

use fg_graph::{OperatorGraph, Severity};
use fg_schema::Schema;

fn schema(s: &str) -> Schema {
    s.parse().unwrap()
}

// -- 1. beacon_filter_round_trip ---------------------------------------------

#[test]
fn beacon_filter_round_trip() {
    let mut graph = OperatorGraph::new();

    let beacon = graph
        .add_operator_named("spl.utility::Beacon", "beacon")
        .unwrap();
    let beacon_out = graph
        .invocation_mut(beacon)
        .add_output(None, schema("name: string"))
        .unwrap();

    let filter = graph
        .add_operator_named("spl.relational::Filter", "filter")
        .unwrap();
    let filter_in = graph
        .invocation_mut(filter)
        .add_input(None, schema("name: string"))
        .unwrap();
    graph
        .invocation_mut(filter)
        .add_output(None, schema("name: string"))
        .unwrap();

    graph
        .input_port_mut(filter_in)
        .tumbling()
        .unwrap()
        .evict_count(200)
        .unwrap();

    graph.connect(beacon_out, filter_in).unwrap();

    let report = graph.compile_checks(false).unwrap();
    assert!(report.passed());
    assert!(report.is_empty());
}

#[test]
fn beacon_filter_without_eviction_fails() {
    let mut graph = OperatorGraph::new();

    let beacon = graph
        .add_operator_named("spl.utility::Beacon", "beacon")
        .unwrap();
    let beacon_out = graph
        .invocation_mut(beacon)
        .add_output(None, schema("name: string"))
        .unwrap();

    let filter = graph
        .add_operator_named("spl.relational::Filter", "filter")
        .unwrap();
    let filter_in = graph
        .invocation_mut(filter)
        .add_input(None, schema("name: string"))
        .unwrap();

    // tumbling declared, evict_count(200) omitted
    graph.input_port_mut(filter_in).tumbling().unwrap();
    graph.connect(beacon_out, filter_in).unwrap();

    let report = graph.compile_checks(false).unwrap();
    assert!(!report.passed());
    assert_eq!(report.error_count(), 1);

    let diag = &report.diagnostics()[0];
    assert_eq!(diag.severity, Severity::Error);
    assert_eq!(diag.operator, "filter");
    assert_eq!(diag.port.as_deref(), Some("in0"));
    assert!(diag.message.contains("eviction"), "{}", diag.message);
}

// -- 2. source_to_sink_chain --------------------------------------------------

#[test]
fn source_to_sink_chain() {
    let tuples = "ts: timestamp, host: string, bytes: int64";
    let mut graph = OperatorGraph::new();

    let src = graph.add_operator("net::PacketSource");
    let src_out = graph
        .invocation_mut(src)
        .add_output(None, schema(tuples))
        .unwrap();

    let agg = graph.add_operator("spl.relational::Aggregate");
    let agg_in = graph
        .invocation_mut(agg)
        .add_input(None, schema(tuples))
        .unwrap();
    let agg_out = graph
        .invocation_mut(agg)
        .add_output(None, schema("host: string, total: int64"))
        .unwrap();

    let sink = graph.add_operator("io::FileSink");
    let sink_in = graph
        .invocation_mut(sink)
        .add_input(None, schema("host: string, total: int64"))
        .unwrap();

    graph
        .input_port_mut(agg_in)
        .sliding()
        .unwrap()
        .evict_time(60.0)
        .unwrap()
        .trigger_count(100)
        .unwrap()
        .partitioned()
        .unwrap()
        .partition_eviction_age(3600.0)
        .unwrap();

    graph.connect(src_out, agg_in).unwrap();
    graph.connect(agg_out, sink_in).unwrap();

    assert_eq!(graph.len(), 3);
    assert_eq!(graph.connection_count(), 2);

    let report = graph.compile_checks(true).unwrap();
    assert!(report.passed(), "{:?}", report.diagnostics());

    // an unconnected port is legal at declaration time
    let lone = graph.add_operator("io::ConsoleSink");
    graph
        .invocation_mut(lone)
        .add_input(None, schema("v: int64"))
        .unwrap();
    assert!(graph.compile_checks(false).unwrap().passed());
}

// -- 3. diagnostics_accumulate_across_operators --------------------------------

#[test]
fn diagnostics_accumulate_across_operators() {
    let mut graph = OperatorGraph::new();

    for name in ["a", "b", "c"] {
        let id = graph.add_operator_named("test::Agg", name).unwrap();
        let port = graph
            .invocation_mut(id)
            .add_input(None, schema("v: int64"))
            .unwrap();
        graph.input_port_mut(port).sliding().unwrap();
        // neither eviction nor trigger configured
    }

    let report = graph.compile_checks(false).unwrap();
    assert_eq!(report.error_count(), 3);
    assert_eq!(report.warning_count(), 3);

    // insertion order is preserved in the report
    let ops: Vec<&str> = report
        .diagnostics()
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.operator.as_str())
        .collect();
    assert_eq!(ops, ["a", "b", "c"]);
}
