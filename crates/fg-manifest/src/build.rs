use fg_graph::{InputPortDecl, InputPortRef, OperatorGraph, OutputPortRef};

use crate::manifest::{
    EvictSpec, InputPortSpec, PortPath, TopologyManifest, TriggerSpec, PartitionEvictSpec,
    WindowKindSpec,
};

/// Drive the graph builder API from a resolved manifest.
///
/// Graph-level errors (duplicate names, window-state violations, schema
/// mismatches on connect) surface as `anyhow` errors carrying the
/// operator/port context of the manifest entry that caused them.
pub fn build_graph(manifest: &TopologyManifest) -> anyhow::Result<OperatorGraph> {
    let mut graph = OperatorGraph::new();

    for op in &manifest.operators {
        let id = match &op.name {
            Some(name) => graph
                .add_operator_named(&op.kind, name)
                .map_err(|e| anyhow::anyhow!("operator {name:?}: {e}"))?,
            None => graph.add_operator(&op.kind),
        };

        let op_name = graph.invocation(id).name().to_string();

        for spec in &op.inputs {
            let port = graph
                .invocation_mut(id)
                .add_input_with_mode(spec.name.as_deref(), spec.schema.clone(), spec.mode)
                .map_err(|e| anyhow::anyhow!("operator {op_name:?}: {e}"))?;
            let context = format!(
                "operator {op_name:?} input {:?}",
                graph.input_port(port).name(),
            );
            apply_input_spec(graph.input_port_mut(port), spec)
                .map_err(|e| anyhow::anyhow!("{context}: {e}"))?;
        }

        for spec in &op.outputs {
            graph
                .invocation_mut(id)
                .add_output(spec.name.as_deref(), spec.schema.clone())
                .map_err(|e| anyhow::anyhow!("operator {op_name:?}: {e}"))?;
        }
    }

    for conn in &manifest.connections {
        let from = resolve_output(&graph, &conn.from)?;
        let to = resolve_input(&graph, &conn.to)?;
        graph
            .connect(from, to)
            .map_err(|e| anyhow::anyhow!("connection {} -> {}: {e}", conn.from, conn.to))?;
    }

    Ok(graph)
}

fn apply_input_spec(port: &mut InputPortDecl, spec: &InputPortSpec) -> anyhow::Result<()> {
    if let Some(window) = &spec.window {
        match window.kind {
            WindowKindSpec::Sliding => port.sliding().map(drop),
            WindowKindSpec::Tumbling => port.tumbling().map(drop),
        }
        .map_err(|e| anyhow::anyhow!("{e}"))?;

        if let Some(evict) = &window.evict {
            match evict {
                EvictSpec::Count(n) => port.evict_count(*n).map(drop),
                EvictSpec::Time(d) => port.evict_time(d.as_secs_f64()).map(drop),
                EvictSpec::Punctuation => port.evict_punctuation().map(drop),
                EvictSpec::Delta { attribute, delta } => {
                    port.evict_delta(attribute, delta.clone()).map(drop)
                }
            }
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        }

        if let Some(trigger) = &window.trigger {
            match trigger {
                TriggerSpec::Count(n) => port.trigger_count(*n).map(drop),
                TriggerSpec::Time(d) => port.trigger_time(d.as_secs_f64()).map(drop),
                TriggerSpec::Delta { attribute, delta } => {
                    port.trigger_delta(attribute, delta.clone()).map(drop)
                }
            }
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        }

        if window.partitioned {
            port.partitioned().map_err(|e| anyhow::anyhow!("{e}"))?;
            if let Some(pe) = &window.partition_evict {
                match pe {
                    PartitionEvictSpec::Age(d) => {
                        port.partition_eviction_age(d.as_secs_f64()).map(drop)
                    }
                    PartitionEvictSpec::Partitions(n) => {
                        port.partition_eviction_count(*n).map(drop)
                    }
                    PartitionEvictSpec::Tuples(n) => {
                        port.partition_eviction_tuple_count(*n).map(drop)
                    }
                }
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            }
        }
    }

    if let Some(threaded) = &spec.threaded {
        port.threaded_with(
            threaded.congestion,
            threaded.queue_size,
            threaded.single_threaded,
        )
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    }

    Ok(())
}

fn resolve_output(graph: &OperatorGraph, path: &PortPath) -> anyhow::Result<OutputPortRef> {
    let inv = graph
        .invocation_named(&path.operator)
        .ok_or_else(|| anyhow::anyhow!("connection endpoint {path}: unknown operator"))?;
    let port = inv
        .output_named(&path.port)
        .ok_or_else(|| anyhow::anyhow!("connection endpoint {path}: unknown output port"))?;
    Ok(port.port_ref())
}

fn resolve_input(graph: &OperatorGraph, path: &PortPath) -> anyhow::Result<InputPortRef> {
    let inv = graph
        .invocation_named(&path.operator)
        .ok_or_else(|| anyhow::anyhow!("connection endpoint {path}: unknown operator"))?;
    let port = inv
        .input_named(&path.port)
        .ok_or_else(|| anyhow::anyhow!("connection endpoint {path}: unknown input port"))?;
    Ok(port.port_ref())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
