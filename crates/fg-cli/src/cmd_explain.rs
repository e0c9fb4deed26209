use std::path::{Path, PathBuf};

use anyhow::Result;

use fg_graph::OperatorGraph;
use fg_manifest::{TopologyManifest, build_graph};

use crate::tracing_init;

pub fn run(manifest_path: PathBuf) -> Result<()> {
    let manifest = TopologyManifest::load(&manifest_path)?;
    let base_dir = manifest_path.parent().unwrap_or(Path::new("."));
    let _guard = tracing_init::init_tracing(&manifest.logging, base_dir)?;

    let graph = build_graph(&manifest)?;
    print_topology(&graph);
    Ok(())
}

fn print_topology(graph: &OperatorGraph) {
    for inv in graph.invocations() {
        println!("operator {} ({})", inv.name(), inv.operator_kind());

        for port in inv.inputs() {
            let producer = port.connections().first().map(|&id| {
                let edge = graph.connection(id);
                let from = graph.output_port(edge.from());
                format!(
                    "{}.{}",
                    graph.invocation(edge.from().op()).name(),
                    from.name(),
                )
            });

            print!("  in  {}: {}", port.name(), port.schema());
            print!("  [{}]", port.window().describe());
            if let Some(t) = port.threaded() {
                print!(
                    "  [threaded {:?} queue={}{}]",
                    t.congestion,
                    t.queue_size,
                    if t.single_threaded_on_input {
                        " single-threaded"
                    } else {
                        ""
                    },
                );
            }
            match producer {
                Some(p) => println!("  <- {p}"),
                None => println!("  (unconnected)"),
            }
        }

        for port in inv.outputs() {
            let fan_out = port.connections().len();
            println!(
                "  out {}: {}  ({} consumer{})",
                port.name(),
                port.schema(),
                fan_out,
                if fan_out == 1 { "" } else { "s" },
            );
        }

        if !inv.parameters().is_empty() {
            for (name, values) in inv.parameters() {
                let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
                println!("  param {name} = [{}]", rendered.join(", "));
            }
        }
    }

    println!();
    println!("{} connection(s):", graph.connection_count());
    for (_, edge) in graph.connections() {
        println!(
            "  {}.{} -> {}.{}",
            graph.invocation(edge.from().op()).name(),
            graph.output_port(edge.from()).name(),
            graph.invocation(edge.to().op()).name(),
            graph.input_port(edge.to()).name(),
        );
    }
}
