use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use fg_graph::{CongestionPolicy, PortWindowMode};
use fg_schema::{Schema, Value};

use crate::logging::LoggingConfig;
use crate::types::HumanDuration;

// ---------------------------------------------------------------------------
// Raw TOML structure (intermediate representation)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TopologyManifestRaw {
    #[serde(default)]
    schemas: BTreeMap<String, Schema>,
    #[serde(default, rename = "operator")]
    operators: Vec<OperatorRaw>,
    #[serde(default, rename = "connection")]
    connections: Vec<ConnectionRaw>,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
struct OperatorRaw {
    name: Option<String>,
    kind: String,
    #[serde(default, rename = "input")]
    inputs: Vec<InputPortRaw>,
    #[serde(default, rename = "output")]
    outputs: Vec<OutputPortRaw>,
}

#[derive(Debug, Deserialize)]
struct InputPortRaw {
    name: Option<String>,
    /// Name of a `[schemas]` entry.
    schema: String,
    /// `non_windowed` | `optional` (default) | `required`.
    mode: Option<String>,
    /// `sliding` | `tumbling`. Absent = not windowed.
    window: Option<String>,
    /// `count:<n>` | `time:<dur>` | `punct` | `delta:<attr>:<literal>`.
    evict: Option<String>,
    /// `count:<n>` | `time:<dur>` | `delta:<attr>:<literal>`.
    trigger: Option<String>,
    #[serde(default)]
    partitioned: bool,
    /// `age:<dur>` | `partitions:<n>` | `tuples:<n>`.
    partition_evict: Option<String>,
    threaded: Option<ThreadedRaw>,
}

#[derive(Debug, Deserialize)]
struct OutputPortRaw {
    name: Option<String>,
    schema: String,
}

#[derive(Debug, Deserialize)]
struct ThreadedRaw {
    /// `wait` | `drop_first` | `drop_last`.
    congestion: String,
    queue_size: u32,
    #[serde(default)]
    single_threaded: bool,
}

#[derive(Debug, Deserialize)]
struct ConnectionRaw {
    /// `<operator>.<output port>`.
    from: String,
    /// `<operator>.<input port>`.
    to: String,
}

// ---------------------------------------------------------------------------
// TopologyManifest (resolved, validated)
// ---------------------------------------------------------------------------

/// A parsed and reference-checked topology manifest.
///
/// Resolution checks schema references, policy-string syntax, and
/// endpoint formats. Window-state legality (e.g. a trigger on a tumbling
/// window) is left to the graph builder, which owns those rules.
#[derive(Debug)]
pub struct TopologyManifest {
    pub schemas: BTreeMap<String, Schema>,
    pub operators: Vec<OperatorDecl>,
    pub connections: Vec<ConnectionDecl>,
    pub logging: LoggingConfig,
}

#[derive(Debug)]
pub struct OperatorDecl {
    pub name: Option<String>,
    pub kind: String,
    pub inputs: Vec<InputPortSpec>,
    pub outputs: Vec<OutputPortSpec>,
}

#[derive(Debug)]
pub struct InputPortSpec {
    pub name: Option<String>,
    pub schema: Schema,
    pub mode: PortWindowMode,
    pub window: Option<WindowDecl>,
    pub threaded: Option<ThreadedDecl>,
}

#[derive(Debug)]
pub struct OutputPortSpec {
    pub name: Option<String>,
    pub schema: Schema,
}

#[derive(Debug)]
pub struct WindowDecl {
    pub kind: WindowKindSpec,
    pub evict: Option<EvictSpec>,
    pub trigger: Option<TriggerSpec>,
    pub partitioned: bool,
    pub partition_evict: Option<PartitionEvictSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKindSpec {
    Sliding,
    Tumbling,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvictSpec {
    Count(u32),
    Time(HumanDuration),
    Punctuation,
    Delta { attribute: String, delta: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerSpec {
    Count(u32),
    Time(HumanDuration),
    Delta { attribute: String, delta: Value },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PartitionEvictSpec {
    Age(HumanDuration),
    Partitions(u32),
    Tuples(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadedDecl {
    pub congestion: CongestionPolicy,
    pub queue_size: u32,
    pub single_threaded: bool,
}

#[derive(Debug)]
pub struct ConnectionDecl {
    pub from: PortPath,
    pub to: PortPath,
}

/// An `<operator>.<port>` endpoint reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortPath {
    pub operator: String,
    pub port: String,
}

impl std::fmt::Display for PortPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.operator, self.port)
    }
}

impl TopologyManifest {
    /// Read and parse a topology manifest file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }
}

impl FromStr for TopologyManifest {
    type Err = anyhow::Error;

    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let raw: TopologyManifestRaw = toml::from_str(toml_str)?;

        let mut operators = Vec::with_capacity(raw.operators.len());
        for (i, op) in raw.operators.into_iter().enumerate() {
            operators.push(resolve_operator(op, i, &raw.schemas)?);
        }

        let mut connections = Vec::with_capacity(raw.connections.len());
        for conn in raw.connections {
            connections.push(ConnectionDecl {
                from: parse_port_path(&conn.from)?,
                to: parse_port_path(&conn.to)?,
            });
        }

        Ok(TopologyManifest {
            schemas: raw.schemas,
            operators,
            connections,
            logging: raw.logging,
        })
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

fn resolve_operator(
    raw: OperatorRaw,
    index: usize,
    schemas: &BTreeMap<String, Schema>,
) -> anyhow::Result<OperatorDecl> {
    let ctx = raw
        .name
        .clone()
        .unwrap_or_else(|| format!("#{index} ({})", raw.kind));

    let mut inputs = Vec::with_capacity(raw.inputs.len());
    for input in raw.inputs {
        inputs.push(
            resolve_input(input, schemas)
                .map_err(|e| anyhow::anyhow!("operator {ctx}: {e}"))?,
        );
    }

    let mut outputs = Vec::with_capacity(raw.outputs.len());
    for output in raw.outputs {
        let schema = lookup_schema(schemas, &output.schema)?;
        outputs.push(OutputPortSpec {
            name: output.name,
            schema,
        });
    }

    Ok(OperatorDecl {
        name: raw.name,
        kind: raw.kind,
        inputs,
        outputs,
    })
}

fn resolve_input(
    raw: InputPortRaw,
    schemas: &BTreeMap<String, Schema>,
) -> anyhow::Result<InputPortSpec> {
    let schema = lookup_schema(schemas, &raw.schema)?;

    let mode = match raw.mode.as_deref() {
        None => PortWindowMode::Optional,
        Some("non_windowed") => PortWindowMode::NonWindowed,
        Some("optional") => PortWindowMode::Optional,
        Some("required") => PortWindowMode::Required,
        Some(other) => anyhow::bail!(
            "unknown port mode {other:?} (expected non_windowed/optional/required)"
        ),
    };

    let window = match raw.window.as_deref() {
        None => {
            // policy keys are meaningless without a window declaration
            if raw.evict.is_some()
                || raw.trigger.is_some()
                || raw.partitioned
                || raw.partition_evict.is_some()
            {
                anyhow::bail!("window policies given but no `window` declared");
            }
            None
        }
        Some(kind) => {
            let kind = match kind {
                "sliding" => WindowKindSpec::Sliding,
                "tumbling" => WindowKindSpec::Tumbling,
                other => {
                    anyhow::bail!("unknown window kind {other:?} (expected sliding/tumbling)")
                }
            };
            Some(WindowDecl {
                kind,
                evict: raw
                    .evict
                    .as_deref()
                    .map(|s| parse_evict(s, &schema))
                    .transpose()?,
                trigger: raw
                    .trigger
                    .as_deref()
                    .map(|s| parse_trigger(s, &schema))
                    .transpose()?,
                partitioned: raw.partitioned,
                partition_evict: raw
                    .partition_evict
                    .as_deref()
                    .map(parse_partition_evict)
                    .transpose()?,
            })
        }
    };

    let threaded = raw.threaded.map(resolve_threaded).transpose()?;

    Ok(InputPortSpec {
        name: raw.name,
        schema,
        mode,
        window,
        threaded,
    })
}

fn resolve_threaded(raw: ThreadedRaw) -> anyhow::Result<ThreadedDecl> {
    let congestion = match raw.congestion.as_str() {
        "wait" => CongestionPolicy::Wait,
        "drop_first" => CongestionPolicy::DropFirst,
        "drop_last" => CongestionPolicy::DropLast,
        other => anyhow::bail!(
            "unknown congestion policy {other:?} (expected wait/drop_first/drop_last)"
        ),
    };
    Ok(ThreadedDecl {
        congestion,
        queue_size: raw.queue_size,
        single_threaded: raw.single_threaded,
    })
}

fn lookup_schema(schemas: &BTreeMap<String, Schema>, name: &str) -> anyhow::Result<Schema> {
    schemas
        .get(name)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("unknown schema reference {name:?}"))
}

// ---------------------------------------------------------------------------
// Compact policy strings
// ---------------------------------------------------------------------------

fn parse_evict(s: &str, schema: &Schema) -> anyhow::Result<EvictSpec> {
    match split_policy(s) {
        ("count", Some(n)) => Ok(EvictSpec::Count(parse_count(n)?)),
        ("time", Some(d)) => Ok(EvictSpec::Time(d.parse()?)),
        ("punct", None) => Ok(EvictSpec::Punctuation),
        ("delta", Some(rest)) => {
            let (attribute, delta) = parse_delta(rest, schema)?;
            Ok(EvictSpec::Delta { attribute, delta })
        }
        _ => anyhow::bail!(
            "invalid eviction policy {s:?} (expected count:<n>, time:<dur>, punct, or delta:<attr>:<literal>)"
        ),
    }
}

fn parse_trigger(s: &str, schema: &Schema) -> anyhow::Result<TriggerSpec> {
    match split_policy(s) {
        ("count", Some(n)) => Ok(TriggerSpec::Count(parse_count(n)?)),
        ("time", Some(d)) => Ok(TriggerSpec::Time(d.parse()?)),
        ("delta", Some(rest)) => {
            let (attribute, delta) = parse_delta(rest, schema)?;
            Ok(TriggerSpec::Delta { attribute, delta })
        }
        _ => anyhow::bail!(
            "invalid trigger policy {s:?} (expected count:<n>, time:<dur>, or delta:<attr>:<literal>)"
        ),
    }
}

fn parse_partition_evict(s: &str) -> anyhow::Result<PartitionEvictSpec> {
    match split_policy(s) {
        ("age", Some(d)) => Ok(PartitionEvictSpec::Age(d.parse()?)),
        ("partitions", Some(n)) => Ok(PartitionEvictSpec::Partitions(parse_count(n)?)),
        ("tuples", Some(n)) => Ok(PartitionEvictSpec::Tuples(parse_count(n)?)),
        _ => anyhow::bail!(
            "invalid partition eviction policy {s:?} (expected age:<dur>, partitions:<n>, or tuples:<n>)"
        ),
    }
}

fn split_policy(s: &str) -> (&str, Option<&str>) {
    match s.split_once(':') {
        Some((head, rest)) => (head.trim(), Some(rest.trim())),
        None => (s.trim(), None),
    }
}

fn parse_count(s: &str) -> anyhow::Result<u32> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("invalid count {s:?}"))
}

/// `<attr>:<literal>` — the literal is typed by the attribute's schema type.
fn parse_delta(rest: &str, schema: &Schema) -> anyhow::Result<(String, Value)> {
    let (attr, literal) = rest
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("delta policy needs <attr>:<literal>, got {rest:?}"))?;
    let attr = attr.trim();
    let attribute = schema
        .attribute(attr)
        .ok_or_else(|| anyhow::anyhow!("delta attribute {attr:?} not in schema `{schema}`"))?;
    let delta = Value::parse_typed(attribute.ty, literal)?;
    Ok((attr.to_string(), delta))
}

fn parse_port_path(s: &str) -> anyhow::Result<PortPath> {
    let (operator, port) = s
        .split_once('.')
        .ok_or_else(|| anyhow::anyhow!("invalid endpoint {s:?} (expected <operator>.<port>)"))?;
    if operator.is_empty() || port.is_empty() {
        anyhow::bail!("invalid endpoint {s:?} (expected <operator>.<port>)");
    }
    Ok(PortPath {
        operator: operator.to_string(),
        port: port.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_TOML: &str = r#"
[schemas]
events = "ts: timestamp, host: string, bytes: int64"
totals = "host: string, total: int64"

[[operator]]
name = "src"
kind = "net::PacketSource"

  [[operator.output]]
  name = "out"
  schema = "events"

[[operator]]
name = "agg"
kind = "spl.relational::Aggregate"

  [[operator.input]]
  name = "in"
  schema = "events"
  window = "sliding"
  evict = "time:60s"
  trigger = "count:100"
  partitioned = true
  partition_evict = "age:1h"
  threaded = { congestion = "drop_first", queue_size = 1000, single_threaded = true }

  [[operator.output]]
  name = "out"
  schema = "totals"

[[operator]]
name = "sink"
kind = "io::FileSink"

  [[operator.input]]
  name = "in"
  schema = "totals"

[[connection]]
from = "src.out"
to = "agg.in"

[[connection]]
from = "agg.out"
to = "sink.in"

[logging]
level = "debug"
format = "json"
"#;

    const MINIMAL_TOML: &str = r#"
[schemas]
t = "v: int64"

[[operator]]
kind = "test::Op"

  [[operator.input]]
  schema = "t"
"#;

    #[test]
    fn load_full_toml() {
        let m: TopologyManifest = FULL_TOML.parse().unwrap();

        assert_eq!(m.schemas.len(), 2);
        assert_eq!(m.operators.len(), 3);
        assert_eq!(m.connections.len(), 2);

        let agg = &m.operators[1];
        assert_eq!(agg.name.as_deref(), Some("agg"));
        let input = &agg.inputs[0];
        assert_eq!(input.mode, PortWindowMode::Optional);

        let window = input.window.as_ref().unwrap();
        assert_eq!(window.kind, WindowKindSpec::Sliding);
        assert_eq!(
            window.evict,
            Some(EvictSpec::Time("60s".parse().unwrap())),
        );
        assert_eq!(window.trigger, Some(TriggerSpec::Count(100)));
        assert!(window.partitioned);
        assert_eq!(
            window.partition_evict,
            Some(PartitionEvictSpec::Age("1h".parse().unwrap())),
        );

        let threaded = input.threaded.unwrap();
        assert_eq!(threaded.congestion, CongestionPolicy::DropFirst);
        assert_eq!(threaded.queue_size, 1000);
        assert!(threaded.single_threaded);

        assert_eq!(m.connections[0].from.to_string(), "src.out");
        assert_eq!(m.connections[0].to.to_string(), "agg.in");

        assert_eq!(m.logging.level, "debug");
        assert_eq!(m.logging.format, crate::logging::LogFormat::Json);
    }

    #[test]
    fn load_minimal_toml() {
        let m: TopologyManifest = MINIMAL_TOML.parse().unwrap();
        assert_eq!(m.operators.len(), 1);
        assert!(m.operators[0].name.is_none());
        assert!(m.operators[0].inputs[0].window.is_none());
        assert_eq!(m.logging.level, "info");
    }

    #[test]
    fn delta_literal_typed_by_schema() {
        let toml = r#"
[schemas]
t = "seq: int64"

[[operator]]
kind = "test::Op"

  [[operator.input]]
  schema = "t"
  window = "tumbling"
  evict = "delta:seq:500"
"#;
        let m: TopologyManifest = toml.parse().unwrap();
        let window = m.operators[0].inputs[0].window.as_ref().unwrap();
        assert_eq!(
            window.evict,
            Some(EvictSpec::Delta {
                attribute: "seq".into(),
                delta: Value::Int64(500),
            }),
        );
    }

    #[test]
    fn reject_unknown_schema_reference() {
        let toml = r#"
[[operator]]
kind = "test::Op"

  [[operator.input]]
  schema = "missing"
"#;
        let err = toml.parse::<TopologyManifest>().unwrap_err().to_string();
        assert!(err.contains("unknown schema"), "{err}");
    }

    #[test]
    fn reject_policy_without_window() {
        let toml = r#"
[schemas]
t = "v: int64"

[[operator]]
kind = "test::Op"

  [[operator.input]]
  schema = "t"
  evict = "count:10"
"#;
        let err = toml.parse::<TopologyManifest>().unwrap_err().to_string();
        assert!(err.contains("no `window`"), "{err}");
    }

    #[test]
    fn reject_unknown_window_kind() {
        let toml = r#"
[schemas]
t = "v: int64"

[[operator]]
kind = "test::Op"

  [[operator.input]]
  schema = "t"
  window = "hopping"
"#;
        let err = toml.parse::<TopologyManifest>().unwrap_err().to_string();
        assert!(err.contains("window kind"), "{err}");
    }

    #[test]
    fn reject_bad_policy_strings() {
        for (key, value) in [
            ("evict", "count:abc"),
            ("evict", "bytes:100"),
            ("trigger", "punct"),
            ("partition_evict", "age:5x"),
        ] {
            let toml = format!(
                r#"
[schemas]
t = "v: int64"

[[operator]]
kind = "test::Op"

  [[operator.input]]
  schema = "t"
  window = "tumbling"
  {key} = "{value}"
"#
            );
            assert!(
                toml.parse::<TopologyManifest>().is_err(),
                "{key} = {value} should be rejected"
            );
        }
    }

    #[test]
    fn reject_bad_endpoint() {
        let toml = r#"
[schemas]
t = "v: int64"

[[connection]]
from = "srcout"
to = "sink.in"
"#;
        let err = toml.parse::<TopologyManifest>().unwrap_err().to_string();
        assert!(err.contains("endpoint"), "{err}");
    }

    #[test]
    fn reject_unknown_delta_attribute() {
        let toml = r#"
[schemas]
t = "v: int64"

[[operator]]
kind = "test::Op"

  [[operator.input]]
  schema = "t"
  window = "tumbling"
  evict = "delta:missing:5"
"#;
        let err = toml.parse::<TopologyManifest>().unwrap_err().to_string();
        assert!(err.contains("delta attribute"), "{err}");
    }
}
