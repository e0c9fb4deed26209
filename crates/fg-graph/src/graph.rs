use std::collections::HashMap;

use orion_error::prelude::*;

use crate::check::{self, CheckReport};
use crate::connection::{ConnectionId, ConnectionRegistry, StreamConnection};
use crate::error::{GraphReason, GraphResult};
use crate::invocation::{OpId, OperatorInvocation};
use crate::port::{InputPortDecl, InputPortRef, OutputPortDecl, OutputPortRef};

// ---------------------------------------------------------------------------
// OperatorGraph
// ---------------------------------------------------------------------------

/// The top-level registry of operator invocations and stream connections.
///
/// Invocations live in an insertion-ordered arena indexed by [`OpId`];
/// the name map only serves lookup. Insertion order is what makes the
/// compile-check pass deterministic.
///
/// Handle-taking accessors (`invocation`, `input_port`, `connection`,
/// ...) expect handles minted by this graph; passing a handle from a
/// different graph is a caller bug and panics.
#[derive(Default)]
pub struct OperatorGraph {
    invocations: Vec<OperatorInvocation>,
    names: HashMap<String, OpId>,
    connections: ConnectionRegistry,
}

impl std::fmt::Debug for OperatorGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorGraph")
            .field("operator_count", &self.invocations.len())
            .field("connection_count", &self.connections.len())
            .finish()
    }
}

impl OperatorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // -- invocations ---------------------------------------------------------

    /// Add an invocation with a generated name, derived from the trailing
    /// segment of `kind` plus a numeric suffix. Never fails: the
    /// generated name is guaranteed unique within this graph.
    pub fn add_operator(&mut self, kind: &str) -> OpId {
        let name = self.generate_operator_name(kind);
        log::debug!("add operator {name:?} (kind {kind:?})");
        self.insert_invocation(name, kind)
    }

    /// Add an invocation with a caller-supplied name. Fails with
    /// `DuplicateName` when the name is taken.
    pub fn add_operator_named(&mut self, kind: &str, name: &str) -> GraphResult<OpId> {
        if self.names.contains_key(name) {
            return StructError::from(GraphReason::DuplicateName)
                .with_detail(format!("operator name {name:?} already exists"))
                .err();
        }
        log::debug!("add operator {name:?} (kind {kind:?})");
        Ok(self.insert_invocation(name.to_string(), kind))
    }

    fn insert_invocation(&mut self, name: String, kind: &str) -> OpId {
        let id = OpId(self.invocations.len());
        self.names.insert(name.clone(), id);
        self.invocations
            .push(OperatorInvocation::new(id, name, kind.to_string()));
        id
    }

    /// Base the name on the trailing segment of the kind (`spl.utility::
    /// Beacon` → `beacon`), then append the first free `_<n>` suffix.
    fn generate_operator_name(&self, kind: &str) -> String {
        let base = kind
            .rsplit(|c: char| c == ':' || c == '.')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("op")
            .to_lowercase();
        let mut n = 1;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.names.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn invocation(&self, id: OpId) -> &OperatorInvocation {
        &self.invocations[id.0]
    }

    pub fn invocation_mut(&mut self, id: OpId) -> &mut OperatorInvocation {
        &mut self.invocations[id.0]
    }

    pub fn invocation_named(&self, name: &str) -> Option<&OperatorInvocation> {
        self.names.get(name).map(|id| &self.invocations[id.0])
    }

    /// Invocations in insertion order.
    pub fn invocations(&self) -> impl Iterator<Item = &OperatorInvocation> {
        self.invocations.iter()
    }

    pub fn operator_names(&self) -> impl Iterator<Item = &str> {
        self.invocations.iter().map(|inv| inv.name())
    }

    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    // -- ports ---------------------------------------------------------------

    pub fn input_port(&self, port: InputPortRef) -> &InputPortDecl {
        self.invocations[port.op.0]
            .input(port.index)
            .expect("input port handle out of range")
    }

    pub fn input_port_mut(&mut self, port: InputPortRef) -> &mut InputPortDecl {
        self.invocations[port.op.0]
            .input_mut(port.index)
            .expect("input port handle out of range")
    }

    pub fn output_port(&self, port: OutputPortRef) -> &OutputPortDecl {
        self.invocations[port.op.0]
            .output(port.index)
            .expect("output port handle out of range")
    }

    pub fn output_port_mut(&mut self, port: OutputPortRef) -> &mut OutputPortDecl {
        self.invocations[port.op.0]
            .output_mut(port.index)
            .expect("output port handle out of range")
    }

    // -- connections ---------------------------------------------------------

    /// Connect an output port to an input port.
    ///
    /// Fails with `SchemaMismatch` on incompatible schemas and
    /// `AlreadyConnected` when the input already has a different
    /// producer; reconnecting the same pair is idempotent and returns the
    /// existing id. Nothing is mutated on failure.
    pub fn connect(
        &mut self,
        from: OutputPortRef,
        to: InputPortRef,
    ) -> GraphResult<ConnectionId> {
        let from_schema = self.output_port(from).schema().clone();
        let to_schema = self.input_port(to).schema().clone();

        let outcome = self
            .connections
            .connect(from, &from_schema, to, &to_schema)?;
        if outcome.created {
            log::debug!(
                "connect {}:{} -> {}:{}",
                self.invocation(from.op).name(),
                self.output_port(from).name(),
                self.invocation(to.op).name(),
                self.input_port(to).name(),
            );
            self.output_port_mut(from).add_connection(outcome.id);
            self.input_port_mut(to).add_connection(outcome.id);
        }
        Ok(outcome.id)
    }

    /// Connect one output to several inputs, validating every target
    /// before creating any edge, so a failure mutates nothing.
    pub fn connect_all(
        &mut self,
        from: OutputPortRef,
        targets: &[InputPortRef],
    ) -> GraphResult<Vec<ConnectionId>> {
        let from_schema = self.output_port(from).schema().clone();

        // Phase 1: verify all the schemas and producer slots first.
        for &to in targets {
            let to_schema = self.input_port(to).schema();
            if !to_schema.is_assignable_from(&from_schema) {
                return StructError::from(GraphReason::SchemaMismatch)
                    .with_detail(format!(
                        "input schema `{to_schema}` does not match output schema `{from_schema}`"
                    ))
                    .err();
            }
            if self.connections.find(from, to).is_none()
                && self.connections.producer_of(to).is_some()
            {
                return StructError::from(GraphReason::AlreadyConnected)
                    .with_detail(format!(
                        "input port {:?} already has a producer",
                        self.input_port(to).name(),
                    ))
                    .err();
            }
        }

        // Phase 2: create the edges.
        targets.iter().map(|&to| self.connect(from, to)).collect()
    }

    pub fn connection(&self, id: ConnectionId) -> &StreamConnection {
        self.connections
            .get(id)
            .expect("connection handle out of range")
    }

    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &StreamConnection)> {
        self.connections.iter()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // -- compile checks ------------------------------------------------------

    /// Walk every invocation in insertion order and aggregate all window
    /// completeness findings and operator-check results into one report.
    ///
    /// Expected validation failures never surface as `Err`; only an
    /// operator callback that itself fails to run does.
    pub fn compile_checks(&self, verbose: bool) -> GraphResult<CheckReport> {
        let mut report = CheckReport::new();
        for inv in &self.invocations {
            check::check_invocation(inv, verbose, &mut report)?;
        }
        log::info!(
            "compile checks: {} operator(s), {} error(s), {} warning(s)",
            self.invocations.len(),
            report.error_count(),
            report.warning_count(),
        );
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
