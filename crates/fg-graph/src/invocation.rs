use std::collections::BTreeMap;
use std::sync::Arc;

use orion_error::prelude::*;

use fg_schema::{Schema, Value};

use crate::check::OperatorCheck;
use crate::error::{GraphReason, GraphResult};
use crate::port::{InputPortDecl, InputPortRef, OutputPortDecl, OutputPortRef, PortWindowMode};

// ---------------------------------------------------------------------------
// OpId
// ---------------------------------------------------------------------------

/// Handle to an operator invocation within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpId(pub(crate) usize);

impl OpId {
    pub fn index(&self) -> usize {
        self.0
    }
}

// ---------------------------------------------------------------------------
// OperatorInvocation
// ---------------------------------------------------------------------------

/// One instantiated operator within a graph: ordered input and output
/// port declarations, an opaque parameter bag, and an optional
/// operator-supplied compile-check callback.
pub struct OperatorInvocation {
    id: OpId,
    name: String,
    kind: String,
    inputs: Vec<InputPortDecl>,
    outputs: Vec<OutputPortDecl>,
    parameters: BTreeMap<String, Vec<Value>>,
    check: Option<Arc<dyn OperatorCheck>>,
}

impl std::fmt::Debug for OperatorInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorInvocation")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("has_check", &self.check.is_some())
            .finish()
    }
}

impl OperatorInvocation {
    pub(crate) fn new(id: OpId, name: String, kind: String) -> Self {
        Self {
            id,
            name,
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: BTreeMap::new(),
            check: None,
        }
    }

    // -- identity -----------------------------------------------------------

    pub fn id(&self) -> OpId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operator_kind(&self) -> &str {
        &self.kind
    }

    // -- ports --------------------------------------------------------------

    /// Add an input port. The index is the number of input ports declared
    /// before this call; when `name` is `None` a unique `in<i>`-style
    /// name is generated. Fails with `DuplicateName` when a
    /// caller-supplied name is already taken by another port.
    pub fn add_input(&mut self, name: Option<&str>, schema: Schema) -> GraphResult<InputPortRef> {
        self.add_input_with_mode(name, schema, PortWindowMode::default())
    }

    /// Add an input port with an explicit window mode.
    pub fn add_input_with_mode(
        &mut self,
        name: Option<&str>,
        schema: Schema,
        window_mode: PortWindowMode,
    ) -> GraphResult<InputPortRef> {
        let index = self.inputs.len();
        let name = self.resolve_port_name(name, "in", index)?;
        log::debug!(
            "operator {}: add input port {name:?} (index {index})",
            self.name,
        );
        self.inputs
            .push(InputPortDecl::new(self.id, index, name, schema, window_mode));
        Ok(InputPortRef {
            op: self.id,
            index,
        })
    }

    /// Add an output port. Same naming rules as [`Self::add_input`] with
    /// an `out<i>` base.
    pub fn add_output(&mut self, name: Option<&str>, schema: Schema) -> GraphResult<OutputPortRef> {
        let index = self.outputs.len();
        let name = self.resolve_port_name(name, "out", index)?;
        log::debug!(
            "operator {}: add output port {name:?} (index {index})",
            self.name,
        );
        self.outputs
            .push(OutputPortDecl::new(self.id, index, name, schema));
        Ok(OutputPortRef {
            op: self.id,
            index,
        })
    }

    /// Port names share one namespace across both directions: connection
    /// endpoints resolve ports by name, so a duplicate would be
    /// ambiguous. Caller-supplied names must be unused; generated names
    /// start at `<base><index>` and bump the suffix past any name
    /// already taken.
    fn resolve_port_name(
        &self,
        name: Option<&str>,
        base: &str,
        index: usize,
    ) -> GraphResult<String> {
        match name {
            Some(n) => {
                if self.port_name_taken(n) {
                    return StructError::from(GraphReason::DuplicateName)
                        .with_detail(format!(
                            "operator {:?}: port name {n:?} already in use",
                            self.name,
                        ))
                        .err();
                }
                Ok(n.to_string())
            }
            None => Ok(self.generate_port_name(base, index)),
        }
    }

    fn generate_port_name(&self, base: &str, index: usize) -> String {
        let mut n = index;
        loop {
            let candidate = format!("{base}{n}");
            if !self.port_name_taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn port_name_taken(&self, name: &str) -> bool {
        self.inputs.iter().any(|p| p.name() == name)
            || self.outputs.iter().any(|p| p.name() == name)
    }

    pub fn inputs(&self) -> &[InputPortDecl] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputPortDecl] {
        &self.outputs
    }

    pub fn input(&self, index: usize) -> Option<&InputPortDecl> {
        self.inputs.get(index)
    }

    pub fn input_mut(&mut self, index: usize) -> Option<&mut InputPortDecl> {
        self.inputs.get_mut(index)
    }

    pub fn output(&self, index: usize) -> Option<&OutputPortDecl> {
        self.outputs.get(index)
    }

    pub fn output_mut(&mut self, index: usize) -> Option<&mut OutputPortDecl> {
        self.outputs.get_mut(index)
    }

    pub fn input_named(&self, name: &str) -> Option<&InputPortDecl> {
        self.inputs.iter().find(|p| p.name() == name)
    }

    pub fn output_named(&self, name: &str) -> Option<&OutputPortDecl> {
        self.outputs.iter().find(|p| p.name() == name)
    }

    // -- parameters ---------------------------------------------------------

    /// Bind a parameter. Replaces any previous binding of the same name.
    pub fn set_parameter(&mut self, name: &str, values: Vec<Value>) -> &mut Self {
        self.parameters.insert(name.to_string(), values);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&[Value]> {
        self.parameters.get(name).map(Vec::as_slice)
    }

    pub fn parameters(&self) -> &BTreeMap<String, Vec<Value>> {
        &self.parameters
    }

    // -- compile check callback ----------------------------------------------

    /// Register the operator-supplied compile check, run during the
    /// graph-wide check pass.
    pub fn set_check(&mut self, check: Arc<dyn OperatorCheck>) -> &mut Self {
        self.check = Some(check);
        self
    }

    pub(crate) fn check_callback(&self) -> Option<&Arc<dyn OperatorCheck>> {
        self.check.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(s: &str) -> Schema {
        s.parse().unwrap()
    }

    fn invocation() -> OperatorInvocation {
        OperatorInvocation::new(OpId(0), "op_1".into(), "test::Op".into())
    }

    #[test]
    fn port_indices_follow_call_order() {
        let mut inv = invocation();
        let a = inv.add_input(None, schema("v: int64")).unwrap();
        let b = inv.add_input(None, schema("v: int64")).unwrap();
        let c = inv.add_output(None, schema("v: int64")).unwrap();

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(c.index(), 0);
        assert_eq!(inv.input(0).unwrap().name(), "in0");
        assert_eq!(inv.input(1).unwrap().name(), "in1");
        assert_eq!(inv.output(0).unwrap().name(), "out0");
    }

    #[test]
    fn generated_names_avoid_caller_names() {
        let mut inv = invocation();
        inv.add_input(Some("in1"), schema("v: int64")).unwrap();
        inv.add_input(None, schema("v: int64")).unwrap();
        // index 1 is taken by the caller-supplied name, so the generated
        // name bumps past it
        assert_eq!(inv.input(1).unwrap().name(), "in2");
    }

    #[test]
    fn duplicate_caller_port_name_rejected() {
        let mut inv = invocation();
        inv.add_input(Some("in"), schema("v: int64")).unwrap();
        let err = inv.add_input(Some("in"), schema("v: int64")).unwrap_err();
        assert!(format!("{err:?}").contains("DuplicateName"));
        assert_eq!(inv.inputs().len(), 1);

        // one namespace across both directions
        assert!(inv.add_output(Some("in"), schema("v: int64")).is_err());
        assert!(inv.outputs().is_empty());
    }

    #[test]
    fn parameter_replace_semantics() {
        let mut inv = invocation();
        inv.set_parameter("period", vec![Value::Float64(0.1)]);
        inv.set_parameter("period", vec![Value::Float64(0.5)]);
        assert_eq!(inv.parameter("period"), Some(&[Value::Float64(0.5)][..]));
        assert!(inv.parameter("missing").is_none());
    }

    #[test]
    fn lookup_by_name() {
        let mut inv = invocation();
        inv.add_input(Some("left"), schema("v: int64")).unwrap();
        inv.add_output(Some("result"), schema("v: int64")).unwrap();
        assert_eq!(inv.input_named("left").unwrap().index(), 0);
        assert_eq!(inv.output_named("result").unwrap().index(), 0);
        assert!(inv.input_named("right").is_none());
    }
}
