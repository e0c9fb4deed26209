use orion_error::prelude::*;
use serde::{Deserialize, Serialize};

use fg_schema::{Schema, Value};

use crate::connection::ConnectionId;
use crate::error::{GraphReason, GraphResult};
use crate::invocation::OpId;
use crate::window::WindowConfig;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Handle to an input port: owning invocation + port index.
///
/// Handles are only meaningful for the graph that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputPortRef {
    pub(crate) op: OpId,
    pub(crate) index: usize,
}

impl InputPortRef {
    pub fn op(&self) -> OpId {
        self.op
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Handle to an output port: owning invocation + port index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputPortRef {
    pub(crate) op: OpId,
    pub(crate) index: usize,
}

impl OutputPortRef {
    pub fn op(&self) -> OpId {
        self.op
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

// ---------------------------------------------------------------------------
// Port window mode
// ---------------------------------------------------------------------------

/// What the operator's model allows for an input port's window.
///
/// `NonWindowed` ports reject any window declaration; `Required` ports
/// fail compile checks when left unwindowed; `Optional` ports accept
/// either.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortWindowMode {
    NonWindowed,
    #[default]
    Optional,
    Required,
}

// ---------------------------------------------------------------------------
// Threaded port
// ---------------------------------------------------------------------------

/// Backpressure behaviour of a threaded port's queue when full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionPolicy {
    /// Block the upstream producer.
    Wait,
    /// Discard the oldest queued tuple.
    DropFirst,
    /// Discard the incoming tuple.
    DropLast,
}

/// Threaded-port settings. Configuration data for the runtime; this
/// layer only validates and stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadedPort {
    pub congestion: CongestionPolicy,
    pub queue_size: u32,
    pub single_threaded_on_input: bool,
}

// ---------------------------------------------------------------------------
// InputPortDecl
// ---------------------------------------------------------------------------

/// A declared input port: identity, schema, window configuration,
/// optional threaded settings, and connection back-references.
///
/// All window mutators are chainable (`GraphResult<&mut Self>`) and leave
/// the port unchanged on failure.
#[derive(Debug)]
pub struct InputPortDecl {
    name: String,
    index: usize,
    op: OpId,
    schema: Schema,
    window_mode: PortWindowMode,
    window: WindowConfig,
    threaded: Option<ThreadedPort>,
    connections: Vec<ConnectionId>,
}

impl InputPortDecl {
    pub(crate) fn new(
        op: OpId,
        index: usize,
        name: String,
        schema: Schema,
        window_mode: PortWindowMode,
    ) -> Self {
        Self {
            name,
            index,
            op,
            schema,
            window_mode,
            window: WindowConfig::new(),
            threaded: None,
            connections: Vec::new(),
        }
    }

    // -- identity -----------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The invocation owning this port.
    pub fn op(&self) -> OpId {
        self.op
    }

    /// Handle for this port, usable with the owning graph.
    pub fn port_ref(&self) -> InputPortRef {
        InputPortRef {
            op: self.op,
            index: self.index,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn window_mode(&self) -> PortWindowMode {
        self.window_mode
    }

    pub fn window(&self) -> &WindowConfig {
        &self.window
    }

    pub fn threaded(&self) -> Option<&ThreadedPort> {
        self.threaded.as_ref()
    }

    // -- window declaration (chainable) --------------------------------------

    /// Declare a sliding window. Resets any previous window policies.
    pub fn sliding(&mut self) -> GraphResult<&mut Self> {
        self.check_mode_allows_window()?;
        self.window.sliding();
        Ok(self)
    }

    /// Declare a tumbling window. Resets any previous window policies.
    pub fn tumbling(&mut self) -> GraphResult<&mut Self> {
        self.check_mode_allows_window()?;
        self.window.tumbling();
        Ok(self)
    }

    pub fn partitioned(&mut self) -> GraphResult<&mut Self> {
        self.window.set_partitioned()?;
        Ok(self)
    }

    pub fn evict_count(&mut self, count: u32) -> GraphResult<&mut Self> {
        self.window.set_evict_count(count)?;
        Ok(self)
    }

    pub fn evict_time(&mut self, seconds: f64) -> GraphResult<&mut Self> {
        self.window.set_evict_time(seconds)?;
        Ok(self)
    }

    pub fn evict_punctuation(&mut self) -> GraphResult<&mut Self> {
        self.window.set_evict_punctuation()?;
        Ok(self)
    }

    pub fn evict_delta(&mut self, attribute: &str, delta: Value) -> GraphResult<&mut Self> {
        // State gate first so a non-windowed port reports InvalidState even
        // when the delta arguments are also bad.
        self.window.check_windowed()?;
        self.check_delta_arguments(attribute, &delta)?;
        self.window.set_evict_delta(attribute.to_string(), delta)?;
        Ok(self)
    }

    pub fn trigger_count(&mut self, count: u32) -> GraphResult<&mut Self> {
        self.window.set_trigger_count(count)?;
        Ok(self)
    }

    pub fn trigger_time(&mut self, seconds: f64) -> GraphResult<&mut Self> {
        self.window.set_trigger_time(seconds)?;
        Ok(self)
    }

    pub fn trigger_delta(&mut self, attribute: &str, delta: Value) -> GraphResult<&mut Self> {
        self.window.check_sliding()?;
        self.check_delta_arguments(attribute, &delta)?;
        self.window.set_trigger_delta(attribute.to_string(), delta)?;
        Ok(self)
    }

    pub fn partition_eviction_age(&mut self, seconds: f64) -> GraphResult<&mut Self> {
        self.window.set_partition_eviction_age(seconds)?;
        Ok(self)
    }

    pub fn partition_eviction_count(&mut self, count: u32) -> GraphResult<&mut Self> {
        self.window.set_partition_eviction_count(count)?;
        Ok(self)
    }

    pub fn partition_eviction_tuple_count(&mut self, count: u32) -> GraphResult<&mut Self> {
        self.window.set_partition_eviction_tuple_count(count)?;
        Ok(self)
    }

    // -- threaded port --------------------------------------------------------

    /// Declare the port as threaded: tuples are queued and delivered on a
    /// dedicated thread, with `congestion` governing the full-queue
    /// behaviour. Independent of windowing.
    pub fn threaded_with(
        &mut self,
        congestion: CongestionPolicy,
        queue_size: u32,
        single_threaded_on_input: bool,
    ) -> GraphResult<&mut Self> {
        if queue_size == 0 {
            return StructError::from(GraphReason::InvalidArgument)
                .with_detail(format!(
                    "port {:?}: threaded queue size must be > 0",
                    self.name,
                ))
                .err();
        }
        self.threaded = Some(ThreadedPort {
            congestion,
            queue_size,
            single_threaded_on_input,
        });
        Ok(self)
    }

    // -- connections ----------------------------------------------------------

    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    pub fn connections(&self) -> &[ConnectionId] {
        &self.connections
    }

    pub(crate) fn add_connection(&mut self, id: ConnectionId) {
        if !self.connections.contains(&id) {
            self.connections.push(id);
        }
    }

    // -- checks ---------------------------------------------------------------

    fn check_mode_allows_window(&self) -> GraphResult<()> {
        if self.window_mode == PortWindowMode::NonWindowed {
            return StructError::from(GraphReason::InvalidState)
                .with_detail(format!(
                    "port {:?} does not allow a window configuration",
                    self.name,
                ))
                .err();
        }
        Ok(())
    }

    /// A delta policy compares consecutive values of one attribute, so the
    /// attribute must exist in the port schema, the threshold must have
    /// the attribute's type, and the type must be ordered.
    fn check_delta_arguments(&self, attribute: &str, delta: &Value) -> GraphResult<()> {
        let Some(attr) = self.schema.attribute(attribute) else {
            return StructError::from(GraphReason::InvalidArgument)
                .with_detail(format!(
                    "port {:?}: delta attribute {attribute:?} does not exist in schema `{}`",
                    self.name, self.schema,
                ))
                .err();
        };
        if attr.ty != delta.attribute_type() {
            return StructError::from(GraphReason::InvalidArgument)
                .with_detail(format!(
                    "port {:?}: delta value for {attribute:?} has type {}, attribute is {}",
                    self.name,
                    delta.attribute_type(),
                    attr.ty,
                ))
                .err();
        }
        if !attr.ty.is_ordered() {
            return StructError::from(GraphReason::InvalidArgument)
                .with_detail(format!(
                    "port {:?}: attribute {attribute:?} of type {} cannot drive a delta policy",
                    self.name, attr.ty,
                ))
                .err();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// OutputPortDecl
// ---------------------------------------------------------------------------

/// A declared output port: identity, schema, connection back-references.
#[derive(Debug)]
pub struct OutputPortDecl {
    name: String,
    index: usize,
    op: OpId,
    schema: Schema,
    connections: Vec<ConnectionId>,
}

impl OutputPortDecl {
    pub(crate) fn new(op: OpId, index: usize, name: String, schema: Schema) -> Self {
        Self {
            name,
            index,
            op,
            schema,
            connections: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn op(&self) -> OpId {
        self.op
    }

    pub fn port_ref(&self) -> OutputPortRef {
        OutputPortRef {
            op: self.op,
            index: self.index,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    pub fn connections(&self) -> &[ConnectionId] {
        &self.connections
    }

    pub(crate) fn add_connection(&mut self, id: ConnectionId) {
        if !self.connections.contains(&id) {
            self.connections.push(id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
