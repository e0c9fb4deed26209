use orion_error::prelude::*;

use fg_schema::Schema;

use crate::error::{GraphReason, GraphResult};
use crate::port::{InputPortRef, OutputPortRef};

// ---------------------------------------------------------------------------
// StreamConnection
// ---------------------------------------------------------------------------

/// Handle to a stream connection within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub(crate) usize);

impl ConnectionId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A directed edge from an output port to an input port.
///
/// Owned solely by the [`ConnectionRegistry`]; ports keep
/// [`ConnectionId`] back-references for enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConnection {
    from: OutputPortRef,
    to: InputPortRef,
}

impl StreamConnection {
    pub fn from(&self) -> OutputPortRef {
        self.from
    }

    pub fn to(&self) -> InputPortRef {
        self.to
    }
}

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

/// The single owner of all stream connections in a graph.
///
/// Edge legality is enforced at creation: schemas must be assignable,
/// and an input port accepts at most one producer. Reconnecting an
/// existing (from, to) pair is idempotent.
#[derive(Default)]
pub struct ConnectionRegistry {
    edges: Vec<StreamConnection>,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("edge_count", &self.edges.len())
            .finish()
    }
}

/// Result of [`ConnectionRegistry::connect`]: the edge id plus whether a
/// new edge was created (false for an idempotent reconnect).
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectOutcome {
    pub id: ConnectionId,
    pub created: bool,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and record an edge. The caller supplies the two port
    /// schemas; back-reference bookkeeping on the ports stays with the
    /// caller, keyed off `created`.
    pub(crate) fn connect(
        &mut self,
        from: OutputPortRef,
        from_schema: &Schema,
        to: InputPortRef,
        to_schema: &Schema,
    ) -> GraphResult<ConnectOutcome> {
        if !to_schema.is_assignable_from(from_schema) {
            return StructError::from(GraphReason::SchemaMismatch)
                .with_detail(format!(
                    "input schema `{to_schema}` does not match output schema `{from_schema}`"
                ))
                .err();
        }

        if let Some(id) = self.find(from, to) {
            return Ok(ConnectOutcome { id, created: false });
        }

        if let Some(existing) = self.producer_of(to) {
            return StructError::from(GraphReason::AlreadyConnected)
                .with_detail(format!(
                    "input port already has a producer (connection {})",
                    existing.index(),
                ))
                .err();
        }

        let id = ConnectionId(self.edges.len());
        self.edges.push(StreamConnection { from, to });
        Ok(ConnectOutcome { id, created: true })
    }

    /// The existing edge for a (from, to) pair, if any.
    pub(crate) fn find(&self, from: OutputPortRef, to: InputPortRef) -> Option<ConnectionId> {
        self.edges
            .iter()
            .position(|e| e.from == from && e.to == to)
            .map(ConnectionId)
    }

    /// The edge feeding an input port, if any (single-producer model).
    pub(crate) fn producer_of(&self, to: InputPortRef) -> Option<ConnectionId> {
        self.edges.iter().position(|e| e.to == to).map(ConnectionId)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&StreamConnection> {
        self.edges.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConnectionId, &StreamConnection)> {
        self.edges
            .iter()
            .enumerate()
            .map(|(i, e)| (ConnectionId(i), e))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::OpId;

    fn out_ref(op: usize, index: usize) -> OutputPortRef {
        OutputPortRef { op: OpId(op), index }
    }

    fn in_ref(op: usize, index: usize) -> InputPortRef {
        InputPortRef { op: OpId(op), index }
    }

    fn schema(s: &str) -> Schema {
        s.parse().unwrap()
    }

    #[test]
    fn connect_compatible_schemas() {
        let mut reg = ConnectionRegistry::new();
        let s = schema("id: int64");
        let outcome = reg.connect(out_ref(0, 0), &s, in_ref(1, 0), &s).unwrap();
        assert!(outcome.created);
        assert_eq!(reg.len(), 1);

        let edge = reg.get(outcome.id).unwrap();
        assert_eq!(edge.from(), out_ref(0, 0));
        assert_eq!(edge.to(), in_ref(1, 0));
    }

    #[test]
    fn connect_incompatible_schemas() {
        let mut reg = ConnectionRegistry::new();
        let err = reg
            .connect(
                out_ref(0, 0),
                &schema("id: int64"),
                in_ref(1, 0),
                &schema("id: int32"),
            )
            .unwrap_err();
        assert!(format!("{err:?}").contains("SchemaMismatch"));
        assert!(reg.is_empty());
    }

    #[test]
    fn reconnect_same_pair_is_idempotent() {
        let mut reg = ConnectionRegistry::new();
        let s = schema("id: int64");
        let first = reg.connect(out_ref(0, 0), &s, in_ref(1, 0), &s).unwrap();
        let second = reg.connect(out_ref(0, 0), &s, in_ref(1, 0), &s).unwrap();
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn second_producer_rejected() {
        let mut reg = ConnectionRegistry::new();
        let s = schema("id: int64");
        reg.connect(out_ref(0, 0), &s, in_ref(2, 0), &s).unwrap();
        let err = reg
            .connect(out_ref(1, 0), &s, in_ref(2, 0), &s)
            .unwrap_err();
        assert!(format!("{err:?}").contains("AlreadyConnected"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn fan_out_allowed() {
        let mut reg = ConnectionRegistry::new();
        let s = schema("id: int64");
        reg.connect(out_ref(0, 0), &s, in_ref(1, 0), &s).unwrap();
        reg.connect(out_ref(0, 0), &s, in_ref(2, 0), &s).unwrap();
        assert_eq!(reg.len(), 2);
    }
}
