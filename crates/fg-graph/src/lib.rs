pub mod check;
pub mod connection;
pub mod error;
pub mod graph;
pub mod invocation;
pub mod port;
pub mod window;

pub use check::{CheckDiagnostic, CheckOutcome, CheckReport, OperatorCheck, Severity};
pub use connection::{ConnectionId, StreamConnection};
pub use error::{GraphError, GraphReason, GraphResult};
pub use graph::OperatorGraph;
pub use invocation::{OpId, OperatorInvocation};
pub use port::{
    CongestionPolicy, InputPortDecl, InputPortRef, OutputPortDecl, OutputPortRef, PortWindowMode,
    ThreadedPort,
};
pub use window::{EvictionPolicy, PartitionEviction, TriggerPolicy, WindowConfig, WindowKind};
