pub mod build;
pub mod logging;
pub mod manifest;
pub mod types;

pub use build::build_graph;
pub use logging::{LogFormat, LoggingConfig};
pub use manifest::TopologyManifest;
pub use types::HumanDuration;
