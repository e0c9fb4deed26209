pub mod schema;
pub mod value;

pub use schema::{Attribute, Schema};
pub use value::{AttributeType, Value};
