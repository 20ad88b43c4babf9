//! Core graph data structures

mod edge;
mod node;
mod schema;


pub use edge::{EdgeRef, Endpoint, StoredEdge};
pub use node::{
    put, IdentityKey, KeyKind, MatchPolicy, NodeRef, NodeUpsert, Outcome, Properties,
    PropertyValue, StoredNode,
};
pub use schema::{EdgeType, NodeLabel, SchemaError};
