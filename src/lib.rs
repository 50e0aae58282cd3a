//! Canopy: Filtered Configuration Queries
//!
//! The query core of a network configuration server: a path-addressed
//! leaf store with schema-derived defaults, subtree and path selection
//! filters, with-defaults disclosure modes, and transparent forwarding
//! to remote stores mounted beneath list instances.

pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod path;
pub mod proxy;
pub mod query;
pub mod render;
pub mod schema;
pub mod store;

pub use error::{ErrorTag, QueryError};
pub use filter::{Filter, FilterNode};
pub use path::TreePath;
pub use query::{QueryEngine, QueryOutcome, QueryRequest};
pub use render::{DataNode, WithDefaults};
