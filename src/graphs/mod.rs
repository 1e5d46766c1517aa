//! Graph definition and compilation.
//!
//! [`GraphBuilder`] assembles nodes, static edges, and conditional edges,
//! then [`compile`](GraphBuilder::compile) validates the topology and
//! produces an executable [`App`](crate::app::App). Validation is strict and
//! happens at construction time: every referenced node must exist, the entry
//! edge out of `Start` must be unique, and every conditional edge must
//! declare the full set of targets its predicate can return.
//!
//! # Quick Start
//!
//! ```
//! use mealgraph::graphs::GraphBuilder;
//! use mealgraph::types::NodeKind;
//! use mealgraph::node::{Node, NodeContext, NodePartial, NodeError};
//! use mealgraph::state::StateSnapshot;
//! use async_trait::async_trait;
//!
//! struct MyNode;
//!
//! #[async_trait]
//! impl Node for MyNode {
//!     async fn run(&self, _: StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
//!         Ok(NodePartial::default())
//!     }
//! }
//!
//! // Start (virtual) -> process -> End (virtual)
//! let app = GraphBuilder::new()
//!     .add_node(NodeKind::Custom("process".into()), MyNode)
//!     .add_edge(NodeKind::Start, NodeKind::Custom("process".into()))
//!     .add_edge(NodeKind::Custom("process".into()), NodeKind::End)
//!     .compile()
//!     .unwrap();
//! ```

mod builder;
mod compilation;
mod edges;

pub use builder::GraphBuilder;
pub use compilation::GraphBuildError;
pub use edges::{ConditionalEdge, EdgePredicate, RoutingError};
