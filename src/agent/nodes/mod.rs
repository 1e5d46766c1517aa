//! The agent's business nodes.

mod approval;
mod executor;
mod order_builder;
mod order_submit;
mod order_validator;
mod preferences;
mod router;
mod vendor_search;

pub use approval::ApprovalNode;
pub use executor::ExecutorNode;
pub use order_builder::OrderBuilderNode;
pub use order_submit::OrderSubmitNode;
pub use order_validator::OrderValidatorNode;
pub use preferences::PreferencesNode;
pub use router::RouterNode;
pub use vendor_search::VendorSearchNode;
