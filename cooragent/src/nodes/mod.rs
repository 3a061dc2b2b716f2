//! The five orchestration nodes: coordinator, planner, publisher, factory,
//! and proxy.

mod coordinator;
mod factory;
mod planner;
mod proxy;
mod publisher;

pub use coordinator::CoordinatorNode;
pub use factory::FactoryNode;
pub use planner::PlannerNode;
pub use proxy::ProxyNode;
pub use publisher::PublisherNode;

/// Wrapper for agent output fed back into the conversation so the publisher
/// sees who produced what and moves the plan along.
pub(crate) fn response_message(agent: &str, body: &str) -> String {
    format!("Response from {agent}:\n\n<response>\n{body}\n</response>\n\n*Please execute the next step.*")
}
