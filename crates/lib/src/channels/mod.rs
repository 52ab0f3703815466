//! Bot Framework channel service (the "connector").
//!
//! `ConnectorClient` talks to the v3 REST API at a channel's service URL. The two traits are the
//! seams the turn context and broadcaster depend on, so tests can swap in in-memory fakes.

mod connector;
mod traits;

pub use connector::{ConnectorClient, ConnectorError, TeamsClient};
pub use traits::{ActivitySender, TeamsDirectory};
