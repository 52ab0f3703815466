//! Teams bridge core library: Bot Framework schema, authentication, connector client,
//! activity handlers, adapter, team broadcast, and the HTTP gateway.

pub mod adapter;
pub mod auth;
pub mod broadcast;
pub mod channels;
pub mod config;
pub mod gateway;
pub mod handler;
pub mod schema;
pub mod turn;

#[cfg(test)]
pub(crate) mod test_utils;
