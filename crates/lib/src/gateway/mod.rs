//! Gateway: the HTTP surface of the bridge.
//!
//! `POST /api/messages` receives Bot Framework activities; `POST /api/messages/send` and
//! `/api/messages/send-execsum` trigger a team broadcast. `GET /` is a health probe.

mod server;

pub use server::{router, run_gateway, run_gateway_with, GatewayState};
