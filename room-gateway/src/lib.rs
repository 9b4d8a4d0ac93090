//! Gateway serving a shared fact pool: one JSON exchange per operation on
//! the request/response endpoints, plus a duplex `/session` channel that
//! pushes each connection's solution set whenever it changes.

pub mod server;

pub use server::{build_router, GatewayState};
