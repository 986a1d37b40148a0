// ABOUTME: Server module for the voxrelay relay
// ABOUTME: Provides the TCP acceptor, client registry, broadcast relay and lifecycle

mod acceptor;
mod cli;
mod config;
mod registry;
mod relay;
mod server;

pub use cli::{init_tracing, ServerArgs};
pub use config::ServerConfig;
pub use registry::{ClientEntry, ClientId, ClientRegistry};
pub use server::{RelayServer, ServerState};
