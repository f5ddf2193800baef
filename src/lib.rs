//! mcp-bridge: expose Model Context Protocol server tools to agent frameworks.
//!
//! Connect to one or more MCP servers, translate their tool schemas and wrap
//! every remote tool in the tool shape a framework expects. Sessions run on
//! background threads for synchronous callers, or on the caller's runtime in
//! async code.
//!
//! # Quick Start
//!
//! ```no_run
//! use mcp_bridge::prelude::*;
//!
//! # fn example() -> mcp_bridge::error::Result<()> {
//! let servers = vec![ServerDescriptor::stdio("uvx", ["mcp-server-time"])];
//! let mut toolset = McpToolset::connect(servers, &PassthroughAdapter, AggregateOptions::default())?;
//! for tool in toolset.tools() {
//!     println!("{}", tool.name());
//! }
//! toolset.close();
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod auth;
pub mod config;
pub mod error;
pub mod mcp;
pub mod prelude;
pub mod schema;
pub mod tools;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
