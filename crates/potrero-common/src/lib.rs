//! ---
//! ipc_section: "01-core-functionality"
//! ipc_subsection: "module"
//! ipc_type: "source"
//! ipc_scope: "code"
//! ipc_description: "Shared configuration and logging for node binaries."
//! ipc_version: "v0.1.0"
//! ipc_owner: "tbd"
//! ---
//! Shared plumbing for Potrero node binaries: configuration loading and
//! tracing initialization.

#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub use config::{AppConfig, BrokerConfig, LoggingConfig};
pub use logging::{init_tracing, LogFormat};
