//! CLI command handling

pub mod common;
pub mod listen;
pub mod output;
pub mod probe;
pub mod show_config;

pub use common::ServerArgs;
pub use listen::{handle_listen, ListenArgs};
pub use output::{format_event, format_output};
pub use probe::{handle_probe, ProbeArgs};
pub use show_config::{handle_config, ConfigArgs};
