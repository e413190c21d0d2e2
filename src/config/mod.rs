//! Configuration layer for the urlclient binary.
//!
//! This module provides:
//! - CLI argument parsing ([`Cli`], [`Command`])
//! - TOML configuration file parsing ([`TomlConfig`])
//! - Validated configuration ([`ValidatedConfig`]) that builds the
//!   [`Request`](crate::message::Request) and
//!   [`ResponseHandler`](crate::handler::ResponseHandler) for one run
//! - Configuration file generation ([`write_default_config`])
//! - Default values ([`defaults`])
//!
//! # Priority
//!
//! Configuration values are resolved with the following priority (highest to lowest):
//!
//! 1. **Explicit CLI arguments** - Values explicitly passed via command line
//! 2. **TOML config file** - Values from the configuration file
//! 3. **Built-in defaults** - Hardcoded default values
//!
//! Headers are merged: TOML headers are applied first and a CLI header with
//! the same name (compared case-insensitively) replaces the TOML value.
//!
//! Acceptable status ranges given on the CLI **replace** the TOML list.
//!
//! # Boolean Flag Semantics
//!
//! `--resume` and `--insecure` use OR semantics: set in either source, the
//! result is `true`. `--no-follow` works the other way round: redirects are
//! followed only if neither the CLI nor `response.follow_redirects = false`
//! disables them.
//!
//! # CLI-Only Options
//!
//! `--query`, `--json` and `--verbose` have no config file counterpart.
//!
//! Paths starting with `~` are expanded to the home directory.

mod cli;
pub mod defaults;
mod error;
mod toml;
mod validated;

#[cfg(test)]
mod toml_tests;

pub use cli::{CachePolicyArg, Cli, Command};
pub use error::{ConfigError, field};
pub use toml::{TomlConfig, default_config_template};
pub use validated::{RequestBody, ValidatedConfig, write_default_config};
