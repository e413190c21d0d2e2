//! urlclient: a poll-driven HTTP client core
//!
//! A library for running HTTP requests through a narrow connection-handle
//! transport, polling them to completion and delivering the body to memory,
//! a caller supplied stream or a resumable file download.

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod time;
pub mod transport;
pub mod uri;
