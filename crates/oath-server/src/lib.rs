//! oath-server
//!
//! Async TCP server for the two OTP front-ends:
//! - dynalogin: line protocol, normally over TLS
//! - weblogin: packet protocol inside a security context

pub mod config;
pub mod credentials;
pub mod security;
pub mod tls;
pub mod types;

pub mod dynalogin;
pub mod weblogin;

pub mod server;
