//! Domains: the tools and the servers built from them.

pub mod servers;
pub mod tools;
