//! Oracle access: the provider port and the bounded, retrying classifier on top of it.

pub mod client;
pub mod port;
