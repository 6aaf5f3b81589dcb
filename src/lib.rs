//! A peer-to-peer storage overlay node: Kademlia-based peer connectivity
//! under churn, an AEAD-encrypted + Shamir-threshold dispersal protocol, and
//! a pluggable newline-delimited stream-handler framework.

pub mod behaviour;
pub mod bootstrap_store;
pub mod cli;
pub mod config;
pub mod connectivity;
pub mod crypto;
pub mod dispersal;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod network;
pub mod persistence;
pub mod sss;
pub mod streams;

pub use error::{DfsError, DfsResult};
