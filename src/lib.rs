//! rpc-fairness - Per-namespace handler fairness for federated RPC routers
//!
//! Decides, per downstream nameservice, whether an incoming call may take
//! one of the router's handlers, and adapts the split of handlers to demand.

pub mod cli;
pub mod config_validator;
pub mod fairness;
