//! HTTP implementation of the wizard's submit gateway.
//!
//! The wizard controller in `medicert-core` is transport-agnostic; this
//! crate supplies the one real transport: a single JSON POST to the
//! registry's `/api/submit` endpoint with an explicit bounded timeout.

pub mod gateway;

pub use gateway::HttpSubmitGateway;
