//! # Integration Scenarios
//!
//! Every scenario starts its own nodes on ephemeral loopback ports, so the
//! modules run in parallel without sharing state.

#[cfg(test)]
pub(crate) mod harness;

#[cfg(test)]
mod catch_up;
#[cfg(test)]
mod churn;
#[cfg(test)]
mod propagation;
