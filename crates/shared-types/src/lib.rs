//! # Shared Types Crate
//!
//! Chain entities exchanged between the peer network, the chain host and
//! the storage collaborators.
//!
//! ## Design Principles
//!
//! - **Opaque identifiers**: block ids are raw bytes. The network never
//!   interprets them beyond equality.
//! - **Pluggable transactions**: a transaction body is any type implementing
//!   [`TransactionType`]. The concrete type travels as a numeric tag and is
//!   rebuilt by whoever registered that tag.

pub mod entities;
pub mod errors;
pub mod transactions;

pub use entities::*;
pub use errors::*;
pub use transactions::*;
