//! Shared domain types for the document job service.
//!
//! Holds the job record and its state machine, submission validation, the
//! error taxonomy shared by the gateway and the stores, and the clock
//! abstraction used for record expiry. No I/O lives here.

pub mod clock;
pub mod error;
pub mod job;
pub mod submission;
pub mod types;
