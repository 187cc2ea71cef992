//! Job execution side of the service.
//!
//! [`JobDispatcher`] pulls jobs off the queue and runs each one through the
//! pipeline, recording `running` and then exactly one terminal status.

pub mod config;
pub mod dispatcher;

pub use config::WorkerConfig;
pub use dispatcher::JobDispatcher;
