//! zclient core: configuration, error type, tracing setup and the abstract
//! application event vocabulary delivered by the (external) window layer.
#![forbid(unsafe_code)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod logging;

pub use config::CoreConfig;
pub use error::{Error, Result};
pub use event::{dispatch, AppEvent, EventHandler, EventOutcome};
pub use logging::init_tracing;
