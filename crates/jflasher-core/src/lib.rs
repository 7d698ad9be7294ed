//! jflasher-core - Scripted J-Link bring-up and flashing sessions
//!
//! This crate turns a J-Link Commander style script into a sequence of driver
//! calls against a debug probe. The probe driver itself (the vendor SDK) sits
//! behind the [`driver::ProbeDriver`] and [`driver::DriverLibrary`] traits;
//! everything above that boundary lives here.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────────────┐
//! │   script   │──▶│   dispatch   │──▶│    connection     │
//! │  (parser)  │   │ (run/engine) │   │ (probe handshake) │
//! └────────────┘   └──────┬───────┘   └─────────┬─────────┘
//!                         │                     │
//!                         ▼                     ▼
//!                  ┌─────────────┐       ┌─────────────┐
//!                  │   report    │◀──────│   handle    │◀── loader
//!                  │ (StepResult)│       │ (DriverHandle)
//!                  └─────────────┘       └─────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use jflasher_core::engine::Engine;
//!
//! let mut engine = Engine::open(&library, Some(dll.as_path()), None)?;
//! let ok = engine.run_script("bringup.jlink".as_ref(), None, None);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod driver;
pub mod engine;
pub mod error;
pub mod handle;
pub mod loader;
pub mod platform;
pub mod report;
pub mod script;

pub use error::{AddressError, DriverError, LoadError, ScriptError};
