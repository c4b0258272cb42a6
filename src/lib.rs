//! Execution engine for Scratch 3 block scripts.
//!
//! A [`Runtime`] owns the block graph of a loaded project, its sprites and
//! the state they share. The host drives it one frame at a time with
//! [`Runtime::run_threads`] and feeds it input through the event methods
//! ([`Runtime::green_flag`], [`Runtime::press_key`], ...).

pub mod block;
pub mod blocks;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod host;
pub mod json;
pub mod opcode;
pub mod pen;
pub mod project;
pub mod script;
pub mod sprite;
pub mod value;

#[cfg(test)]
mod testing;

pub use block::{BlockId, Graph};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::{Error, Result};
pub use executor::Sweep;
pub use host::{Headless, Host};
pub use opcode::{Progress, Registry, UnknownOpcodePolicy};
pub use project::{Config, Runtime};
pub use sprite::SpriteId;
pub use value::Value;
