//! avm: runtime core of a small stack-based bytecode virtual machine.
//!
//! A [`vm::Context`] owns a zero-defaulted, auto-growing heap, an operand stack and
//! a call stack. Programs come in as flat word images ([`loader`]), an external
//! [`exec::Interpreter`] drives the context, and [`listing`] renders heap ranges for
//! debugging. Failures are [`vm::VmError`] values, rendered for humans or tools by
//! [`diagnostic`].

pub mod config;
pub mod diagnostic;
pub mod exec;
pub mod listing;
pub mod loader;
pub mod logging;
pub mod vm;

pub use config::Config;
pub use vm::{Addr, Context, VmError, Word};
