//! Driver loop between a context and an instruction decoder.
//!
//! The opcode set lives with whoever implements [`Interpreter`]; this module only
//! repeats `step` until the program halts or an operation fails.

use tracing::{debug, trace};

use crate::vm::{Context, VmResult, Word};

/// What the driver should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Halt(Word),
}

pub trait Interpreter {
    /// Decode and execute the instruction at `ctx.ins`.
    fn step(&mut self, ctx: &mut Context) -> VmResult<Control>;
}

/// Step `interp` until it halts, returning the halt value.
pub fn run<I: Interpreter + ?Sized>(ctx: &mut Context, interp: &mut I) -> VmResult<Word> {
    let mut steps: u64 = 0;
    loop {
        trace!(ins = ctx.ins, depth = ctx.stack().len(), "step");
        let control = interp.step(ctx).inspect_err(|e| {
            debug!(steps, ins = ctx.ins, error = %e, "program failed");
        })?;
        steps += 1;
        if let Control::Halt(value) = control {
            debug!(steps, value, "program halted");
            return Ok(value);
        }
    }
}
