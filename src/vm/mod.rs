//! Execution context: heap, operand stack and call stack for one program run.
//!
//! A [`Context`] is built once from a program image, mutated only through the
//! operations below, and released when dropped. Every fallible operation returns a
//! [`VmError`] by value; there is no shared last-error slot.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Config;

pub mod alloc;
pub mod call_stack;
pub mod heap;
pub mod stack;

use self::alloc::{AllocError, Allocator, System};
use self::call_stack::{CallStack, Frame};
use self::heap::Heap;
use self::stack::OperandStack;

/// The uniform value type: instructions and data alike.
pub type Word = i64;

/// Unsigned address and capacity type.
pub type Addr = u32;

/// Largest representable address or capacity.
pub const ADDR_MAX: Addr = Addr::MAX;

/// Program images must stay below this many cells.
pub const MAX_PROGRAM_CELLS: usize = (ADDR_MAX / 2) as usize;

/// Which owned buffer an allocation failure hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Heap,
    Stack,
    CallStack,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Heap => write!(f, "heap"),
            Region::Stack => write!(f, "stack"),
            Region::CallStack => write!(f, "call stack"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("unable to allocate {region} ({cells} cells)")]
    Allocation {
        region: Region,
        cells: usize,
        #[source]
        source: AllocError,
    },
    #[error("tried to resize memory to index {location}, but the memory size would overflow")]
    CapacityOverflow { location: Addr },
    #[error("program image needs {cells} heap cells, limit is {limit}")]
    ImageTooLarge { cells: usize, limit: Addr },
    #[error("stack overflow: depth limit of {limit} reached")]
    StackOverflow { limit: Addr },
    #[error("unable to {action} item off stack: stack underrun")]
    StackUnderrun { action: &'static str },
    #[error("call stack overflow: all {capacity} frames in use")]
    CallStackOverflow { capacity: usize },
    #[error("address range {start}+{count} runs past the end of the address space")]
    AddressRange { start: Addr, count: Addr },
    #[error("context is unusable after an earlier allocation failure")]
    Unusable,
}

impl VmError {
    /// Stable diagnostic code, see `diagnostic::registry`.
    pub fn code(&self) -> &'static str {
        match self {
            VmError::Allocation { .. } => "AVM-R001",
            VmError::CapacityOverflow { .. } => "AVM-R002",
            VmError::ImageTooLarge { .. } => "AVM-R003",
            VmError::StackOverflow { .. } => "AVM-R004",
            VmError::StackUnderrun { .. } => "AVM-R005",
            VmError::CallStackOverflow { .. } => "AVM-R006",
            VmError::AddressRange { .. } => "AVM-R007",
            VmError::Unusable => "AVM-R008",
        }
    }

    /// True when the context that produced this error must not be used again.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VmError::Allocation { .. } | VmError::Unusable)
    }
}

pub type VmResult<T> = Result<T, VmError>;

// ── Context ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Context {
    heap: Heap,
    stack: OperandStack,
    call_stack: CallStack,
    /// Instruction pointer, owned by the interpreter.
    pub ins: Addr,
    unusable: bool,
}

impl Context {
    pub fn new(program: &[Word], config: &Config) -> VmResult<Self> {
        Self::with_allocator(program, config, Arc::new(System))
    }

    /// Builds a context whose buffers all draw from `alloc`.
    ///
    /// # Panics
    ///
    /// If `program` has [`MAX_PROGRAM_CELLS`] cells or more. Loaders reject such
    /// images before they get here.
    pub fn with_allocator(
        program: &[Word],
        config: &Config,
        alloc: Arc<dyn Allocator>,
    ) -> VmResult<Self> {
        assert!(
            program.len() < MAX_PROGRAM_CELLS,
            "program image of {} cells does not fit the address space",
            program.len()
        );

        // leave room for program-local data past the image
        let heap_size = program.len() + config.heap_slack as usize;
        if heap_size > config.heap_limit as usize {
            return Err(VmError::ImageTooLarge { cells: heap_size, limit: config.heap_limit });
        }

        let heap = Heap::with_image(alloc.clone(), program, heap_size, config.heap_limit)
            .inspect_err(|e| warn!(error = %e, "context initialization failed"))?;
        let stack = OperandStack::new(alloc.clone(), config.stack_capacity, config.stack_limit)
            .inspect_err(|e| warn!(error = %e, "context initialization failed"))?;
        let call_stack = CallStack::new(alloc, config.call_stack_capacity)
            .inspect_err(|e| warn!(error = %e, "context initialization failed"))?;

        debug!(
            image = program.len(),
            heap = heap_size,
            stack = config.stack_capacity,
            call_stack = config.call_stack_capacity,
            "context initialized"
        );

        Ok(Context { heap, stack, call_stack, ins: 0, unusable: false })
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    pub fn call_stack(&self) -> &CallStack {
        &self.call_stack
    }

    /// False once an allocation has failed; only dropping is meaningful then.
    pub fn is_usable(&self) -> bool {
        !self.unusable
    }

    pub fn heap_get(&self, location: Addr) -> Word {
        self.heap.get(location)
    }

    pub fn heap_set(&mut self, location: Addr, value: Word) -> VmResult<()> {
        self.guarded(|ctx| ctx.heap.set(location, value))
    }

    pub fn push(&mut self, value: Word) -> VmResult<()> {
        self.guarded(|ctx| ctx.stack.push(value))
    }

    pub fn pop(&mut self) -> VmResult<Word> {
        self.guarded(|ctx| ctx.stack.pop())
    }

    pub fn peek(&self) -> VmResult<Word> {
        self.stack.peek()
    }

    pub fn push_frame(&mut self, frame: Frame) -> VmResult<()> {
        self.guarded(|ctx| ctx.call_stack.push(frame))
    }

    pub fn pop_frame(&mut self) -> VmResult<Option<Frame>> {
        self.guarded(|ctx| Ok(ctx.call_stack.pop()))
    }

    pub fn reserve_frames(&mut self, capacity: usize) -> VmResult<()> {
        self.guarded(|ctx| ctx.call_stack.reserve(capacity))
    }

    fn guarded<T>(&mut self, op: impl FnOnce(&mut Self) -> VmResult<T>) -> VmResult<T> {
        if self.unusable {
            return Err(VmError::Unusable);
        }
        let result = op(self);
        if let Err(e) = &result {
            if e.is_fatal() {
                warn!(error = %e, "context marked unusable");
                self.unusable = true;
            }
        }
        result
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        debug!(
            heap = self.heap.size(),
            stack = self.stack.capacity(),
            call_stack = self.call_stack.capacity(),
            "releasing context"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::alloc::Budget;

    fn config() -> Config {
        Config::default()
    }

    fn small_config() -> Config {
        Config { heap_slack: 4, stack_capacity: 2, call_stack_capacity: 2, ..Config::default() }
    }

    #[test]
    fn new_context_layout() {
        let ctx = Context::new(&[10, 20, 30], &config()).unwrap();
        assert_eq!(ctx.heap().size(), 3 + 4096);
        assert_eq!(ctx.stack().capacity(), 4096);
        assert!(ctx.stack().is_empty());
        assert_eq!(ctx.call_stack().capacity(), 256);
        assert!(ctx.call_stack().is_empty());
        assert_eq!(ctx.ins, 0);
        assert!(ctx.is_usable());
    }

    #[test]
    fn image_and_slack_read_back() {
        let ctx = Context::new(&[10, 20, 30], &config()).unwrap();
        assert_eq!(ctx.heap_get(0), 10);
        assert_eq!(ctx.heap_get(1), 20);
        assert_eq!(ctx.heap_get(2), 30);
        assert_eq!(ctx.heap_get(3), 0);
    }

    #[test]
    fn empty_program_has_zeroed_slack() {
        let ctx = Context::new(&[], &config()).unwrap();
        assert_eq!(ctx.heap().size(), 4096);
        assert!((0..4096).all(|i| ctx.heap_get(i) == 0));
    }

    #[test]
    fn image_beyond_heap_limit() {
        let cfg = Config { heap_limit: 8, heap_slack: 4, ..Config::default() };
        let err = Context::new(&[1; 5], &cfg).unwrap_err();
        assert!(matches!(err, VmError::ImageTooLarge { cells: 9, limit: 8 }));
    }

    #[test]
    fn failed_stack_allocation_releases_heap() {
        // heap fits, stack does not
        let alloc = Arc::new(Budget::new(8 * 8));
        let cfg = Config { heap_slack: 8, stack_capacity: 4, ..small_config() };
        let err = Context::with_allocator(&[], &cfg, alloc.clone()).unwrap_err();
        assert!(matches!(err, VmError::Allocation { region: Region::Stack, .. }));
        assert_eq!(alloc.in_use(), 0);
    }

    #[test]
    fn failed_call_stack_allocation_releases_everything() {
        let alloc = Arc::new(Budget::new(6 * 8));
        let cfg = small_config();
        let err = Context::with_allocator(&[], &cfg, alloc.clone()).unwrap_err();
        assert!(matches!(err, VmError::Allocation { region: Region::CallStack, .. }));
        assert_eq!(alloc.in_use(), 0);
    }

    #[test]
    fn drop_releases_all_buffers() {
        let alloc = Arc::new(Budget::new(1 << 20));
        {
            let mut ctx = Context::with_allocator(&[1, 2], &small_config(), alloc.clone()).unwrap();
            ctx.heap_set(1000, 3).unwrap();
            for v in 0..10 {
                ctx.push(v).unwrap();
            }
            assert!(alloc.in_use() > 0);
        }
        assert_eq!(alloc.in_use(), 0);
    }

    #[test]
    fn stack_scenario() {
        let mut ctx = Context::new(&[10, 20, 30], &config()).unwrap();
        ctx.push(5).unwrap();
        ctx.push(7).unwrap();
        assert_eq!(ctx.pop().unwrap(), 7);
        assert_eq!(ctx.pop().unwrap(), 5);
        let err = ctx.pop().unwrap_err();
        assert!(matches!(err, VmError::StackUnderrun { .. }));
        // underrun is not fatal
        assert!(ctx.is_usable());
        ctx.push(1).unwrap();
    }

    #[test]
    fn allocation_failure_poisons_context() {
        let alloc = Arc::new(Budget::new(1024));
        let mut ctx = Context::with_allocator(&[], &small_config(), alloc).unwrap();
        let err = ctx.heap_set(1 << 20, 1).unwrap_err();
        assert!(err.is_fatal());
        assert!(!ctx.is_usable());
        assert!(matches!(ctx.push(1), Err(VmError::Unusable)));
        assert!(matches!(ctx.heap_set(0, 1), Err(VmError::Unusable)));
        // reads stay total
        assert_eq!(ctx.heap_get(0), 0);
    }

    #[test]
    fn capacity_overflow_is_not_fatal() {
        let mut ctx = Context::new(&[], &small_config()).unwrap();
        let err = ctx.heap_set(ADDR_MAX, 1).unwrap_err();
        assert!(matches!(err, VmError::CapacityOverflow { location: ADDR_MAX }));
        assert!(ctx.is_usable());
        ctx.heap_set(1, 1).unwrap();
    }

    #[test]
    fn frames_through_context() {
        let mut ctx = Context::new(&[], &small_config()).unwrap();
        let f = Frame { return_addr: 4, stack_base: 1 };
        ctx.push_frame(f).unwrap();
        ctx.push_frame(f).unwrap();
        assert!(matches!(ctx.push_frame(f), Err(VmError::CallStackOverflow { capacity: 2 })));
        ctx.reserve_frames(3).unwrap();
        ctx.push_frame(f).unwrap();
        assert_eq!(ctx.pop_frame().unwrap(), Some(f));
        assert_eq!(ctx.call_stack().len(), 2);
    }

    #[test]
    fn error_codes_are_distinct() {
        let errors = [
            VmError::CapacityOverflow { location: 1 },
            VmError::ImageTooLarge { cells: 1, limit: 0 },
            VmError::StackOverflow { limit: 1 },
            VmError::StackUnderrun { action: "pop" },
            VmError::CallStackOverflow { capacity: 1 },
            VmError::AddressRange { start: 1, count: 1 },
            VmError::Unusable,
        ];
        let mut codes: Vec<_> = errors.iter().map(VmError::code).collect();
        codes.push("AVM-R001");
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 8);
    }

    #[test]
    fn underrun_messages() {
        assert_eq!(
            VmError::StackUnderrun { action: "pop" }.to_string(),
            "unable to pop item off stack: stack underrun"
        );
        assert_eq!(
            VmError::StackUnderrun { action: "read" }.to_string(),
            "unable to read item off stack: stack underrun"
        );
    }
}
