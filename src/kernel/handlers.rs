//! Handlers the kernel installs at boot.
//!
//! | Vector    | Handler          | Action                                  |
//! |-----------|------------------|-----------------------------------------|
//! | 0-31      | `FaultReporter`  | log breakpoints, panic on other faults  |
//! | IRQ0      | `TimerTick`      | count ticks                             |
//! | IRQ1      | `KeyboardHandler`| read port 0x60, queue the scancode      |

use core::sync::atomic::{AtomicU32, Ordering};

use log::info;

use crate::arch::PortIo;
use crate::drivers::ps2_keyboard::{ScancodeQueue, DATA_PORT};
use crate::interrupts::stubs::SavedState;
use crate::interrupts::InterruptHandler;

pub const BREAKPOINT_VECTOR: u8 = 3;
pub const EXCEPTION_VECTORS: core::ops::Range<u8> = 0..32;

pub struct TimerTick {
    ticks: AtomicU32,
}

impl TimerTick {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU32::new(0),
        }
    }

    pub fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Default for TimerTick {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptHandler for TimerTick {
    fn handle_interrupt(&self, stack_pointer: u32) -> u32 {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        stack_pointer
    }
}

/// Drains the PS/2 data port so the controller keeps raising IRQ 1.
pub struct KeyboardHandler<P: PortIo + Sync + 'static> {
    io: &'static P,
    queue: ScancodeQueue,
}

impl<P: PortIo + Sync + 'static> KeyboardHandler<P> {
    pub const fn new(io: &'static P) -> Self {
        Self {
            io,
            queue: ScancodeQueue::new(),
        }
    }

    pub fn next_scancode(&self) -> Option<u8> {
        self.queue.pop()
    }
}

impl<P: PortIo + Sync + 'static> InterruptHandler for KeyboardHandler<P> {
    fn handle_interrupt(&self, stack_pointer: u32) -> u32 {
        let scancode = unsafe { self.io.read_byte(DATA_PORT) };
        self.queue.push(scancode);
        stack_pointer
    }
}

/// Reports CPU exceptions from the saved register state.
pub struct FaultReporter;

impl FaultReporter {
    /// Resumes from `stack_pointer` after a breakpoint, panics on anything else.
    pub fn report(&self, state: &SavedState, stack_pointer: u32) -> u32 {
        if state.vector == u32::from(BREAKPOINT_VECTOR) {
            info!("breakpoint at {:#010x}", state.eip);
            return stack_pointer;
        }
        panic!(
            "CPU exception {} at {:#06x}:{:#010x}, error code {:#x}",
            state.vector, state.cs, state.eip, state.error_code
        );
    }
}

impl InterruptHandler for FaultReporter {
    fn handle_interrupt(&self, stack_pointer: u32) -> u32 {
        let state = unsafe { SavedState::from_stack_pointer(stack_pointer) };
        self.report(state, stack_pointer)
    }
}
