//! Installable interrupt handlers and the per-vector registry behind them.
//!
//! Each vector keeps a short chain of handlers. Installing pushes onto the
//! chain and shadows the previous occupant; removing an entry splices it out,
//! so whichever handler was installed before it becomes visible again.

use core::sync::atomic::{AtomicU32, Ordering};

use spin::Mutex;

use super::idt::IDT_ENTRIES;
use super::manager::{InterruptManager, Registration};
use crate::arch::Platform;
use crate::errors::InterruptError;

/// Deepest chain a single vector can hold.
pub const MAX_CHAIN_DEPTH: usize = 4;

/// Software side of an interrupt vector.
///
/// `stack_pointer` points at the [`SavedState`](super::stubs::SavedState)
/// the entry stub pushed. The returned value is the stack the stub resumes
/// from; returning a different one switches contexts.
pub trait InterruptHandler: Sync {
    fn handle_interrupt(&self, stack_pointer: u32) -> u32 {
        stack_pointer
    }

    /// Installs `self` on `vector` of `manager`.
    fn install<'m, P: Platform + 'static>(
        &'static self,
        vector: u8,
        manager: &'m InterruptManager<P>,
    ) -> Result<Registration<'m, P>, InterruptError>
    where
        Self: Sized,
    {
        manager.register(vector, self)
    }
}

/// Identifies one installation so it can be removed out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationId(u32);

#[derive(Clone, Copy)]
struct Entry {
    id: RegistrationId,
    handler: &'static dyn InterruptHandler,
}

#[derive(Clone, Copy)]
struct HandlerChain {
    entries: [Option<Entry>; MAX_CHAIN_DEPTH],
    len: usize,
}

impl HandlerChain {
    const EMPTY: HandlerChain = HandlerChain {
        entries: [None; MAX_CHAIN_DEPTH],
        len: 0,
    };

    fn push(&mut self, entry: Entry) -> bool {
        if self.len == MAX_CHAIN_DEPTH {
            return false;
        }
        self.entries[self.len] = Some(entry);
        self.len += 1;
        true
    }

    fn remove(&mut self, id: RegistrationId) -> bool {
        let Some(pos) = self.entries[..self.len]
            .iter()
            .position(|e| e.is_some_and(|e| e.id == id))
        else {
            return false;
        };

        self.entries.copy_within(pos + 1..self.len, pos);
        self.len -= 1;
        self.entries[self.len] = None;
        true
    }

    fn top(&self) -> Option<&'static dyn InterruptHandler> {
        self.len
            .checked_sub(1)
            .and_then(|i| self.entries[i])
            .map(|e| e.handler)
    }
}

/// Vector to handler-chain map.
pub struct HandlerTable {
    chains: Mutex<[HandlerChain; IDT_ENTRIES]>,
    next_id: AtomicU32,
}

impl HandlerTable {
    pub const fn new() -> Self {
        Self {
            chains: Mutex::new([HandlerChain::EMPTY; IDT_ENTRIES]),
            next_id: AtomicU32::new(1),
        }
    }

    pub fn install(
        &self,
        vector: u8,
        handler: &'static dyn InterruptHandler,
    ) -> Result<RegistrationId, InterruptError> {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut chains = self.chains.lock();
        if chains[usize::from(vector)].push(Entry { id, handler }) {
            Ok(id)
        } else {
            Err(InterruptError::ChainFull { vector })
        }
    }

    /// Removes one installation. Returns `false` if it was already gone.
    pub fn remove(&self, vector: u8, id: RegistrationId) -> bool {
        self.chains.lock()[usize::from(vector)].remove(id)
    }

    /// The handler dispatch currently reaches for `vector`.
    pub fn handler(&self, vector: u8) -> Option<&'static dyn InterruptHandler> {
        self.chains.lock()[usize::from(vector)].top()
    }

    pub fn depth(&self, vector: u8) -> usize {
        self.chains.lock()[usize::from(vector)].len
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}
