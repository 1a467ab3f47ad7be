//! PS/2 keyboard scancode queue.
//!
//! The IRQ 1 handler pushes raw scancodes, the main loop pops them. One
//! producer, one consumer, no locks.

use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

pub const DATA_PORT: u16 = 0x60;

const BUFFER_SIZE: usize = 64;

pub struct ScancodeQueue {
    buffer: [AtomicU8; BUFFER_SIZE],
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl ScancodeQueue {
    pub const fn new() -> Self {
        Self {
            buffer: [const { AtomicU8::new(0) }; BUFFER_SIZE],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Returns `false` and drops the scancode when the queue is full.
    pub fn push(&self, scancode: u8) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let next = (head + 1) % BUFFER_SIZE;
        if next == self.tail.load(Ordering::Acquire) {
            return false;
        }
        self.buffer[head].store(scancode, Ordering::Relaxed);
        self.head.store(next, Ordering::Release);
        true
    }

    pub fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        let scancode = self.buffer[tail].load(Ordering::Relaxed);
        self.tail.store((tail + 1) % BUFFER_SIZE, Ordering::Release);
        Some(scancode)
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }
}

impl Default for ScancodeQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let queue = ScancodeQueue::new();
        assert!(queue.is_empty());
        queue.push(0x1E);
        queue.push(0x9E);
        assert_eq!(queue.pop(), Some(0x1E));
        assert_eq!(queue.pop(), Some(0x9E));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn full_queue_drops() {
        let queue = ScancodeQueue::new();
        for i in 0..BUFFER_SIZE - 1 {
            assert!(queue.push(i as u8));
        }
        assert!(!queue.push(0xFF));
        assert_eq!(queue.pop(), Some(0));
        assert!(queue.push(0xFF));
    }
}
