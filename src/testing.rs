//! Host-side test support: a [`Platform`] that records instead of executing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use x86_64::structures::gdt::SegmentSelector;

use crate::arch::{Cpu, DescriptorTablePointer, PortIo};

/// Base of the fake entry stubs, one every 16 bytes.
pub const TRAMPOLINE_BASE: u32 = 0x0010_0000;
pub const IGNORE_TRAMPOLINE: u32 = 0x0010_2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Write { port: u16, value: u8, slow: bool },
    Read { port: u16 },
    LoadGdt { limit: u16, base: u32 },
    LoadIdt { limit: u16, base: u32 },
    ReloadSegments { code: u16, data: u16 },
    EnableInterrupts,
    DisableInterrupts,
}

#[derive(Default)]
pub struct MockPlatform {
    events: Mutex<Vec<Event>>,
    ports: Mutex<HashMap<u16, u8>>,
    interrupts: AtomicBool,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Preloads the value the next reads of `port` return.
    pub fn set_port(&self, port: u16, value: u8) {
        self.ports.lock().unwrap().insert(port, value);
    }

    /// Bytes written to `port`, in order.
    pub fn written_to(&self, port: u16) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Write { port: p, value, .. } if p == port => Some(value),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl PortIo for MockPlatform {
    unsafe fn write_byte(&self, port: u16, value: u8) {
        self.ports.lock().unwrap().insert(port, value);
        self.record(Event::Write {
            port,
            value,
            slow: false,
        });
    }

    unsafe fn read_byte(&self, port: u16) -> u8 {
        self.record(Event::Read { port });
        self.ports.lock().unwrap().get(&port).copied().unwrap_or(0)
    }

    unsafe fn write_byte_slow(&self, port: u16, value: u8) {
        self.ports.lock().unwrap().insert(port, value);
        self.record(Event::Write {
            port,
            value,
            slow: true,
        });
    }
}

impl Cpu for MockPlatform {
    unsafe fn load_gdt(&self, pointer: &DescriptorTablePointer) {
        self.record(Event::LoadGdt {
            limit: pointer.limit,
            base: pointer.base,
        });
    }

    unsafe fn load_idt(&self, pointer: &DescriptorTablePointer) {
        self.record(Event::LoadIdt {
            limit: pointer.limit,
            base: pointer.base,
        });
    }

    unsafe fn reload_segment_registers(&self, code: SegmentSelector, data: SegmentSelector) {
        self.record(Event::ReloadSegments {
            code: code.0,
            data: data.0,
        });
    }

    fn enable_interrupts(&self) {
        self.interrupts.store(true, Ordering::SeqCst);
        self.record(Event::EnableInterrupts);
    }

    fn disable_interrupts(&self) {
        self.interrupts.store(false, Ordering::SeqCst);
        self.record(Event::DisableInterrupts);
    }

    fn interrupts_enabled(&self) -> bool {
        self.interrupts.load(Ordering::SeqCst)
    }

    fn interrupt_trampoline(&self, vector: u8) -> u32 {
        TRAMPOLINE_BASE + u32::from(vector) * 16
    }

    fn ignore_trampoline(&self) -> u32 {
        IGNORE_TRAMPOLINE
    }
}

static ACTIVE_LOCK: Mutex<()> = Mutex::new(());

/// Serialises tests that activate a manager, since only one can be active.
pub fn lock_active() -> MutexGuard<'static, ()> {
    ACTIVE_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
