//! # Interrupt Manager
//!
//! Owns the IDT, the PIC pair and the handler registry, and routes every
//! vector the entry stubs deliver.
//!
//! ## Lifecycle
//!
//! ```text
//!            activate()                     deactivate()
//! Inactive ─────────────▶ Active ──────────────────────▶ Inactive
//!  cli, lidt, remap PIC,           cli, clear active slot
//!  become active, sti              (handlers stay installed)
//! ```
//!
//! Exactly one manager is active at a time. Activating another one
//! replaces it.
//!
//! ## Dispatch
//!
//! 1. Stub pushes state and calls [`handle_interrupt`] with the vector
//! 2. The active manager looks up the newest handler for the vector
//! 3. The handler runs and returns the stack pointer to resume from
//! 4. PIC vectors are acknowledged (slave first when it fired)

use core::sync::atomic::{AtomicU32, Ordering};

use log::{debug, info, warn};
use spin::Mutex;

use super::gdt::GlobalDescriptorTable;
use super::handler::{HandlerTable, InterruptHandler, RegistrationId};
use super::idt::{GateDescriptor, GateType, InterruptDescriptorTable, IDT_ENTRIES};
use super::pic::{ChainedPics, IrqLines};
use crate::arch::Platform;
use crate::config::PicConfig;
use crate::errors::InterruptError;

/// Anything the entry stubs can hand a vector to.
pub trait Dispatcher: Sync {
    fn dispatch(&self, vector: u8, stack_pointer: u32) -> u32;
}

static ACTIVE: Mutex<Option<&'static dyn Dispatcher>> = Mutex::new(None);

fn is_same(dispatcher: &dyn Dispatcher, object: *const ()) -> bool {
    core::ptr::eq(dispatcher as *const dyn Dispatcher as *const (), object)
}

/// Common entry point for every vector.
///
/// Forwards to the active manager, or resumes untouched when none is active.
pub fn handle_interrupt(vector: u8, stack_pointer: u32) -> u32 {
    let active = *ACTIVE.lock();
    match active {
        Some(manager) => manager.dispatch(vector, stack_pointer),
        None => stack_pointer,
    }
}

/// Dispatch counters for one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VectorStats {
    pub dispatched: u32,
    pub unhandled: u32,
}

struct DispatchStats {
    dispatched: [AtomicU32; IDT_ENTRIES],
    unhandled: [AtomicU32; IDT_ENTRIES],
}

impl DispatchStats {
    const fn new() -> Self {
        Self {
            dispatched: [const { AtomicU32::new(0) }; IDT_ENTRIES],
            unhandled: [const { AtomicU32::new(0) }; IDT_ENTRIES],
        }
    }

    fn record_dispatch(&self, vector: u8) {
        self.dispatched[usize::from(vector)].fetch_add(1, Ordering::Relaxed);
    }

    /// Returns `true` the first time `vector` goes unhandled.
    fn record_unhandled(&self, vector: u8) -> bool {
        self.unhandled[usize::from(vector)].fetch_add(1, Ordering::Relaxed) == 0
    }

    fn get(&self, vector: u8) -> VectorStats {
        VectorStats {
            dispatched: self.dispatched[usize::from(vector)].load(Ordering::Relaxed),
            unhandled: self.unhandled[usize::from(vector)].load(Ordering::Relaxed),
        }
    }
}

pub struct InterruptManager<P: Platform + 'static> {
    platform: &'static P,
    idt: InterruptDescriptorTable,
    pics: ChainedPics,
    enabled_lines: IrqLines,
    handlers: HandlerTable,
    stats: DispatchStats,
}

impl<P: Platform + 'static> InterruptManager<P> {
    /// Points every gate at its entry stub through the GDT code segment.
    ///
    /// Nothing touches the hardware until [`activate`](Self::activate).
    pub fn new(platform: &'static P, gdt: &GlobalDescriptorTable, pic: &PicConfig) -> Self {
        let idt = InterruptDescriptorTable::new(gdt.code_segment_selector(), |vector| {
            platform.interrupt_trampoline(vector)
        });
        debug!(
            "IDT built: {} gates, selector {:#06x}",
            IDT_ENTRIES,
            gdt.code_segment_selector().0
        );

        Self {
            platform,
            idt,
            pics: ChainedPics::from_config(pic),
            enabled_lines: pic.enabled_lines,
            handlers: HandlerTable::new(),
            stats: DispatchStats::new(),
        }
    }

    /// Points `vector` straight at the `iret` stub, bypassing dispatch.
    ///
    /// Only possible before the manager is shared, so the live IDT never
    /// changes under the CPU.
    pub fn ignore_vector(&mut self, vector: u8) {
        let gate = *self.idt.gate(vector);
        self.idt.set_gate(
            vector,
            GateDescriptor::new(
                self.platform.ignore_trampoline(),
                gate.selector(),
                gate.privilege_level(),
                GateType::Interrupt,
            ),
        );
        debug!("vector {:#04x} ignored", vector);
    }

    pub fn idt(&self) -> &InterruptDescriptorTable {
        &self.idt
    }

    pub fn pics(&self) -> &ChainedPics {
        &self.pics
    }

    /// Loads the IDT, remaps the PICs and makes this the active manager,
    /// then enables interrupts.
    pub fn activate(&'static self) {
        self.platform.disable_interrupts();

        let previous = ACTIVE.lock().replace(self);
        if let Some(previous) = previous {
            if !is_same(previous, self as *const Self as *const ()) {
                warn!("replacing the active interrupt manager");
            }
        }

        unsafe {
            self.platform.load_idt(&self.idt.pointer());
            self.pics.initialize(self.platform, self.enabled_lines);
        }

        self.platform.enable_interrupts();
        info!("interrupts enabled");
    }

    /// Disables interrupts and stops being the active manager.
    ///
    /// Does nothing if another manager is active. Installed handlers and the
    /// PIC programming are left in place.
    pub fn deactivate(&self) {
        let was_enabled = self.platform.interrupts_enabled();
        self.platform.disable_interrupts();

        let released = {
            let mut active = ACTIVE.lock();
            let is_self = active.is_some_and(|m| is_same(m, self as *const Self as *const ()));
            if is_self {
                *active = None;
            }
            is_self
        };

        // The slot must be unlocked before `sti`, or a pending IRQ spins on it.
        if released {
            info!("interrupts disabled");
        } else if was_enabled {
            self.platform.enable_interrupts();
        }
    }

    pub fn is_active(&self) -> bool {
        self.platform.without_interrupts(|| {
            ACTIVE
                .lock()
                .is_some_and(|m| is_same(m, self as *const Self as *const ()))
        })
    }

    /// Installs `handler` on `vector`, shadowing the current one until the
    /// returned registration is dropped.
    pub fn register(
        &self,
        vector: u8,
        handler: &'static dyn InterruptHandler,
    ) -> Result<Registration<'_, P>, InterruptError> {
        let (id, depth) = self.platform.without_interrupts(|| {
            self.handlers
                .install(vector, handler)
                .map(|id| (id, self.handlers.depth(vector)))
        })?;
        debug!("handler installed on vector {:#04x} (depth {})", vector, depth);

        Ok(Registration {
            manager: self,
            vector,
            id,
        })
    }

    fn unregister(&self, vector: u8, id: RegistrationId) {
        if self
            .platform
            .without_interrupts(|| self.handlers.remove(vector, id))
        {
            debug!("handler removed from vector {:#04x}", vector);
        }
    }

    pub fn has_handler(&self, vector: u8) -> bool {
        self.platform
            .without_interrupts(|| self.handlers.handler(vector).is_some())
    }

    pub fn enable_irq(&self, irq: u8) -> Result<(), InterruptError> {
        self.platform
            .without_interrupts(|| unsafe { self.pics.set_irq_masked(self.platform, irq, false) })
    }

    pub fn disable_irq(&self, irq: u8) -> Result<(), InterruptError> {
        self.platform
            .without_interrupts(|| unsafe { self.pics.set_irq_masked(self.platform, irq, true) })
    }

    pub fn stats(&self, vector: u8) -> VectorStats {
        self.stats.get(vector)
    }

    /// Runs the handler for `vector` and acknowledges the PIC.
    ///
    /// Returns the stack pointer to resume from.
    pub fn do_handle_interrupt(&self, vector: u8, stack_pointer: u32) -> u32 {
        self.stats.record_dispatch(vector);

        let resume = match self.handlers.handler(vector) {
            Some(handler) => handler.handle_interrupt(stack_pointer),
            None => {
                if self.stats.record_unhandled(vector) {
                    warn!("unhandled interrupt {:#04x}", vector);
                }
                stack_pointer
            }
        };

        unsafe { self.pics.notify_end_of_interrupt(self.platform, vector) };
        resume
    }
}

impl<P: Platform + 'static> Dispatcher for InterruptManager<P> {
    fn dispatch(&self, vector: u8, stack_pointer: u32) -> u32 {
        self.do_handle_interrupt(vector, stack_pointer)
    }
}

/// Keeps a handler installed. Dropping it restores the previous handler.
#[must_use = "dropping a Registration uninstalls the handler"]
pub struct Registration<'m, P: Platform + 'static> {
    manager: &'m InterruptManager<P>,
    vector: u8,
    id: RegistrationId,
}

impl<P: Platform + 'static> Registration<'_, P> {
    pub fn vector(&self) -> u8 {
        self.vector
    }

    /// Keeps the handler installed for the rest of the manager's life.
    pub fn leak(self) {
        core::mem::forget(self);
    }
}

impl<P: Platform + 'static> Drop for Registration<'_, P> {
    fn drop(&mut self) {
        self.manager.unregister(self.vector, self.id);
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::AtomicBool;

    use x86_64::structures::gdt::SegmentSelector;

    use super::*;
    use crate::arch::{Cpu, DescriptorTablePointer, PortIo};
    use crate::config::KernelConfig;
    use crate::interrupts::pic::{EOI, MASTER_COMMAND, SLAVE_COMMAND};
    use crate::testing::{self, Event, MockPlatform};

    struct Fixed(u32);

    impl InterruptHandler for Fixed {
        fn handle_interrupt(&self, _stack_pointer: u32) -> u32 {
            self.0
        }
    }

    struct Counting(AtomicU32);

    impl InterruptHandler for Counting {
        fn handle_interrupt(&self, stack_pointer: u32) -> u32 {
            self.0.fetch_add(1, Ordering::SeqCst);
            stack_pointer
        }
    }

    fn manager() -> &'static InterruptManager<MockPlatform> {
        let platform: &'static MockPlatform = Box::leak(Box::new(MockPlatform::new()));
        let config = KernelConfig::DEFAULT;
        let gdt = GlobalDescriptorTable::new(&config.segments).unwrap();
        Box::leak(Box::new(InterruptManager::new(platform, &gdt, &config.pic)))
    }

    fn eoi_count(events: &[Event], port: u16) -> usize {
        events
            .iter()
            .filter(|e| {
                matches!(e, Event::Write { port: p, value, .. } if *p == port && *value == EOI)
            })
            .count()
    }

    #[test]
    fn gates_point_at_trampolines() {
        let manager = manager();
        for vector in 0..=u8::MAX {
            let gate = manager.idt().gate(vector);
            assert!(gate.is_present());
            assert_eq!(gate.selector().0, 0x10);
            assert_eq!(
                gate.handler_address(),
                manager.platform.interrupt_trampoline(vector)
            );
        }
        assert!(manager.platform.events().is_empty());
    }

    #[test]
    fn ignored_vector_points_at_iret_stub() {
        let platform: &'static MockPlatform = Box::leak(Box::new(MockPlatform::new()));
        let config = KernelConfig::DEFAULT;
        let gdt = GlobalDescriptorTable::new(&config.segments).unwrap();
        let mut manager = InterruptManager::new(platform, &gdt, &config.pic);

        manager.ignore_vector(0);

        let gate = manager.idt().gate(0);
        assert_eq!(gate.handler_address(), platform.ignore_trampoline());
        assert_eq!(gate.selector().0, 0x10);
        assert_eq!(gate.gate_type(), Some(GateType::Interrupt));
        assert_eq!(
            manager.idt().gate(1).handler_address(),
            platform.interrupt_trampoline(1)
        );
    }

    #[test]
    fn handler_return_value_is_propagated() {
        static HANDLER: Fixed = Fixed(0xCAFE_0000);
        let manager = manager();
        let _registration = manager.register(0x21, &HANDLER).unwrap();

        assert_eq!(manager.do_handle_interrupt(0x21, 0x0009_F000), 0xCAFE_0000);
    }

    #[test]
    fn handler_runs_only_for_its_vector() {
        static HANDLER: Counting = Counting(AtomicU32::new(0));
        let manager = manager();
        let _registration = HANDLER.install(0x30, manager).unwrap();

        for vector in 0..=u8::MAX {
            manager.do_handle_interrupt(vector, 0x1000);
        }

        assert_eq!(HANDLER.0.load(Ordering::SeqCst), 1);
        assert_eq!(manager.stats(0x30), VectorStats { dispatched: 1, unhandled: 0 });
        assert_eq!(manager.stats(0x31), VectorStats { dispatched: 1, unhandled: 1 });
    }

    #[test]
    fn unhandled_vector_resumes_unchanged() {
        let manager = manager();
        assert_eq!(manager.do_handle_interrupt(0x45, 0x1234_5678), 0x1234_5678);
        assert_eq!(manager.do_handle_interrupt(0x45, 0x1234_5678), 0x1234_5678);
        assert_eq!(manager.stats(0x45).unhandled, 2);
    }

    #[test]
    fn master_irq_acknowledges_master_once() {
        let manager = manager();
        manager.platform.clear_events();

        manager.do_handle_interrupt(0x20, 0x1000);

        let events = manager.platform.events();
        assert_eq!(eoi_count(&events, MASTER_COMMAND), 1);
        assert_eq!(eoi_count(&events, SLAVE_COMMAND), 0);
    }

    #[test]
    fn slave_irq_acknowledges_both() {
        static HANDLER: Fixed = Fixed(0x2000);
        let manager = manager();
        let _registration = manager.register(0x2C, &HANDLER).unwrap();
        manager.platform.clear_events();

        manager.do_handle_interrupt(0x2C, 0x1000);

        let events = manager.platform.events();
        assert_eq!(eoi_count(&events, SLAVE_COMMAND), 1);
        assert_eq!(eoi_count(&events, MASTER_COMMAND), 1);
        assert_eq!(
            events,
            vec![
                Event::Write { port: SLAVE_COMMAND, value: EOI, slow: true },
                Event::Write { port: MASTER_COMMAND, value: EOI, slow: true },
            ]
        );
    }

    #[test]
    fn exception_vector_is_not_acknowledged() {
        let manager = manager();
        manager.do_handle_interrupt(0x0D, 0x1000);
        manager.do_handle_interrupt(0x80, 0x1000);
        assert!(manager.platform.events().is_empty());
    }

    #[test]
    fn dropping_registration_restores_previous_handler() {
        static FIRST: Fixed = Fixed(1);
        static SECOND: Fixed = Fixed(2);
        let manager = manager();

        let first = manager.register(0x21, &FIRST).unwrap();
        {
            let second = manager.register(0x21, &SECOND).unwrap();
            assert_eq!(second.vector(), 0x21);
            assert_eq!(manager.do_handle_interrupt(0x21, 0), 2);
        }
        assert_eq!(manager.do_handle_interrupt(0x21, 0), 1);

        drop(first);
        assert!(!manager.has_handler(0x21));
        assert_eq!(manager.do_handle_interrupt(0x21, 7), 7);
    }

    #[test]
    fn leaked_registration_stays_installed() {
        static HANDLER: Fixed = Fixed(9);
        let manager = manager();
        manager.register(0x22, &HANDLER).unwrap().leak();
        assert_eq!(manager.do_handle_interrupt(0x22, 0), 9);
    }

    #[test]
    fn registration_runs_with_interrupts_disabled() {
        static HANDLER: Fixed = Fixed(0);
        let manager = manager();
        manager.platform.enable_interrupts();
        manager.platform.clear_events();

        let registration = manager.register(0x21, &HANDLER).unwrap();
        drop(registration);

        assert_eq!(
            manager.platform.events(),
            vec![
                Event::DisableInterrupts,
                Event::EnableInterrupts,
                Event::DisableInterrupts,
                Event::EnableInterrupts,
            ]
        );
        assert!(manager.platform.interrupts_enabled());
    }

    #[test]
    fn activate_loads_idt_and_remaps_pic() {
        let _lock = testing::lock_active();
        let manager = manager();

        manager.activate();

        let events = manager.platform.events();
        assert_eq!(events.first(), Some(&Event::DisableInterrupts));
        assert_eq!(
            events.get(1),
            Some(&Event::LoadIdt {
                limit: 2047,
                base: manager.idt() as *const _ as usize as u32,
            })
        );
        assert_eq!(
            events.get(2),
            Some(&Event::Write { port: MASTER_COMMAND, value: 0x11, slow: true })
        );
        assert_eq!(events.last(), Some(&Event::EnableInterrupts));
        assert!(manager.is_active());
        assert!(manager.platform.interrupts_enabled());

        manager.deactivate();
    }

    #[test]
    fn second_activation_replaces_first() {
        let _lock = testing::lock_active();
        let first = manager();
        let second = manager();

        first.activate();
        second.activate();

        assert!(!first.is_active());
        assert!(second.is_active());

        first.deactivate();
        assert!(second.is_active());
        assert!(first.platform.interrupts_enabled());

        second.deactivate();
        assert!(!second.is_active());
        assert_eq!(handle_interrupt(0x20, 0x10), 0x10);
    }

    #[test]
    fn deactivate_keeps_handlers() {
        static HANDLER: Fixed = Fixed(0x55);
        let _lock = testing::lock_active();
        let manager = manager();
        manager.register(0x21, &HANDLER).unwrap().leak();

        manager.activate();
        manager.deactivate();

        assert!(!manager.is_active());
        assert!(!manager.platform.interrupts_enabled());
        assert!(manager.has_handler(0x21));
        assert_eq!(handle_interrupt(0x21, 0x10), 0x10);
    }

    /// Notes whether the active slot was locked at any `sti`.
    #[derive(Default)]
    struct SlotWatcher {
        inner: MockPlatform,
        sti_while_locked: AtomicBool,
    }

    impl PortIo for SlotWatcher {
        unsafe fn write_byte(&self, port: u16, value: u8) {
            self.inner.write_byte(port, value)
        }

        unsafe fn read_byte(&self, port: u16) -> u8 {
            self.inner.read_byte(port)
        }
    }

    impl Cpu for SlotWatcher {
        unsafe fn load_gdt(&self, pointer: &DescriptorTablePointer) {
            self.inner.load_gdt(pointer)
        }

        unsafe fn load_idt(&self, pointer: &DescriptorTablePointer) {
            self.inner.load_idt(pointer)
        }

        unsafe fn reload_segment_registers(&self, code: SegmentSelector, data: SegmentSelector) {
            self.inner.reload_segment_registers(code, data)
        }

        fn enable_interrupts(&self) {
            if ACTIVE.is_locked() {
                self.sti_while_locked.store(true, Ordering::SeqCst);
            }
            self.inner.enable_interrupts()
        }

        fn disable_interrupts(&self) {
            self.inner.disable_interrupts()
        }

        fn interrupts_enabled(&self) -> bool {
            self.inner.interrupts_enabled()
        }

        fn interrupt_trampoline(&self, vector: u8) -> u32 {
            self.inner.interrupt_trampoline(vector)
        }

        fn ignore_trampoline(&self) -> u32 {
            self.inner.ignore_trampoline()
        }
    }

    #[test]
    fn inactive_deactivate_unlocks_slot_before_sti() {
        let _lock = testing::lock_active();
        let platform: &'static SlotWatcher = Box::leak(Box::default());
        let config = KernelConfig::DEFAULT;
        let gdt = GlobalDescriptorTable::new(&config.segments).unwrap();
        let first: &'static InterruptManager<SlotWatcher> =
            Box::leak(Box::new(InterruptManager::new(platform, &gdt, &config.pic)));
        let second = manager();

        first.activate();
        second.activate();
        first.deactivate();

        assert!(platform.interrupts_enabled());
        assert!(!platform.sti_while_locked.load(Ordering::SeqCst));
        assert!(second.is_active());

        second.deactivate();
    }

    #[test]
    fn static_entry_routes_to_active_manager() {
        static HANDLER: Fixed = Fixed(0xBEEF);
        let _lock = testing::lock_active();
        let manager = manager();
        let _registration = manager.register(0x21, &HANDLER).unwrap();

        assert_eq!(handle_interrupt(0x21, 0x10), 0x10);

        manager.activate();
        assert_eq!(handle_interrupt(0x21, 0x10), 0xBEEF);
        assert_eq!(handle_interrupt(0x22, 0x10), 0x10);

        manager.deactivate();
    }

    #[test]
    fn irq_mask_control() {
        let manager = manager();
        unsafe { manager.pics().write_masks(manager.platform, 0xFF, 0xFF) };

        manager.enable_irq(12).unwrap();
        assert_eq!(unsafe { manager.pics().read_masks(manager.platform) }, (0xFF, 0xEF));

        manager.disable_irq(12).unwrap();
        assert_eq!(unsafe { manager.pics().read_masks(manager.platform) }, (0xFF, 0xFF));

        assert_eq!(manager.enable_irq(20), Err(InterruptError::InvalidIrqLine(20)));
    }
}
