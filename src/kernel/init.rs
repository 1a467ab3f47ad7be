//! Kernel initialization phases
//!
//! | Phase                | Work                                          |
//! |----------------------|-----------------------------------------------|
//! | Configuration        | validate PIC offsets                          |
//! | Descriptor Tables    | build the GDT, `lgdt`, reload segments        |
//! | Interrupt System     | build the IDT and handler registry            |
//! | Boot Handlers        | faults, timer, keyboard                       |
//! | Interrupt Activation | `lidt`, remap the PICs, `sti`                 |

use log::{error, info};
use spin::Once;

use super::handlers::{FaultReporter, KeyboardHandler, TimerTick, EXCEPTION_VECTORS};
use super::status::{InitStatus, StatusBoard};
use crate::arch::Platform;
use crate::config::KernelConfig;
use crate::errors::KernelError;
use crate::interrupts::pic::IrqLines;
use crate::interrupts::{GlobalDescriptorTable, InterruptManager};

const PHASES: [&str; 5] = [
    "Configuration",
    "Descriptor Tables",
    "Interrupt System",
    "Boot Handlers",
    "Interrupt Activation",
];

/// Everything bring-up creates. Lives in a `static` so the CPU tables never
/// move once loaded.
pub struct KernelState<P: Platform + 'static> {
    gdt: Once<GlobalDescriptorTable>,
    interrupts: Once<InterruptManager<P>>,
    keyboard: Once<KeyboardHandler<P>>,
    timer: TimerTick,
    faults: FaultReporter,
    status: StatusBoard,
}

impl<P: Platform + 'static> KernelState<P> {
    pub const fn new() -> Self {
        Self {
            gdt: Once::new(),
            interrupts: Once::new(),
            keyboard: Once::new(),
            timer: TimerTick::new(),
            faults: FaultReporter,
            status: StatusBoard::new(),
        }
    }

    pub fn gdt(&self) -> Option<&GlobalDescriptorTable> {
        self.gdt.get()
    }

    pub fn interrupts(&self) -> Option<&InterruptManager<P>> {
        self.interrupts.get()
    }

    pub fn keyboard(&self) -> Option<&KeyboardHandler<P>> {
        self.keyboard.get()
    }

    pub fn timer(&self) -> &TimerTick {
        &self.timer
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }
}

impl<P: Platform + 'static> Default for KernelState<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Brings the CPU from the boot loader's state to interrupts enabled:
/// GDT built and loaded, IDT built, boot handlers installed, manager active.
pub fn bring_up<P: Platform + 'static>(
    state: &'static KernelState<P>,
    platform: &'static P,
    config: &KernelConfig,
) -> Result<&'static InterruptManager<P>, KernelError> {
    if state.gdt.is_completed() {
        return Err(KernelError::AlreadyInitialized("kernel state"));
    }

    for name in PHASES {
        state.status.register_component(name);
    }
    info!("protected-mode bring-up");

    init_phase(&state.status, "Configuration", || Ok(config.validate()?))?;

    let gdt = init_phase(&state.status, "Descriptor Tables", || {
        let gdt = state
            .gdt
            .try_call_once(|| GlobalDescriptorTable::new(&config.segments))?;
        gdt.load(platform);
        Ok(gdt)
    })?;

    let manager = init_phase(&state.status, "Interrupt System", || {
        Ok(state.interrupts.call_once(|| {
            let mut manager = InterruptManager::new(platform, gdt, &config.pic);
            for &vector in config.ignored_vectors {
                manager.ignore_vector(vector);
            }
            manager
        }))
    })?;

    init_phase(&state.status, "Boot Handlers", || {
        install_boot_handlers(state, platform, manager, config)
    })?;

    init_phase(&state.status, "Interrupt Activation", || {
        manager.activate();
        Ok(())
    })?;

    Ok(manager)
}

fn install_boot_handlers<P: Platform + 'static>(
    state: &'static KernelState<P>,
    platform: &'static P,
    manager: &'static InterruptManager<P>,
    config: &KernelConfig,
) -> Result<(), KernelError> {
    for vector in EXCEPTION_VECTORS {
        manager.register(vector, &state.faults)?.leak();
    }

    let pics = manager.pics();
    let lines = config.pic.enabled_lines;

    if lines.contains(IrqLines::TIMER) {
        if let Some(vector) = pics.vector_for_irq(0) {
            manager.register(vector, &state.timer)?.leak();
        }
    }

    if lines.contains(IrqLines::KEYBOARD) {
        if let Some(vector) = pics.vector_for_irq(1) {
            let keyboard = state.keyboard.call_once(|| KeyboardHandler::new(platform));
            manager.register(vector, keyboard)?.leak();
        }
    }

    Ok(())
}

fn init_phase<T>(
    status: &StatusBoard,
    name: &'static str,
    init_fn: impl FnOnce() -> Result<T, KernelError>,
) -> Result<T, KernelError> {
    status.update_component_status(name, InitStatus::InProgress);
    info!("Initializing {}...", name);

    match init_fn() {
        Ok(value) => {
            status.update_component_status(name, InitStatus::Completed);
            info!("{} initialized", name);
            Ok(value)
        }
        Err(e) => {
            status.update_component_status(name, InitStatus::Failed(e));
            error!("{} failed: {}", name, e);
            Err(e)
        }
    }
}
