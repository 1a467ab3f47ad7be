use core::fmt;
use spin::Mutex;

use crate::errors::KernelError;

/// Most components a boot can track
pub const MAX_COMPONENTS: usize = 8;

/// Kernel initialization status tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed(KernelError),
}

/// Kernel component status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentStatus {
    pub name: &'static str,
    pub status: InitStatus,
}

impl ComponentStatus {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            status: InitStatus::NotStarted,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, InitStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, InitStatus::Failed(_))
    }
}

/// Fixed-capacity list of boot components and how far each got.
pub struct StatusBoard {
    components: Mutex<[Option<ComponentStatus>; MAX_COMPONENTS]>,
}

impl StatusBoard {
    pub const fn new() -> Self {
        Self {
            components: Mutex::new([None; MAX_COMPONENTS]),
        }
    }

    /// Track kernel component initialization. Returns `false` when the board
    /// is full; names already on the board are not added twice.
    pub fn register_component(&self, name: &'static str) -> bool {
        let mut components = self.components.lock();
        if components.iter().flatten().any(|c| c.name == name) {
            return true;
        }
        match components.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(ComponentStatus::new(name));
                true
            }
            None => false,
        }
    }

    /// Update component status
    pub fn update_component_status(&self, name: &'static str, status: InitStatus) {
        let mut components = self.components.lock();
        if let Some(comp) = components.iter_mut().flatten().find(|c| c.name == name) {
            comp.status = status;
        }
    }

    pub fn status_of(&self, name: &str) -> Option<InitStatus> {
        self.components
            .lock()
            .iter()
            .flatten()
            .find(|c| c.name == name)
            .map(|c| c.status)
    }

    /// Get all component statuses, in registration order
    pub fn statuses(&self) -> [Option<ComponentStatus>; MAX_COMPONENTS] {
        *self.components.lock()
    }

    /// Check if all components are initialized
    pub fn all_components_ready(&self) -> bool {
        let components = self.components.lock();
        let mut registered = components.iter().flatten().peekable();
        registered.peek().is_some() && registered.all(|c| c.is_complete())
    }

    pub fn any_failed(&self) -> bool {
        self.components.lock().iter().flatten().any(|c| c.is_failed())
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStatus::NotStarted => write!(f, "Not Started"),
            InitStatus::InProgress => write!(f, "In Progress"),
            InitStatus::Completed => write!(f, "Completed"),
            InitStatus::Failed(err) => write!(f, "Failed: {}", err),
        }
    }
}

impl fmt::Display for StatusBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in self.statuses().iter().flatten() {
            writeln!(f, "{:<24} {}", component.name, component.status)?;
        }
        Ok(())
    }
}
