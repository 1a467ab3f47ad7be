/// Kernel initialization and bootstrap module
pub mod handlers;
pub mod init;
pub mod status;

pub use init::{bring_up, KernelState};
pub use status::{InitStatus, StatusBoard};
