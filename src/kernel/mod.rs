//! # Kernel Bring-up
//!
//! Phased initialization with status tracking.
//!
//! ## Submodules
//!
//! - `init`: phase runner, descriptor table phase and the startup banner
//! - `status`: fixed-capacity component status table
//!
//! ## Example
//!
//! ```ignore
//! use crate::kernel::init_phase;
//!
//! init_phase("Descriptor Table", || init_descriptor_table(&GDT))?;
//! ```

pub mod init;
pub mod status;

pub use init::{init_descriptor_table, init_phase, print_banner, run_phase};
pub use status::{InitStatus, StatusTable};
