//! Inspection engines for bpfscope.
//!
//! Composes the raw [`Kernel`](bpfscope_sys::Kernel) primitives into the
//! operations callers use: listing and looking up programs and maps,
//! iterating map contents, and mapping objects to their pinned paths.
//!
//! # Modules
//!
//! - [`extract`]: raw kernel info to normalized records
//! - [`programs`]: ProgramService, the program enumeration engine
//! - [`maps`]: MapService, map enumeration, lookup and iteration
//! - [`pins`]: PinScanner, the lazily built pinned-path index

mod classify;
pub mod extract;
pub mod maps;
pub mod pins;
pub mod programs;
mod walk;

pub use maps::{Cursor, KeyStep, MapService};
pub use pins::PinScanner;
pub use programs::ProgramService;
