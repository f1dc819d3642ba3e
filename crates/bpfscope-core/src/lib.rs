//! Core data model for bpfscope.
//!
//! Everything here is independent of how the kernel is reached: ID newtypes,
//! the normalized records built from live objects, the references a caller
//! uses to name an object, kernel type-name tables, and [`InspectError`].

pub mod error;
pub mod id;
pub mod kind;
pub mod record;
pub mod reference;

// Re-export commonly used types
pub use error::InspectError;
pub use id::{MapId, ProgramId};
pub use kind::{map_type_name, program_type_name};
pub use record::{MapEntry, MapRecord, ProgramRecord, TAG_LEN};
pub use reference::{MapRef, ProgramRef};
