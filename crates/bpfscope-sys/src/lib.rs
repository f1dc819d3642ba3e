//! Kernel capability layer for bpfscope.
//!
//! Provides the [`Kernel`] trait defining the raw primitives the inspection
//! engines depend on, plus two backends that implement it:
//!
//! - [`InMemoryKernel`]: a first-class fake with kernel semantics, used by
//!   tests and anywhere a live BPF subsystem is not available.
//! - [`SyscallKernel`] (Linux only): talks to the kernel through `bpf(2)`.
//!
//! # Modules
//!
//! - [`error`]: KernelError, the per-call classification of failures
//! - [`traits`]: Kernel, ProgramHandle and MapHandle trait definitions
//! - [`cursor`]: MapCursor, the buffer-reusing entry iterator
//! - [`memory`]: InMemoryKernel implementation
//! - `syscall`: SyscallKernel implementation

pub mod cursor;
pub mod error;
pub mod memory;
#[cfg(target_os = "linux")]
pub mod syscall;
pub mod traits;

// Re-export key types for ergonomic use.
pub use cursor::MapCursor;
pub use error::{KernelError, ObjectKind};
pub use memory::{FakeMap, FakeProgram, InMemoryKernel, MapFault};
#[cfg(target_os = "linux")]
pub use syscall::SyscallKernel;
pub use traits::{ClockSample, Kernel, MapHandle, ProgramHandle, RawMapInfo, RawProgramInfo};
