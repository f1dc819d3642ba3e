//! The ID-space walk shared by the program and map engines.

use std::fmt::Display;

use bpfscope_core::InspectError;
use bpfscope_sys::KernelError;

use crate::classify::call_error;

/// Walks an ID space from `sentinel`, calling `visit` for every ID in
/// ascending order.
///
/// The first step decides whether there is anything to walk:
/// end-of-sequence there means the space is empty and is reported as
/// [`InspectError::NotFound`]. After that, end-of-sequence stops the walk
/// and any other failure aborts it; the walk never returns a silently
/// truncated result.
pub(crate) fn walk_ids<I, S, V>(
    sentinel: I,
    noun: &str,
    mut step: S,
    mut visit: V,
) -> Result<(), InspectError>
where
    I: Copy + Display,
    S: FnMut(I) -> Result<I, KernelError>,
    V: FnMut(I),
{
    let mut current = match step(sentinel) {
        Ok(first) => first,
        Err(KernelError::EndOfSequence) => {
            return Err(InspectError::not_found(format!("loaded {}", noun)));
        }
        Err(e) => return Err(call_error(e, &format!("listing {}", noun))),
    };
    loop {
        visit(current);
        current = match step(current) {
            Ok(next) => next,
            Err(KernelError::EndOfSequence) => return Ok(()),
            Err(e) => {
                return Err(call_error(
                    e,
                    &format!("listing {} after ID {}", noun, current),
                ))
            }
        };
    }
}
