//! Scoped construction: create a value, configure it in place, hand it back
//!
//! Every `insert(..)`, `find(..)`, `and(..)` and `join(..)` entry point is
//! this one function with a different factory.

/// Create a fresh value with `factory`, run `configure` against it exactly
/// once, and return the same value.
///
/// `configure` runs synchronously before `build` returns. If it fails the
/// half-configured value is dropped and only the error escapes.
pub fn build<T, E>(
    factory: impl FnOnce() -> T,
    configure: impl FnOnce(&mut T) -> Result<(), E>,
) -> Result<T, E> {
    let mut value = factory();
    configure(&mut value)?;
    Ok(value)
}
