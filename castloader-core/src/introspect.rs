use std::fmt::Debug;

/// A type that can produce a cheap, read-only snapshot of its internal
/// state, used by embedding applications for diagnostics without exposing
/// mutable internals.
///
/// Mirrors `turntable_core::util::introspection::Introspect`, which is used
/// the same way across `MultiRangeBuffer` and the output encoders.
pub trait Introspect<T>
where
    T: Debug,
{
    fn introspect(&self) -> T;
}
