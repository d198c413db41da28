//! A value serializer with no registered types of its own — every method
//! falls back to [`ValueSerializer`]'s default fixed-width encoding. Good
//! enough for any test that only needs primitives, decimals, and strings to
//! round-trip, which covers everything the runtime itself inspects.

use remoting_wire::ValueSerializer;

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTestSerializer;

impl ValueSerializer for DefaultTestSerializer {}
