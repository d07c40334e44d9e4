//! Identity-keyed lookups for schema and stream objects.
//!
//! The sink needs `input_object -> output_object` maps keyed by *identity*, not value
//! (two `StreamClass`es with the same id but different allocations are different objects).
//! `ObjectId` wraps the address of the backing `Arc` allocation, which is stable for the
//! lifetime of the object and unique across live objects.

use std::sync::Arc;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[repr(transparent)]
pub struct ObjectId(usize);

impl ObjectId {
    pub fn of<T>(arc: &Arc<T>) -> Self {
        ObjectId(Arc::as_ptr(arc) as usize)
    }
}

/// Implemented by every schema/stream node that participates in an identity-keyed map.
pub trait Identity {
    fn identity(&self) -> ObjectId;
}
