//! Monotonic outgoing-request id allocation (§8: "the next outgoing request
//! has id > i within the same session").

use std::sync::atomic::{AtomicI64, Ordering};

use mcp_core::RequestId;

/// Hands out strictly increasing request ids for one session's lifetime.
#[derive(Debug, Default)]
pub struct RequestIdAllocator {
    next: AtomicI64,
}

impl RequestIdAllocator {
    /// Start allocating from 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicI64::new(1),
        }
    }

    /// Allocate the next id.
    pub fn next(&self) -> RequestId {
        RequestId::Number(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_strictly_increase() {
        let allocator = RequestIdAllocator::new();
        let RequestId::Number(a) = allocator.next() else { panic!() };
        let RequestId::Number(b) = allocator.next() else { panic!() };
        assert!(b > a);
    }
}
