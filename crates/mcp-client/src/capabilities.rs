//! Builds the `ClientCapabilities` declared at `initialize`, derived from
//! which server-initiated-request handlers were actually registered (§4.6,
//! §4.10) — mirroring the teacher's "capability follows handler presence"
//! rule rather than requiring a separate, easy-to-desync declaration.

use mcp_protocol::capabilities::{
    ClientCapabilities, ElicitationCapabilities, RootsCapabilities, SamplingCapabilities,
};

use crate::handlers::HandlerRegistry;

/// Derive the capabilities to advertise from the handlers registered on
/// `registry`. A capability is declared only when something exists to
/// answer the corresponding server-initiated request.
#[must_use]
pub fn negotiate(registry: &HandlerRegistry) -> ClientCapabilities {
    ClientCapabilities {
        experimental: None,
        roots: registry.roots.is_some().then(|| RootsCapabilities {
            list_changed: Some(true),
        }),
        sampling: registry.sampling.is_some().then_some(SamplingCapabilities),
        elicitation: registry.elicitation.is_some().then_some(ElicitationCapabilities),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_declares_no_capabilities() {
        let caps = negotiate(&HandlerRegistry::new());
        assert!(caps.sampling.is_none());
        assert!(caps.elicitation.is_none());
        assert!(caps.roots.is_none());
    }
}
