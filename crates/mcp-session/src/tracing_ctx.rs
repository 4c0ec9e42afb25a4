//! W3C `traceparent` propagation across the transport boundary (§4.6, §10.1).
//!
//! `_meta.traceparent` travels on the wire; this module converts it to and
//! from the current `tracing` span's OpenTelemetry context so a server's
//! spans nest under the caller's trace and an outgoing request carries the
//! caller's in-flight span onward.

use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Read the current `tracing` span's OpenTelemetry context and format it as
/// a W3C `traceparent` header value (`00-{trace_id}-{span_id}-{flags}`).
/// Returns `None` if the current span carries no valid OpenTelemetry
/// context (e.g. telemetry isn't configured).
#[must_use]
pub fn current_traceparent() -> Option<String> {
    let span = tracing::Span::current();
    let context = span.context();
    let span_context = context.span().span_context().clone();

    if span_context.is_valid() {
        let flags = if span_context.is_sampled() { "01" } else { "00" };
        Some(format!("00-{}-{}-{}", span_context.trace_id(), span_context.span_id(), flags))
    } else {
        None
    }
}

/// Parse a `traceparent` header value into an OpenTelemetry [`SpanContext`]
/// a receiving span can be made a remote child of. Returns `None` for a
/// malformed value rather than erroring — an unparseable trace header must
/// not fail the request it rides along with (§7).
#[must_use]
pub fn parse_traceparent(value: &str) -> Option<SpanContext> {
    let parts: Vec<&str> = value.split('-').collect();
    if parts.len() != 4 || parts[0] != "00" {
        return None;
    }
    let trace_id = TraceId::from_hex(parts[1]).ok()?;
    let span_id = SpanId::from_hex(parts[2]).ok()?;
    let flags_byte = u8::from_str_radix(parts[3], 16).ok()?;
    let flags = TraceFlags::new(flags_byte);

    Some(SpanContext::new(trace_id, span_id, flags, true, TraceState::default()))
}

/// Apply a peer-supplied `traceparent` to `span` as its parent context, so
/// spans emitted under `span` report as children of the caller's trace
/// (§10.1: "incoming `_meta.traceparent`, when present, becomes the parent
/// of the span created for that request").
pub fn attach_parent(span: &tracing::Span, traceparent: &str) {
    if let Some(remote_context) = parse_traceparent(traceparent) {
        let parent = opentelemetry::Context::new().with_remote_span_context(remote_context);
        span.set_parent(parent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_traceparent_round_trips_valid_header() {
        let value = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";
        let context = parse_traceparent(value).unwrap();
        assert!(context.is_valid());
        assert!(context.is_sampled());
    }

    #[test]
    fn parse_traceparent_rejects_wrong_version() {
        assert!(parse_traceparent("01-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01").is_none());
    }

    #[test]
    fn parse_traceparent_rejects_malformed_value() {
        assert!(parse_traceparent("not-a-traceparent").is_none());
    }

    #[test]
    fn current_traceparent_is_none_without_an_active_otel_context() {
        assert!(current_traceparent().is_none());
    }
}
