//! Lossless JSON encoding of events.
//!
//! A JSON array of events in their serde form. Carries every datatype and
//! keeps metadata, so it is the format used by the `tap` command and the
//! in-memory sink fixtures.

use super::{Codec, ContentHeaders, DecodeError, EncodeError};
use crate::event::Event;

/// Codec for the `native_json` protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeJsonCodec;

impl Codec for NativeJsonCodec {
    fn decode(&self, body: &[u8], _headers: &ContentHeaders) -> Result<Vec<Event>, DecodeError> {
        Ok(serde_json::from_slice(body)?)
    }

    fn encode(&self, events: &[Event]) -> Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec(events)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{LogEvent, MetricEvent, Span, TraceEvent};

    #[test]
    fn test_mixed_batch_is_lossless() {
        let events = vec![
            Event::from(LogEvent::new().with_field("message", "hello")),
            Event::from(MetricEvent::counter("hits", 3.0).with_tag("route", "/")),
            Event::from(TraceEvent::apm_event(Span::new(1, 2, "op", "svc"))),
        ];

        let body = NativeJsonCodec.encode(&events).unwrap();
        let decoded = NativeJsonCodec
            .decode(&body, &ContentHeaders::default())
            .unwrap();

        assert_eq!(decoded, events);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = NativeJsonCodec.decode(
            br#"[{"type": "profile", "fields": {}}]"#,
            &ContentHeaders::default(),
        );
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }
}
