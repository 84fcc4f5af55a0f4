//! Internal counters describing the pipeline's own behaviour.
//!
//! Counters go through the `metrics` facade. This crate only increments them;
//! the embedding binary decides whether a recorder is installed and where
//! values are exported.

use crate::event::DataType;
use metrics::counter;

/// Events accepted from a decoded payload.
pub fn events_received(data_type: DataType, count: usize) {
    counter!("component_received_events_total", "data_type" => data_type.as_str())
        .increment(count as u64);
}

/// A payload was rejected by its decoder.
pub fn decode_error(data_type: DataType, reason: &'static str) {
    counter!(
        "decode_errors_total",
        "data_type" => data_type.as_str(),
        "reason" => reason
    )
    .increment(1);
}

/// A transform step rejected an event.
pub fn transform_error(kind: &str, step: usize) {
    counter!(
        "transform_errors_total",
        "kind" => kind.to_string(),
        "step" => step.to_string()
    )
    .increment(1);
}

/// An event was dropped before a compound step that does not accept its datatype.
pub fn type_mismatch_dropped(kind: &str) {
    counter!("compound_type_mismatch_dropped_total", "kind" => kind.to_string()).increment(1);
}

/// Events discarded because their traversal of the pipeline failed.
pub fn events_discarded(data_type: DataType, count: usize) {
    counter!("component_discarded_events_total", "data_type" => data_type.as_str())
        .increment(count as u64);
}

/// A batch could not be encoded for its destination protocol.
pub fn encode_error(protocol: &'static str) {
    counter!("encode_errors_total", "protocol" => protocol).increment(1);
}

/// A sink reported a failed or partially failed delivery.
pub fn delivery_failed(sink: &str) {
    counter!("sink_delivery_failures_total", "sink" => sink.to_string()).increment(1);
}

/// The pipeline was rebuilt and swapped in.
pub fn pipeline_reloaded() {
    counter!("pipeline_reloads_total").increment(1);
}
