//! Command implementations.
//!
//! Every command writes its report to the given writer so the output can be
//! checked in tests.

use anyhow::{Context, Result};
use clap::Args;
use shared::codec::{self, ContentHeaders, Payload, Protocol};
use shared::config::PipelineConfig;
use shared::event::{DataType, Event};
use shared::pipeline::{Engine, Pipeline};
use shared::sink::DeliveryStatus;
use shared::transform::TransformRegistry;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Arguments of the `tap` command.
#[derive(Args, Debug)]
pub struct TapArgs {
    /// Pipeline configuration file. Without one, events pass through unchanged.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Datatype the payload carries
    #[arg(short = 't', long)]
    pub data_type: DataType,

    /// Content encoding of the payload, e.g. gzip
    #[arg(short, long)]
    pub encoding: Option<String>,

    /// Content type of the payload. Defaults to the intake format of the datatype.
    #[arg(long)]
    pub content_type: Option<String>,

    /// Also deliver the terminal events to the configured sinks
    #[arg(long)]
    pub deliver: bool,

    /// Payload file, or `-` for stdin
    pub payload: PathBuf,
}

/// Builds a pipeline configuration and lists its steps and sinks.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the pipeline fails to build.
pub fn validate(path: &Path, out: &mut impl Write) -> Result<()> {
    let config = PipelineConfig::from_file(path)?;
    let pipeline = Pipeline::build(&config, &TransformRegistry::default())
        .with_context(|| format!("invalid pipeline {}", path.display()))?;

    let chain = pipeline.chain();
    writeln!(
        out,
        "{}: {} steps, {} sinks",
        path.display(),
        chain.len(),
        pipeline.sinks().len()
    )?;
    for (index, step) in chain.steps().iter().enumerate() {
        writeln!(
            out,
            "  [{index}] {} ({} -> {})",
            step.kind(),
            step.transform().input(),
            step.transform().output()
        )?;
    }
    for sink in pipeline.sinks() {
        writeln!(
            out,
            "  sink {} ({}, accepts {})",
            sink.name(),
            sink.config().protocol,
            sink.accepts()
        )?;
    }
    Ok(())
}

/// Decodes a payload file, runs it through the pipeline and prints the
/// terminal events as native JSON, one per line, followed by a summary.
///
/// # Errors
///
/// Returns an error if the configuration or payload cannot be loaded, or if
/// the payload does not decode.
pub fn tap(args: &TapArgs, out: &mut impl Write) -> Result<()> {
    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::passthrough(),
    };
    let engine = Engine::from_config(&config, Arc::new(TransformRegistry::default()))?;

    let body = read_payload(&args.payload)?;
    let content_type = args.content_type.clone().unwrap_or_else(|| {
        Protocol::intake(args.data_type)
            .content_type()
            .to_string()
    });
    let mut headers = ContentHeaders::with_content_type(content_type);
    if let Some(encoding) = &args.encoding {
        headers = headers.encoding(encoding.as_str());
    }

    let events = codec::decode(&Payload::new(args.data_type, body, headers))
        .with_context(|| format!("failed to decode {}", args.payload.display()))?;
    let report = engine.process(events);

    for event in &report.emitted {
        writeln!(out, "{}", serde_json::to_string(event)?)?;
    }
    writeln!(
        out,
        "accepted {}, emitted {}, dropped {}, errored {}",
        report.accepted,
        report.emitted.len(),
        report.dropped,
        report.errored
    )?;

    if args.deliver {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(deliver(&engine, &report.emitted, out))?;
    }
    Ok(())
}

/// Dispatches events to the engine's sinks and prints one line per sink.
pub async fn deliver(engine: &Engine, events: &[Event], out: &mut impl Write) -> Result<()> {
    let report = engine.dispatch(events).await;

    for delivery in &report.deliveries {
        writeln!(
            out,
            "sink {}: {} events {}",
            delivery.sink,
            delivery.events,
            describe(&delivery.status)
        )?;
    }
    if report.unrouted > 0 {
        tracing::warn!(unrouted = report.unrouted, "Events selected by no sink");
        writeln!(out, "unrouted: {} events", report.unrouted)?;
    }
    Ok(())
}

fn describe(status: &DeliveryStatus) -> String {
    match status {
        DeliveryStatus::Delivered => "delivered".to_string(),
        DeliveryStatus::Partial { rejected, message } => {
            format!("partially delivered ({rejected} rejected: {message})")
        }
        DeliveryStatus::Rejected { message } => format!("rejected: {message}"),
        DeliveryStatus::Errored { message } => format!("errored: {message}"),
    }
}

fn read_payload(path: &Path) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    if path == Path::new("-") {
        std::io::stdin().read_to_end(&mut body)?;
    } else {
        body = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    }
    Ok(body)
}
