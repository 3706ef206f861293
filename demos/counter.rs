//! Counter Input - a complete modular input.
//!
//! This example demonstrates:
//! - Describing arguments in a scheme
//! - External validation of a proposed stanza
//! - Streaming events per stanza and logging to the host
//!
//! # Running by hand
//!
//! ```sh
//! ./target/debug/examples/counter --scheme
//! ./target/debug/examples/counter --validate-arguments < tests/data/validation.xml
//! ./target/debug/examples/counter < tests/data/conf_with_2_inputs.xml
//! ```

use std::process::ExitCode;
use std::time::SystemTime;

use modinput::handler::{ModularInput, RunContext};
use modinput::protocol::{
    Argument, DataType, Event, InputDefinition, Params, Scheme, StreamingMode,
    ValidationDefinition,
};
use modinput::{telemetry, EventWriter, Script, StreamResult, ValidationError, ValidationResult};

/// Events emitted per stanza when `count` is not set.
const DEFAULT_COUNT: u64 = 5;

struct Counter;

fn number(params: &Params, name: &str) -> Result<Option<u64>, String> {
    match params.get(name).and_then(|value| value.as_str()) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("{} must be a non-negative integer, got {:?}", name, raw)),
    }
}

impl ModularInput for Counter {
    fn scheme(&self) -> Option<Scheme> {
        let mut scheme = Scheme::new("Counter");
        scheme.description = Some("Emits a sequence of numbers for each stanza.".to_string());
        scheme.streaming_mode = StreamingMode::Xml;
        scheme.use_external_validation = true;

        scheme
            .add_argument(
                Argument::new("start")
                    .description("First number of the sequence")
                    .data_type(DataType::Number)
                    .required_on_create(true),
            )
            .ok()?;
        scheme
            .add_argument(
                Argument::new("count")
                    .description("How many numbers to emit")
                    .data_type(DataType::Number),
            )
            .ok()?;

        Some(scheme)
    }

    async fn validate_input(
        &self,
        definition: &ValidationDefinition,
        _ctx: &RunContext,
    ) -> ValidationResult {
        let start = number(&definition.parameters, "start").map_err(ValidationError::new)?;
        let count = number(&definition.parameters, "count").map_err(ValidationError::new)?;

        if start.is_none() {
            return Err(ValidationError::new("start is required"));
        }
        if count == Some(0) {
            return Err(ValidationError::new("count must be at least 1"));
        }
        Ok(())
    }

    async fn stream_events(
        &self,
        inputs: &InputDefinition,
        writer: &EventWriter,
        ctx: &RunContext,
    ) -> StreamResult {
        if let Ok(service) = ctx.service() {
            writer
                .debug(format!("management API at {}", service.prefix()))
                .await?;
        }

        for (stanza, params) in &inputs.inputs {
            let start = number(params, "start")?.unwrap_or(0);
            let count = number(params, "count")?.unwrap_or(DEFAULT_COUNT);

            writer
                .info(format!("{}: emitting {} events", stanza, count))
                .await?;
            for n in start..start.saturating_add(count) {
                let event = Event::new(n.to_string())
                    .stanza(stanza.as_str())
                    .system_time(SystemTime::now())
                    .sourcetype("counter");
                writer.write_event(&event).await?;
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = telemetry::initialise("warn") {
        eprintln!("WARN {}", e);
    }
    Script::new(Counter).run().await.into()
}
