//! Script orchestrator and runtime loop.
//!
//! The [`Script`] owns a plugin and decides, per invocation, which of its
//! hooks to run:
//! 1. Select the mode from the command line
//! 2. Read and parse the stdin document (validate/stream modes)
//! 3. Run the hook in its own task
//! 4. Map the result to sink content and an exit code
//! 5. Finish the writer task
//!
//! # Example
//!
//! ```ignore
//! use modinput::Script;
//!
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     Script::new(MyInput).run().await.into()
//! }
//! ```

use std::any::Any;
use std::ffi::OsString;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinError;

use crate::control::{read_document, Mode};
use crate::error::{ModularInputError, Result};
use crate::handler::{ModularInput, RunContext};
use crate::protocol::xml::XmlBuilder;
use crate::protocol::{InputDefinition, ValidationDefinition};
use crate::writer::{spawn_event_writer, EventWriter, WriterConfig};

/// Configuration for a run.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Sink capacities and command queue size.
    pub writer: WriterConfig,
    /// Write `</stream>` after a successful streaming run.
    pub close_stream_on_success: bool,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Exit code 0.
    Success,
    /// Exit code 1.
    Failure,
}

impl RunOutcome {
    /// Process exit code for this outcome.
    pub fn code(self) -> u8 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::Failure => 1,
        }
    }

    /// Whether the run succeeded.
    pub fn is_success(self) -> bool {
        self == RunOutcome::Success
    }
}

impl From<RunOutcome> for ExitCode {
    fn from(outcome: RunOutcome) -> Self {
        ExitCode::from(outcome.code())
    }
}

/// Result of [`Script::run_with`]: the outcome and both sinks.
#[derive(Debug)]
pub struct RunReport<O, E> {
    /// How the run ended.
    pub outcome: RunOutcome,
    /// The data sink.
    pub out: O,
    /// The log sink.
    pub err: E,
}

/// Runs a [`ModularInput`] plugin against the host protocol.
///
/// Use the fluent API to tune the run, then call [`run`](Script::run).
pub struct Script<P> {
    plugin: Arc<P>,
    config: RunConfig,
}

impl<P: ModularInput> Script<P> {
    /// Wrap a plugin with the default configuration.
    pub fn new(plugin: P) -> Self {
        Self {
            plugin: Arc::new(plugin),
            config: RunConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the data sink capacity in bytes.
    ///
    /// Default: unbounded
    pub fn out_capacity(mut self, capacity: usize) -> Self {
        self.config.writer.out_capacity = capacity;
        self
    }

    /// Set the log sink capacity in bytes.
    ///
    /// Default: unbounded
    pub fn err_capacity(mut self, capacity: usize) -> Self {
        self.config.writer.err_capacity = capacity;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.writer.channel_capacity = capacity;
        self
    }

    /// Whether to write `</stream>` after a successful run.
    ///
    /// Otherwise the stream is ended by process exit.
    /// Default: false
    pub fn close_stream_on_success(mut self, close: bool) -> Self {
        self.config.close_stream_on_success = close;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The wrapped plugin.
    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    /// Run against the process arguments and stdio.
    ///
    /// Never fails: every fault ends up as a log line and
    /// [`RunOutcome::Failure`]. While the run lasts, panic reports go to
    /// `tracing` instead of stderr; the previous panic hook is restored
    /// afterwards.
    pub async fn run(self) -> RunOutcome {
        let _quiet = quiet_panics();
        let args: Vec<String> = std::env::args_os()
            .skip(1)
            .map(|arg: OsString| arg.to_string_lossy().into_owned())
            .collect();

        match self
            .run_with(
                &args,
                tokio::io::stdin(),
                tokio::io::stdout(),
                tokio::io::stderr(),
            )
            .await
        {
            Ok(report) => report.outcome,
            Err(e) => {
                tracing::error!("Event writer failed: {}", e);
                RunOutcome::Failure
            }
        }
    }

    /// Run against the given arguments (program path excluded) and streams.
    ///
    /// # Errors
    ///
    /// Only if the writer task itself dies; hook and protocol failures are
    /// reported through the sinks and the outcome.
    pub async fn run_with<S, R, O, E>(
        &self,
        args: &[S],
        stdin: R,
        out: O,
        err: E,
    ) -> Result<RunReport<O, E>>
    where
        S: AsRef<str>,
        R: AsyncRead + Unpin,
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        let (writer, task) = spawn_event_writer(out, err, self.config.writer.clone());

        let outcome = self.dispatch(args, stdin, &writer).await;
        drop(writer);

        let close_stream = outcome.is_success() && self.config.close_stream_on_success;
        let (out, err) = task.finish(close_stream).await?;

        Ok(RunReport {
            outcome,
            out: out.into_inner(),
            err: err.into_inner(),
        })
    }

    async fn dispatch<S, R>(&self, args: &[S], stdin: R, writer: &EventWriter) -> RunOutcome
    where
        S: AsRef<str>,
        R: AsyncRead + Unpin,
    {
        let mode = match Mode::from_args(args) {
            Ok(mode) => mode,
            Err(e) => return fatal(writer, e).await,
        };
        tracing::debug!(?mode, "modular input invoked");

        match mode {
            Mode::Scheme => self.print_scheme(writer).await,
            Mode::Validate => self.validate(stdin, writer).await,
            Mode::Stream => self.stream(stdin, writer).await,
        }
    }

    async fn print_scheme(&self, writer: &EventWriter) -> RunOutcome {
        let plugin = self.plugin.clone();
        let scheme = match tokio::spawn(async move { plugin.scheme() }).await {
            Ok(Some(scheme)) => scheme,
            Ok(None) => return fatal(writer, ModularInputError::NullScheme).await,
            Err(e) => {
                let message = format!("Scheme hook panicked: {}", panic_message(e));
                return fatal(writer, message).await;
            }
        };

        let written = match scheme.to_xml() {
            Ok(document) => writer.write_document(document).await,
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => RunOutcome::Success,
            Err(e) => fatal(writer, e).await,
        }
    }

    async fn validate<R: AsyncRead + Unpin>(&self, stdin: R, writer: &EventWriter) -> RunOutcome {
        let definition = match read_validation(stdin).await {
            Ok(definition) => definition,
            Err(e) => return fatal(writer, e).await,
        };
        tracing::debug!(stanza = definition.name(), "validating stanza");

        let ctx = RunContext::new(definition.metadata.clone());
        let plugin = self.plugin.clone();
        let verdict = tokio::spawn(async move { plugin.validate_input(&definition, &ctx).await });

        match verdict.await {
            Ok(Ok(())) => RunOutcome::Success,
            Ok(Err(rejection)) => {
                let document = validation_error_document(rejection.message());
                if let Err(e) = writer.write_document(document).await {
                    tracing::error!("Failed to write validation error: {}", e);
                }
                RunOutcome::Failure
            }
            Err(e) => {
                let message = format!("Validation hook panicked: {}", panic_message(e));
                report_error(writer, message).await
            }
        }
    }

    async fn stream<R: AsyncRead + Unpin>(&self, stdin: R, writer: &EventWriter) -> RunOutcome {
        let inputs = match read_inputs(stdin).await {
            Ok(inputs) => inputs,
            Err(e) => return fatal(writer, e).await,
        };
        tracing::debug!(stanzas = inputs.inputs.len(), "streaming events");

        let ctx = RunContext::new(inputs.metadata.clone());
        let plugin = self.plugin.clone();
        let events = writer.clone();
        let streaming =
            tokio::spawn(async move { plugin.stream_events(&inputs, &events, &ctx).await });

        let failure = match streaming.await {
            Ok(Ok(())) => return RunOutcome::Success,
            Ok(Err(e)) => ModularInputError::Streaming(e.to_string()),
            Err(e) => ModularInputError::Streaming(format!(
                "Streaming hook panicked: {}",
                panic_message(e)
            )),
        };
        report_error(writer, failure).await
    }
}

async fn read_validation<R: AsyncRead + Unpin>(stdin: R) -> Result<ValidationDefinition> {
    let document = read_document(stdin).await?;
    ValidationDefinition::parse(&document)
}

async fn read_inputs<R: AsyncRead + Unpin>(stdin: R) -> Result<InputDefinition> {
    let document = read_document(stdin).await?;
    InputDefinition::parse(&document)
}

fn validation_error_document(message: &str) -> String {
    let mut xml = XmlBuilder::new();
    xml.open("error", &[])
        .element("message", message)
        .close("error");
    xml.into_string()
}

/// Log a `FATAL` line and fail the run.
async fn fatal(writer: &EventWriter, message: impl ToString) -> RunOutcome {
    let message = message.to_string();
    if let Err(e) = writer.fatal(&message).await {
        tracing::error!("Failed to log fatal error `{}`: {}", message, e);
    }
    RunOutcome::Failure
}

/// Log an `ERROR` line and fail the run.
async fn report_error(writer: &EventWriter, message: impl ToString) -> RunOutcome {
    let message = message.to_string();
    if let Err(e) = writer.error(&message).await {
        tracing::error!("Failed to log error `{}`: {}", message, e);
    }
    RunOutcome::Failure
}

/// Restores the previous panic hook when dropped.
struct QuietPanics<F: FnOnce()> {
    restore: Option<F>,
}

impl<F: FnOnce()> Drop for QuietPanics<F> {
    fn drop(&mut self) {
        // The hook cannot be swapped from a panicking thread.
        if std::thread::panicking() {
            return;
        }
        if let Some(restore) = self.restore.take() {
            restore();
        }
    }
}

/// Route panic reports to `tracing` so stderr carries only protocol lines.
fn quiet_panics() -> QuietPanics<impl FnOnce()> {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(|info| {
        tracing::debug!("{}", info);
    }));
    QuietPanics {
        restore: Some(move || std::panic::set_hook(previous)),
    }
}

fn panic_message(error: JoinError) -> String {
    match error.try_into_panic() {
        Ok(payload) => payload_text(payload.as_ref()),
        Err(e) => e.to_string(),
    }
}

fn payload_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StreamResult, ValidationError, ValidationResult};
    use crate::protocol::{Event, Scheme, ValidationDefinition};
    use std::sync::atomic::{AtomicBool, Ordering};

    const INPUT: &str = r#"<input>
  <server_host>tiny</server_host>
  <server_uri>https://127.0.0.1:8089</server_uri>
  <session_key>123102983109283019283</session_key>
  <checkpoint_dir>/some/dir</checkpoint_dir>
  <configuration>
    <stanza name="foobar://aaa">
      <param name="param1">value1</param>
    </stanza>
  </configuration>
</input>"#;

    const VALIDATION: &str = r#"<items>
  <server_host>tiny</server_host>
  <server_uri>https://127.0.0.1:8089</server_uri>
  <session_key>123102983109283019283</session_key>
  <checkpoint_dir>/opt/splunk/var/lib/splunk/modinputs</checkpoint_dir>
  <item name="aaa">
    <param name="param1">value1</param>
  </item>
</items>"#;

    struct Panicky;

    impl ModularInput for Panicky {
        fn scheme(&self) -> Option<Scheme> {
            panic!("no scheme today")
        }

        async fn validate_input(
            &self,
            _definition: &ValidationDefinition,
            _ctx: &RunContext,
        ) -> ValidationResult {
            panic!("validator exploded")
        }

        async fn stream_events(
            &self,
            _inputs: &InputDefinition,
            _writer: &EventWriter,
            _ctx: &RunContext,
        ) -> StreamResult {
            panic!("stream exploded")
        }
    }

    struct Picky;

    impl ModularInput for Picky {
        fn scheme(&self) -> Option<Scheme> {
            Some(Scheme::new("picky"))
        }

        async fn validate_input(
            &self,
            definition: &ValidationDefinition,
            _ctx: &RunContext,
        ) -> ValidationResult {
            Err(ValidationError::new(format!(
                "stanza {} needs <param2> & more",
                definition.name()
            )))
        }

        async fn stream_events(
            &self,
            _inputs: &InputDefinition,
            writer: &EventWriter,
            _ctx: &RunContext,
        ) -> StreamResult {
            writer.write_event(&Event::new("first")).await?;
            Err("source went away".into())
        }
    }

    async fn run<P: ModularInput>(
        script: &Script<P>,
        args: &[&str],
        stdin: &str,
    ) -> RunReport<Vec<u8>, Vec<u8>> {
        script
            .run_with(args, stdin.as_bytes(), Vec::new(), Vec::new())
            .await
            .unwrap()
    }

    #[test]
    fn test_run_config_default() {
        let config = RunConfig::default();
        assert!(!config.close_stream_on_success);
        assert_eq!(config.writer.channel_capacity, 1024);
    }

    #[test]
    fn test_outcome_codes() {
        assert_eq!(RunOutcome::Success.code(), 0);
        assert_eq!(RunOutcome::Failure.code(), 1);
        assert!(RunOutcome::Success.is_success());
        assert!(!RunOutcome::Failure.is_success());
    }

    #[test]
    fn test_builder_sets_config() {
        let script = Script::new(Picky)
            .out_capacity(10)
            .err_capacity(20)
            .channel_capacity(4)
            .close_stream_on_success(true);

        let config = script.config();
        assert_eq!(config.writer.out_capacity, 10);
        assert_eq!(config.writer.err_capacity, 20);
        assert_eq!(config.writer.channel_capacity, 4);
        assert!(config.close_stream_on_success);
    }

    #[test]
    fn test_validation_error_document_escapes() {
        assert_eq!(
            validation_error_document("a < b & c"),
            "<error><message>a &lt; b &amp; c</message></error>"
        );
    }

    #[tokio::test]
    async fn test_scheme_panic_is_fatal() {
        let report = run(&Script::new(Panicky), &["--scheme"], "").await;

        assert_eq!(report.outcome, RunOutcome::Failure);
        assert!(report.out.is_empty());
        let err = String::from_utf8(report.err).unwrap();
        assert_eq!(err, "FATAL Scheme hook panicked: no scheme today\n");
    }

    #[tokio::test]
    async fn test_validation_panic_logs_error() {
        let report = run(&Script::new(Panicky), &["--validate-arguments"], VALIDATION).await;

        assert_eq!(report.outcome, RunOutcome::Failure);
        assert!(report.out.is_empty());
        let err = String::from_utf8(report.err).unwrap();
        assert_eq!(err, "ERROR Validation hook panicked: validator exploded\n");
    }

    #[tokio::test]
    async fn test_stream_panic_logs_error() {
        let report = run(&Script::new(Panicky), &[], INPUT).await;

        assert_eq!(report.outcome, RunOutcome::Failure);
        assert!(report.out.is_empty());
        let err = String::from_utf8(report.err).unwrap();
        assert_eq!(err, "ERROR Streaming hook panicked: stream exploded\n");
    }

    #[tokio::test]
    async fn test_validation_rejection_is_escaped() {
        let report = run(&Script::new(Picky), &["--validate-arguments"], VALIDATION).await;

        assert_eq!(report.outcome, RunOutcome::Failure);
        assert!(report.err.is_empty());
        assert_eq!(
            String::from_utf8(report.out).unwrap(),
            "<error><message>stanza aaa needs &lt;param2&gt; &amp; more</message></error>"
        );
    }

    #[tokio::test]
    async fn test_stream_error_leaves_stream_open() {
        let report = run(&Script::new(Picky), &[], INPUT).await;

        assert_eq!(report.outcome, RunOutcome::Failure);
        assert_eq!(
            String::from_utf8(report.out).unwrap(),
            "<stream><event><data>first</data></event>"
        );
        assert_eq!(
            String::from_utf8(report.err).unwrap(),
            "ERROR source went away\n"
        );
    }

    #[tokio::test]
    async fn test_stream_error_not_closed_even_when_configured() {
        let script = Script::new(Picky).close_stream_on_success(true);
        let report = run(&script, &[], INPUT).await;

        assert_eq!(report.outcome, RunOutcome::Failure);
        assert_eq!(
            String::from_utf8(report.out).unwrap(),
            "<stream><event><data>first</data></event>"
        );
        assert_eq!(
            String::from_utf8(report.err).unwrap(),
            "ERROR source went away\n"
        );
    }

    #[test]
    fn test_quiet_panics_restores_previous_hook() {
        static CALLED: AtomicBool = AtomicBool::new(false);
        std::panic::set_hook(Box::new(|_| CALLED.store(true, Ordering::SeqCst)));

        {
            let _quiet = quiet_panics();
            CALLED.store(false, Ordering::SeqCst);
            assert!(std::panic::catch_unwind(|| panic!("quiet")).is_err());
            assert!(!CALLED.load(Ordering::SeqCst));
        }

        assert!(std::panic::catch_unwind(|| panic!("loud")).is_err());
        assert!(CALLED.load(Ordering::SeqCst));

        drop(std::panic::take_hook());
    }

    #[tokio::test]
    async fn test_malformed_stdin_is_fatal() {
        let report = run(&Script::new(Picky), &[], "<input><configuration>").await;

        assert_eq!(report.outcome, RunOutcome::Failure);
        assert!(report.out.is_empty());
        let err = String::from_utf8(report.err).unwrap();
        assert!(err.starts_with("FATAL failed to parse input configuration"));
    }
}
