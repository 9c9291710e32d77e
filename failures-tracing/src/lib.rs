#![deny(
    missing_docs,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]

//! Tracing integration for the `failures` crate.
//!
//! Two directions are covered:
//!
//! - **Spans into failures.** [`FailuresLayer`] records span fields while
//!   your other layers do their work. [`SpanCollector`] (a detail collector)
//!   or [`SpanExt::attach_span`] then copy the active span chain into the
//!   details of failures under the `"span"` key.
//! - **Failures into events.** [`TracingHandler`] is a failure handler that
//!   emits every failure it receives as a tracing event.
//!
//! # Quick Start
//!
//! ```
//! use failures::{Handler, Reporter, hooks};
//! use failures_tracing::{FailuresLayer, SpanCollector, TracingHandler};
//! use tracing_subscriber::{Registry, layer::SubscriberExt};
//!
//! let subscriber = Registry::default()
//!     .with(FailuresLayer)
//!     .with(tracing_subscriber::fmt::layer());
//! tracing::subscriber::set_global_default(subscriber).expect("failed to set subscriber");
//!
//! hooks::register_detail_collector("span", SpanCollector::new());
//! hooks::register_default_handler(TracingHandler::default());
//!
//! #[tracing::instrument(fields(user_id = 42))]
//! fn load() {
//!     let reporter = Reporter::new("user.load").unwrap();
//!     reporter.report("connection reset").unwrap();
//!     Handler::new().handle_reporter(&reporter);
//! }
//! load();
//! ```
//!
//! The failure is logged through the fmt layer with
//! `details={span=["load{user_id=42}"]}`.

use std::{fmt, sync::OnceLock};

use failures::{Failure, FailureHandler, ReporterBuilder, hooks::DetailCollector};
use serde_json::Value;
use tracing::{
    Level, Span,
    field::{Field, Visit},
};
use tracing_subscriber::{
    Registry,
    registry::{LookupSpan, SpanRef},
};

/// Detail key used for captured spans.
pub const SPAN_KEY: &str = "span";

#[derive(Default)]
struct CapturedFields(String);

struct FieldVisitor<'a> {
    output: &'a mut String,
}

impl Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        use std::fmt::Write;
        if !self.output.is_empty() {
            self.output.push(' ');
        }
        let _ = write!(self.output, "{}={:?}", field.name(), value);
    }
}

/// A [`Layer`](tracing_subscriber::Layer) that records span fields so they
/// can be copied into failure details.
///
/// Without this layer spans are still captured, but only by name.
///
/// ```
/// use failures_tracing::FailuresLayer;
/// use tracing_subscriber::{Registry, layer::SubscriberExt};
///
/// let subscriber = Registry::default()
///     .with(FailuresLayer)
///     .with(tracing_subscriber::fmt::layer());
///
/// tracing::subscriber::set_global_default(subscriber).expect("failed to set subscriber");
/// ```
#[derive(Copy, Clone, Debug, Default)]
pub struct FailuresLayer;

impl<S> tracing_subscriber::Layer<S> for FailuresLayer
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = CapturedFields::default();
        attrs.record(&mut FieldVisitor {
            output: &mut fields.0,
        });
        span.extensions_mut().insert(fields);
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<CapturedFields>() {
            Some(fields) => values.record(&mut FieldVisitor {
                output: &mut fields.0,
            }),
            None => {
                let mut fields = CapturedFields::default();
                values.record(&mut FieldVisitor {
                    output: &mut fields.0,
                });
                extensions.insert(fields);
            }
        }
    }
}

fn render(span: &SpanRef<'_, Registry>) -> String {
    match span.extensions().get::<CapturedFields>() {
        Some(fields) if !fields.0.is_empty() => format!("{}{{{}}}", span.name(), fields.0),
        _ => span.name().to_owned(),
    }
}

/// Renders the spans entered on the current thread, outermost first.
///
/// Each span is rendered as `name{field=value ...}`. With `leaf_only`, only
/// the innermost span is returned. Returns an empty list when no span is
/// entered or the subscriber is not built on a [`Registry`].
pub fn current_spans(leaf_only: bool) -> Vec<String> {
    Span::current()
        .with_subscriber(|(id, dispatch)| {
            let Some(registry) = dispatch.downcast_ref::<Registry>() else {
                return Vec::new();
            };
            let Some(span) = registry.span(id) else {
                return Vec::new();
            };
            let mut spans: Vec<String> = span.scope().map(|span| render(&span)).collect();
            if leaf_only {
                spans.truncate(1);
            }
            spans.reverse();
            spans
        })
        .unwrap_or_default()
}

#[derive(Debug)]
struct FailuresTracingEnvOptions {
    leaf_only: bool,
}

impl FailuresTracingEnvOptions {
    fn get() -> &'static Self {
        static FAILURES_TRACING_FLAGS: OnceLock<FailuresTracingEnvOptions> = OnceLock::new();

        FAILURES_TRACING_FLAGS.get_or_init(|| {
            let mut leaf_only = false;

            if let Some(var) = std::env::var_os("FAILURES_TRACING") {
                for v in var.to_string_lossy().split(',') {
                    if v.trim().eq_ignore_ascii_case("leaf") {
                        leaf_only = true;
                    }
                }
            }

            FailuresTracingEnvOptions { leaf_only }
        })
    }
}

/// Detail collector that captures the active span chain.
///
/// Register it with [`failures::hooks::register_detail_collector`], usually
/// under [`SPAN_KEY`]. Produces `null`, and so adds nothing, when no span is
/// entered.
///
/// ```
/// use failures::hooks;
/// use failures_tracing::{SPAN_KEY, SpanCollector};
///
/// hooks::register_detail_collector(SPAN_KEY, SpanCollector { leaf_only: true });
/// ```
#[derive(Copy, Clone, Debug)]
pub struct SpanCollector {
    /// Capture only the innermost span instead of the whole chain.
    pub leaf_only: bool,
}

impl SpanCollector {
    /// Creates a collector configured from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `FAILURES_TRACING` - Comma-separated options:
    ///   - `leaf` - Only capture the innermost span
    pub fn new() -> Self {
        Self {
            leaf_only: FailuresTracingEnvOptions::get().leaf_only,
        }
    }
}

impl Default for SpanCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl DetailCollector for SpanCollector {
    fn collect(&self) -> Value {
        let spans = current_spans(self.leaf_only);
        if spans.is_empty() {
            Value::Null
        } else {
            Value::from(spans)
        }
    }
}

/// Attaches the active span chain to a reporter under construction.
///
/// Every failure the built reporter captures carries the spans that were
/// active when the reporter was built.
///
/// ```
/// use failures::Reporter;
/// use failures_tracing::SpanExt;
///
/// let _guard = tracing::info_span!("import", file = "users.csv").entered();
/// let reporter = Reporter::builder("import.row").attach_span().build().unwrap();
/// # let _ = reporter;
/// ```
pub trait SpanExt: Sized {
    /// Adds the current spans under [`SPAN_KEY`]. Does nothing when no span
    /// is entered.
    fn attach_span(self) -> Self;
}

impl SpanExt for ReporterBuilder {
    fn attach_span(self) -> Self {
        match SpanCollector::new().collect() {
            Value::Null => self,
            spans => self.detail(SPAN_KEY, spans),
        }
    }
}

/// Failure handler that emits each failure as a tracing event.
///
/// Events use the `failures` target and carry `source`, `error` and
/// `details` fields.
///
/// ```
/// use failures::{Filter, Handler};
/// use failures_tracing::TracingHandler;
/// use tracing::Level;
///
/// let handler = Handler::builder()
///     .on_matching("db.*", TracingHandler::new(Level::WARN))
///     .on(TracingHandler::default())
///     .build()
///     .unwrap();
/// # let _ = handler;
/// ```
#[derive(Copy, Clone, Debug)]
pub struct TracingHandler {
    level: Level,
}

impl TracingHandler {
    /// Creates a handler emitting events at `level`.
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// The level events are emitted at.
    pub fn level(&self) -> Level {
        self.level
    }
}

impl Default for TracingHandler {
    fn default() -> Self {
        Self::new(Level::ERROR)
    }
}

impl FailureHandler for TracingHandler {
    fn handle(&self, failure: &Failure) {
        let source = failure.source();
        let error = failure.error();
        let details = failure.details();
        // Callsite levels must be constants.
        if self.level == Level::ERROR {
            tracing::error!(target: "failures", source, error = %error, details = %details, "failure");
        } else if self.level == Level::WARN {
            tracing::warn!(target: "failures", source, error = %error, details = %details, "failure");
        } else if self.level == Level::INFO {
            tracing::info!(target: "failures", source, error = %error, details = %details, "failure");
        } else if self.level == Level::DEBUG {
            tracing::debug!(target: "failures", source, error = %error, details = %details, "failure");
        } else {
            tracing::trace!(target: "failures", source, error = %error, details = %details, "failure");
        }
    }
}

/// Emits `failure` as an `ERROR` event. Usable directly as a handler entry.
pub fn log_failure(failure: &Failure) {
    TracingHandler::default().handle(failure);
}
