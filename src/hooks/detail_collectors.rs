use alloc::{
    string::{String, ToString},
    vec::Vec,
};
use core::{fmt, panic::Location};

use serde_json::Value;
use triomphe::Arc;
use unsize::CoerceUnsize;

use crate::{Details, hooks::hook_lock::HookLock};

type CollectorSet = Vec<Arc<dyn UntypedDetailCollector>>;

static COLLECTORS: HookLock<CollectorSet> = HookLock::new();

trait UntypedDetailCollector: 'static + Send + Sync + fmt::Display {
    fn key(&self) -> &str;

    fn collect(&self) -> Value;
}

/// Produces a value that is added to the details of every captured failure.
///
/// Implemented for closures returning anything that converts into a
/// [`serde_json::Value`].
pub trait DetailCollector: 'static + Send + Sync {
    /// Produces the value for the current failure.
    fn collect(&self) -> Value;
}

impl<F, V> DetailCollector for F
where
    F: Fn() -> V + Send + Sync + 'static,
    V: Into<Value>,
{
    fn collect(&self) -> Value {
        self().into()
    }
}

#[track_caller]
fn collector_to_untyped<C: DetailCollector>(
    key: String,
    collector: C,
) -> Arc<dyn UntypedDetailCollector> {
    struct Hook<C> {
        key: String,
        collector: C,
        added_at: &'static Location<'static>,
    }

    impl<C> fmt::Display for Hook<C> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "Detail collector {} for key {:?} registered at {}:{}",
                core::any::type_name::<C>(),
                self.key,
                self.added_at.file(),
                self.added_at.line()
            )
        }
    }

    impl<C: DetailCollector> UntypedDetailCollector for Hook<C> {
        fn key(&self) -> &str {
            &self.key
        }

        fn collect(&self) -> Value {
            self.collector.collect()
        }
    }

    let hook = Hook {
        key,
        collector,
        added_at: Location::caller(),
    };
    Arc::new(hook).unsize(unsize::Coercion!(to dyn UntypedDetailCollector))
}

/// Registers a collector whose value is stored under `key` in the details of
/// every failure captured from a fresh error.
///
/// Collected values have the lowest precedence: reporter details and
/// call-site details with the same key override them. Collectors run in
/// registration order; registering the same key twice makes the later
/// collector win. A collector producing `null` adds nothing.
///
/// # Examples
///
/// ```
/// use failures::{Reporter, hooks};
///
/// hooks::register_detail_collector("pid", || std::process::id());
///
/// let reporter = Reporter::new("job").unwrap();
/// reporter.report("boom").unwrap();
/// assert!(reporter.failures()[0].details().contains_key("pid"));
/// ```
#[track_caller]
pub fn register_detail_collector<C: DetailCollector>(key: impl Into<String>, collector: C) {
    let hook = collector_to_untyped(key.into(), collector);
    tracing::debug!(hook = %hook, "detail collector registered");
    COLLECTORS.write().get_or_insert_with(Vec::new).push(hook);
}

/// Removes every registered detail collector.
pub fn clear_detail_collectors() {
    *COLLECTORS.write() = None;
}

pub(crate) fn collect_details() -> Details {
    // Cloned out of the lock so collectors can run without holding it.
    let collectors = match COLLECTORS.read().as_ref() {
        Some(collectors) if !collectors.is_empty() => collectors.clone(),
        _ => return Details::new(),
    };
    collectors
        .iter()
        .map(|collector| (collector.key(), collector.collect()))
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

pub(crate) fn describe() -> Vec<String> {
    COLLECTORS
        .read()
        .iter()
        .flatten()
        .map(ToString::to_string)
        .collect()
}
