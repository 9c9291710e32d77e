use alloc::string::String;
use core::{fmt, panic::Location};

use triomphe::Arc;
use unsize::CoerceUnsize;

use crate::{
    Failure,
    handler::{FailureHandler, print_failure},
    hooks::hook_lock::HookLock,
};

static DEFAULT_HANDLER: HookLock<Registered> = HookLock::new();

struct Registered {
    handler: Arc<dyn FailureHandler>,
    type_name: &'static str,
    added_at: &'static Location<'static>,
}

impl fmt::Display for Registered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Default failure handler {} registered at {}:{}",
            self.type_name,
            self.added_at.file(),
            self.added_at.line()
        )
    }
}

/// Replaces the handler used by [`Handler`](crate::Handler)s without entries.
///
/// Until one is registered, such handlers call
/// [`print_failure`](crate::print_failure).
///
/// # Examples
///
/// ```
/// use failures::{Failure, Handler, hooks};
///
/// hooks::register_default_handler(|failure: &Failure| {
///     eprintln!("unhandled failure in {}", failure.source());
/// });
///
/// Handler::new().handle(&Failure::new("job", "boom", Default::default()));
/// ```
#[track_caller]
pub fn register_default_handler<H: FailureHandler>(handler: H) {
    let registered = Registered {
        handler: Arc::new(handler).unsize(unsize::Coercion!(to dyn FailureHandler)),
        type_name: core::any::type_name::<H>(),
        added_at: Location::caller(),
    };
    tracing::debug!(hook = %registered, "default handler registered");
    *DEFAULT_HANDLER.write() = Some(registered);
}

/// Removes the registered default handler, going back to
/// [`print_failure`](crate::print_failure).
pub fn reset_default_handler() {
    *DEFAULT_HANDLER.write() = None;
}

pub(crate) fn run_default_handler(failure: &Failure) {
    // Released before calling out so the handler may register hooks itself.
    let handler = DEFAULT_HANDLER
        .read()
        .as_ref()
        .map(|registered| registered.handler.clone());
    match handler {
        Some(handler) => handler.handle(failure),
        None => print_failure(failure),
    }
}

pub(crate) fn describe() -> Option<String> {
    DEFAULT_HANDLER
        .read()
        .as_ref()
        .map(alloc::string::ToString::to_string)
}
