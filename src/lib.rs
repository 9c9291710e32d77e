#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_core,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Label nested operations and route their failures to filtered handlers.
//!
//! ## Overview
//!
//! Errors raised deep inside reusable functions usually lose the information
//! of *where, logically,* they happened. This crate lets application code
//! name the operations it performs (`user.retrieve`, `user.get.email`) and
//! labels every error with the dotted path of the operations it crossed,
//! without backtraces and without threading names through every call.
//!
//! The pieces:
//!
//! - [`Reporter`]: a node in a tree of named operations. All nodes of a tree
//!   share one [`FailureStore`]. Reporting an error through a node produces a
//!   [`Failure`] whose source is the node's label; the node's [`Severity`]
//!   decides whether it propagates, is recorded or is discarded.
//! - [`Scope`]: runs a body with a reporter and labels the error it returns.
//!   Scopes compose: an error crossing three unrelated scopes ends up as a
//!   single failure labeled `outer.middle.inner`.
//! - [`Filter`] and [`Handler`]: route failures to handler functions by label
//!   pattern and error type.
//! - [`hooks`]: process-wide default handler and detail collectors.
//!
//! ## Quick example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use failures::prelude::*;
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("user {0} not found")]
//! struct NotFound(u32);
//!
//! fn get_email(reporter: &Reporter, id: u32) -> Result<String, FailureError> {
//!     let reporter = reporter.child("email").unwrap();
//!     reporter.required(|| Err(NotFound(id)))
//! }
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let handler = Handler::builder()
//!     .on_matching(Filter::error::<NotFound>(), {
//!         let seen = seen.clone();
//!         move |failure: &Failure| seen.lock().unwrap().push(failure.to_string())
//!     })
//!     .build()
//!     .unwrap();
//!
//! let scope = Scope::new("user").unwrap().with_handler(handler);
//! let email = scope.run(|reporter| get_email(reporter, 7));
//!
//! assert_eq!(email, None);
//! assert_eq!(*seen.lock().unwrap(), ["user.email: user 7 not found"]);
//! ```
//!
//! ## Severities
//!
//! | severity   | `report` returns          | store        |
//! |------------|---------------------------|--------------|
//! | `Required` | `Err(FailureError)`       | untouched    |
//! | `Normal`   | `Ok(())`                  | appended     |
//! | `Optional` | `Ok(())`                  | untouched    |
//!
//! Root reporters default to `Normal`; children inherit their parent's
//! severity. Scopes created with [`Scope::new`] are `Required`.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `debug` when a failure is captured,
//! `trace` when it is recorded, discarded, re-homed or dispatched, and `warn`
//! when a handled scope swallows a failure that no entry received. The
//! `failures-tracing` companion crate provides a layer that copies span fields
//! into failure details and a handler that logs failures as events.

extern crate alloc;

#[macro_use]
mod macros;

mod details;
mod failure;
mod filter;
mod handler;
pub mod hooks;
pub mod label;
pub mod markers;
pub mod prelude;
mod reporter;
mod result_ext;
mod scope;
mod store;

pub use self::{
    details::Details,
    failure::{BoxError, Failure, FailureError, TryIntoFailure},
    filter::{ErrorPattern, Filter, InvalidFilterError, LabelPattern, Predicate},
    handler::{FailureHandler, Handler, HandlerBuilder, print_failure},
    label::{InvalidLabelError, LabelErrorKind},
    reporter::{Reporter, ReporterBuilder, Severity},
    result_ext::ResultExt,
    scope::{Scope, Scoped},
    store::FailureStore,
};
