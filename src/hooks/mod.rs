//! Process-wide hooks.
//!
//! Two things can be configured globally:
//!
//! - the default handler, used by [`Handler`](crate::Handler)s that have no
//!   entries ([`register_default_handler`]);
//! - detail collectors, whose values are added to every failure captured from
//!   a fresh error ([`register_detail_collector`]).
//!
//! Hooks are usually registered once at startup. Every registration remembers
//! where it was made, which [`registered`] reports for debugging.
//!
//! ```
//! use failures::hooks;
//!
//! hooks::register_detail_collector("host", || "worker-1");
//!
//! for hook in hooks::registered() {
//!     println!("{hook}");
//! }
//! ```

mod default_handler;
mod detail_collectors;
mod hook_lock;

use alloc::{string::String, vec::Vec};

pub(crate) use self::{default_handler::run_default_handler, detail_collectors::collect_details};
pub use self::{
    default_handler::{register_default_handler, reset_default_handler},
    detail_collectors::{DetailCollector, clear_detail_collectors, register_detail_collector},
};

/// Describes every registered hook and where it was registered.
pub fn registered() -> Vec<String> {
    let mut hooks: Vec<String> = default_handler::describe().into_iter().collect();
    hooks.extend(detail_collectors::describe());
    hooks
}
