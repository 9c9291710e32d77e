//! Commonly used items for convenient importing.
//!
//! ```rust
//! use failures::prelude::*;
//!
//! fn divide(reporter: &Reporter, a: i32, b: i32) -> Result<i32, FailureError> {
//!     if b == 0 {
//!         report!(reporter, "cannot divide by zero", { "a" => a });
//!         return Ok(0);
//!     }
//!     Ok(a / b)
//! }
//!
//! let scope = Scope::new("math").unwrap();
//! let result = scope.run(|reporter| divide(reporter, 10, 0));
//! assert_eq!(result.unwrap_err().failure().details().get("a"), Some(&serde_json::json!(10)));
//! ```

pub use crate::{
    BoxError, Details, Failure, FailureError, Filter, Handler, Reporter, ResultExt, Scope,
    Scoped, Severity, TryIntoFailure, details, markers, report,
};
