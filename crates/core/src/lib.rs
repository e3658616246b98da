#![forbid(unsafe_code)]

pub mod contract;
pub mod paths;
pub mod validate;

pub use contract::{FieldKind, FieldSpec, ToolContract};
pub use paths::{PathError, resolve_under_root};
pub use validate::{ValidationError, validate};
