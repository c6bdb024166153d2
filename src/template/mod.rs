//! Template model and structural diffing.
//!
//! Templates are parsed into an ordered YAML tree. The differ walks two
//! trees side by side and yields typed change records on demand.

mod diff;
mod model;
mod path;

pub use diff::{ChangeRecord, ElementChange, TemplateDiff};
pub use model::{PARAMETERS_SECTION, RESOURCES_SECTION, Template};
pub use path::{ChangePath, PathToken};
