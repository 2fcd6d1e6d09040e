//! The flow chart document: graph data, structural patches, validation and diffing.

pub mod definition;
pub mod diff;
pub mod patch;
pub mod validation;

pub use definition::*;
pub use diff::diff;
pub use patch::*;
pub use validation::*;
