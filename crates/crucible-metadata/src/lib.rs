//! Package metadata JSON schema: parsing, validation, canonical
//! serialization and "did you mean" field hinting (spec §3.2, §4.A).

mod error;
mod hint;
mod library;
mod metadata;
mod shorthand;

pub use error::{Error, Result};
pub use library::{Dependency, LibraryInfo};
pub use metadata::PackageMetadata;
pub use shorthand::DependencyShorthand;
