//! Shared identity and hashing primitives: names, versions, package ids,
//! library usage, version ranges, content digests, and the breadcrumb
//! carrier used for error diagnostics across the workspace.

pub mod breadcrumb;
pub mod digest;
pub mod fsops;
pub mod name;
pub mod pkg_id;
pub mod policy;
pub mod usage;
pub mod version;
pub mod version_range;

pub use breadcrumb::{Breadcrumb, Trail};
pub use digest::{digest_reader, djb2, Digest, InvalidDigestError};
pub use fsops::{atomic_move, StagingDir};
pub use name::{validate_name, InvalidNameError, Name, NameBuf};
pub use pkg_id::{InvalidPkgIdError, PkgId, Revision};
pub use policy::{IfExists, IfMissing};
pub use usage::Usage;
pub use version::{InvalidVersionError, Version};
pub use version_range::{Interval, InvalidRangeError, VersionRangeSet};
