//! Build plan construction and usage-requirements aggregation
//! (SPEC_FULL §3.5, §4.F, §4.I).

mod error;
mod node;
mod plan;
mod source;
mod usage;

pub use crucible_toolchain::DepsMode;
pub use error::{Error, Result};
pub use node::{ArchiveNode, BuildNode, CompileNode, LinkKind, LinkNode, TestNode};
pub use plan::{BuildPlan, PlanOptions};
pub use source::{scan_sources, LangTag, SourceFile, SourceKind};
pub use usage::{ActivatedPackage, UsageGraph, UsageRequirements};
