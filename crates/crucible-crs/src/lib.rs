//! Client-side Component Resolution Store cache: a local merged view of
//! remote repositories with fetch+revalidate and a content-addressed
//! source layout (spec §3.4, §4.C).

mod cache;
mod db;
mod error;
mod http;
mod sync;

pub use cache::{CrsCache, EnabledPackage};
pub use error::{Error, Result};
pub use sync::SyncPolicy;
