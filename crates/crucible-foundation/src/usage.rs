//! Library usage identifiers: `(namespace, library_name)` (spec §3.1).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::name::NameBuf;

/// Identifies a single library hosted by a package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Usage {
    pub namespace: NameBuf,
    pub library_name: NameBuf,
}

impl Usage {
    pub fn new(namespace: NameBuf, library_name: NameBuf) -> Self {
        Self {
            namespace,
            library_name,
        }
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.library_name)
    }
}
