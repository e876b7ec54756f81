// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `.checksums` integrity manifest type (spec §6).
//!
//! Verification (BLAKE3 digest comparison against the filesystem) is
//! explicitly out of scope; this crate only defines the on-disk shape so a
//! future verifier has something to deserialize.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Maps each protected file's absolute path to a `blake3:<hex>` digest string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntegrityManifest {
    pub digests: BTreeMap<PathBuf, String>,
}

impl IntegrityManifest {
    pub fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
