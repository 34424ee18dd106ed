//! Raw catalog records as produced by the package evaluator and the build
//! farm.
//!
//! These types mirror the external JSON shapes closely. Fields whose shape
//! varies between packages are kept as [`Value`] and interpreted by the
//! document normalizer.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::{Value, present};

/// A point-in-time evaluation of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Number of revisions since the channel started.
    pub revisions_since_start: u64,
    /// Source-control revision the evaluation was built from.
    pub git_revision: String,
    /// Object-store prefix the evaluation was found under (no trailing `/`).
    pub prefix: String,
    /// Build-farm evaluation id.
    pub id: String,
}

impl Evaluation {
    /// Compound identity used in index names.
    ///
    /// The `id-revisions-revision` triple appears twice; existing deployments
    /// depend on the exact string.
    pub fn identity(&self) -> String {
        let triple = format!(
            "{}-{}-{}",
            self.id, self.revisions_since_start, self.git_revision
        );
        format!("{triple}-{triple}")
    }
}

/// One entry of the evaluator's package listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PackageRecord {
    /// Derivation name (`pname-version`).
    pub name: String,
    /// Package name without version.
    pub pname: String,
    /// Package version.
    #[serde(default)]
    pub version: String,
    /// Platform the listing was evaluated for.
    #[serde(default)]
    pub system: String,
    /// Package metadata.
    #[serde(default)]
    pub meta: PackageMeta,
}

/// The `meta` attribute of a package.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PackageMeta {
    /// String, mapping, or list of either.
    #[serde(default)]
    pub license: Option<Value>,
    /// String, mapping, or arbitrarily nested list of either.
    ///
    /// `Some(Value::Null)` when the key is present with `null`.
    #[serde(default, deserialize_with = "present")]
    pub maintainers: Option<Value>,
    /// Platform strings, possibly nested, possibly mixed with patterns.
    #[serde(default)]
    pub platforms: Option<Value>,
    /// Platforms the package is known not to build on.
    #[serde(default, rename = "badPlatforms")]
    pub bad_platforms: Option<Value>,
    /// String or list of strings.
    #[serde(default)]
    pub homepage: Option<Value>,
    /// `file:line` of the package definition.
    #[serde(default)]
    pub position: Option<String>,
    /// One-line description.
    #[serde(default)]
    pub description: Option<String>,
    /// Long description.
    #[serde(default, rename = "longDescription")]
    pub long_description: Option<String>,
}

/// One entry of the options listing.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct OptionRecord {
    /// Files declaring the option.
    #[serde(default)]
    pub declarations: Vec<String>,
    /// Description markup: a string, or an `{ _type, text }` wrapper.
    #[serde(default)]
    pub description: Option<Value>,
    /// Human-readable type description.
    #[serde(default, rename = "type")]
    pub option_type: Option<String>,
    /// Default value; `Some(Value::Null)` when present as `null`.
    #[serde(default, deserialize_with = "present")]
    pub default: Option<Value>,
    /// Example value; `Some(Value::Null)` when present as `null`.
    #[serde(default, deserialize_with = "present")]
    pub example: Option<Value>,
}

/// A single output of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutput {
    /// Store path of the output.
    pub path: String,
}

/// One build of an evaluation, as listed by the build farm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Build id.
    pub id: u64,
    /// Build status code; absent while the build is queued.
    #[serde(default)]
    pub buildstatus: Option<i64>,
    /// Target platform.
    pub system: String,
    /// Build-farm project.
    #[serde(default)]
    pub project: String,
    /// Build-farm jobset.
    #[serde(default)]
    pub jobset: String,
    /// Job name.
    #[serde(default)]
    pub job: String,
    /// Outputs by name, in listing order.
    #[serde(default)]
    pub buildoutputs: IndexMap<String, BuildOutput>,
    /// Derivation store path.
    #[serde(default)]
    pub drvpath: String,
    /// Derivation name the build belongs to.
    pub nixname: String,
}

/// Build records keyed by derivation name, then by platform.
pub type BuildResults = BTreeMap<String, BTreeMap<String, BuildRecord>>;

/// Group a flat build listing by derivation name and platform.
///
/// A later record for the same name and platform replaces an earlier one.
pub fn group_builds<I>(builds: I) -> BuildResults
where
    I: IntoIterator<Item = BuildRecord>,
{
    let mut grouped = BuildResults::new();
    for build in builds {
        grouped
            .entry(build.nixname.clone())
            .or_default()
            .insert(build.system.clone(), build);
    }
    grouped
}

// ============================================================================
// Tests
// ============================================================================
