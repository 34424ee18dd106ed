//! Search documents.
//!
//! A [`Document`] is the flat, search-ready form of one catalog record. Field
//! names are part of the index contract shared with the search frontend and
//! with the mapping in [`crate::mapping`]; they keep their historical spelling
//! (`package_longDescription`, `package_hydra`, ...).

use serde::{Deserialize, Serialize};

use crate::suggest::Suggestion;

/// One indexed document, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Document {
    /// A package from the package listing.
    Package(PackageDocument),
    /// A configuration option from the options listing.
    Option(OptionDocument),
}

impl Document {
    /// The `type` discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            Document::Package(_) => "package",
            Document::Option(_) => "option",
        }
    }

    /// Attribute name of a package or dotted name of an option.
    pub fn name(&self) -> &str {
        match self {
            Document::Package(p) => &p.attr_name,
            Document::Option(o) => &o.name,
        }
    }

    /// Serialize to a JSON object.
    pub fn to_json(&self) -> nixdex_core::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl From<PackageDocument> for Document {
    fn from(doc: PackageDocument) -> Self {
        Document::Package(doc)
    }
}

impl From<OptionDocument> for Document {
    fn from(doc: OptionDocument) -> Self {
        Document::Option(doc)
    }
}

/// A license entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    /// Full license name.
    #[serde(rename = "fullName")]
    pub full_name: String,
    /// License URL, if known.
    pub url: Option<String>,
}

/// A maintainer entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintainer {
    /// Display name.
    pub name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// GitHub handle.
    pub github: Option<String>,
}

/// One output path of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydraOutput {
    /// Output name (`out`, `dev`, `man`, ...).
    pub output: String,
    /// Store path.
    pub path: String,
}

/// Build status of a package on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydraBuild {
    /// Build-farm build id.
    pub build_id: u64,
    /// Build status code; `0` means success, `None` while queued.
    pub build_status: Option<i64>,
    /// Target platform (`x86_64-linux`, ...).
    pub platform: String,
    /// Build-farm project.
    pub project: String,
    /// Build-farm jobset.
    pub jobset: String,
    /// Job (attribute path with platform suffix).
    pub job: String,
    /// Output paths.
    pub path: Vec<HydraOutput>,
    /// Derivation store path.
    pub drv_path: String,
}

/// Search document for a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDocument {
    /// Builds of this derivation, one per platform; `null` when unknown.
    #[serde(rename = "package_hydra")]
    pub hydra: Option<Vec<HydraBuild>>,

    /// Attribute path.
    #[serde(rename = "package_attr_name")]
    pub attr_name: String,
    /// `attr_name` reversed.
    #[serde(rename = "package_attr_name_reverse")]
    pub attr_name_reverse: String,
    /// Search tokens of `attr_name`.
    #[serde(rename = "package_attr_name_query")]
    pub attr_name_query: Vec<String>,
    /// `attr_name_query`, each token reversed.
    #[serde(rename = "package_attr_name_query_reverse")]
    pub attr_name_query_reverse: Vec<String>,

    /// Package set the attribute belongs to (`pythonPackages`, ...).
    #[serde(rename = "package_attr_set")]
    pub attr_set: Option<String>,
    /// `attr_set` reversed.
    #[serde(rename = "package_attr_set_reverse")]
    pub attr_set_reverse: Option<String>,

    /// Package name with any ecosystem prefix removed.
    #[serde(rename = "package_pname")]
    pub pname: String,
    /// `pname` reversed.
    #[serde(rename = "package_pname_reverse")]
    pub pname_reverse: String,
    /// Package version.
    #[serde(rename = "package_pversion")]
    pub pversion: String,

    /// Short description.
    #[serde(rename = "package_description")]
    pub description: Option<String>,
    /// `description` reversed.
    #[serde(rename = "package_description_reverse")]
    pub description_reverse: Option<String>,
    /// Long description; empty when absent.
    #[serde(rename = "package_longDescription")]
    pub long_description: String,
    /// `long_description` reversed.
    #[serde(rename = "package_longDescription_reverse")]
    pub long_description_reverse: String,

    /// Licenses.
    #[serde(rename = "package_license")]
    pub license: Vec<License>,
    /// Full names of `license`, for faceting.
    #[serde(rename = "package_license_set")]
    pub license_set: Vec<String>,
    /// Maintainers.
    #[serde(rename = "package_maintainers")]
    pub maintainers: Vec<Maintainer>,
    /// Non-empty maintainer names, for faceting.
    #[serde(rename = "package_maintainers_set")]
    pub maintainers_set: Vec<String>,

    /// Supported platforms from the allow-list.
    #[serde(rename = "package_platforms")]
    pub platforms: Vec<String>,
    /// Definition position relative to the source tree.
    #[serde(rename = "package_position")]
    pub position: Option<String>,
    /// Homepage URLs.
    #[serde(rename = "package_homepage")]
    pub homepage: Vec<String>,
    /// Platform the package listing was evaluated on.
    #[serde(rename = "package_system")]
    pub system: String,

    /// Completion suggestions for the name.
    #[serde(rename = "package_suggestions")]
    pub suggestions: Vec<Suggestion>,
}

/// Search document for a configuration option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDocument {
    /// Dotted option name.
    #[serde(rename = "option_name")]
    pub name: String,
    /// `name` reversed.
    #[serde(rename = "option_name_reverse")]
    pub name_reverse: String,
    /// Search tokens of `name`.
    #[serde(rename = "option_name_query")]
    pub name_query: Vec<String>,
    /// `name_query`, each token reversed.
    #[serde(rename = "option_name_query_reverse")]
    pub name_query_reverse: Vec<String>,

    /// Description, converted to HTML when it carried markup.
    #[serde(rename = "option_description")]
    pub description: Option<String>,
    /// `description` reversed.
    #[serde(rename = "option_description_reverse")]
    pub description_reverse: Option<String>,

    /// Option type description (`boolean`, `list of string`, ...).
    #[serde(rename = "option_type")]
    pub option_type: Option<String>,
    /// Default value rendered as a Nix expression.
    #[serde(rename = "option_default")]
    pub default: Option<String>,
    /// Example value rendered as a Nix expression.
    #[serde(rename = "option_example")]
    pub example: Option<String>,
    /// First declaring file.
    #[serde(rename = "option_source")]
    pub source: Option<String>,

    /// Completion suggestions for the name.
    #[serde(rename = "option_suggestions")]
    pub suggestions: Vec<Suggestion>,
}

// ============================================================================
// Tests
// ============================================================================
