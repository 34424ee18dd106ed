//! Catalog record normalization.
//!
//! The [`Normalizer`] turns one raw package or option record into one
//! [`Document`]. It owns no data: the run context, the build results and the
//! markup converter are borrowed for the duration of a run.
//!
//! [`DocumentStream`] wraps an iterator of records and yields documents one at
//! a time, so a listing of tens of thousands of records is never held in
//! document form all at once.

use std::sync::LazyLock;

use fancy_regex::Regex;
use nixdex_core::{
    BuildResults, Error, MarkupConverter, MissingFieldPolicy, OptionRecord, PackageRecord, Result,
    RunContext, Value,
};

use crate::document::{
    Document, HydraBuild, HydraOutput, License, Maintainer, OptionDocument, PackageDocument,
};
use crate::prettyprint::pretty_print;
use crate::reverse::Reversible;
use crate::suggest::rank;
use crate::tokenize::tokenize;

// An element that is either self-closing or closed by a matching end tag.
static ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([A-Za-z_][\w.:-]*)(?:\s[^<>]*)?(?:/>|>[\s\S]*?</\1\s*>)")
        .expect("Invalid element regex")
});

/// Package sets whose members repeat the set name in their `pname`.
pub const ATTR_SET_PREFIXES: &[&str] = &[
    // Packages
    "emscripten",
    "lua",
    "php",
    "pure",
    "python",
    "lisp",
    "perl",
    "ruby",
    // Plugins
    "elasticsearch",
    "graylog",
    "tmuxplugin",
    "vimplugin",
];

/// Suffixes that mark the first attribute segment as a package set.
const ATTR_SET_SUFFIXES: &[&str] = &["Packages", "Plugins", "Extensions"];

/// Store prefix stripped from definition positions.
const STORE_PREFIX: &str = "/nix/store";

const NO_LICENSE: &str = "No license";
const NO_MAINTAINERS: &str = "No maintainers";
const NO_PACKAGE_SET: &str = "No package set";

/// Converts raw catalog records into search documents.
pub struct Normalizer<'a> {
    ctx: &'a RunContext,
    builds: &'a BuildResults,
    converter: &'a dyn MarkupConverter,
}

impl<'a> Normalizer<'a> {
    /// Create a normalizer for one run.
    pub fn new(
        ctx: &'a RunContext,
        builds: &'a BuildResults,
        converter: &'a dyn MarkupConverter,
    ) -> Self {
        Self {
            ctx,
            builds,
            converter,
        }
    }

    /// Normalize a package record listed under `attr_name`.
    pub fn package(&self, attr_name: &str, record: &PackageRecord) -> Result<PackageDocument> {
        let policy = self.ctx.missing_fields;
        let meta = &record.meta;

        let license = licenses(meta.license.as_ref(), policy)?;
        let license_set = license.iter().map(|l| l.full_name.clone()).collect();

        let maintainers = maintainers(meta.maintainers.as_ref(), policy)?;
        let maintainers_set = maintainers
            .iter()
            .filter_map(|m| m.name.clone())
            .filter(|name| !name.is_empty())
            .collect();

        let attr_set = attr_set(attr_name, policy);
        let pname = strip_attr_set_prefix(&record.pname);
        let query = tokenize(attr_name);
        let long_description = meta.long_description.clone().unwrap_or_default();

        Ok(PackageDocument {
            hydra: self.hydra(&record.name),
            attr_name: attr_name.to_string(),
            attr_name_reverse: attr_name.to_string().reversed(),
            attr_name_query_reverse: query.reversed(),
            attr_name_query: query,
            attr_set_reverse: attr_set.reversed(),
            attr_set,
            pname_reverse: pname.reversed(),
            pname,
            pversion: record.version.clone(),
            description_reverse: meta.description.reversed(),
            description: meta.description.clone(),
            long_description_reverse: long_description.reversed(),
            long_description,
            license,
            license_set,
            maintainers,
            maintainers_set,
            platforms: self.platforms(meta.platforms.as_ref(), meta.bad_platforms.as_ref()),
            position: meta.position.as_deref().map(trim_position),
            homepage: homepage(meta.homepage.as_ref()),
            system: record.system.clone(),
            suggestions: rank(attr_name),
        })
    }

    /// Normalize an option record listed under its dotted `name`.
    pub fn option(&self, name: &str, record: &OptionRecord) -> Result<OptionDocument> {
        let default = record.default.as_ref().map(pretty_print).transpose()?;
        let example = record.example.as_ref().map(pretty_print).transpose()?;
        let description = self.option_description(record.description.as_ref())?;
        let query = tokenize(name);

        Ok(OptionDocument {
            name: name.to_string(),
            name_reverse: name.to_string().reversed(),
            name_query_reverse: query.reversed(),
            name_query: query,
            description_reverse: description.reversed(),
            description,
            option_type: record.option_type.clone(),
            default,
            example,
            source: record.declarations.first().cloned(),
            suggestions: rank(name),
        })
    }

    /// Wrap an iterator of records into a lazy document stream.
    pub fn stream<I, E>(&self, entries: I) -> DocumentStream<'_, I::IntoIter>
    where
        I: IntoIterator<Item = E>,
        E: CatalogEntry,
    {
        DocumentStream {
            normalizer: self,
            entries: entries.into_iter(),
            failed: false,
        }
    }

    fn hydra(&self, derivation: &str) -> Option<Vec<HydraBuild>> {
        let per_platform = self.builds.get(derivation)?;
        Some(
            per_platform
                .values()
                .map(|build| HydraBuild {
                    build_id: build.id,
                    build_status: build.buildstatus,
                    platform: build.system.clone(),
                    project: build.project.clone(),
                    jobset: build.jobset.clone(),
                    job: build.job.clone(),
                    path: build
                        .buildoutputs
                        .iter()
                        .map(|(output, item)| HydraOutput {
                            output: output.clone(),
                            path: item.path.clone(),
                        })
                        .collect(),
                    drv_path: build.drvpath.clone(),
                })
                .collect(),
        )
    }

    fn platforms(&self, platforms: Option<&Value>, bad: Option<&Value>) -> Vec<String> {
        let mut bad_platforms = Vec::new();
        if let Some(bad) = bad {
            flatten_strings(bad, &mut bad_platforms);
        }

        let mut listed = Vec::new();
        if let Some(platforms) = platforms {
            flatten_strings(platforms, &mut listed);
        }

        listed
            .into_iter()
            .filter(|p| !bad_platforms.contains(p))
            .filter(|p| self.ctx.allows_platform(p))
            .collect()
    }

    fn option_description(&self, description: Option<&Value>) -> Result<Option<String>> {
        let text = match description {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Text(text)) => text.clone(),
            Some(wrapper @ Value::Mapping(_)) => match wrapper.get_str("text") {
                // Markdown wrappers are passed through untouched.
                Some(text) if wrapper.get_str("_type") == Some("mdDoc") => {
                    return Ok(Some(text.to_string()));
                }
                Some(text) => text.to_string(),
                None => {
                    return Err(Error::schema_violation(
                        "description",
                        format!("mapping without text: {wrapper}"),
                    ));
                }
            },
            Some(other) => {
                return Err(Error::schema_violation(
                    "description",
                    format!("unexpected {}: {other}", other.kind()),
                ));
            }
        };

        // Only fragments with child elements go through the converter.
        if !has_nested_markup(&text) {
            return Ok(Some(text));
        }
        let wrapped = format!(
            r#"<xml xmlns:xlink="http://www.w3.org/1999/xlink"><para>{text}</para></xml>"#
        );
        self.converter.to_html(&wrapped).map(Some)
    }
}

impl std::fmt::Debug for Normalizer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer")
            .field("ctx", &self.ctx)
            .field("builds", &self.builds.len())
            .finish()
    }
}

/// A raw catalog entry the normalizer knows how to convert.
pub trait CatalogEntry {
    /// Produce the document for this entry.
    fn normalize(&self, normalizer: &Normalizer<'_>) -> Result<Document>;
}

impl CatalogEntry for (String, PackageRecord) {
    fn normalize(&self, normalizer: &Normalizer<'_>) -> Result<Document> {
        normalizer.package(&self.0, &self.1).map(Document::Package)
    }
}

impl CatalogEntry for (String, OptionRecord) {
    fn normalize(&self, normalizer: &Normalizer<'_>) -> Result<Document> {
        normalizer.option(&self.0, &self.1).map(Document::Option)
    }
}

/// Lazy, finite, single-pass sequence of documents.
///
/// Yields `Err` at most once: after a record fails to normalize the stream
/// ends.
pub struct DocumentStream<'s, I> {
    normalizer: &'s Normalizer<'s>,
    entries: I,
    failed: bool,
}

impl<I, E> Iterator for DocumentStream<'_, I>
where
    I: Iterator<Item = E>,
    E: CatalogEntry,
{
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let entry = self.entries.next()?;
        let result = entry.normalize(self.normalizer);
        if let Err(e) = &result {
            log::error!("normalize: {e}");
            self.failed = true;
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            self.entries.size_hint()
        }
    }
}

// ----------------------------------------------------------------------------
// Field rules
// ----------------------------------------------------------------------------

fn licenses(license: Option<&Value>, policy: MissingFieldPolicy) -> Result<Vec<License>> {
    let value = match license {
        Some(value) if !value.is_empty() => value,
        _ => {
            return Ok(match policy {
                MissingFieldPolicy::Placeholder => vec![License {
                    full_name: NO_LICENSE.to_string(),
                    url: None,
                }],
                MissingFieldPolicy::Empty => vec![],
            });
        }
    };

    match value {
        Value::Sequence(items) => items.iter().map(license_entry).collect(),
        single => Ok(vec![license_entry(single)?]),
    }
}

fn license_entry(value: &Value) -> Result<License> {
    match value {
        Value::Text(name) => Ok(License {
            full_name: name.clone(),
            url: None,
        }),
        Value::Mapping(_) => Ok(License {
            full_name: value
                .get_str("fullName")
                .or_else(|| value.get_str("shortName"))
                .unwrap_or("custom")
                .to_string(),
            url: value.get_str("url").map(str::to_string),
        }),
        other => Err(Error::schema_violation(
            "meta.license",
            format!("license can not be recognized from {other}"),
        )),
    }
}

fn maintainers(value: Option<&Value>, policy: MissingFieldPolicy) -> Result<Vec<Maintainer>> {
    let mut found = Vec::new();
    if let Some(value) = value {
        collect_maintainers(value, &mut found)?;
    }

    if found.is_empty() && policy == MissingFieldPolicy::Placeholder {
        found.push(Maintainer {
            name: Some(NO_MAINTAINERS.to_string()),
            email: None,
            github: None,
        });
    }
    Ok(found)
}

fn collect_maintainers(value: &Value, found: &mut Vec<Maintainer>) -> Result<()> {
    match value {
        Value::Text(name) => found.push(Maintainer {
            name: Some(name.clone()),
            email: None,
            github: None,
        }),
        Value::Mapping(_) => found.push(Maintainer {
            name: value.get_str("name").map(str::to_string),
            email: value.get_str("email").map(str::to_string),
            github: value.get_str("github").map(str::to_string),
        }),
        Value::Sequence(items) => {
            for item in items {
                collect_maintainers(item, found)?;
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {
            return Err(Error::schema_violation(
                "meta.maintainers",
                format!("maintainer can not be recognized from {value}"),
            ));
        }
    }
    Ok(())
}

fn attr_set(attr_name: &str, policy: MissingFieldPolicy) -> Option<String> {
    let detected = attr_name
        .split_once('.')
        .map(|(first, _)| first)
        .filter(|first| ATTR_SET_SUFFIXES.iter().any(|s| first.ends_with(s)));

    match (detected, policy) {
        (Some(set), _) => Some(set.to_string()),
        (None, MissingFieldPolicy::Placeholder) => Some(NO_PACKAGE_SET.to_string()),
        (None, MissingFieldPolicy::Empty) => None,
    }
}

/// Drop a repeated package-set name from the front of a `pname`.
///
/// `python3.8-requests` becomes `requests`; `node_left-pad` becomes
/// `left-pad`. A name that starts with a known set but has no `-` is kept.
pub fn strip_attr_set_prefix(pname: &str) -> String {
    if ATTR_SET_PREFIXES.iter().any(|p| pname.starts_with(p)) {
        match pname.split_once('-') {
            Some((_, rest)) => rest.to_string(),
            None => pname.to_string(),
        }
    } else if let Some(rest) = pname.strip_prefix("node_") {
        rest.to_string()
    } else {
        pname.to_string()
    }
}

/// Make a store position relative to the source tree.
fn trim_position(position: &str) -> String {
    if position.starts_with(STORE_PREFIX) {
        position
            .splitn(5, '/')
            .last()
            .unwrap_or(position)
            .to_string()
    } else {
        position.to_string()
    }
}

fn homepage(value: Option<&Value>) -> Vec<String> {
    let mut urls = Vec::new();
    if let Some(value) = value {
        flatten_strings(value, &mut urls);
    }
    urls
}

/// Collect string leaves, descending into sequences and skipping everything
/// else (platform patterns are mappings).
fn flatten_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Text(s) => out.push(s.clone()),
        Value::Sequence(items) => items.iter().for_each(|item| flatten_strings(item, out)),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::Mapping(_) => {}
    }
}

/// Whether a description fragment contains an element tag.
///
/// Stray `<` characters, as in `x<y` or an unclosed `<code>`, do not count.
/// If the matcher gives up, the fragment is treated as markup.
pub fn has_nested_markup(fragment: &str) -> bool {
    ELEMENT.is_match(fragment).unwrap_or_else(|e| {
        log::warn!("has_nested_markup: treating fragment as markup: {e}");
        true
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use nixdex_core::{BuildRecord, IdentityConverter, group_builds};
    use serde_json::json;
    use std::sync::Mutex;

    fn package(meta: serde_json::Value) -> PackageRecord {
        serde_json::from_value(json!({
            "name": "hello-2.10",
            "pname": "hello",
            "version": "2.10",
            "system": "x86_64-linux",
            "meta": meta,
        }))
        .unwrap()
    }

    fn option(record: serde_json::Value) -> OptionRecord {
        serde_json::from_value(record).unwrap()
    }

    fn normalize_package(ctx: &RunContext, meta: serde_json::Value) -> Result<PackageDocument> {
        let builds = BuildResults::new();
        Normalizer::new(ctx, &builds, &IdentityConverter).package("hello", &package(meta))
    }

    /// Converter that records what it was asked to convert.
    #[derive(Default)]
    struct RecordingConverter {
        calls: Mutex<Vec<String>>,
    }

    impl MarkupConverter for RecordingConverter {
        fn to_html(&self, docbook: &str) -> Result<String> {
            self.calls.lock().unwrap().push(docbook.to_string());
            Ok("<p>converted</p>".to_string())
        }
    }

    // ------------------------------------------------------------------------
    // License tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_license_string() {
        let doc = normalize_package(&RunContext::default(), json!({"license": "MIT"})).unwrap();
        assert_eq!(
            doc.license,
            vec![License {
                full_name: "MIT".to_string(),
                url: None
            }]
        );
        assert_eq!(doc.license_set, vec!["MIT"]);
    }

    #[test]
    fn test_license_mapping_and_list() {
        let doc = normalize_package(
            &RunContext::default(),
            json!({"license": [
                {"fullName": "GNU GPL v3", "url": "https://www.gnu.org/licenses/gpl-3.0"},
                "BSD",
                {"shortName": "unfree"},
                {}
            ]}),
        )
        .unwrap();
        assert_eq!(
            doc.license_set,
            vec!["GNU GPL v3", "BSD", "unfree", "custom"]
        );
        assert_eq!(
            doc.license[0].url.as_deref(),
            Some("https://www.gnu.org/licenses/gpl-3.0")
        );
    }

    #[test]
    fn test_license_missing_follows_policy() {
        let placeholder = normalize_package(&RunContext::default(), json!({})).unwrap();
        assert_eq!(placeholder.license_set, vec!["No license"]);

        let ctx = RunContext::new().with_missing_fields(MissingFieldPolicy::Empty);
        let empty = normalize_package(&ctx, json!({"license": []})).unwrap();
        assert!(empty.license.is_empty());
        assert!(empty.license_set.is_empty());
    }

    #[test]
    fn test_license_number_is_schema_violation() {
        let err = normalize_package(&RunContext::default(), json!({"license": [3]})).unwrap_err();
        assert!(err.is_schema_violation());
    }

    // ------------------------------------------------------------------------
    // Maintainer tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_maintainers_nested_lists_are_flattened() {
        let doc = normalize_package(
            &RunContext::default(),
            json!({"maintainers": [
                "alice",
                [{"name": "Bob", "email": "bob@example.org", "github": "bob"}],
                [[{"email": "anon@example.org"}]]
            ]}),
        )
        .unwrap();
        assert_eq!(doc.maintainers.len(), 3);
        assert_eq!(doc.maintainers[1].github.as_deref(), Some("bob"));
        assert_eq!(doc.maintainers[2].name, None);
        assert_eq!(doc.maintainers_set, vec!["alice", "Bob"]);
    }

    #[test]
    fn test_maintainers_missing_follows_policy() {
        let doc = normalize_package(&RunContext::default(), json!({})).unwrap();
        assert_eq!(doc.maintainers_set, vec!["No maintainers"]);

        let ctx = RunContext::new().with_missing_fields(MissingFieldPolicy::Empty);
        let doc = normalize_package(&ctx, json!({"maintainers": []})).unwrap();
        assert!(doc.maintainers.is_empty());
    }

    #[test]
    fn test_maintainer_unrecognized_shapes_abort() {
        for bad in [json!(42), json!(null), json!(["ok", true])] {
            let err =
                normalize_package(&RunContext::default(), json!({ "maintainers": bad })).unwrap_err();
            assert!(matches!(err, Error::SchemaViolation { .. }), "{err}");
        }
    }

    // ------------------------------------------------------------------------
    // Platform, position, homepage tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_platforms_filtered_and_flattened() {
        let doc = normalize_package(
            &RunContext::default(),
            json!({
                "platforms": [
                    "x86_64-linux",
                    ["aarch64-linux", "armv7l-linux"],
                    {"kernel": {"name": "darwin"}},
                    "i686-linux"
                ],
                "badPlatforms": ["i686-linux"]
            }),
        )
        .unwrap();
        assert_eq!(doc.platforms, vec!["x86_64-linux", "aarch64-linux"]);
    }

    #[test]
    fn test_position_in_store_is_trimmed() {
        let doc = normalize_package(
            &RunContext::default(),
            json!({"position": "/nix/store/0abc-source/pkgs/applications/misc/hello/default.nix:34"}),
        )
        .unwrap();
        assert_eq!(
            doc.position.as_deref(),
            Some("pkgs/applications/misc/hello/default.nix:34")
        );
    }

    #[test]
    fn test_position_outside_store_is_kept() {
        let doc =
            normalize_package(&RunContext::default(), json!({"position": "pkgs/hello.nix:1"}))
                .unwrap();
        assert_eq!(doc.position.as_deref(), Some("pkgs/hello.nix:1"));
    }

    #[test]
    fn test_homepage_string_or_list() {
        let doc = normalize_package(
            &RunContext::default(),
            json!({"homepage": "https://www.gnu.org/software/hello/"}),
        )
        .unwrap();
        assert_eq!(doc.homepage, vec!["https://www.gnu.org/software/hello/"]);

        let doc = normalize_package(
            &RunContext::default(),
            json!({"homepage": ["https://a.example", "https://b.example"]}),
        )
        .unwrap();
        assert_eq!(doc.homepage.len(), 2);
    }

    // ------------------------------------------------------------------------
    // Attribute set and pname tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_attr_set_detection() {
        let p = MissingFieldPolicy::Placeholder;
        assert_eq!(
            attr_set("python37Packages.requests", p).as_deref(),
            Some("python37Packages")
        );
        assert_eq!(
            attr_set("vimPlugins.fugitive", p).as_deref(),
            Some("vimPlugins")
        );
        assert_eq!(
            attr_set("gnomeExtensions.dash", p).as_deref(),
            Some("gnomeExtensions")
        );
        assert_eq!(attr_set("hello", p).as_deref(), Some("No package set"));
        assert_eq!(attr_set("xorg.libX11", p).as_deref(), Some("No package set"));
        assert_eq!(attr_set("hello", MissingFieldPolicy::Empty), None);
    }

    #[test]
    fn test_strip_attr_set_prefix() {
        assert_eq!(strip_attr_set_prefix("python3.8-requests"), "requests");
        assert_eq!(strip_attr_set_prefix("perl5.32.0-JSON-4.02"), "JSON-4.02");
        assert_eq!(strip_attr_set_prefix("vimplugin-fugitive"), "fugitive");
        assert_eq!(strip_attr_set_prefix("node_left-pad"), "left-pad");
        assert_eq!(strip_attr_set_prefix("hello"), "hello");
        assert_eq!(strip_attr_set_prefix("luarocks"), "luarocks");
    }

    // ------------------------------------------------------------------------
    // Package document tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_package_document_fields() {
        let record = package(json!({
            "description": "A program that produces a familiar, friendly greeting",
            "license": "GPL",
            "maintainers": ["eelco"],
            "platforms": ["x86_64-linux"]
        }));
        let builds = BuildResults::new();
        let ctx = RunContext::default();
        let doc = Normalizer::new(&ctx, &builds, &IdentityConverter)
            .package("python37Packages.hello", &record)
            .unwrap();

        assert_eq!(doc.attr_name_reverse, "olleh.segakcaP73nohtyp");
        assert_eq!(doc.attr_set_reverse.as_deref(), Some("segakcaP73nohtyp"));
        assert_eq!(doc.pname, "hello");
        assert_eq!(doc.pversion, "2.10");
        assert_eq!(doc.long_description, "");
        assert_eq!(doc.hydra, None);
        assert_eq!(doc.attr_name_query.len(), doc.attr_name_query_reverse.len());
        assert!(doc.attr_name_query.contains(&"hello".to_string()));
        assert!(doc.attr_name_query_reverse.contains(&"olleh".to_string()));
        assert_eq!(
            doc.description_reverse.as_deref(),
            Some("A margorp taht secudorp a ,railimaf yldneirf gniteerg")
        );
        assert_eq!(doc.suggestions.len(), 2);
        assert_eq!(doc.suggestions[1].input, "python37Packages.");
    }

    #[test]
    fn test_package_hydra_builds_attached() {
        let build: BuildRecord = serde_json::from_value(json!({
            "id": 42,
            "buildstatus": 0,
            "system": "x86_64-linux",
            "project": "nixos",
            "jobset": "trunk-combined",
            "job": "nixpkgs.hello.x86_64-linux",
            "buildoutputs": {"out": {"path": "/nix/store/abc-hello-2.10"}},
            "drvpath": "/nix/store/abc-hello-2.10.drv",
            "nixname": "hello-2.10"
        }))
        .unwrap();
        let builds = group_builds(vec![build]);
        let ctx = RunContext::default();
        let doc = Normalizer::new(&ctx, &builds, &IdentityConverter)
            .package("hello", &package(json!({})))
            .unwrap();

        let hydra = doc.hydra.unwrap();
        assert_eq!(hydra.len(), 1);
        assert_eq!(hydra[0].build_id, 42);
        assert_eq!(hydra[0].platform, "x86_64-linux");
        assert_eq!(
            hydra[0].path,
            vec![HydraOutput {
                output: "out".to_string(),
                path: "/nix/store/abc-hello-2.10".to_string()
            }]
        );
        assert_eq!(hydra[0].drv_path, "/nix/store/abc-hello-2.10.drv");
    }

    // ------------------------------------------------------------------------
    // Option document tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_option_document_fields() {
        let ctx = RunContext::default();
        let builds = BuildResults::new();
        let converter = RecordingConverter::default();
        let doc = Normalizer::new(&ctx, &builds, &converter)
            .option(
                "services.nginx.extraConfig",
                &option(json!({
                    "declarations": ["nixos/modules/services/web-servers/nginx/default.nix", "other.nix"],
                    "description": "Extra lines appended to the configuration.",
                    "type": "strings concatenated with \"\\n\"",
                    "default": "",
                    "example": {"_type": "literalExample", "text": "''\n  gzip on;\n''"}
                })),
            )
            .unwrap();

        assert_eq!(doc.name_reverse, "gifnoCartxe.xnign.secivres");
        assert_eq!(doc.default.as_deref(), Some("\"\""));
        assert_eq!(doc.example.as_deref(), Some("''\n  gzip on;\n''"));
        assert_eq!(
            doc.source.as_deref(),
            Some("nixos/modules/services/web-servers/nginx/default.nix")
        );
        assert_eq!(
            doc.description.as_deref(),
            Some("Extra lines appended to the configuration.")
        );
        assert!(converter.calls.lock().unwrap().is_empty());
        assert_eq!(doc.suggestions[0].weight, 980);
        assert_eq!(doc.name_query.len(), 10);
    }

    #[test]
    fn test_option_missing_and_null_values() {
        let ctx = RunContext::default();
        let builds = BuildResults::new();
        let doc = Normalizer::new(&ctx, &builds, &IdentityConverter)
            .option("a.b", &option(json!({"default": null})))
            .unwrap();
        assert_eq!(doc.default.as_deref(), Some("null"));
        assert_eq!(doc.example, None);
        assert_eq!(doc.source, None);
        assert_eq!(doc.description, None);
        assert_eq!(doc.description_reverse, None);
    }

    #[test]
    fn test_option_description_with_markup_is_converted() {
        let ctx = RunContext::default();
        let builds = BuildResults::new();
        let converter = RecordingConverter::default();
        let doc = Normalizer::new(&ctx, &builds, &converter)
            .option(
                "programs.x.enable",
                &option(json!({"description": "Whether to enable <literal>x</literal>."})),
            )
            .unwrap();

        assert_eq!(doc.description.as_deref(), Some("<p>converted</p>"));
        assert_eq!(doc.description_reverse.as_deref(), Some(">p/<detrevnoc>p<"));
        let calls = converter.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            [r#"<xml xmlns:xlink="http://www.w3.org/1999/xlink"><para>Whether to enable <literal>x</literal>.</para></xml>"#]
        );
    }

    #[test]
    fn test_option_markdown_wrapper_is_not_converted() {
        let ctx = RunContext::default();
        let builds = BuildResults::new();
        let converter = RecordingConverter::default();
        let doc = Normalizer::new(&ctx, &builds, &converter)
            .option(
                "programs.x.enable",
                &option(json!({"description": {"_type": "mdDoc", "text": "Uses `<x>`."}})),
            )
            .unwrap();
        assert_eq!(doc.description.as_deref(), Some("Uses `<x>`."));
        assert!(converter.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_option_description_number_is_schema_violation() {
        let ctx = RunContext::default();
        let builds = BuildResults::new();
        let err = Normalizer::new(&ctx, &builds, &IdentityConverter)
            .option("a.b", &option(json!({"description": 3})))
            .unwrap_err();
        assert!(err.is_schema_violation());
    }

    #[test]
    fn test_has_nested_markup() {
        assert!(has_nested_markup("see <link xlink:href=\"x\"/>"));
        assert!(has_nested_markup("<_x/>"));
        assert!(!has_nested_markup("a < b and c > d"));
        assert!(!has_nested_markup("plain text"));
        assert!(!has_nested_markup("&lt;tag&gt;"));
        assert!(has_nested_markup("<literal>foo</literal>"));
        assert!(has_nested_markup("use <option>a.b</option> or <br />"));
    }

    #[test]
    fn test_stray_angle_brackets_are_not_markup() {
        assert!(!has_nested_markup("x<y"));
        assert!(!has_nested_markup("requires x<y and y>z"));
        assert!(!has_nested_markup("an unclosed <code>x"));
        assert!(!has_nested_markup("<para>mismatched</literal>"));
    }

    // ------------------------------------------------------------------------
    // Stream tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_stream_is_lazy_and_ordered() {
        let ctx = RunContext::default();
        let builds = BuildResults::new();
        let normalizer = Normalizer::new(&ctx, &builds, &IdentityConverter);
        let entries = vec![
            ("a.first".to_string(), OptionRecord::default()),
            ("a.second".to_string(), OptionRecord::default()),
        ];
        let mut stream = normalizer.stream(entries);
        assert_eq!(stream.size_hint(), (2, Some(2)));

        let names: Vec<String> = stream
            .by_ref()
            .map(|doc| doc.unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["a.first", "a.second"]);
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_stream_stops_after_error() {
        let ctx = RunContext::default();
        let builds = BuildResults::new();
        let normalizer = Normalizer::new(&ctx, &builds, &IdentityConverter);
        let entries = vec![
            ("ok".to_string(), package(json!({}))),
            ("bad".to_string(), package(json!({"maintainers": 1}))),
            ("never".to_string(), package(json!({}))),
        ];
        let results: Vec<_> = normalizer.stream(entries).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
