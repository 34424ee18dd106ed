//! Index settings and field mapping.
//!
//! The mapping is expressed in the store's JSON dialect and is the single
//! source of truth for field types: the Elasticsearch store sends it verbatim
//! and the Tantivy store derives its schema from it.
//!
//! # Field kinds
//!
//! | Kind | Used for |
//! |------|----------|
//! | keyword + `lowercase` normalizer + `edge` subfield | names, query tokens and their reversals |
//! | english text + `edge` subfield | descriptions and their reversals |
//! | nested | licenses, maintainers, build results |
//! | completion | `package_suggestions`, `option_suggestions` |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Bumped whenever the mapping changes shape.
pub const MAPPING_GENERATION: u32 = 2;

/// Settings and mappings sent when creating an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Shard count and analysis chain.
    pub settings: Value,
    /// Field mapping.
    pub mappings: Value,
}

impl IndexSettings {
    /// Mapped top-level fields in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.mappings
            .get("properties")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(Map::iter)
    }

    /// Look up a mapped field.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.mappings.get("properties")?.get(name)
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        index_settings()
    }
}

/// Build the settings for a catalog index.
pub fn index_settings() -> IndexSettings {
    IndexSettings {
        settings: json!({
            "number_of_shards": 1,
            "analysis": analysis(),
        }),
        mappings: json!({ "properties": properties() }),
    }
}

fn analysis() -> Value {
    json!({
        "normalizer": {
            "lowercase": {"type": "custom", "char_filter": [], "filter": ["lowercase"]}
        },
        "tokenizer": {
            "edge": {
                "type": "edge_ngram",
                "min_gram": 2,
                "max_gram": 50,
                "token_chars": ["letter", "digit", "punctuation", "symbol"]
            }
        },
        "analyzer": {
            "edge": {"tokenizer": "edge", "filter": ["lowercase"]},
            "lowercase": {
                "type": "custom",
                "tokenizer": "keyword",
                "filter": ["lowercase"]
            }
        }
    })
}

fn keyword() -> Value {
    json!({"type": "keyword"})
}

fn keyword_edge() -> Value {
    json!({
        "type": "keyword",
        "normalizer": "lowercase",
        "fields": {"edge": {"type": "text", "analyzer": "edge"}}
    })
}

fn english_edge() -> Value {
    json!({
        "type": "text",
        "analyzer": "english",
        "fields": {"edge": {"type": "text", "analyzer": "edge"}}
    })
}

fn text() -> Value {
    json!({"type": "text"})
}

fn completion() -> Value {
    json!({"type": "completion"})
}

fn properties() -> Value {
    let mut props = Map::new();
    let mut put = |name: &str, value: Value| {
        props.insert(name.to_string(), value);
    };

    put("type", keyword());

    // Package fields
    put(
        "package_hydra",
        json!({
            "type": "nested",
            "properties": {
                "build_id": {"type": "keyword"},
                "build_status": {"type": "keyword"},
                "platform": {"type": "keyword"},
                "project": {"type": "keyword"},
                "jobset": {"type": "keyword"},
                "job": {"type": "keyword"},
                "path": {
                    "type": "nested",
                    "properties": {
                        "output": {"type": "keyword"},
                        "path": {"type": "keyword"}
                    }
                },
                "drv_path": {"type": "keyword"}
            }
        }),
    );
    for name in [
        "package_attr_name",
        "package_attr_name_reverse",
        "package_attr_name_query",
        "package_attr_name_query_reverse",
        "package_attr_set",
        "package_attr_set_reverse",
        "package_pname",
        "package_pname_reverse",
    ] {
        put(name, keyword_edge());
    }
    put("package_pversion", keyword());
    for name in [
        "package_description",
        "package_description_reverse",
        "package_longDescription",
        "package_longDescription_reverse",
    ] {
        put(name, english_edge());
    }
    put(
        "package_license",
        json!({
            "type": "nested",
            "properties": {"fullName": {"type": "text"}, "url": {"type": "text"}}
        }),
    );
    put("package_license_set", keyword());
    put(
        "package_maintainers",
        json!({
            "type": "nested",
            "properties": {
                "name": {"type": "text"},
                "email": {"type": "text"},
                "github": {"type": "text"}
            }
        }),
    );
    put("package_maintainers_set", keyword());
    put("package_platforms", keyword());
    put("package_position", text());
    put("package_homepage", keyword());
    put("package_system", keyword());
    put("package_suggestions", completion());

    // Option fields
    for name in [
        "option_name",
        "option_name_reverse",
        "option_name_query",
        "option_name_query_reverse",
    ] {
        put(name, keyword_edge());
    }
    for name in ["option_description", "option_description_reverse"] {
        put(name, english_edge());
    }
    put("option_type", keyword());
    put("option_default", text());
    put("option_example", text());
    put("option_source", keyword());
    put("option_suggestions", completion());

    Value::Object(props)
}

// ============================================================================
// Tests
// ============================================================================
