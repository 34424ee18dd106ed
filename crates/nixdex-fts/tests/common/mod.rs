//! Fake collaborators and catalog fixtures shared by the integration tests.

use std::sync::Mutex;

use async_trait::async_trait;
use nixdex_core::{
    BuildResults, BuildResultsSource, CatalogSource, Error, Evaluation, EvaluationSource,
    IdentityConverter, OptionRecord, PackageRecord, Result, RunContext, group_builds,
};
use nixdex_fts::Collaborators;
use serde_json::json;

/// Channel prefix used by every test.
pub const PREFIX: &str = "nixos/unstable/nixos-21.11pre";

/// Evaluation source returning whatever evaluation was last set.
pub struct FakeEvaluations {
    current: Mutex<Evaluation>,
}

impl FakeEvaluations {
    pub fn new(revisions: u64) -> Self {
        Self {
            current: Mutex::new(evaluation(revisions)),
        }
    }

    /// Pretend a newer evaluation was published.
    pub fn advance(&self, revisions: u64) {
        *self.current.lock().unwrap() = evaluation(revisions);
    }
}

#[async_trait]
impl EvaluationSource for FakeEvaluations {
    async fn latest_evaluation(&self, prefix: &str) -> Result<Evaluation> {
        assert_eq!(prefix, PREFIX);
        Ok(self.current.lock().unwrap().clone())
    }
}

/// Build source with a fixed listing.
pub struct FakeBuilds(pub BuildResults);

#[async_trait]
impl BuildResultsSource for FakeBuilds {
    async fn build_results(&self, _evaluation_id: &str) -> Result<BuildResults> {
        Ok(self.0.clone())
    }
}

/// Catalog source with fixed package and option listings.
pub struct FakeCatalog {
    pub packages: Vec<(String, PackageRecord)>,
    pub options: Vec<(String, OptionRecord)>,
    pub fail_options: bool,
}

impl FakeCatalog {
    pub fn new(
        packages: Vec<(String, PackageRecord)>,
        options: Vec<(String, OptionRecord)>,
    ) -> Self {
        Self {
            packages,
            options,
            fail_options: false,
        }
    }

    /// Make `options()` fail after packages were listed.
    pub fn failing_options(mut self) -> Self {
        self.fail_options = true;
        self
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn packages(&self, _evaluation: &Evaluation) -> Result<Vec<(String, PackageRecord)>> {
        Ok(self.packages.clone())
    }

    async fn options(&self, _evaluation: &Evaluation) -> Result<Vec<(String, OptionRecord)>> {
        if self.fail_options {
            return Err(Error::command("nix-build", "exited with exit status: 1"));
        }
        Ok(self.options.clone())
    }
}

/// Everything an import needs, owned in one place.
pub struct TestHarness {
    pub ctx: RunContext,
    pub evaluations: FakeEvaluations,
    pub builds: FakeBuilds,
    pub catalog: FakeCatalog,
    pub converter: IdentityConverter,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_catalog(FakeCatalog::new(sample_packages(), sample_options()))
    }

    pub fn with_catalog(catalog: FakeCatalog) -> Self {
        Self {
            ctx: RunContext::new().with_schema_version(1),
            evaluations: FakeEvaluations::new(310_000),
            builds: FakeBuilds(sample_builds()),
            catalog,
            converter: IdentityConverter,
        }
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            evaluations: &self.evaluations,
            builds: &self.builds,
            catalog: &self.catalog,
            converter: &self.converter,
        }
    }
}

pub fn evaluation(revisions: u64) -> Evaluation {
    Evaluation {
        revisions_since_start: revisions,
        git_revision: format!("rev{revisions}"),
        prefix: format!("{PREFIX}{revisions}.rev{revisions}"),
        id: format!("{}", 1_700_000 + revisions),
    }
}

pub fn sample_packages() -> Vec<(String, PackageRecord)> {
    let raw = json!({
        "hello": {
            "name": "hello-2.10",
            "pname": "hello",
            "version": "2.10",
            "system": "x86_64-linux",
            "meta": {
                "description": "A program that produces a familiar, friendly greeting",
                "license": {"fullName": "GNU General Public License v3.0 or later", "url": "https://spdx.org/licenses/GPL-3.0-or-later.html"},
                "maintainers": [{"name": "Eelco Dolstra", "email": "edolstra@example.org", "github": "edolstra"}],
                "platforms": ["x86_64-linux", "aarch64-linux", "mips-linux"],
                "homepage": "https://www.gnu.org/software/hello/manual/",
                "position": "/nix/store/abc-source/pkgs/applications/misc/hello/default.nix:34"
            }
        },
        "python37Packages.requests": {
            "name": "python3.7-requests-2.25.1",
            "pname": "python3.7-requests",
            "version": "2.25.1",
            "system": "x86_64-linux",
            "meta": {
                "description": "HTTP library for Python",
                "license": "asl20",
                "platforms": [["x86_64-linux"], ["x86_64-darwin"]]
            }
        },
        "emptyMeta": {
            "name": "empty-meta-1.0",
            "pname": "empty-meta",
            "version": "1.0"
        }
    });
    records(raw)
}

pub fn sample_options() -> Vec<(String, OptionRecord)> {
    let raw = json!({
        "services.nginx.enable": {
            "declarations": ["nixos/modules/services/web-servers/nginx/default.nix"],
            "description": "Whether to enable the nginx Web Server.",
            "type": "boolean",
            "default": false,
            "example": true
        },
        "services.nginx.virtualHosts": {
            "declarations": ["nixos/modules/services/web-servers/nginx/default.nix"],
            "description": "Declarative vhost config",
            "type": "attribute set of submodules",
            "default": {},
            "example": {"_type": "literalExample", "text": "{ \"example.org\" = { forceSSL = true; }; }"}
        }
    });
    records(raw)
}

/// A package listing whose second entry has a maintainer shape the
/// normalizer refuses.
pub fn packages_with_bad_maintainers() -> Vec<(String, PackageRecord)> {
    let raw = json!({
        "good": {"name": "good-1", "pname": "good", "version": "1"},
        "bad": {"name": "bad-1", "pname": "bad", "version": "1", "meta": {"maintainers": 42}},
        "later": {"name": "later-1", "pname": "later", "version": "1"}
    });
    records(raw)
}

pub fn sample_builds() -> BuildResults {
    let builds = ["x86_64-linux", "aarch64-linux"]
        .into_iter()
        .enumerate()
        .map(|(i, system)| {
            serde_json::from_value(json!({
                "id": 1000 + i,
                "buildstatus": 0,
                "system": system,
                "project": "nixos",
                "jobset": "trunk-combined",
                "job": format!("nixpkgs.hello.{system}"),
                "buildoutputs": {"out": {"path": "/nix/store/xyz-hello-2.10"}},
                "drvpath": "/nix/store/xyz-hello-2.10.drv",
                "nixname": "hello-2.10"
            }))
            .unwrap()
        });
    group_builds(builds)
}

fn records<T: serde::de::DeserializeOwned>(raw: serde_json::Value) -> Vec<(String, T)> {
    raw.as_object()
        .unwrap()
        .iter()
        .map(|(name, record)| (name.clone(), serde_json::from_value(record.clone()).unwrap()))
        .collect()
}
