//! One import run for one channel.
//!
//! `import_channel` ties the collaborators to the lifecycle:
//!
//! 1. find the latest evaluation under the channel prefix;
//! 2. ensure the versioned index for it exists;
//! 3. if it was freshly created, normalize and write packages, then options;
//! 4. repoint the channel alias at the index.
//!
//! Any error before step 4 returns early and leaves the alias where it was.
//! An error in step 3 also deletes the half-written index.

use nixdex_core::{
    BuildResultsSource, CatalogSource, Evaluation, EvaluationSource, MarkupConverter, Result,
    RunContext,
};

use crate::lifecycle::{IndexLifecycle, IndexNames, WriteStats};
use crate::normalize::Normalizer;

/// External collaborators needed by an import run.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// Finds the latest evaluation of a channel.
    pub evaluations: &'a dyn EvaluationSource,
    /// Build results of an evaluation.
    pub builds: &'a dyn BuildResultsSource,
    /// Raw package and option listings.
    pub catalog: &'a dyn CatalogSource,
    /// DocBook to HTML conversion for option descriptions.
    pub converter: &'a dyn MarkupConverter,
}

impl std::fmt::Debug for Collaborators<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// What an import run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Channel name.
    pub channel: String,
    /// Evaluation that was imported.
    pub evaluation: Evaluation,
    /// Alias and index names.
    pub names: IndexNames,
    /// Whether the index was created by this run.
    pub created: bool,
    /// Package population result, if packages were written.
    pub packages: Option<WriteStats>,
    /// Option population result, if options were written.
    pub options: Option<WriteStats>,
    /// Whether the alias now points at the index.
    pub alias_updated: bool,
}

/// Import the latest evaluation of `channel` found under `prefix`.
///
/// An index that already exists is not written to again (unless `force`);
/// the alias swap is still re-applied so the alias ends up on a valid index.
/// An existing index with no documents is treated as left behind by an
/// aborted run and the alias is not moved to it.
///
/// If populating a freshly created index fails, the index is deleted before
/// the error is returned, so a later run starts over instead of finding a
/// partially written index. A fresh index in which the store accepted none
/// of the submitted documents is kept but not published.
pub async fn import_channel(
    ctx: &RunContext,
    collaborators: Collaborators<'_>,
    lifecycle: &IndexLifecycle<'_>,
    channel: &str,
    prefix: &str,
    force: bool,
) -> Result<ImportReport> {
    let evaluation = collaborators.evaluations.latest_evaluation(prefix).await?;
    log::info!(
        "import_channel: {channel} evaluation {} ({} revisions, {})",
        evaluation.id,
        evaluation.revisions_since_start,
        evaluation.git_revision
    );

    let names = IndexNames::new(ctx.schema_version, channel, &evaluation);
    let created = lifecycle.ensure_index(&names.index, force).await?;

    let mut report = ImportReport {
        channel: channel.to_string(),
        evaluation,
        names,
        created,
        packages: None,
        options: None,
        alias_updated: false,
    };

    if created {
        match populate(ctx, collaborators, lifecycle, &report).await {
            Ok((packages, options)) => {
                report.packages = Some(packages);
                report.options = Some(options);
            }
            Err(err) => {
                discard_index(lifecycle, &report.names.index).await;
                return Err(err);
            }
        }
        if nothing_accepted(&report) {
            log::warn!(
                "import_channel: the store rejected every document of '{}'; leaving '{}' untouched",
                report.names.index,
                report.names.alias
            );
            return Ok(report);
        }
    } else {
        let count = lifecycle
            .store()
            .count_documents(&report.names.index)
            .await?;
        if count == 0 {
            log::warn!(
                "import_channel: '{}' exists but holds no documents; leaving '{}' untouched",
                report.names.index,
                report.names.alias
            );
            return Ok(report);
        }
    }

    lifecycle
        .update_alias(&report.names.alias, &report.names.index)
        .await?;
    report.alias_updated = true;
    Ok(report)
}

/// Normalize and write packages, then options, into the report's index.
async fn populate(
    ctx: &RunContext,
    collaborators: Collaborators<'_>,
    lifecycle: &IndexLifecycle<'_>,
    report: &ImportReport,
) -> Result<(WriteStats, WriteStats)> {
    let builds = collaborators
        .builds
        .build_results(&report.evaluation.id)
        .await?;
    let normalizer = Normalizer::new(ctx, &builds, collaborators.converter);

    let packages = collaborators.catalog.packages(&report.evaluation).await?;
    let package_stats = lifecycle
        .write_documents(
            &report.names.index,
            "packages",
            packages.len(),
            normalizer.stream(packages),
        )
        .await?;

    let options = collaborators.catalog.options(&report.evaluation).await?;
    let option_stats = lifecycle
        .write_documents(
            &report.names.index,
            "options",
            options.len(),
            normalizer.stream(options),
        )
        .await?;

    Ok((package_stats, option_stats))
}

/// Delete an index whose population failed. A failure here is logged; the
/// population error is the one reported.
async fn discard_index(lifecycle: &IndexLifecycle<'_>, index: &str) {
    log::warn!("import_channel: population of '{index}' failed, deleting it");
    if let Err(err) = lifecycle.store().delete_index(index).await {
        log::error!("import_channel: could not delete '{index}': {err}");
    }
}

/// Documents were submitted but the store accepted none of them.
fn nothing_accepted(report: &ImportReport) -> bool {
    let stats = report.packages.iter().chain(report.options.iter());
    let (total, succeeded) = stats.fold((0, 0), |(total, succeeded), s| {
        (total + s.total, succeeded + s.succeeded)
    });
    total > 0 && succeeded == 0
}
