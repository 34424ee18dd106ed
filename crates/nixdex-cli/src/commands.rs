//! `import`, `channels` and `mapping` commands.

use nixdex_core::{BuildResultsSource, CatalogSource, Error, NoBuilds, Result};
use nixdex_fts::{
    Collaborators, ImportReport, IndexLifecycle, create_store, import_channel, index_settings,
};
use nixdex_sources::{
    FileCatalogSource, HttpFetcher, HydraBuildSource, NixCatalogSource, PandocConverter,
    RetryPolicy, S3EvaluationSource,
};

use crate::cli::ImportArgs;
use crate::config::{NixdexConfig, SourcesConfig};

// ============================================================================
// import
// ============================================================================

/// Import the latest evaluation of a channel and publish it under its alias.
pub async fn cmd_import(mut config: NixdexConfig, args: &ImportArgs, verbosity: u8) -> Result<()> {
    config.apply_import_args(args);
    let ctx = config.run_context(verbosity);
    let prefix = config.channel_prefix(&args.channel)?.to_string();

    let store = create_store(&config.store)?;
    log::info!("import: writing to {} store", store.name());
    let lifecycle = IndexLifecycle::new(store.as_ref()).with_chunk_size(config.store.chunk_size);

    let fetcher = HttpFetcher::new(RetryPolicy::default())?;
    let evaluations = S3EvaluationSource::new(fetcher.clone(), &config.sources.bucket_url)?;
    let builds = build_source(&config.sources, fetcher)?;
    let catalog = catalog_source(&config.sources)?;
    let converter = PandocConverter::new();

    let collaborators = Collaborators {
        evaluations: &evaluations,
        builds: builds.as_ref(),
        catalog: catalog.as_ref(),
        converter: &converter,
    };

    let report = import_channel(
        &ctx,
        collaborators,
        &lifecycle,
        &args.channel,
        &prefix,
        args.force,
    )
    .await?;
    print_report(&report);
    Ok(())
}

fn build_source(
    sources: &SourcesConfig,
    fetcher: HttpFetcher,
) -> Result<Box<dyn BuildResultsSource>> {
    if !sources.fetch_builds {
        return Ok(Box::new(NoBuilds));
    }
    Ok(Box::new(HydraBuildSource::new(
        fetcher,
        &sources.hydra_url,
        sources.resolved_cache_dir(),
    )?))
}

fn catalog_source(sources: &SourcesConfig) -> Result<Box<dyn CatalogSource>> {
    match (&sources.packages_file, &sources.options_file) {
        (Some(packages), Some(options)) => Ok(Box::new(FileCatalogSource::new(packages, options))),
        (None, None) => Ok(Box::new(NixCatalogSource::new(
            sources.nixpkgs_config.clone(),
            RetryPolicy::default(),
        ))),
        _ => Err(Error::config(
            "packages_file and options_file must be configured together",
        )),
    }
}

/// Lines printed on stdout after an import run.
pub fn report_lines(report: &ImportReport) -> Vec<String> {
    let mut lines = Vec::new();
    if !report.created {
        lines.push(format!(
            "Index '{}' already exists, nothing written",
            report.names.index
        ));
    }
    lines.extend(report.packages.iter().map(ToString::to_string));
    lines.extend(report.options.iter().map(ToString::to_string));
    if report.alias_updated {
        lines.push(format!(
            "'{}' alias now points to '{}' index",
            report.names.alias, report.names.index
        ));
    } else {
        lines.push(format!("'{}' alias left unchanged", report.names.alias));
    }
    lines
}

fn print_report(report: &ImportReport) {
    for line in report_lines(report) {
        println!("{line}");
    }
}

// ============================================================================
// channels, mapping
// ============================================================================

/// List configured channels and their release prefixes.
pub fn cmd_channels(config: &NixdexConfig) -> Result<()> {
    for (name, prefix) in &config.channels {
        println!("{name}\t{prefix}");
    }
    Ok(())
}

/// Print the index settings and mapping.
pub fn cmd_mapping() -> Result<()> {
    let json = serde_json::to_string_pretty(&index_settings())?;
    println!("{json}");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
