//! Whole imports against the in-memory store.

use std::collections::BTreeSet;

use nixdex_fts::{
    Document, IndexLifecycle, IndexNames, IndexStore, MemoryStore, StoreOp, import_channel,
};

use crate::common::{
    FakeCatalog, PREFIX, TestHarness, evaluation, packages_with_bad_maintainers, sample_options,
};

fn aliased(index: &str) -> BTreeSet<String> {
    BTreeSet::from([index.to_string()])
}

#[tokio::test]
async fn test_import_populates_and_publishes() {
    let harness = TestHarness::new();
    let store = MemoryStore::new();
    let lifecycle = IndexLifecycle::new(&store);

    let report = import_channel(
        &harness.ctx,
        harness.collaborators(),
        &lifecycle,
        "unstable",
        PREFIX,
        false,
    )
    .await
    .expect("import should succeed");

    let names = IndexNames::new(1, "unstable", &evaluation(310_000));
    assert_eq!(report.names, names);
    assert!(report.created);
    assert!(report.alias_updated);
    assert_eq!(
        report.packages.as_ref().unwrap().to_string(),
        "Indexed 3/3 packages"
    );
    assert_eq!(
        report.options.as_ref().unwrap().to_string(),
        "Indexed 2/2 options"
    );

    assert_eq!(store.count_documents(&names.index).await.unwrap(), 5);
    assert_eq!(
        store.aliased_indexes("latest-1-unstable").await.unwrap(),
        aliased(&names.index)
    );
}

#[tokio::test]
async fn test_import_normalizes_package_fields() {
    let harness = TestHarness::new();
    let store = MemoryStore::new();
    let lifecycle = IndexLifecycle::new(&store);
    let report = import_channel(
        &harness.ctx,
        harness.collaborators(),
        &lifecycle,
        "unstable",
        PREFIX,
        false,
    )
    .await
    .unwrap();

    let documents = store.documents(&report.names.index).unwrap();
    let hello = documents
        .iter()
        .find_map(|doc| match doc {
            Document::Package(p) if p.attr_name == "hello" => Some(p),
            _ => None,
        })
        .expect("hello is indexed");

    assert_eq!(hello.platforms, vec!["x86_64-linux", "aarch64-linux"]);
    assert_eq!(hello.hydra.as_ref().map(Vec::len), Some(2));
    assert_eq!(
        hello.position.as_deref(),
        Some("pkgs/applications/misc/hello/default.nix:34")
    );
    assert_eq!(hello.attr_name_reverse, "olleh");
    assert_eq!(hello.suggestions.len(), 1);

    let requests = documents
        .iter()
        .find_map(|doc| match doc {
            Document::Package(p) if p.attr_name == "python37Packages.requests" => Some(p),
            _ => None,
        })
        .expect("requests is indexed");
    assert_eq!(requests.attr_set.as_deref(), Some("python37Packages"));
    assert_eq!(requests.pname, "requests");
    assert_eq!(requests.maintainers_set, vec!["No maintainers"]);
}

#[tokio::test]
async fn test_rerun_same_evaluation_writes_nothing() {
    let harness = TestHarness::new();
    let store = MemoryStore::new();
    let lifecycle = IndexLifecycle::new(&store);

    for _ in 0..2 {
        import_channel(
            &harness.ctx,
            harness.collaborators(),
            &lifecycle,
            "unstable",
            PREFIX,
            false,
        )
        .await
        .unwrap();
    }

    let operations = store.operations().unwrap();
    let creates = operations
        .iter()
        .filter(|op| matches!(op, StoreOp::CreateIndex(_)))
        .count();
    let writes = operations
        .iter()
        .filter(|op| matches!(op, StoreOp::BulkWrite { .. }))
        .count();
    assert_eq!(creates, 1);
    assert_eq!(writes, 2, "one batch of packages and one of options");
    assert!(
        !operations
            .iter()
            .any(|op| matches!(op, StoreOp::DeleteIndex(_)))
    );
}

#[tokio::test]
async fn test_newer_evaluation_swaps_alias() {
    let harness = TestHarness::new();
    let store = MemoryStore::new();
    let lifecycle = IndexLifecycle::new(&store);

    let first = import_channel(
        &harness.ctx,
        harness.collaborators(),
        &lifecycle,
        "unstable",
        PREFIX,
        false,
    )
    .await
    .unwrap();

    harness.evaluations.advance(310_500);
    let second = import_channel(
        &harness.ctx,
        harness.collaborators(),
        &lifecycle,
        "unstable",
        PREFIX,
        false,
    )
    .await
    .unwrap();

    assert_ne!(first.names.index, second.names.index);
    assert_eq!(
        store.aliased_indexes("latest-1-unstable").await.unwrap(),
        aliased(&second.names.index)
    );
    // The previous index is kept; only the alias moved.
    assert!(store.index_exists(&first.names.index).await.unwrap());
}

#[tokio::test]
async fn test_schema_violation_leaves_alias_on_previous_index() {
    let store = MemoryStore::new();
    let lifecycle = IndexLifecycle::new(&store);

    let good = TestHarness::new();
    let first = import_channel(
        &good.ctx,
        good.collaborators(),
        &lifecycle,
        "unstable",
        PREFIX,
        false,
    )
    .await
    .unwrap();

    let broken = TestHarness::with_catalog(FakeCatalog::new(
        packages_with_bad_maintainers(),
        sample_options(),
    ));
    broken.evaluations.advance(310_500);
    let err = import_channel(
        &broken.ctx,
        broken.collaborators(),
        &lifecycle,
        "unstable",
        PREFIX,
        false,
    )
    .await
    .unwrap_err();
    assert!(err.is_schema_violation(), "{err}");
    assert_eq!(
        store.aliased_indexes("latest-1-unstable").await.unwrap(),
        aliased(&first.names.index)
    );

    // The aborted run removed its index; a rerun rebuilds it and fails the
    // same way instead of publishing what was written before the failure.
    let broken_index = IndexNames::new(1, "unstable", &evaluation(310_500)).index;
    assert!(!store.index_exists(&broken_index).await.unwrap());

    let rerun = import_channel(
        &broken.ctx,
        broken.collaborators(),
        &lifecycle,
        "unstable",
        PREFIX,
        false,
    )
    .await;
    assert!(rerun.is_err());
    assert_eq!(
        store.aliased_indexes("latest-1-unstable").await.unwrap(),
        aliased(&first.names.index)
    );
}

#[tokio::test]
async fn test_partially_written_index_is_never_published() {
    let store = MemoryStore::new();
    let lifecycle = IndexLifecycle::new(&store).with_chunk_size(1);

    let good = TestHarness::new();
    let first = import_channel(
        &good.ctx,
        good.collaborators(),
        &lifecycle,
        "unstable",
        PREFIX,
        false,
    )
    .await
    .unwrap();

    // With one document per chunk, "good" reaches the store before "bad"
    // aborts the stream.
    let broken = TestHarness::with_catalog(FakeCatalog::new(
        packages_with_bad_maintainers(),
        sample_options(),
    ));
    broken.evaluations.advance(310_500);
    let broken_index = IndexNames::new(1, "unstable", &evaluation(310_500)).index;

    for _ in 0..2 {
        let result = import_channel(
            &broken.ctx,
            broken.collaborators(),
            &lifecycle,
            "unstable",
            PREFIX,
            false,
        )
        .await;
        assert!(result.is_err());
        assert!(!store.index_exists(&broken_index).await.unwrap());
        assert_eq!(
            store.aliased_indexes("latest-1-unstable").await.unwrap(),
            aliased(&first.names.index)
        );
    }

    let operations = store.operations().unwrap();
    assert!(operations.contains(&StoreOp::BulkWrite {
        index: broken_index.clone(),
        count: 1,
    }));
    assert!(operations.contains(&StoreOp::DeleteIndex(broken_index)));
}

#[tokio::test]
async fn test_options_failure_discards_written_packages() {
    let store = MemoryStore::new();
    let lifecycle = IndexLifecycle::new(&store);

    let good = TestHarness::new();
    let first = import_channel(
        &good.ctx,
        good.collaborators(),
        &lifecycle,
        "unstable",
        PREFIX,
        false,
    )
    .await
    .unwrap();

    let broken = TestHarness::with_catalog(
        FakeCatalog::new(crate::common::sample_packages(), sample_options()).failing_options(),
    );
    broken.evaluations.advance(310_500);
    let err = import_channel(
        &broken.ctx,
        broken.collaborators(),
        &lifecycle,
        "unstable",
        PREFIX,
        false,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, nixdex_core::Error::Command { .. }), "{err}");

    let broken_index = IndexNames::new(1, "unstable", &evaluation(310_500)).index;
    assert!(!store.index_exists(&broken_index).await.unwrap());
    assert_eq!(
        store.aliased_indexes("latest-1-unstable").await.unwrap(),
        aliased(&first.names.index)
    );
}

#[tokio::test]
async fn test_fully_rejected_index_is_not_published() {
    let harness = TestHarness::new();
    let store = MemoryStore::new().with_rejection(|_| true);
    let lifecycle = IndexLifecycle::new(&store);

    for _ in 0..2 {
        let report = import_channel(
            &harness.ctx,
            harness.collaborators(),
            &lifecycle,
            "unstable",
            PREFIX,
            false,
        )
        .await
        .unwrap();
        assert!(!report.alias_updated);
        if let Some(packages) = &report.packages {
            assert_eq!(packages.to_string(), "Indexed 0/3 packages");
        }
        assert!(!store.alias_exists("latest-1-unstable").await.unwrap());
        assert_eq!(store.count_documents(&report.names.index).await.unwrap(), 0);
    }
}

#[tokio::test]
async fn test_partial_rejections_still_publish() {
    let harness = TestHarness::new();
    let store = MemoryStore::new().with_rejection(|doc| doc.name() == "emptyMeta");
    let lifecycle = IndexLifecycle::new(&store);

    let report = import_channel(
        &harness.ctx,
        harness.collaborators(),
        &lifecycle,
        "unstable",
        PREFIX,
        false,
    )
    .await
    .unwrap();

    let packages = report.packages.unwrap();
    assert_eq!(packages.to_string(), "Indexed 2/3 packages");
    assert_eq!(packages.failed, 1);
    assert!(report.alias_updated);
    assert_eq!(store.count_documents(&report.names.index).await.unwrap(), 4);
}

#[tokio::test]
async fn test_force_rebuilds_existing_index() {
    let harness = TestHarness::new();
    let store = MemoryStore::new();
    let lifecycle = IndexLifecycle::new(&store);

    for force in [false, true] {
        let report = import_channel(
            &harness.ctx,
            harness.collaborators(),
            &lifecycle,
            "unstable",
            PREFIX,
            force,
        )
        .await
        .unwrap();
        assert!(report.created);
        assert_eq!(store.count_documents(&report.names.index).await.unwrap(), 5);
    }
}
