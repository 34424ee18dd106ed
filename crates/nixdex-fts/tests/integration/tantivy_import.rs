//! Whole imports against the Tantivy store.

use std::collections::BTreeSet;

use nixdex_fts::{IndexLifecycle, IndexNames, IndexStore, TantivyStore, import_channel};
use tempfile::TempDir;

use crate::common::{
    FakeCatalog, PREFIX, TestHarness, evaluation, packages_with_bad_maintainers, sample_options,
};

#[tokio::test]
async fn test_tantivy_import_persists_documents_and_alias() {
    let dir = TempDir::new().unwrap();
    let harness = TestHarness::new();

    let report = {
        let store = TantivyStore::open(dir.path()).unwrap();
        let lifecycle = IndexLifecycle::new(&store).with_chunk_size(2);
        import_channel(
            &harness.ctx,
            harness.collaborators(),
            &lifecycle,
            "unstable",
            PREFIX,
            false,
        )
        .await
        .expect("import should succeed")
    };
    assert_eq!(report.packages.unwrap().succeeded, 3);
    assert_eq!(report.options.unwrap().succeeded, 2);

    let reopened = TantivyStore::open(dir.path()).unwrap();
    assert_eq!(reopened.count_documents(&report.names.index).await.unwrap(), 5);
    assert_eq!(
        reopened.aliased_indexes("latest-1-unstable").await.unwrap(),
        BTreeSet::from([report.names.index.clone()])
    );
}

#[tokio::test]
async fn test_tantivy_alias_moves_to_newer_evaluation() {
    let dir = TempDir::new().unwrap();
    let store = TantivyStore::open(dir.path()).unwrap();
    let lifecycle = IndexLifecycle::new(&store);
    let harness = TestHarness::new();

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

    harness.evaluations.advance(311_000);
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

    assert_eq!(
        store.aliased_indexes("latest-1-unstable").await.unwrap(),
        BTreeSet::from([second.names.index.clone()])
    );
    assert!(store.index_exists(&first.names.index).await.unwrap());
}

#[tokio::test]
async fn test_tantivy_aborted_import_keeps_alias() {
    let dir = TempDir::new().unwrap();
    let store = TantivyStore::open(dir.path()).unwrap();
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
    broken.evaluations.advance(311_000);
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
    assert_eq!(
        store.aliased_indexes("latest-1-unstable").await.unwrap(),
        BTreeSet::from([first.names.index.clone()])
    );
    let broken_index = IndexNames::new(1, "unstable", &evaluation(311_000)).index;
    assert!(!store.index_exists(&broken_index).await.unwrap());
    assert!(!dir.path().join(&broken_index).exists());
}
