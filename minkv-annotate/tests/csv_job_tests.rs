//! CSV annotation job against a SQLite store

mod helpers;

use helpers::*;
use minkv_annotate::model::{EntityKind, Namespace};
use minkv_annotate::store::AnnotationStore;
use minkv_annotate::utils::RetryPolicy;
use minkv_annotate::workflow::CsvJob;
use std::time::Duration;

#[tokio::test]
async fn test_new_pairs_on_unannotated_image() {
    let store = memory_store().await;
    let ds = add(&store, None, EntityKind::Dataset, "ds").await;
    let image = add(&store, Some(ds.id), EntityKind::Image, "cell01.tif").await;

    let summary = CsvJob::new(&store, RetryPolicy::none())
        .run(EntityKind::Dataset, &[ds.id], "image,marker,dose\ncell01.tif,GFP,10nM\n")
        .await
        .unwrap();

    assert_eq!(summary.objects_updated, 1);
    assert_eq!(summary.kv_added, 2);
    assert_eq!(summary.candidates, 1);
    assert_eq!(map_annotation_ids(&store, &image).await.len(), 1);

    let snapshot = snapshot(&store, &image).await;
    let group = snapshot.group(&Namespace::Default).unwrap();
    assert!(group.contains("marker", "GFP"));
    assert!(group.contains("dose", "10nM"));
    assert_eq!(group.pair_count(), 2);
}

#[tokio::test]
async fn test_existing_pair_means_no_write() {
    let store = memory_store().await;
    let ds = add(&store, None, EntityKind::Dataset, "ds").await;
    let image = add(&store, Some(ds.id), EntityKind::Image, "cell01.tif").await;
    let original = attach_pairs(&store, &image, Namespace::Default, &[("marker", "GFP")]).await;

    let summary = CsvJob::new(&store, RetryPolicy::none())
        .run(EntityKind::Dataset, &[ds.id], "image,marker\ncell01.tif,GFP\n")
        .await
        .unwrap();

    assert_eq!(summary.objects_updated, 0);
    assert_eq!(map_annotation_ids(&store, &image).await, vec![original]);
}

#[tokio::test]
async fn test_second_identical_run_writes_nothing() {
    let store = memory_store().await;
    let ds = add(&store, None, EntityKind::Dataset, "ds").await;
    let image = add(&store, Some(ds.id), EntityKind::Image, "cell01.tif").await;
    let csv = "image;marker;dose\ncell01.tif;GFP, RFP;10nM\n";

    let job = CsvJob::new(&store, RetryPolicy::none());
    let first = job.run(EntityKind::Dataset, &[ds.id], csv).await.unwrap();
    let ids_after_first = map_annotation_ids(&store, &image).await;

    let second = job.run(EntityKind::Dataset, &[ds.id], csv).await.unwrap();

    assert_eq!(first.objects_updated, 1);
    assert_eq!(second.objects_updated, 0);
    assert_eq!(second.kv_added, 0);
    assert_eq!(map_annotation_ids(&store, &image).await, ids_after_first);
}

#[tokio::test]
async fn test_multi_valued_cells_union_with_existing() {
    let store = memory_store().await;
    let ds = add(&store, None, EntityKind::Dataset, "ds").await;
    let image = add(&store, Some(ds.id), EntityKind::Image, "cell01.tif").await;
    attach_pairs(&store, &image, Namespace::Default, &[("marker", "GFP")]).await;
    attach_pairs(&store, &image, Namespace::named("mapr_stain"), &[("stain", "DAPI")]).await;

    let summary = CsvJob::new(&store, RetryPolicy::none())
        .run(EntityKind::Dataset, &[ds.id], "image,marker\ncell01.tif,GFP;RFP\n")
        .await
        .unwrap();
    assert_eq!(summary.kv_added, 1);

    let snapshot = snapshot(&store, &image).await;
    let default = snapshot.group(&Namespace::Default).unwrap();
    assert!(default.contains("marker", "GFP"));
    assert!(default.contains("marker", "RFP"));
    // Other namespaces survive the default-namespace replace
    assert!(snapshot
        .group(&Namespace::named("mapr_stain"))
        .unwrap()
        .contains("stain", "DAPI"));
}

#[tokio::test]
async fn test_unknown_images_counted_not_found() {
    let store = memory_store().await;
    let ds = add(&store, None, EntityKind::Dataset, "ds").await;
    add(&store, Some(ds.id), EntityKind::Image, "cell01.tif").await;

    let summary = CsvJob::new(&store, RetryPolicy::none())
        .run(
            EntityKind::Dataset,
            &[ds.id],
            "image,marker\ncell01.tif,GFP\nmissing.tif,RFP\n",
        )
        .await
        .unwrap();

    assert_eq!(summary.records_total, 2);
    assert_eq!(summary.records_not_found, 1);
    assert_eq!(summary.objects_updated, 1);
    assert!(summary.is_success());
}

#[tokio::test]
async fn test_duplicate_names_abort_only_that_root() {
    let store = memory_store().await;
    let bad = add(&store, None, EntityKind::Dataset, "bad").await;
    let dup_a = add(&store, Some(bad.id), EntityKind::Image, "cell01.tif").await;
    let dup_b = add(&store, Some(bad.id), EntityKind::Image, "cell01.tif").await;
    let good = add(&store, None, EntityKind::Dataset, "good").await;
    let image = add(&store, Some(good.id), EntityKind::Image, "cell01.tif").await;

    let summary = CsvJob::new(&store, RetryPolicy::none())
        .run(
            EntityKind::Dataset,
            &[bad.id, good.id],
            "image,marker\ncell01.tif,GFP\n",
        )
        .await
        .unwrap();

    assert_eq!(summary.roots_processed, 2);
    assert_eq!(summary.roots_failed, 1);
    assert_eq!(summary.objects_updated, 1);
    assert!(store.list_annotations(&dup_a).await.unwrap().is_empty());
    assert!(store.list_annotations(&dup_b).await.unwrap().is_empty());
    assert_eq!(map_annotation_ids(&store, &image).await.len(), 1);
    assert!(!summary.is_success());
}

#[tokio::test]
async fn test_plate_rows_target_image_well_or_plate() {
    let store = memory_store().await;
    let plate = add(&store, None, EntityKind::Plate, "P1").await;
    let a1 = add(&store, Some(plate.id), EntityKind::Well, "A1").await;
    let b2 = add(&store, Some(plate.id), EntityKind::Well, "B2").await;
    let image = add(&store, Some(a1.id), EntityKind::Image, "a1_f1.tif").await;

    let csv = "image,well,plate,treatment\n\
               a1_f1.tif,A1,P1,drug\n\
               ,B2,P1,control\n\
               ,,P1,batch7\n\
               ,H12,P1,lost\n";
    let summary = CsvJob::new(&store, RetryPolicy::none())
        .run(EntityKind::Plate, &[plate.id], csv)
        .await
        .unwrap();

    assert_eq!(summary.objects_updated, 3);
    assert_eq!(summary.records_not_found, 1);

    let treatment = |s: &minkv_annotate::model::AnnotationSnapshot| {
        s.group(&Namespace::Default)
            .and_then(|g| g.values("treatment").cloned())
            .unwrap_or_default()
    };
    assert!(treatment(&snapshot(&store, &image).await).contains("drug"));
    assert!(treatment(&snapshot(&store, &b2).await).contains("control"));
    assert!(treatment(&snapshot(&store, &plate).await).contains("batch7"));
    // H12 does not exist: the row must not land on the plate
    assert!(!treatment(&snapshot(&store, &plate).await).contains("lost"));
    assert!(store.list_annotations(&a1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_plate_requires_well_and_plate_columns() {
    let store = memory_store().await;
    let plate = add(&store, None, EntityKind::Plate, "P1").await;

    let summary = CsvJob::new(&store, RetryPolicy::none())
        .run(EntityKind::Plate, &[plate.id], "image,marker\na.tif,GFP\n")
        .await
        .unwrap();

    assert_eq!(summary.roots_failed, 1);
    assert_eq!(summary.objects_updated, 0);
}

#[tokio::test]
async fn test_screen_rows_resolve_within_plate() {
    let store = memory_store().await;
    let screen = add(&store, None, EntityKind::Screen, "S").await;
    let p1 = add(&store, Some(screen.id), EntityKind::Plate, "P1").await;
    let p2 = add(&store, Some(screen.id), EntityKind::Plate, "P2").await;
    let p1_a1 = add(&store, Some(p1.id), EntityKind::Well, "A1").await;
    let p2_a1 = add(&store, Some(p2.id), EntityKind::Well, "A1").await;
    let p1_img = add(&store, Some(p1_a1.id), EntityKind::Image, "f1.tif").await;
    let p2_img = add(&store, Some(p2_a1.id), EntityKind::Image, "f1.tif").await;

    let csv = "plate\twell\timage\tdose\nP2\tA1\tf1.tif\t5uM\nP1\tA1\t\t1uM\n";
    let summary = CsvJob::new(&store, RetryPolicy::none())
        .run(EntityKind::Screen, &[screen.id], csv)
        .await
        .unwrap();

    assert_eq!(summary.objects_updated, 2);
    assert_eq!(summary.candidates, 2);
    assert!(snapshot(&store, &p2_img)
        .await
        .group(&Namespace::Default)
        .unwrap()
        .contains("dose", "5uM"));
    assert!(snapshot(&store, &p1_a1)
        .await
        .group(&Namespace::Default)
        .unwrap()
        .contains("dose", "1uM"));
    assert!(store.list_annotations(&p1_img).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_repeated_rows_merge_into_one_write() {
    let store = memory_store().await;
    let ds = add(&store, None, EntityKind::Dataset, "ds").await;
    let image = add(&store, Some(ds.id), EntityKind::Image, "cell01.tif").await;

    let summary = CsvJob::new(&store, RetryPolicy::none())
        .run(
            EntityKind::Dataset,
            &[ds.id],
            "image,marker\ncell01.tif,GFP\ncell01.tif,RFP\n",
        )
        .await
        .unwrap();

    assert_eq!(summary.objects_updated, 1);
    assert_eq!(summary.kv_added, 2);
    assert_eq!(map_annotation_ids(&store, &image).await.len(), 1);
}

#[tokio::test]
async fn test_write_failure_is_counted_and_run_continues() {
    let sqlite = memory_store().await;
    let ds = add(&sqlite, None, EntityKind::Dataset, "ds").await;
    let first = add(&sqlite, Some(ds.id), EntityKind::Image, "a.tif").await;
    let second = add(&sqlite, Some(ds.id), EntityKind::Image, "b.tif").await;

    let store = FlakyStore::new(sqlite);
    store.fail_create_with_key("broken");

    let summary = CsvJob::new(&store, RetryPolicy::none())
        .run(
            EntityKind::Dataset,
            &[ds.id],
            "image,broken,marker\na.tif,x,GFP\nb.tif,,RFP\n",
        )
        .await
        .unwrap();

    assert_eq!(summary.write_failures, 1);
    assert_eq!(summary.objects_updated, 1);
    assert!(store.list_annotations(&first).await.unwrap().is_empty());
    assert!(snapshot(&store, &second)
        .await
        .group(&Namespace::Default)
        .unwrap()
        .contains("marker", "RFP"));
}

#[tokio::test]
async fn test_failed_delete_is_retried_then_create_is_skipped() {
    let sqlite = memory_store().await;
    let ds = add(&sqlite, None, EntityKind::Dataset, "ds").await;
    let image = add(&sqlite, Some(ds.id), EntityKind::Image, "a.tif").await;
    let original = attach_pairs(&sqlite, &image, Namespace::Default, &[("marker", "GFP")]).await;

    let store = FlakyStore::new(sqlite);
    store
        .fail_deletes
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let retry = RetryPolicy::new(3, Duration::from_millis(1));
    let summary = CsvJob::new(&store, retry)
        .run(EntityKind::Dataset, &[ds.id], "image,marker\na.tif,RFP\n")
        .await
        .unwrap();

    assert_eq!(summary.write_failures, 1);
    assert_eq!(
        store.delete_calls.load(std::sync::atomic::Ordering::SeqCst),
        3
    );
    assert_eq!(map_annotation_ids(&store, &image).await, vec![original]);
}

#[tokio::test]
async fn test_image_root_rejected() {
    let store = memory_store().await;
    let image = add(&store, None, EntityKind::Image, "a.tif").await;

    let result = CsvJob::new(&store, RetryPolicy::none())
        .run(EntityKind::Image, &[image.id], "image,marker\na.tif,GFP\n")
        .await;
    assert!(result.is_err());
}
