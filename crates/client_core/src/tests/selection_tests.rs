use super::*;
use crate::test_support::image;

fn store() -> FileSelectionStore {
    FileSelectionStore::new(PreviewRegistry::new())
}

#[test]
fn three_valid_and_one_oversized_file_split_before_any_request() {
    let mut store = store();
    let options = SelectionOptions {
        max_size: 1_000,
        ..SelectionOptions::bulk(5)
    };

    let outcome = store.add_files(
        vec![
            image("a.jpg", 10),
            image("b.jpg", 10),
            image("huge.jpg", 1_001),
            image("c.jpg", 10),
        ],
        &options,
    );

    assert_eq!(outcome.accepted, 3);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].file_name, "huge.jpg");
    assert_eq!(
        outcome.rejected[0].reasons,
        vec![RejectionReason::FileTooLarge {
            size: 1_001,
            max_size: 1_000
        }]
    );
    assert_eq!(store.len(), 3);
    assert_eq!(store.registry().live_count(), 3);
}

#[test]
fn batch_never_exceeds_max_files_across_calls() {
    let mut store = store();
    let options = SelectionOptions::bulk(3);

    for round in 0..4 {
        let incoming = (0..2).map(|i| image(&format!("r{round}-{i}.png"), 4));
        let outcome = store.add_files(incoming, &options);
        assert!(store.len() <= 3);
        for rejection in &outcome.rejected {
            assert_eq!(
                rejection.reasons,
                vec![RejectionReason::TooManyFiles { max_files: 3 }]
            );
        }
    }

    assert_eq!(store.len(), 3);
    assert_eq!(store.registry().live_count(), 3);
    let names = store
        .batch()
        .iter()
        .map(|selected| selected.file().name().to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["r0-0.png", "r0-1.png", "r1-0.png"]);
}

#[test]
fn single_mode_replaces_batch_and_releases_old_preview() {
    let mut store = store();
    let options = SelectionOptions::single();

    store.add_files(vec![image("first.jpg", 4)], &options);
    let first_url = store.batch()[0].preview().url().to_string();

    let outcome = store.add_files(vec![image("second.jpg", 4), image("third.jpg", 4)], &options);

    assert_eq!(outcome.accepted, 1);
    assert_eq!(outcome.rejected[0].file_name, "third.jpg");
    assert_eq!(store.len(), 1);
    assert_eq!(store.batch()[0].file().name(), "second.jpg");
    assert!(!store.registry().is_live(&first_url));
    assert_eq!(store.registry().live_count(), 1);
}

#[test]
fn single_mode_keeps_existing_file_when_nothing_is_accepted() {
    let mut store = store();
    let options = SelectionOptions::single();
    store.add_files(vec![image("keep.jpg", 4)], &options);

    let outcome = store.add_files(
        vec![LocalFile::new("notes.txt", Some("text/plain".into()), vec![1u8; 4])],
        &options,
    );

    assert_eq!(outcome.accepted, 0);
    assert_eq!(store.batch()[0].file().name(), "keep.jpg");
}

#[test]
fn type_predicate_accepts_by_mime_or_extension() {
    let accepted = AcceptedTypes::images();

    assert!(accepted.accepts(&LocalFile::new("scan", Some("image/webp".into()), vec![0u8])));
    assert!(accepted.accepts(&LocalFile::new("PHOTO.JPG", None, vec![0u8])));
    assert!(!accepted.accepts(&LocalFile::new("doc.pdf", Some("application/pdf".into()), vec![0u8])));
    assert!(!accepted.accepts(&LocalFile::new("unknown", None, vec![0u8])));
}

#[test]
fn invalid_type_and_size_are_both_reported() {
    let options = SelectionOptions {
        max_size: 2,
        ..SelectionOptions::default()
    };
    let file = LocalFile::new("clip.mp4", Some("video/mp4".into()), vec![0u8; 3]);

    let reasons = validate_file(&file, &options);

    assert_eq!(reasons.len(), 2);
    assert!(matches!(reasons[0], RejectionReason::FileInvalidType { .. }));
    assert!(matches!(reasons[1], RejectionReason::FileTooLarge { .. }));
}

#[test]
fn remove_file_releases_only_its_preview() {
    let mut store = store();
    store.add_files(
        vec![image("a.jpg", 1), image("b.jpg", 1), image("c.jpg", 1)],
        &SelectionOptions::bulk(5),
    );
    let urls = store
        .batch()
        .iter()
        .map(|selected| selected.preview().url().to_string())
        .collect::<Vec<_>>();

    let removed = store.remove_file(1).expect("in range");

    assert_eq!(removed.name(), "b.jpg");
    assert_eq!(store.registry().released_count(), 1);
    assert_eq!(store.registry().live_count(), store.len());
    assert!(store.registry().is_live(&urls[0]));
    assert!(!store.registry().is_live(&urls[1]));
    assert!(store.registry().is_live(&urls[2]));
}

#[test]
fn remove_file_out_of_range_is_a_no_op() {
    let mut store = store();
    store.add_files(vec![image("a.jpg", 1)], &SelectionOptions::bulk(5));
    let generation = store.generation();

    assert!(store.remove_file(3).is_none());
    assert_eq!(store.len(), 1);
    assert_eq!(store.generation(), generation);
    assert_eq!(store.registry().released_count(), 0);
}

#[test]
fn clear_take_and_drop_release_every_handle_once() {
    let registry = PreviewRegistry::new();
    let options = SelectionOptions::bulk(5);

    let mut cleared = FileSelectionStore::new(registry.clone());
    cleared.add_files(vec![image("a.jpg", 1), image("b.jpg", 1)], &options);
    cleared.clear();
    assert_eq!(registry.live_count(), 0);

    let mut submitted = FileSelectionStore::new(registry.clone());
    submitted.add_files(vec![image("c.jpg", 1)], &options);
    let files = submitted.take_files();
    assert_eq!(files.len(), 1);
    assert!(submitted.is_empty());
    assert_eq!(registry.live_count(), 0);

    {
        let mut torn_down = FileSelectionStore::new(registry.clone());
        torn_down.add_files(vec![image("d.jpg", 1), image("e.jpg", 1)], &options);
        assert_eq!(registry.live_count(), 2);
    }

    assert_eq!(registry.live_count(), 0);
    assert_eq!(registry.created_count(), 5);
    assert_eq!(registry.released_count(), 5);
}

#[tokio::test]
async fn read_guesses_mime_type_from_extension() {
    let dir = std::env::temp_dir().join(format!("facefind_selection_{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&dir).await.expect("temp dir");
    let path = dir.join("group.png");
    tokio::fs::write(&path, b"png-bytes").await.expect("write");

    let file = LocalFile::read(&path).await.expect("read");

    assert_eq!(file.name(), "group.png");
    assert_eq!(file.mime_type(), Some("image/png"));
    assert_eq!(file.size(), 9);
    tokio::fs::remove_dir_all(dir).await.expect("cleanup");
}

#[test]
fn remove_entries_releases_only_listed_entries() {
    let mut store = FileSelectionStore::new(PreviewRegistry::new());
    store.add_files(
        vec![image("a.jpg", 8), image("b.jpg", 8), image("c.jpg", 8)],
        &SelectionOptions::bulk(5),
    );
    let ids = [store.batch()[0].entry_id(), store.batch()[2].entry_id()];
    let before = store.generation();

    let removed = store.remove_entries(&ids);

    assert_eq!(removed.iter().map(LocalFile::name).collect::<Vec<_>>(), vec!["a.jpg", "c.jpg"]);
    assert_eq!(store.files().iter().map(LocalFile::name).collect::<Vec<_>>(), vec!["b.jpg"]);
    assert_eq!(store.registry().live_count(), 1);
    assert!(store.generation() > before);

    let generation = store.generation();
    assert!(store.remove_entries(&ids).is_empty());
    assert_eq!(store.generation(), generation);
}
