//! End-to-end behaviour of bulk copies and moves.

use std::fs;
use std::sync::Arc;

use anyhow::Result;
use shuttle_config::EngineConfig;
use shuttle_store::TransferLimits;
use shuttle_telemetry::Metrics;
use shuttle_test_support::{Fault, FaultOp, MemoryStore, local_share, memory_share};
use shuttle_transfer::{
    CancellationToken, ConflictPolicy, FileItem, PatternMode, TransferError, TransferRequest,
    TransferService,
};

fn service(store: &Arc<MemoryStore>) -> Result<(TransferService, Metrics)> {
    let metrics = Metrics::new()?;
    let service = TransferService::new(store.clone(), EngineConfig::default(), metrics.clone());
    Ok((service, metrics))
}

fn pairs(items: &[FileItem]) -> Vec<(&str, &str)> {
    items
        .iter()
        .map(|item| (item.source_path.as_str(), item.target_path.as_str()))
        .collect()
}

fn request(source: &str, target: &str, policy: ConflictPolicy) -> TransferRequest {
    let mut request = TransferRequest::new(source, target);
    request.conflict_policy = policy;
    request
}

#[test]
fn recursive_wildcard_copy_preserves_structure() -> Result<()> {
    let store = Arc::new(memory_share(&[
        ("src/a.txt", "alpha"),
        ("src/b.log", "log"),
        ("src/sub/c.txt", "gamma"),
    ])?);
    let (service, metrics) = service(&store)?;

    let mut request = request("src", "target", ConflictPolicy::Throw);
    request.recursive = true;
    request.pattern = "*.txt".to_string();
    request.preserve_structure = true;
    request.create_target_directories = true;

    let items = service.copy_files(&request, &CancellationToken::new())?;

    assert_eq!(
        pairs(&items),
        vec![
            ("src/a.txt", "target/a.txt"),
            ("src/sub/c.txt", "target/sub/c.txt"),
        ]
    );
    assert_eq!(store.read_file("target/a.txt"), Some(b"alpha".to_vec()));
    assert_eq!(store.read_file("target/sub/c.txt"), Some(b"gamma".to_vec()));
    assert!(!store.exists("target/b.log"));
    assert!(store.exists("src/a.txt"));
    assert_eq!(store.open_handles(), 0);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.entries_copied, 2);
    assert_eq!(snapshot.bytes_total, 10);
    Ok(())
}

#[test]
fn regex_mode_selects_by_relative_path() -> Result<()> {
    let store = Arc::new(memory_share(&[
        ("src/2024/report-1.csv", "1"),
        ("src/2025/report-2.csv", "2"),
        ("src/2025/notes.txt", "n"),
    ])?);
    let (service, _) = service(&store)?;

    let mut request = request("src", "dst", ConflictPolicy::Throw);
    request.recursive = true;
    request.pattern = r"^2025/.*\.csv$".to_string();
    request.pattern_mode = PatternMode::Regex;
    request.create_target_directories = true;

    let items = service.copy_files(&request, &CancellationToken::new())?;
    assert_eq!(pairs(&items), vec![("src/2025/report-2.csv", "dst/report-2.csv")]);
    Ok(())
}

#[test]
fn rename_policy_keeps_the_original() -> Result<()> {
    let store = Arc::new(memory_share(&[("src/old.txt", "new"), ("dst/old.txt", "old")])?);
    let (service, metrics) = service(&store)?;
    let request = request("src", "dst", ConflictPolicy::Rename);

    let items = service.copy_files(&request, &CancellationToken::new())?;
    assert_eq!(pairs(&items), vec![("src/old.txt", "dst/old(1).txt")]);
    assert_eq!(store.read_file("dst/old.txt"), Some(b"old".to_vec()));
    assert_eq!(store.read_file("dst/old(1).txt"), Some(b"new".to_vec()));

    let again = service.copy_files(&request, &CancellationToken::new())?;
    assert_eq!(pairs(&again), vec![("src/old.txt", "dst/old(2).txt")]);
    assert_eq!(metrics.snapshot().conflicts_total, 2);
    Ok(())
}

#[test]
fn flattened_duplicates_are_conflicts() -> Result<()> {
    let store = Arc::new(memory_share(&[("src/x/a.txt", "x"), ("src/y/a.txt", "y")])?);
    let (service, _) = service(&store)?;

    let mut request = request("src", "dst", ConflictPolicy::Rename);
    request.recursive = true;
    request.create_target_directories = true;

    let items = service.copy_files(&request, &CancellationToken::new())?;
    assert_eq!(
        pairs(&items),
        vec![("src/x/a.txt", "dst/a.txt"), ("src/y/a.txt", "dst/a(1).txt")]
    );

    let mut strict = request.clone();
    strict.conflict_policy = ConflictPolicy::Throw;
    strict.target_root = "dst2".to_string();
    let before = store.snapshot();
    let result = service.copy_files(&strict, &CancellationToken::new());
    assert!(matches!(result, Err(TransferError::DestinationExists { .. })));
    assert_eq!(store.snapshot(), before);
    Ok(())
}

#[test]
fn throw_on_first_entry_mutates_nothing() -> Result<()> {
    let store = Arc::new(memory_share(&[("src/a.txt", "new"), ("dst/a.txt", "old")])?);
    let (service, _) = service(&store)?;
    let before = store.mutation_count();

    let result = service.copy_files(&request("src", "dst", ConflictPolicy::Throw), &CancellationToken::new());

    match result {
        Err(TransferError::DestinationExists { path }) => assert_eq!(path.as_str(), "dst/a.txt"),
        other => anyhow::bail!("expected destination exists, got {other:?}"),
    }
    assert_eq!(store.mutation_count(), before);
    assert_eq!(store.read_file("dst/a.txt"), Some(b"old".to_vec()));
    Ok(())
}

#[test]
fn throw_on_a_later_entry_reverts_earlier_ones() -> Result<()> {
    let store = Arc::new(memory_share(&[
        ("src/a.txt", "a"),
        ("src/b.txt", "b"),
        ("src/c.txt", "c"),
        ("dst/c.txt", "taken"),
    ])?);
    let (service, metrics) = service(&store)?;
    let before = store.snapshot();

    let result = service.copy_files(&request("src", "dst", ConflictPolicy::Throw), &CancellationToken::new());

    assert!(matches!(result, Err(TransferError::DestinationExists { .. })));
    assert_eq!(store.snapshot(), before);
    assert_eq!(metrics.snapshot().rollbacks_completed, 1);
    assert_eq!(store.open_handles(), 0);
    Ok(())
}

#[test]
fn overwrite_replaces_content_and_discards_staging() -> Result<()> {
    let store = Arc::new(memory_share(&[("src/a.txt", "fresh"), ("dst/a.txt", "stale")])?);
    let (service, _) = service(&store)?;

    let items = service.copy_files(
        &request("src", "dst", ConflictPolicy::Overwrite),
        &CancellationToken::new(),
    )?;

    assert_eq!(pairs(&items), vec![("src/a.txt", "dst/a.txt")]);
    assert_eq!(store.read_file("dst/a.txt"), Some(b"fresh".to_vec()));
    assert!(store.paths_with_name_prefix("temp-").is_empty());
    Ok(())
}

#[test]
fn failure_on_third_of_five_reverts_everything() -> Result<()> {
    let store = Arc::new(memory_share(&[
        ("src/a.txt", "a"),
        ("src/b.txt", "b"),
        ("src/c.txt", "c"),
        ("src/d.txt", "d"),
        ("src/e.txt", "e"),
        ("dst/b.txt", "previous b"),
    ])?);
    store.inject(Fault::new(FaultOp::Write, "dst/c.txt")?);
    let (service, metrics) = service(&store)?;
    let before = store.snapshot();

    let result = service.copy_files(
        &request("src", "dst", ConflictPolicy::Overwrite),
        &CancellationToken::new(),
    );

    assert!(matches!(
        result,
        Err(TransferError::Store {
            operation: "executor.write",
            ..
        })
    ));
    assert_eq!(store.snapshot(), before);
    assert_eq!(store.read_file("dst/b.txt"), Some(b"previous b".to_vec()));
    assert!(!store.exists("dst/d.txt"));
    assert!(!store.exists("dst/e.txt"));
    assert_eq!(metrics.snapshot().rollbacks_completed, 1);
    assert_eq!(metrics.snapshot().entries_copied, 0);
    assert_eq!(store.open_handles(), 0);
    Ok(())
}

#[test]
fn failed_compensation_keeps_the_trigger() -> Result<()> {
    let store = Arc::new(memory_share(&[
        ("src/a.txt", "a"),
        ("src/b.txt", "b"),
        ("src/c.txt", "c"),
    ])?);
    store.add_dir("dst")?;
    store.inject(Fault::new(FaultOp::Write, "dst/c.txt")?);
    store.inject(Fault::new(FaultOp::Delete, "dst/a.txt")?);
    let (service, metrics) = service(&store)?;

    let result = service.copy_files(&request("src", "dst", ConflictPolicy::Throw), &CancellationToken::new());

    match result {
        Err(TransferError::RollbackIncomplete { source, rollback }) => {
            assert!(matches!(
                *source,
                TransferError::Store {
                    operation: "executor.write",
                    ..
                }
            ));
            assert!(matches!(
                *rollback,
                TransferError::Store {
                    operation: "ledger.rollback_delete",
                    ..
                }
            ));
        }
        other => anyhow::bail!("expected rollback incomplete, got {other:?}"),
    }
    assert!(store.exists("dst/a.txt"));
    assert!(!store.exists("dst/b.txt"));
    assert_eq!(metrics.snapshot().rollbacks_incomplete, 1);
    Ok(())
}

#[test]
fn move_removes_sources_after_commit() -> Result<()> {
    let store = Arc::new(memory_share(&[("src/a.txt", "a"), ("src/sub/b.txt", "b")])?);
    let (service, metrics) = service(&store)?;

    let mut request = request("src", "dst", ConflictPolicy::Throw);
    request.recursive = true;
    request.preserve_structure = true;
    request.create_target_directories = true;

    let items = service.move_files(&request, &CancellationToken::new())?;
    assert_eq!(items.len(), 2);
    assert!(!store.exists("src/a.txt"));
    assert!(!store.exists("src/sub/b.txt"));
    assert_eq!(store.read_file("dst/sub/b.txt"), Some(b"b".to_vec()));
    assert_eq!(metrics.snapshot().entries_moved, 2);
    Ok(())
}

#[test]
fn failed_move_keeps_every_source() -> Result<()> {
    let store = Arc::new(memory_share(&[("src/a.txt", "a"), ("src/b.txt", "b")])?);
    store.add_dir("dst")?;
    store.inject(Fault::new(FaultOp::Read, "src/b.txt")?);
    let (service, _) = service(&store)?;

    let result = service.move_files(&request("src", "dst", ConflictPolicy::Throw), &CancellationToken::new());
    assert!(result.is_err());
    assert_eq!(store.read_file("src/a.txt"), Some(b"a".to_vec()));
    assert!(store.exists("src/b.txt"));
    assert!(!store.exists("dst/a.txt"));
    Ok(())
}

#[test]
fn source_cleanup_failures_are_reported_after_commit() -> Result<()> {
    let store = Arc::new(memory_share(&[("src/a.txt", "a"), ("src/b.txt", "b")])?);
    store.add_dir("dst")?;
    store.inject(Fault::new(FaultOp::Delete, "src/a.txt")?);
    let (service, _) = service(&store)?;

    let result = service.move_files(&request("src", "dst", ConflictPolicy::Throw), &CancellationToken::new());
    assert!(matches!(
        result,
        Err(TransferError::SourceCleanup { pending: 1, .. })
    ));
    assert!(store.exists("dst/a.txt"));
    assert!(store.exists("dst/b.txt"));
    assert!(store.exists("src/a.txt"));
    assert!(!store.exists("src/b.txt"));
    Ok(())
}

#[test]
fn overwrite_onto_itself_is_left_in_place() -> Result<()> {
    let store = Arc::new(memory_share(&[("shared/a.txt", "a")])?);
    let (service, _) = service(&store)?;

    let items = service.move_files(
        &request("shared", "shared", ConflictPolicy::Overwrite),
        &CancellationToken::new(),
    )?;
    assert_eq!(pairs(&items), vec![("shared/a.txt", "shared/a.txt")]);
    assert_eq!(store.read_file("shared/a.txt"), Some(b"a".to_vec()));
    Ok(())
}

#[test]
fn depth_one_sources_map_identically_with_or_without_structure() -> Result<()> {
    let files = [("src/a.txt", "a"), ("src/b.txt", "b")];
    let mut outcomes = Vec::new();
    for preserve in [false, true] {
        let store = Arc::new(memory_share(&files)?);
        let (service, _) = service(&store)?;
        let mut request = request("src", "dst", ConflictPolicy::Throw);
        request.recursive = true;
        request.preserve_structure = preserve;
        request.create_target_directories = true;
        let items = service.copy_files(&request, &CancellationToken::new())?;
        outcomes.push((items, store.snapshot()));
    }
    assert_eq!(outcomes[0], outcomes[1]);
    Ok(())
}

#[test]
fn repeated_copies_report_the_same_sequence() -> Result<()> {
    let store = Arc::new(MemoryStore::new().with_page_size(1));
    for (path, contents) in [("src/z.txt", "z"), ("src/b/a.txt", "a"), ("src/a.txt", "a")] {
        store.add_file(path, contents)?;
    }
    let (service, _) = service(&store)?;

    let mut first = request("src", "one", ConflictPolicy::Throw);
    first.recursive = true;
    first.preserve_structure = true;
    first.create_target_directories = true;
    let mut second = first.clone();
    second.target_root = "two".to_string();

    let sources = |items: Vec<FileItem>| -> Vec<String> {
        items
            .into_iter()
            .map(|item| item.source_path.as_str().to_string())
            .collect()
    };
    let one = sources(service.copy_files(&first, &CancellationToken::new())?);
    let two = sources(service.copy_files(&second, &CancellationToken::new())?);
    assert_eq!(one, two);
    assert_eq!(one, vec!["src/a.txt", "src/z.txt", "src/b/a.txt"]);
    Ok(())
}

#[test]
fn no_matches_rolls_back_created_directories() -> Result<()> {
    let store = Arc::new(memory_share(&[("src/a.txt", "a")])?);
    let (service, _) = service(&store)?;

    let mut request = request("src", "new/dst", ConflictPolicy::Throw);
    request.pattern = "*.csv".to_string();
    request.create_target_directories = true;

    let result = service.copy_files(&request, &CancellationToken::new());
    assert!(matches!(
        result,
        Err(TransferError::NothingToTransfer {
            reason: "no_matches",
            ..
        })
    ));
    assert!(!store.exists("new"));
    Ok(())
}

#[test]
fn missing_source_and_target_are_reported() -> Result<()> {
    let store = Arc::new(memory_share(&[("src/a.txt", "a")])?);
    let (service, _) = service(&store)?;

    let mut missing_source = request("absent", "dst", ConflictPolicy::Throw);
    missing_source.create_target_directories = true;
    assert!(matches!(
        service.copy_files(&missing_source, &CancellationToken::new()),
        Err(TransferError::NothingToTransfer {
            reason: "source_missing",
            ..
        })
    ));
    assert!(!store.exists("dst"));

    assert!(matches!(
        service.copy_files(&request("src", "dst", ConflictPolicy::Throw), &CancellationToken::new()),
        Err(TransferError::TargetMissing { .. })
    ));
    Ok(())
}

#[test]
fn single_file_source_ignores_the_pattern() -> Result<()> {
    let store = Arc::new(memory_share(&[("src/data.bin", "bytes")])?);
    store.add_dir("dst")?;
    let (service, _) = service(&store)?;

    let mut request = request("src/data.bin", "dst", ConflictPolicy::Throw);
    request.pattern = "*.txt".to_string();
    request.preserve_structure = true;

    let items = service.copy_files(&request, &CancellationToken::new())?;
    assert_eq!(pairs(&items), vec![("src/data.bin", "dst/data.bin")]);
    Ok(())
}

#[test]
fn cancellation_rolls_back_and_reports_cancelled() -> Result<()> {
    let store = Arc::new(memory_share(&[("src/a.txt", "a")])?);
    let (service, _) = service(&store)?;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut request = request("src", "fresh", ConflictPolicy::Throw);
    request.create_target_directories = true;

    let result = service.copy_files(&request, &cancel);
    let err = result.err();
    assert!(err.as_ref().is_some_and(TransferError::is_cancelled), "{err:?}");
    assert!(!store.exists("fresh"));
    assert_eq!(store.open_handles(), 0);
    Ok(())
}

#[test]
fn cancelling_mid_operation_restores_the_destination() -> Result<()> {
    let store = Arc::new(memory_share(&[
        ("src/a.txt", "a"),
        ("src/b.txt", "fresh b"),
        ("src/c.txt", "c"),
        ("dst/b.txt", "previous b"),
    ])?);
    let (service, metrics) = service(&store)?;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    store.on_call(FaultOp::Read, "src/b.txt", move || trigger.cancel())?;
    let before = store.snapshot();

    let result = service.move_files(&request("src", "dst", ConflictPolicy::Overwrite), &cancel);

    let err = result.err();
    assert!(err.as_ref().is_some_and(TransferError::is_cancelled), "{err:?}");
    assert_eq!(store.snapshot(), before);
    assert!(store.paths_with_name_prefix("temp-").is_empty());
    assert_eq!(store.open_handles(), 0);
    assert_eq!(metrics.snapshot().rollbacks_completed, 1);
    Ok(())
}

#[test]
fn recursive_source_inside_target_is_rejected_before_mutation() -> Result<()> {
    let store = Arc::new(memory_share(&[
        ("dst/sub/x.txt", "first"),
        ("dst/sub/sub/x.txt", "second"),
    ])?);
    let (service, _) = service(&store)?;
    let before = store.snapshot();

    let mut request = request("dst/sub", "dst", ConflictPolicy::Overwrite);
    request.recursive = true;
    request.preserve_structure = true;

    for result in [
        service.move_files(&request, &CancellationToken::new()),
        service.copy_files(&request, &CancellationToken::new()),
    ] {
        assert!(matches!(
            result,
            Err(TransferError::InvalidInput {
                field: "target_root",
                reason: "contains_source",
                ..
            })
        ));
    }
    assert_eq!(store.snapshot(), before);
    assert_eq!(store.mutation_count(), 0);
    Ok(())
}

#[test]
fn negotiated_limits_drive_chunking() -> Result<()> {
    let store = Arc::new(
        MemoryStore::new()
            .with_limits(TransferLimits {
                max_read: 3,
                max_write: 2,
            })
            .with_write_cap(1),
    );
    store.add_file("src/payload.bin", b"abcdefghij")?;
    store.add_dir("dst")?;
    let (service, metrics) = service(&store)?;

    service.copy_files(&request("src", "dst", ConflictPolicy::Throw), &CancellationToken::new())?;
    assert_eq!(store.read_file("dst/payload.bin"), Some(b"abcdefghij".to_vec()));
    assert_eq!(metrics.snapshot().bytes_total, 10);
    Ok(())
}

#[test]
fn invalid_requests_touch_nothing() -> Result<()> {
    let store = Arc::new(memory_share(&[("src/a.txt", "a")])?);
    let (service, metrics) = service(&store)?;

    let mut bad_pattern = request("src", "dst", ConflictPolicy::Throw);
    bad_pattern.pattern = "(".to_string();
    bad_pattern.pattern_mode = PatternMode::Regex;
    assert!(matches!(
        service.copy_files(&bad_pattern, &CancellationToken::new()),
        Err(TransferError::Pattern { .. })
    ));
    assert!(matches!(
        service.copy_files(&request("../src", "dst", ConflictPolicy::Throw), &CancellationToken::new()),
        Err(TransferError::InvalidInput { .. })
    ));
    assert_eq!(store.mutation_count(), 0);
    assert_eq!(metrics.step_count("validate", "failed"), 1);
    assert_eq!(metrics.step_count("compile_pattern", "failed"), 1);
    Ok(())
}

#[test]
fn local_share_end_to_end() -> Result<()> {
    let (temp, store) = local_share(&[
        ("incoming/a.txt", "alpha"),
        ("incoming/nested/b.txt", "beta"),
        ("incoming/skip.log", "log"),
    ])?;
    let service = TransferService::new(Arc::new(store), EngineConfig::default(), Metrics::new()?);

    let mut request = request("incoming", "archive/2025", ConflictPolicy::Throw);
    request.recursive = true;
    request.pattern = "*.TXT".to_string();
    request.preserve_structure = true;
    request.create_target_directories = true;

    let items = service.move_files(&request, &CancellationToken::new())?;
    assert_eq!(items.len(), 2);
    assert_eq!(fs::read_to_string(temp.path().join("archive/2025/a.txt"))?, "alpha");
    assert_eq!(fs::read_to_string(temp.path().join("archive/2025/nested/b.txt"))?, "beta");
    assert!(!temp.path().join("incoming/a.txt").exists());
    assert!(temp.path().join("incoming/skip.log").exists());
    Ok(())
}
