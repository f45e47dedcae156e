#[cfg(test)]
mod tests {
    use crate::utils::{
        assert_accounted, bad_records, config, file_source, job_spec, key, people_lines,
        read_json_lines, read_lines, run_on_memory, run_with_hooks, synthetic_source, write_input,
    };
    use connectors::backend::{memory::MemoryBackend, sled_store::SledBackend};
    use engine_config::{
        report::summary::JobStatus,
        settings::spec::{BackendSpec, BadRecordFormat, JobSpec},
    };
    use engine_processing::hooks::RequiredFields;
    use engine_runtime::execution::{factory, job};
    use model::{core::value::Value, execution::errors::BackendError};
    use std::{sync::Arc, time::Duration};
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    // Scenario: a header file loaded into a sled store through the public entry point.
    // Expected Outcome: every data row is readable from the store afterwards under its key.
    #[traced_test]
    #[tokio::test]
    async fn test_file_to_sled_store() {
        let dir = tempdir().unwrap();
        let mut lines = vec!["ID,Name,Score".to_string()];
        lines.extend(people_lines(120));
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = write_input(dir.path(), "people.csv", &refs);
        let store = dir.path().join("store");

        let spec = JobSpec {
            config: config("people").header(true).build().unwrap(),
            source: file_source(&input, ","),
            backend: BackendSpec::Sled { path: store.clone() },
            bad_records: None,
        };

        let report = job::run(spec, CancellationToken::new()).await.unwrap();
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.rows_processed, 121);
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(report.rows_loaded, 120);
        assert_accounted(&report);

        let sled = SledBackend::open(&store).unwrap();
        assert_eq!(sled.len(), 120);
        let row = sled.get(&key(42)).unwrap().unwrap();
        assert_eq!(row.get_value("name"), Value::String("person 42".to_string()));
        assert_eq!(row.get_value("score"), Value::Int(126));
    }

    // Scenario: the input repeats a key and insert mode rejects duplicates.
    // Expected Outcome: the duplicate is the only failure and lands in the JSON bad record file.
    #[traced_test]
    #[tokio::test]
    async fn test_duplicate_keys_go_to_json_bad_records() {
        let dir = tempdir().unwrap();
        let input = write_input(dir.path(), "dup.csv", &["1,ann", "2,bob", "1,carl", "3,dee"]);
        let bad_path = dir.path().join("bad/dup.jsonl");
        let backend = MemoryBackend::new();

        let spec = job_spec(
            config("dups").build().unwrap(),
            file_source(&input, ","),
            bad_records(&bad_path, BadRecordFormat::Json),
        );
        let report = run_on_memory(&spec, &backend).await;

        assert_eq!(report.status, JobStatus::CompletedWithErrors);
        assert_eq!(report.rows_loaded, 3);
        assert_eq!(report.rows_error, 1);
        assert_accounted(&report);
        assert_eq!(
            backend.get(&key(1)).unwrap().get_value("col_2"),
            Value::String("ann".to_string())
        );

        let failed = read_json_lines(&bad_path);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["job_name"], "dups");
        assert_eq!(failed[0]["record_id"], 2);
        assert_eq!(failed[0]["source_line"], "1,carl");
    }

    // Scenario: replace mode with the same duplicate input.
    // Expected Outcome: the later row overwrites the earlier one and nothing fails.
    #[traced_test]
    #[tokio::test]
    async fn test_replace_mode_overwrites() {
        let dir = tempdir().unwrap();
        let input = write_input(dir.path(), "dup.csv", &["1,ann", "2,bob", "1,carl"]);
        let backend = MemoryBackend::new();

        let spec = job_spec(
            config("replace").replace_mode(true).build().unwrap(),
            file_source(&input, ","),
            None,
        );
        let report = run_on_memory(&spec, &backend).await;

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.rows_loaded, 3);
        assert_eq!(backend.len(), 2);
        assert_eq!(
            backend.get(&key(1)).unwrap().get_value("col_2"),
            Value::String("carl".to_string())
        );
    }

    // Scenario: rows with the wrong number of cells, written in raw format.
    // Expected Outcome: the raw file holds the original lines so it can be loaded again.
    #[traced_test]
    #[tokio::test]
    async fn test_unshapeable_rows_written_raw() {
        let dir = tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "people.tsv",
            &["id\tname", "1\tann", "2", "3\tcarl", "4\tdee\textra"],
        );
        let bad_path = dir.path().join("people.bad");
        let backend = MemoryBackend::new();

        let spec = job_spec(
            config("raw").header(true).build().unwrap(),
            file_source(&input, "tab"),
            bad_records(&bad_path, BadRecordFormat::Raw),
        );
        let report = run_on_memory(&spec, &backend).await;

        assert_eq!(report.status, JobStatus::CompletedWithErrors);
        assert_eq!(report.rows_loaded, 2);
        assert_eq!(report.rows_error, 2);
        assert_accounted(&report);
        assert_eq!(read_lines(&bad_path), vec!["2", "4\tdee\textra"]);
        assert_eq!(backend.keys(), vec![key(1), key(3)]);
    }

    // Scenario: skip the first rows, then stop at a row limit.
    // Expected Outcome: only rows between the two bounds are loaded and the source stops early.
    #[traced_test]
    #[tokio::test]
    async fn test_skip_rows_and_max_rows() {
        let dir = tempdir().unwrap();
        let lines = people_lines(50);
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = write_input(dir.path(), "people.csv", &refs);
        let backend = MemoryBackend::new();

        let spec = job_spec(
            config("window").skip_rows(5).max_rows(Some(20)).build().unwrap(),
            file_source(&input, ","),
            None,
        );
        let report = run_on_memory(&spec, &backend).await;

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.rows_processed, 20);
        assert_eq!(report.rows_skipped, 5);
        assert_eq!(report.rows_loaded, 15);
        assert!(backend.get(&key(5)).is_none());
        assert!(backend.get(&key(6)).is_some());
        assert!(backend.get(&key(20)).is_some());
        assert!(backend.get(&key(21)).is_none());
        assert!(logs_contain("Row limit reached"));
    }

    // Scenario: two workers share one file round-robin.
    // Expected Outcome: together they load every row exactly once.
    #[traced_test]
    #[tokio::test]
    async fn test_workers_partition_the_input() {
        let dir = tempdir().unwrap();
        let lines = people_lines(31);
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = write_input(dir.path(), "people.csv", &refs);
        let backend = MemoryBackend::new();

        let mut loaded = 0;
        for worker_id in 0..2 {
            let spec = job_spec(
                config("split").worker(worker_id, 2).build().unwrap(),
                file_source(&input, ","),
                None,
            );
            let report = run_on_memory(&spec, &backend).await;
            assert_eq!(report.status, JobStatus::Completed);
            assert_eq!(report.rows_error, 0);
            loaded += report.rows_loaded;
        }

        assert_eq!(loaded, 31);
        assert_eq!(backend.len(), 31);
    }

    // Scenario: the key comes from a named header column.
    // Expected Outcome: storage keys use that column's values.
    #[traced_test]
    #[tokio::test]
    async fn test_key_column_from_header() {
        let dir = tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "people.csv",
            &["id|Email|name", "1|ann@example.com|ann", "2|bob@example.com|bob"],
        );
        let backend = MemoryBackend::new();

        let spec = job_spec(
            config("emails")
                .header(true)
                .key_column(Some("email".to_string()))
                .build()
                .unwrap(),
            file_source(&input, "|"),
            None,
        );
        let report = run_on_memory(&spec, &backend).await;

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(
            backend.keys(),
            vec![key("ann@example.com"), key("bob@example.com")]
        );
    }

    // Scenario: the configured key column is missing from the header.
    // Expected Outcome: the job aborts before loading anything.
    #[traced_test]
    #[tokio::test]
    async fn test_unknown_key_column_aborts() {
        let dir = tempdir().unwrap();
        let input = write_input(dir.path(), "people.csv", &["id,name", "1,ann"]);
        let backend = MemoryBackend::new();

        let spec = job_spec(
            config("nokey")
                .header(true)
                .key_column(Some("sku".to_string()))
                .build()
                .unwrap(),
            file_source(&input, ","),
            None,
        );
        let report = run_on_memory(&spec, &backend).await;

        assert_eq!(report.status, JobStatus::Aborted);
        assert!(report.abort_reason.unwrap().contains("header"));
        assert!(backend.is_empty());
    }

    // Scenario: a hook vetoes rows with a missing email.
    // Expected Outcome: vetoed rows count as skipped and are never stored.
    #[traced_test]
    #[tokio::test]
    async fn test_hooks_veto_rows() {
        let dir = tempdir().unwrap();
        let input = write_input(
            dir.path(),
            "people.csv",
            &["id,email", "1,ann@example.com", "2,", "3,carl@example.com"],
        );
        let backend = MemoryBackend::new();

        let spec = job_spec(
            config("veto").header(true).build().unwrap(),
            file_source(&input, ","),
            None,
        );
        let hooks = RequiredFields::new(vec!["email".to_string()]);
        let report = run_with_hooks(&spec, &backend, Box::new(hooks)).await;

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.rows_skipped, 2);
        assert_eq!(report.rows_loaded, 2);
        assert!(backend.get(&key(2)).is_none());
        assert!(logs_contain("Rows vetoed for missing fields"));
    }

    // Scenario: atomic load where one row is rejected.
    // Expected Outcome: the transaction rolls back and the store stays empty.
    #[traced_test]
    #[tokio::test]
    async fn test_atomic_load_is_all_or_nothing() {
        let dir = tempdir().unwrap();
        let lines = people_lines(40);
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = write_input(dir.path(), "people.csv", &refs);
        let backend = MemoryBackend::new();
        backend.fail_key(&key(17), BackendError::Rejected("constraint".into()), 1);

        let spec = job_spec(
            config("atomic").in_one_transaction(true).build().unwrap(),
            file_source(&input, ","),
            None,
        );
        let report = run_on_memory(&spec, &backend).await;

        assert_eq!(report.status, JobStatus::Aborted);
        assert_eq!(report.rows_loaded, 0);
        assert!(report.abort_reason.is_some());
        assert!(backend.is_empty());
    }

    // Scenario: atomic load of a header file with one malformed row in the middle.
    // Expected Outcome: the job aborts, the row is a bad record and nothing is committed.
    #[traced_test]
    #[tokio::test]
    async fn test_atomic_malformed_row_commits_nothing() {
        let dir = tempdir().unwrap();
        let mut lines = vec!["ID,Name,Score".to_string()];
        lines.extend(people_lines(40));
        lines[20] = "20,person 20,60,extra".to_string();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = write_input(dir.path(), "people.csv", &refs);
        let bad = dir.path().join("bad.jsonl");
        let backend = MemoryBackend::new();

        let spec = job_spec(
            config("atomic-malformed")
                .header(true)
                .in_one_transaction(true)
                .build()
                .unwrap(),
            file_source(&input, ","),
            bad_records(&bad, BadRecordFormat::Json),
        );
        let report = run_on_memory(&spec, &backend).await;

        assert_eq!(report.status, JobStatus::Aborted);
        assert_eq!(report.rows_loaded, 0);
        assert!(report.abort_reason.unwrap().contains("could not be shaped"));
        assert!(backend.is_empty());
        assert_eq!(read_json_lines(&bad).len(), 1);
    }

    // Scenario: a plain job run end to end.
    // Expected Outcome: the job start is logged once.
    #[traced_test]
    #[tokio::test]
    async fn test_job_start_logged_once() {
        let dir = tempdir().unwrap();
        let lines = people_lines(5);
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = write_input(dir.path(), "people.csv", &refs);

        let spec = job_spec(config("once").build().unwrap(), file_source(&input, ","), None);
        let report = run_on_memory(&spec, &MemoryBackend::new()).await;

        assert_eq!(report.status, JobStatus::Completed);
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains("Starting load")).count() {
                1 => Ok(()),
                n => Err(format!("job start logged {n} times")),
            }
        });
    }

    // Scenario: atomic load where the commit itself fails.
    // Expected Outcome: nothing is stored and the job aborts.
    #[traced_test]
    #[tokio::test]
    async fn test_atomic_commit_failure() {
        let dir = tempdir().unwrap();
        let lines = people_lines(10);
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = write_input(dir.path(), "people.csv", &refs);
        let backend = MemoryBackend::new();
        backend.fail_commit(BackendError::Storage("disk full".into()));

        let spec = job_spec(
            config("atomic-commit").in_one_transaction(true).build().unwrap(),
            file_source(&input, ","),
            None,
        );
        let report = run_on_memory(&spec, &backend).await;

        assert_eq!(report.status, JobStatus::Aborted);
        assert_eq!(report.rows_loaded, 0);
        assert!(backend.is_empty());
    }

    // Scenario: a clean atomic load.
    // Expected Outcome: every row becomes visible at commit.
    #[traced_test]
    #[tokio::test]
    async fn test_atomic_load_commits() {
        let dir = tempdir().unwrap();
        let lines = people_lines(300);
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = write_input(dir.path(), "people.csv", &refs);
        let backend = MemoryBackend::new();

        let spec = job_spec(
            config("atomic-ok").in_one_transaction(true).build().unwrap(),
            file_source(&input, ","),
            None,
        );
        let report = run_on_memory(&spec, &backend).await;

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.rows_loaded, 300);
        assert_eq!(backend.len(), 300);
    }

    // Scenario: an atomic job over an endless source.
    // Expected Outcome: the job is refused before it starts.
    #[tokio::test]
    async fn test_atomic_endless_source_refused() {
        let spec = job_spec(
            config("atomic-endless").in_one_transaction(true).build().unwrap(),
            synthetic_source("seq"),
            None,
        );
        let built = factory::build_job(
            &spec,
            Arc::new(MemoryBackend::new()),
            Box::new(engine_processing::hooks::NoopHooks),
            CancellationToken::new(),
        )
        .await;
        assert!(built.is_err());
    }

    // Scenario: a slow destination with a small lead window.
    // Expected Outcome: the source pauses and resumes, and every row still loads.
    #[traced_test]
    #[tokio::test]
    async fn test_backpressure_against_slow_backend() {
        let backend = MemoryBackend::new().with_latency(Duration::from_millis(2));
        let spec = job_spec(
            config("slow").lead(10, 20).max_rows(Some(400)).build().unwrap(),
            synthetic_source("seq"),
            None,
        );
        let report = run_on_memory(&spec, &backend).await;

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.rows_loaded, 400);
        assert_eq!(backend.len(), 400);
        assert!(logs_contain("Pausing source"));
        assert!(logs_contain("Resuming source"));
    }

    // Scenario: the destination runs out of capacity mid-load.
    // Expected Outcome: the job aborts and drains, and the store holds fewer rows than the input.
    #[traced_test]
    #[tokio::test]
    async fn test_capacity_exhaustion_aborts() {
        let dir = tempdir().unwrap();
        let lines = people_lines(5_000);
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = write_input(dir.path(), "people.csv", &refs);
        let backend = MemoryBackend::new();
        backend.fail_key(&key(100), BackendError::CapacityExhausted("disk".into()), 1);

        let spec = job_spec(
            config("full").build().unwrap(),
            file_source(&input, ","),
            None,
        );
        let report = run_on_memory(&spec, &backend).await;

        assert_eq!(report.status, JobStatus::Aborted);
        assert!(report.abort_reason.is_some());
        assert!(backend.get(&key(100)).is_none());
        assert!((backend.len() as u64) < 5_000);
        assert!(report.rows_loaded <= backend.len() as u64);
    }

    // Scenario: transient failures below and above the retry budget.
    // Expected Outcome: the first row eventually loads, the second fails after its retries.
    #[traced_test]
    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let dir = tempdir().unwrap();
        let lines = people_lines(20);
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = write_input(dir.path(), "people.csv", &refs);
        let bad_path = dir.path().join("retries.jsonl");
        let backend = MemoryBackend::new();
        backend.fail_key(&key(4), BackendError::Transient("lock".into()), 2);
        backend.fail_key(&key(9), BackendError::Transient("lock".into()), 10);

        let spec = job_spec(
            config("retries").max_retries(3).build().unwrap(),
            file_source(&input, ","),
            bad_records(&bad_path, BadRecordFormat::Json),
        );
        let report = run_on_memory(&spec, &backend).await;

        assert_eq!(report.status, JobStatus::CompletedWithErrors);
        assert_eq!(report.rows_loaded, 19);
        assert_eq!(report.rows_error, 1);
        assert!(backend.get(&key(4)).is_some());
        assert!(backend.get(&key(9)).is_none());

        let failed = read_json_lines(&bad_path);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["source_line"], "9,person 9,27");
    }

    // Scenario: an endless load interrupted by cancellation.
    // Expected Outcome: in-flight rows drain and the report matches the store.
    #[traced_test]
    #[tokio::test]
    async fn test_cancellation_drains_and_reports() {
        let backend = MemoryBackend::new().with_latency(Duration::from_millis(1));
        let cancel = CancellationToken::new();
        let spec = job_spec(config("endless").build().unwrap(), synthetic_source("seq"), None);

        let runner = factory::build_job(
            &spec,
            Arc::new(backend.clone()),
            Box::new(engine_processing::hooks::NoopHooks),
            cancel.clone(),
        )
        .await
        .unwrap();
        let handle = tokio::spawn(runner.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.status, JobStatus::Cancelled);
        assert!(report.rows_loaded > 0);
        assert_eq!(report.rows_loaded, backend.len() as u64);
        assert_accounted(&report);
        assert!(logs_contain("Cancellation requested"));
    }

    // Scenario: an input file with no rows at all.
    // Expected Outcome: the job completes with zero counts.
    #[traced_test]
    #[tokio::test]
    async fn test_empty_file_completes() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("empty.csv");
        std::fs::write(&input, "").unwrap();

        let spec = job_spec(config("empty").build().unwrap(), file_source(&input, ","), None);
        let report = run_on_memory(&spec, &MemoryBackend::new()).await;

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.rows_processed, 0);
        assert_eq!(report.job_name, "empty");
        assert!(!report.run_id.is_empty());
    }
}
