use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use futures_util::stream::StreamExt;
use tempfile::tempdir;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::time;
use webtail::{Config, Multiplexer, QueuePolicy};

const TIMEOUT_2_SEC: Duration = Duration::from_millis(2000);

async fn append_lines(path: &Path, prefix: &str, count: usize) {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .unwrap();
    for i in 0..count {
        file.write_all(format!("{}{}\n", prefix, i).as_bytes())
            .await
            .unwrap();
        file.sync_all().await.unwrap();
        time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test]
pub async fn test_interleaved_two_files() {
    let logdir = tempdir().unwrap();
    std::fs::write(logdir.path().join("a.log"), b"hi\n").unwrap();
    std::fs::write(logdir.path().join("b.log"), b"yo\n").unwrap();

    let mux = Multiplexer::new(Config::new(logdir.path()));
    let merged = mux.merge_all().await.unwrap();

    let mut lines: Vec<String> = time::timeout(
        TIMEOUT_2_SEC,
        merged.map(|line| line.to_string()).take(2).collect::<Vec<_>>(),
    )
    .await
    .unwrap();
    lines.sort();

    assert_eq!(lines, vec!["a.log: hi\n", "b.log: yo\n"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
pub async fn test_growing_files_exactly_once() {
    let logdir = tempdir().unwrap();
    let a = logdir.path().join("a.log");
    let b = logdir.path().join("b.log");
    std::fs::write(&a, b"").unwrap();
    std::fs::write(&b, b"").unwrap();

    let mux = Multiplexer::new(Config::new(logdir.path()));
    let mut merged = mux.merge_all().await.unwrap();

    let writers = tokio::spawn(async move {
        tokio::join!(append_lines(&a, "a", 100), append_lines(&b, "b", 100));
    });

    let mut per_file: HashMap<String, Vec<String>> = HashMap::new();
    for _ in 0..200 {
        let line = time::timeout(TIMEOUT_2_SEC, merged.next())
            .await
            .expect("timed out waiting for merged line")
            .unwrap();
        let (source, line) = line.into_inner();
        per_file.entry(source).or_default().push(line);
    }
    writers.await.unwrap();

    for (source, prefix) in [("a.log", "a"), ("b.log", "b")] {
        let expected: Vec<String> = (0..100).map(|i| format!("{}{}\n", prefix, i)).collect();
        assert_eq!(per_file[source], expected, "lines of {}", source);
    }

    assert!(time::timeout(Duration::from_millis(50), merged.next())
        .await
        .is_err());
    merged.shutdown().await;
}

#[tokio::test]
pub async fn test_blocking_queue_loses_nothing() {
    let logdir = tempdir().unwrap();
    let content: String = (0..300).map(|i| format!("{}\n", i)).collect();
    std::fs::write(logdir.path().join("big.log"), &content).unwrap();

    let config = Config::new(logdir.path()).queue(QueuePolicy::Block(4));
    let mut merged = Multiplexer::new(config).merge_all().await.unwrap();

    // Give the producer time to fill the queue and stall.
    time::sleep(Duration::from_millis(50)).await;
    assert!(merged.backlog() <= 4);

    for i in 0..300 {
        let line = time::timeout(TIMEOUT_2_SEC, merged.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line.line(), format!("{}\n", i));
    }
    assert_eq!(merged.dropped(), 0);
}

#[tokio::test]
pub async fn test_empty_directory() {
    let logdir = tempdir().unwrap();

    let mux = Multiplexer::new(Config::new(logdir.path()));
    let mut merged = mux.merge_all().await.unwrap();

    assert!(merged.sources().is_empty());
    assert_eq!(merged.live_producers(), 0);
    assert!(time::timeout(Duration::from_millis(50), merged.next())
        .await
        .is_err());
}
