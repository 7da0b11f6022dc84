use std::time::Duration;

use tempfile::tempdir;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::time;
use webtail::{Config, Tail};

const TIMEOUT_2_SEC: Duration = Duration::from_millis(2000);

#[tokio::test]
pub async fn test_newline() {
    let expected_line = "foo bar\n".to_string();

    let logdir = tempdir().unwrap();
    let logfile = logdir.path().join("foo.log");
    tokio::fs::write(&logfile, b"").await.unwrap();

    let mut tail = Tail::open(&logfile, &Config::default()).await.unwrap();

    // Writes the line in pieces, pausing long enough for the tail to poll
    // the unterminated part several times.
    let writer = {
        let logfile = logfile.clone();
        tokio::spawn(async move {
            let mut file = OpenOptions::new()
                .append(true)
                .open(&logfile)
                .await
                .unwrap();
            for chunk in [&b"foo"[..], b" ", b"bar", b"\n"] {
                file.write_all(chunk).await.unwrap();
                file.sync_all().await.unwrap();
                time::sleep(Duration::from_millis(30)).await;
            }
        })
    };

    let (line_val, status) = tokio::try_join!(
        time::timeout(TIMEOUT_2_SEC, tail.next_line()),
        time::timeout(TIMEOUT_2_SEC, writer),
    )
    .unwrap();

    status.unwrap();
    assert_eq!(Some(expected_line), line_val.unwrap());
    assert_eq!(tail.offset(), 8);

    // Exactly one line came out of it.
    assert!(time::timeout(Duration::from_millis(100), tail.next_line())
        .await
        .is_err());
}

#[tokio::test]
pub async fn test_lines_in_append_order() {
    let logdir = tempdir().unwrap();
    let logfile = logdir.path().join("ordered.log");
    tokio::fs::write(&logfile, b"0\n").await.unwrap();

    let mut tail = Tail::open(&logfile, &Config::default()).await.unwrap();

    let writer = {
        let logfile = logfile.clone();
        tokio::spawn(async move {
            let mut file = OpenOptions::new()
                .append(true)
                .open(&logfile)
                .await
                .unwrap();
            for i in 1..200 {
                file.write_all(format!("{}\n", i).as_bytes()).await.unwrap();
                if i % 17 == 0 {
                    file.sync_all().await.unwrap();
                    time::sleep(Duration::from_millis(2)).await;
                }
            }
            file.sync_all().await.unwrap();
        })
    };

    let mut seen = Vec::new();
    while seen.len() < 200 {
        let line = time::timeout(TIMEOUT_2_SEC, tail.next_line())
            .await
            .expect("timed out waiting for line")
            .unwrap()
            .unwrap();
        seen.push(line);
    }
    writer.await.unwrap();

    let expected: Vec<String> = (0..200).map(|i| format!("{}\n", i)).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
pub async fn test_missing_file_yields_nothing() {
    let logdir = tempdir().unwrap();

    let res = Tail::open(logdir.path().join("nonexistent.log"), &Config::default()).await;
    match res {
        Err(err) => assert!(err.is_open_failure()),
        Ok(_) => panic!("opening a missing file should fail"),
    }
}
