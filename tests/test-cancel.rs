use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::stream::StreamExt;
use tempfile::tempdir;
use tokio::time;
use webtail::{CancellationToken, Config, Multiplexer, Tail};

const TIMEOUT_2_SEC: Duration = Duration::from_millis(2000);

/// Number of this process' open file descriptors pointing below `dir`.
#[cfg(target_os = "linux")]
fn open_handles_under(dir: &Path) -> usize {
    std::fs::read_dir("/proc/self/fd")
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| std::fs::read_link(entry.path()).ok())
        .filter(|target| target.starts_with(dir))
        .count()
}

fn populated_dir(names: &[&str]) -> (tempfile::TempDir, PathBuf) {
    let logdir = tempdir().unwrap();
    let root = logdir.path().canonicalize().unwrap();
    for name in names {
        std::fs::write(root.join(name), format!("{} says hi\n", name)).unwrap();
    }
    (logdir, root)
}

#[tokio::test]
pub async fn test_cancel_merge_session() {
    let (_logdir, root) = populated_dir(&["a.log", "b.log", "c.log"]);

    let token = CancellationToken::new();
    let mux = Multiplexer::new(Config::new(&root));
    let mut merged = mux.merge_all_with_token(token.clone()).await.unwrap();
    let gauge = merged.gauge();

    for _ in 0..3 {
        time::timeout(TIMEOUT_2_SEC, merged.next())
            .await
            .unwrap()
            .unwrap();
    }
    assert_eq!(gauge.live(), 3);
    #[cfg(target_os = "linux")]
    assert_eq!(open_handles_under(&root), 3);

    token.cancel();
    assert!(merged.next().await.is_none());

    time::timeout(TIMEOUT_2_SEC, async {
        while gauge.live() > 0 {
            time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("tails kept polling after cancellation");

    #[cfg(target_os = "linux")]
    assert_eq!(open_handles_under(&root), 0);
}

#[tokio::test]
pub async fn test_shutdown_releases_files() {
    let (_logdir, root) = populated_dir(&["a.log", "b.log"]);

    let mux = Multiplexer::new(Config::new(&root));
    let mut merged = mux.merge_all().await.unwrap();
    let gauge = merged.gauge();
    time::timeout(TIMEOUT_2_SEC, merged.next())
        .await
        .unwrap()
        .unwrap();

    time::timeout(TIMEOUT_2_SEC, merged.shutdown())
        .await
        .expect("shutdown hung");

    assert_eq!(gauge.live(), 0);
    #[cfg(target_os = "linux")]
    assert_eq!(open_handles_under(&root), 0);
}

#[tokio::test]
pub async fn test_dropped_tail_session_releases_file() {
    let (_logdir, root) = populated_dir(&["solo.log"]);

    let tail = Tail::open(root.join("solo.log"), &Config::default())
        .await
        .unwrap();
    let token = tail.cancellation_token();
    let mut session = Box::pin(tail.into_session());

    let line = time::timeout(TIMEOUT_2_SEC, session.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(line, "solo.log says hi\n");

    drop(session);
    assert!(token.is_cancelled());
    #[cfg(target_os = "linux")]
    assert_eq!(open_handles_under(&root), 0);
}
