//! Command dispatch writes the expected text.

use poast::cli::{Command, WatchAction};
use poast::commands;
use poast::config::PoastConfig;
use poast::seed;
use poast_sync::identity::mint_unsigned_token;

fn config_as(name: Option<&str>, dir: &tempfile::TempDir) -> PoastConfig {
    PoastConfig {
        jwt: name.and_then(seed::user_id).map(mint_unsigned_token),
        token_file: dir.path().join("token"),
        ..PoastConfig::default()
    }
}

async fn run(command: Command, config: &PoastConfig) -> String {
    let mut out = Vec::new();
    commands::run(command, config, &mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn whoami_names_the_user() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(run(Command::Whoami, &config_as(Some("Dax"), &dir)).await, "Logged in as Dax\n");
    assert_eq!(run(Command::Whoami, &config_as(None, &dir)).await, "Not logged in\n");
}

#[tokio::test]
async fn empty_feed_shows_the_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(
        Command::Feed {
            from: None,
            contains: None,
        },
        &config_as(None, &dir),
    )
    .await;
    assert_eq!(out, "Showing all 0 messages\nNo posts found\n");
}

#[tokio::test]
async fn add_prints_the_new_feed() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(Command::Add { count: 2 }, &config_as(Some("Dax"), &dir)).await;
    let summary = out.lines().next().unwrap();
    assert!(summary.starts_with("Showing all "), "{out}");
    assert!(out.contains("Dax"));
}

#[tokio::test]
async fn anonymous_remove_prints_the_warning() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(
        Command::Remove {
            count: 1,
            force: false,
        },
        &config_as(None, &dir),
    )
    .await;
    assert!(out.starts_with(poast::actions::DELETE_WARNING));
}

#[tokio::test]
async fn watch_streams_growing_counts() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(
        Command::Watch {
            action: WatchAction::Add,
            ticks: 3,
            every_ms: 1,
            force: false,
        },
        &config_as(Some("Dax"), &dir),
    )
    .await;
    let lines: Vec<&str> = out.lines().collect();
    assert!(lines.len() >= 3, "{out}");
    assert_eq!(lines[0], "Showing all 0 messages");
}

#[tokio::test]
async fn logout_without_a_session_is_fine() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(run(Command::Logout, &config_as(None, &dir)).await, "Logged out\n");
}
