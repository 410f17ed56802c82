//! Repository loading against a scripted repository host.

mod common;

use std::time::Duration;

use codemate_ingest::config::GithubConfig;
use codemate_ingest::github::{FileBody, ListingError};
use codemate_ingest::loader::RepositoryLoader;
use tokio::time::Instant;

use common::{blob, repo, subtree, FakeHost};

fn paths(docs: &[codemate_ingest::models::SourceDocument]) -> Vec<String> {
    let mut paths: Vec<String> = docs.iter().map(|d| d.path.clone()).collect();
    paths.sort();
    paths
}

#[tokio::test]
async fn loads_text_files_and_skips_ignored_names() {
    let host = FakeHost::new()
        .with_tree(
            vec![
                blob("README.md"),
                subtree("src"),
                blob("src/index.ts"),
                blob("package-lock.json"),
                blob("web/yarn.lock"),
            ],
            false,
        )
        .with_text("README.md", "# widgets")
        .with_text("src/index.ts", "export {}")
        .with_text("package-lock.json", "{}")
        .with_text("web/yarn.lock", "");
    let loader = RepositoryLoader::new(&host, &GithubConfig::default()).unwrap();

    let docs = loader.load_repository(&repo()).await.unwrap();

    assert_eq!(paths(&docs), vec!["README.md", "src/index.ts"]);
    let readme = docs.iter().find(|d| d.path == "README.md").unwrap();
    assert_eq!(readme.content, "# widgets");
    assert_eq!(readme.repository, "acme/widgets");
    assert_eq!(host.count_calls("fetch package-lock.json"), 0);
    assert_eq!(host.count_calls("fetch web/yarn.lock"), 0);
    assert!(!host.calls().contains(&"fetch src".to_string()));
}

#[tokio::test]
async fn configured_ignore_list_replaces_the_default() {
    let host = FakeHost::new()
        .with_tree(vec![blob("a.ts"), blob("dist/a.js")], false)
        .with_text("a.ts", "a")
        .with_text("dist/a.js", "a");
    let config = GithubConfig {
        ignore_files: vec!["dist/**".into()],
        ..GithubConfig::default()
    };
    let loader = RepositoryLoader::new(&host, &config).unwrap();

    assert!(loader.is_ignored("dist/a.js"));
    let docs = loader.load_repository(&repo()).await.unwrap();
    assert_eq!(paths(&docs), vec!["a.ts"]);
}

#[tokio::test]
async fn undecodable_files_are_skipped() {
    let host = FakeHost::new()
        .with_tree(vec![blob("logo.png"), blob("huge.sql"), blob("main.go")], false)
        .with_body("logo.png", FileBody::Bytes(vec![0x89, 0x50, 0xff, 0xfe]))
        .with_body(
            "huge.sql",
            FileBody::Unavailable("file too large for inline content".into()),
        )
        .with_text("main.go", "package main");
    let loader = RepositoryLoader::new(&host, &GithubConfig::default()).unwrap();

    let docs = loader.load_repository(&repo()).await.unwrap();

    assert_eq!(paths(&docs), vec!["main.go"]);
}

#[tokio::test]
async fn truncated_tree_still_loads() {
    let host = FakeHost::new()
        .with_tree(vec![blob("a.ts")], true)
        .with_text("a.ts", "a");
    let loader = RepositoryLoader::new(&host, &GithubConfig::default()).unwrap();

    let docs = loader.load_repository(&repo()).await.unwrap();

    assert_eq!(docs.len(), 1);
}

#[tokio::test]
async fn empty_repository_loads_nothing() {
    let host = FakeHost::new();
    let loader = RepositoryLoader::new(&host, &GithubConfig::default()).unwrap();

    let docs = loader.load_repository(&repo()).await.unwrap();

    assert!(docs.is_empty());
    assert_eq!(host.calls(), vec!["tree main"]);
}

#[tokio::test(start_paused = true)]
async fn rejected_fetch_is_retried() {
    let host = FakeHost::new()
        .with_tree(vec![blob("a.ts")], false)
        .with_text("a.ts", "a")
        .with_quota_failures("fetch a.ts", 2);
    let loader = RepositoryLoader::new(&host, &GithubConfig::default()).unwrap();
    let start = Instant::now();

    let docs = loader.load_repository(&repo()).await.unwrap();

    assert_eq!(docs.len(), 1);
    assert_eq!(host.count_calls("fetch a.ts"), 3);
    assert!(start.elapsed() >= Duration::from_secs(60));
}

#[tokio::test]
async fn failed_fetch_fails_the_load() {
    let host = FakeHost::new()
        .with_tree(vec![blob("a.ts"), blob("b.ts")], false)
        .with_text("a.ts", "a")
        .with_fatal("fetch b.ts");
    let loader = RepositoryLoader::new(&host, &GithubConfig::default()).unwrap();

    let err = loader.load_repository(&repo()).await.unwrap_err();

    assert!(matches!(err, ListingError::Status { .. }));
}

#[tokio::test]
async fn loads_the_configured_branch() {
    let host = FakeHost::new();
    let config = GithubConfig {
        branch: "develop".into(),
        ..GithubConfig::default()
    };
    let loader = RepositoryLoader::new(&host, &config).unwrap();

    loader.load_repository(&repo()).await.unwrap();

    assert_eq!(host.calls(), vec!["tree develop"]);
}

#[test]
fn invalid_ignore_pattern_is_rejected() {
    let host = FakeHost::new();
    let config = GithubConfig {
        ignore_files: vec!["[".into()],
        ..GithubConfig::default()
    };
    assert!(RepositoryLoader::new(&host, &config).is_err());
}
