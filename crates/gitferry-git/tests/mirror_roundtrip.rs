//! End-to-end mirror transfer between two local repositories.
//!
//! Skipped silently when no `git` binary is on the path.

use std::path::Path;

use tokio::process::Command;

use gitferry_git::{GitCli, MirrorTransport, Workspace};
use gitferry_types::GitSettings;

async fn git(args: &[&str], cwd: &Path) {
    let out = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .unwrap();
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
}

#[tokio::test]
async fn mirror_clone_then_push_preserves_refs() {
    if !GitCli::available().await {
        return;
    }

    let source = tempfile::tempdir().unwrap();
    git(&["init", "."], source.path()).await;
    git(&["symbolic-ref", "HEAD", "refs/heads/main"], source.path()).await;
    git(&["config", "user.email", "ferry@example.com"], source.path()).await;
    git(&["config", "user.name", "ferry"], source.path()).await;
    std::fs::write(source.path().join("README.md"), "hello\n").unwrap();
    git(&["add", "."], source.path()).await;
    git(&["commit", "-m", "initial"], source.path()).await;
    git(&["tag", "v1.0.0"], source.path()).await;
    git(&["branch", "develop"], source.path()).await;

    let destination = tempfile::tempdir().unwrap();
    git(&["init", "--bare", "."], destination.path()).await;

    let settings = GitSettings {
        lfs_enabled: false,
        ..GitSettings::default()
    };
    let transport = GitCli::new(&settings);
    let workspace = Workspace::create(&settings).unwrap();

    let source_url = source.path().to_string_lossy().into_owned();
    let clone = transport
        .clone_mirror(&source_url, "", workspace.path())
        .await
        .unwrap();
    assert_eq!(clone.branches, 2);
    assert_eq!(clone.tags, 1);

    let dest_url = destination.path().to_string_lossy().into_owned();
    transport
        .push_mirror(workspace.path(), &dest_url, "")
        .await
        .unwrap();

    // The destination bare repo now carries both branches and the tag.
    let out = Command::new("git")
        .args(["for-each-ref", "--format=%(refname)"])
        .current_dir(destination.path())
        .output()
        .await
        .unwrap();
    let refs = String::from_utf8_lossy(&out.stdout);
    assert!(refs.contains("refs/heads/main"));
    assert!(refs.contains("refs/heads/develop"));
    assert!(refs.contains("refs/tags/v1.0.0"));
}

#[tokio::test]
async fn clone_failure_reports_stderr() {
    if !GitCli::available().await {
        return;
    }

    let settings = GitSettings {
        lfs_enabled: false,
        ..GitSettings::default()
    };
    let transport = GitCli::new(&settings);
    let workspace = Workspace::create(&settings).unwrap();

    let err = transport
        .clone_mirror("/nonexistent/repo.git", "", workspace.path())
        .await
        .unwrap_err();
    assert!(!err.detail().is_empty());
}
