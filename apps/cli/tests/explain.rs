use std::error::Error;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn cli() -> Result<Command, Box<dyn Error>> {
    Ok(Command::cargo_bin("rustnotepad-cli")?)
}

#[test]
fn missing_file_offers_retry() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    cli()?
        .args([
            "--workspace",
            workspace.path().to_str().unwrap(),
            "explain",
            "io:not-found",
            "--location",
            "/tmp/missing.txt",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "error: Could not find the file /tmp/missing.txt.",
        ))
        .stdout(predicate::str::contains(
            "Please check that you typed the location correctly and try again.",
        ))
        .stdout(predicate::str::contains("Actions: Retry, Cancel"));
    Ok(())
}

#[test]
fn detection_failure_requests_an_encoding() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    let output = cli()?
        .args([
            "--workspace",
            workspace.path().to_str().unwrap(),
            "explain",
            "document:encoding-auto-detection-failed",
            "--location",
            "/tmp/blob.bin",
            "--json",
        ])
        .output()?;
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["operation"], "load");
    assert_eq!(report["code"], "document:encoding-auto-detection-failed");
    assert_eq!(report["decision"]["requires_encoding_choice"], true);
    assert_eq!(report["decision"]["severity"], "error");
    assert_eq!(
        report["decision"]["actions"],
        serde_json::json!(["retry", "cancel"])
    );
    Ok(())
}

#[test]
fn saving_over_external_changes_asks_first() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    cli()?
        .args([
            "--workspace",
            workspace.path().to_str().unwrap(),
            "explain",
            "document:externally-modified",
            "--operation",
            "save",
            "--location",
            "/home/me/notes.txt",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "warning: The file /home/me/notes.txt has been modified since reading it.",
        ))
        .stdout(predicate::str::contains("Actions: Save Anyway, Don't Save"));
    Ok(())
}

#[test]
fn backup_wording_follows_preferences() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    let root = workspace.path().to_str().unwrap();

    cli()?
        .args([
            "--workspace",
            root,
            "explain",
            "document:cant-create-backup",
            "--operation",
            "save",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Could not create a temporary backup file while saving",
        ));

    cli()?
        .args(["--workspace", root, "preferences", "set", "--backup", "true"])
        .assert()
        .success();

    cli()?
        .args([
            "--workspace",
            root,
            "explain",
            "document:cant-create-backup",
            "--operation",
            "save",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Could not create a backup file while saving"));
    Ok(())
}

#[test]
fn unhandled_codes_fall_back_to_the_raw_message() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    cli()?
        .args([
            "--workspace",
            workspace.path().to_str().unwrap(),
            "explain",
            "io:would-merge",
            "--operation",
            "revert",
            "--location",
            "/tmp/a.txt",
            "--message",
            "merge <refused>",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Could not revert the file /tmp/a.txt."))
        .stdout(predicate::str::contains("Unexpected error: merge <refused>"))
        .stdout(predicate::str::contains("Actions: Cancel"));
    Ok(())
}

#[test]
fn plain_output_shows_unescaped_text() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    let root = workspace.path().to_str().unwrap();
    cli()?
        .args([
            "--workspace",
            root,
            "explain",
            "io:not-found",
            "--location",
            "/tmp/a&b \"q\".txt",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Could not find the file /tmp/a&b \"q\".txt.",
        ))
        .stdout(predicate::str::contains("&amp;").not());

    let output = cli()?
        .args([
            "--workspace",
            root,
            "explain",
            "io:not-found",
            "--location",
            "/tmp/a&b",
            "--json",
        ])
        .output()?;
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(
        report["decision"]["primary_message"],
        "Could not find the file /tmp/a&amp;b."
    );
    Ok(())
}

#[test]
fn unknown_codes_are_rejected() -> Result<(), Box<dyn Error>> {
    cli()?
        .args(["explain", "io:no-such-code"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown io error code"));
    Ok(())
}
