use std::error::Error;
use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn cli() -> Result<Command, Box<dyn Error>> {
    Ok(Command::cargo_bin("rustnotepad-cli")?)
}

#[test]
fn show_prints_defaults_without_a_file() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    let output = cli()?
        .args([
            "--workspace",
            workspace.path().to_str().unwrap(),
            "preferences",
            "show",
        ])
        .output()?;
    assert!(output.status.success());

    let prefs: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(prefs["editor"]["create_backup_copy"], false);
    assert_eq!(prefs["print"]["wrap_mode"], "word");
    assert_eq!(prefs["print"]["font_body"], "Monospace 9");
    assert!(!workspace.path().join(".rustnotepad").exists());
    Ok(())
}

#[test]
fn set_updates_the_workspace_file() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    let root = workspace.path().to_str().unwrap();

    cli()?
        .args([
            "--workspace",
            root,
            "preferences",
            "set",
            "--line-numbers",
            "5",
            "--split-words",
            "true",
            "--tab-width",
            "4",
            "--body-font",
            "Courier 10",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated preferences at"));

    let path = workspace.path().join(".rustnotepad").join("preferences.json");
    let prefs: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(prefs["print"]["line_numbers"], 5);
    assert_eq!(prefs["print"]["wrap_mode"], "char");
    assert_eq!(prefs["print"]["font_body"], "Courier 10");
    assert_eq!(prefs["editor"]["tab_width"], 4);

    cli()?
        .args([
            "--workspace",
            root,
            "preferences",
            "set",
            "--no-line-numbers",
            "--wrap",
            "false",
            "--reset-fonts",
        ])
        .assert()
        .success();

    let prefs: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(prefs["print"]["line_numbers"], 0);
    assert_eq!(prefs["print"]["wrap_mode"], "none");
    assert_eq!(prefs["print"]["font_body"], "Monospace 9");
    Ok(())
}

#[test]
fn set_without_changes_fails() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    cli()?
        .args([
            "--workspace",
            workspace.path().to_str().unwrap(),
            "preferences",
            "set",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no preference changes were given"));
    Ok(())
}

#[test]
fn malformed_preferences_are_reported() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    let dir = workspace.path().join(".rustnotepad");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("preferences.json"), "{ not json")?;

    cli()?
        .args([
            "--workspace",
            workspace.path().to_str().unwrap(),
            "preferences",
            "show",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load preferences"));
    Ok(())
}
