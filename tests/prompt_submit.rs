mod common;

use common::{prompt_input, run_cli};
use std::fs;

#[test]
fn prompt_lands_in_yaml_without_database() {
    let project = tempfile::tempdir().unwrap();
    let project_dir = project.path().to_str().unwrap();

    let (code, stdout, stderr) = run_cli(
        &["save-prompt"],
        &prompt_input("Add a retry to the uploader", project.path()),
        &[("CLAUDE_PROJECT_DIR", project_dir)],
    );
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.is_empty());

    let contents = fs::read_to_string(project.path().join("user_prompts.yaml")).unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_str(&contents).unwrap();
    let entries = doc["user_prompts"].as_mapping().unwrap();
    let (key, entry) = entries.iter().next().unwrap();
    // "%Y-%m-%d %H:%M"
    assert_eq!(key.as_str().unwrap().len(), 16);
    assert_eq!(entry["user_prompt"].as_str(), Some("Add a retry to the uploader"));
    assert_eq!(entry["session_id"].as_str(), Some("test-session"));
}

#[test]
fn prompt_file_defaults_to_cwd() {
    let cwd = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(&["save-prompt"], &prompt_input("hello", cwd.path()), &[]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(cwd.path().join("user_prompts.yaml").exists());
}

#[test]
fn settings_file_renames_prompt_file() {
    let project = tempfile::tempdir().unwrap();
    let settings = project.path().join("hookrelay.toml");
    fs::write(&settings, "prompt_file = \"prompts.yaml\"\n").unwrap();

    let (code, _, stderr) = run_cli(
        &["save-prompt", "--config", settings.to_str().unwrap()],
        &prompt_input("hello", project.path()),
        &[("CLAUDE_PROJECT_DIR", project.path().to_str().unwrap())],
    );
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(project.path().join("prompts.yaml").exists());
    assert!(!project.path().join("user_prompts.yaml").exists());
}

#[test]
fn corrupt_fallback_file_is_kept_and_fails() {
    let project = tempfile::tempdir().unwrap();
    let path = project.path().join("user_prompts.yaml");
    fs::write(&path, "user_prompts: [unclosed").unwrap();

    let (code, _, stderr) = run_cli(
        &["save-prompt"],
        &prompt_input("hello", project.path()),
        &[("CLAUDE_PROJECT_DIR", project.path().to_str().unwrap())],
    );
    assert_eq!(code, 1);
    assert!(stderr.starts_with("hookrelay: "), "stderr: {stderr}");
    assert_eq!(fs::read_to_string(&path).unwrap(), "user_prompts: [unclosed");
}
