use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

const BIN: &str = env!("CARGO_BIN_EXE_typemap");

const SPEC: &str = "\
# Perforce File Type Mapping Specifications.

TypeMap:
\ttext //....txt
\tbinary+F //....zip ## archives
\tbinary //special/....txt
";

const TEMPLATE: &str = "\
# Name: Archives
TypeMap:
\tbinary+F //....zip
\tbinary+l //....psd
";

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("failed to write fixture");
    path
}

/// Runs the binary in `dir` so a stray `.typemap.yml` elsewhere is never picked up.
fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(BIN)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run typemap")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ---------------------------------------------------------------------------
// parse
// ---------------------------------------------------------------------------

#[test]
fn parse_prints_rules_as_json() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "typemap.txt", SPEC);

    let output = run(dir.path(), &["parse", input.to_str().unwrap(), "--format", "json"]);
    assert!(output.status.success());

    let rules: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rules = rules.as_array().unwrap();
    assert_eq!(rules.len(), 3);
    assert_eq!(rules[1]["filetype"], "binary+F");
    assert_eq!(rules[1]["comment"], "archives");
    assert_eq!(rules[2]["order"], 3);
}

#[test]
fn parse_reads_indexed_record_from_stdin() {
    let dir = TempDir::new().unwrap();
    let record = r###"{"TypeMap1": "binary //....bin", "TypeMap0": "text //....txt", "TypeMapComment1": "## blobs"}"###;

    let mut child = Command::new(BIN)
        .current_dir(dir.path())
        .args(["parse", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to run typemap");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(record.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["   1  text //....txt", "   2  binary //....bin ## blobs"]);
}

#[test]
fn parse_uses_format_from_config() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "typemap.txt", SPEC);
    write(&dir, ".typemap.yml", "output:\n  format: yaml\n");

    let output = run(dir.path(), &["parse", input.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("filetype: binary+F"));
}

#[test]
fn verbose_logs_go_to_stderr_without_colour() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "typemap.txt", SPEC);

    let output = run(dir.path(), &["parse", "-vv", input.to_str().unwrap()]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Loaded typemap"));
    assert!(!stderr.contains('\x1b'));
    assert!(!stdout(&output).contains("Loaded typemap"));
}

#[test]
fn missing_input_fails() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["parse", "does-not-exist.txt"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("error: Failed to read"));
}

#[test]
fn invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "typemap.txt", SPEC);
    let config = write(&dir, "bad.yml", "output:\n  format: xml\n");

    let output = run(
        dir.path(),
        &["parse", input.to_str().unwrap(), "--config", config.to_str().unwrap()],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid config"));
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_reports_overridden_rule() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "typemap.txt", SPEC);

    let output = run(dir.path(), &["check", input.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("rule 1 (text //....txt) overridden by rule 3 (binary)"));
}

#[test]
fn check_json_lists_conflicts() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "typemap.txt", SPEC);

    let output = run(dir.path(), &["check", input.to_str().unwrap(), "--format", "json"]);
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["rules"], 3);
    assert_eq!(report["conflicts"][0]["order"], 1);
    assert_eq!(report["conflicts"][0]["conflicts"][0]["kind"], "overridden");
    assert_eq!(report["conflicts"][0]["conflicts"][0]["by_order"], 3);
}

#[test]
fn check_strict_fails_on_advisory_findings() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "typemap.txt", "ctext //depot/readme\n");

    let relaxed = run(dir.path(), &["check", input.to_str().unwrap()]);
    assert!(relaxed.status.success());
    assert!(stdout(&relaxed).contains("warning: rule 1 (#1) has an unknown base filetype: ctext"));

    let strict = run(dir.path(), &["check", "--strict", input.to_str().unwrap()]);
    assert!(!strict.status.success());
}

// ---------------------------------------------------------------------------
// test-path
// ---------------------------------------------------------------------------

#[test]
fn test_path_resolves_highest_order_rule() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "typemap.txt", SPEC);

    let output = run(
        dir.path(),
        &[
            "test-path",
            input.to_str().unwrap(),
            "//depot/readme.txt",
            "//special/notes.txt",
            "//depot/logo.png",
        ],
    );
    assert!(output.status.success());
    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "//depot/readme.txt\ttext\t(rule 1: //....txt)",
            "//special/notes.txt\tbinary\t(rule 3: //special/....txt)",
            "//depot/logo.png\t(no match)",
        ]
    );
}

#[test]
fn test_path_honours_ignore_case() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "typemap.txt", SPEC);

    let sensitive = run(dir.path(), &["test-path", input.to_str().unwrap(), "//depot/A.ZIP"]);
    assert!(stdout(&sensitive).contains("(no match)"));

    let insensitive = run(
        dir.path(),
        &["test-path", "--ignore-case", input.to_str().unwrap(), "//depot/A.ZIP"],
    );
    assert!(stdout(&insensitive).contains("binary+F"));
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

#[test]
fn merge_writes_spec_and_reports_counts() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "typemap.txt", SPEC);
    let template = write(&dir, "template.txt", TEMPLATE);
    let merged = dir.path().join("merged.txt");

    let output = run(
        dir.path(),
        &[
            "merge",
            input.to_str().unwrap(),
            "--template",
            template.to_str().unwrap(),
            "--output",
            merged.to_str().unwrap(),
        ],
    );
    assert!(output.status.success());
    assert!(stdout(&output).contains("1 added, 1 skipped, 0 conflicting"));

    let spec = fs::read_to_string(&merged).unwrap();
    assert!(spec.contains("TypeMap:\n"));
    assert!(spec.ends_with("\tbinary+l //....psd\n"));

    // Merging the result again changes nothing.
    let again = run(
        dir.path(),
        &[
            "merge",
            merged.to_str().unwrap(),
            "--template",
            template.to_str().unwrap(),
            "--format",
            "json",
        ],
    );
    let report: serde_json::Value = serde_json::from_slice(&again.stdout).unwrap();
    let outcomes: Vec<&str> = report["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["outcome"].as_str().unwrap())
        .collect();
    assert_eq!(outcomes, vec!["skipped", "skipped"]);
}

#[test]
fn merge_rejects_template_without_section() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "typemap.txt", SPEC);
    let template = write(&dir, "template.txt", "# Name: nothing here\n");

    let output = run(
        dir.path(),
        &["merge", input.to_str().unwrap(), "--template", template.to_str().unwrap()],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no TypeMap: section"));
}

// ---------------------------------------------------------------------------
// format
// ---------------------------------------------------------------------------

#[test]
fn format_normalizes_spacing() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "typemap.txt", "text    //....txt   ##   docs  \n  binary //....bin\n");

    let output = run(dir.path(), &["format", input.to_str().unwrap()]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.starts_with("# Perforce File Type Mapping Specifications."));
    assert!(text.ends_with("TypeMap:\n\ttext //....txt ## docs\n\tbinary //....bin\n"));
}
