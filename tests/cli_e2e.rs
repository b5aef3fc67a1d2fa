use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn run_cli(cwd: &Path, home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_anchorpatch"))
        .current_dir(cwd)
        .env("HOME", home)
        .env_remove("ANCHORPATCH_LOG")
        .args(args)
        .output()
        .expect("command runs")
}

fn run_json_lines(cwd: &Path, home: &Path, args: &[&str]) -> (Output, Vec<Value>) {
    let output = run_cli(cwd, home, args);
    let lines = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    (output, lines)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

const MANIFEST: &str = r#"root: project
patches:
  - file: src/lib/api.ts
    guard: stuckRuns
    edits:
      - anchor:
          last_occurrence: "};"
        placement: replace
        text: "  stuckRuns: () => fetchApi('/api/runs/stuck'),\n};\n"
  - file: server/routes/runs.ts
    guard: [stuckRuns, unstick]
    edits:
      - anchor:
          first_occurrence: "import { runCli } from '../utils/cli.js';"
        placement: after
        text: "\nimport { unstickRun } from '../utils/antfarm-db.js';"
      - anchor:
          replace: "export default router;"
        text: "router.post('/runs/:id/unstick', handler);\n\nexport default router;"
  - file: src/index.css
    guard: stuck-banner
    edits:
      - anchor: end_of_file
        placement: after
        text_file: payloads/banner.css
"#;

fn seed_project(workspace: &Path) {
    let project = workspace.join("project");
    fs::create_dir_all(project.join("src/lib")).expect("lib dir");
    fs::create_dir_all(project.join("server/routes")).expect("routes dir");
    fs::create_dir_all(workspace.join("payloads")).expect("payload dir");
    fs::write(
        project.join("src/lib/api.ts"),
        "export const api = {\n  overview: () => fetchApi('/api/overview'),\n};",
    )
    .expect("seed api");
    fs::write(
        project.join("server/routes/runs.ts"),
        "import { Router } from 'express';\nimport { runCli } from '../utils/cli.js';\n\nconst router = Router();\n\nexport default router;\n",
    )
    .expect("seed runs");
    fs::write(project.join("src/index.css"), "body { margin: 0; }\n").expect("seed css");
    fs::write(
        workspace.join("payloads/banner.css"),
        "\n.stuck-banner { border: 1px solid orange; }\n",
    )
    .expect("seed payload");
    fs::write(workspace.join("anchorpatch.yml"), MANIFEST).expect("seed manifest");
}

#[test]
fn apply_patches_every_file_then_reports_already_patched() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = temp.path();
    seed_project(workspace);

    let first = run_cli(workspace, workspace, &["apply"]);
    assert!(
        first.status.success(),
        "apply failed: stdout={}\nstderr={}",
        stdout(&first),
        String::from_utf8_lossy(&first.stderr)
    );
    let text = stdout(&first);
    assert!(text.contains("src/lib/api.ts: patched (1 edit)"), "{text}");
    assert!(text.contains("server/routes/runs.ts: patched (2 edits)"), "{text}");
    assert!(text.contains("src/index.css: patched (1 edit)"), "{text}");
    assert!(text.trim_end().ends_with(
        "3 files: 3 patched, 0 already patched, 0 anchor not found, 0 failed"
    ));

    let project = workspace.join("project");
    assert_eq!(
        fs::read_to_string(project.join("src/lib/api.ts")).expect("api"),
        "export const api = {\n  overview: () => fetchApi('/api/overview'),\n  stuckRuns: () => fetchApi('/api/runs/stuck'),\n};\n"
    );
    assert_eq!(
        fs::read_to_string(project.join("server/routes/runs.ts")).expect("runs"),
        "import { Router } from 'express';\nimport { runCli } from '../utils/cli.js';\nimport { unstickRun } from '../utils/antfarm-db.js';\n\nconst router = Router();\n\nrouter.post('/runs/:id/unstick', handler);\n\nexport default router;\n"
    );
    assert_eq!(
        fs::read_to_string(project.join("src/index.css")).expect("css"),
        "body { margin: 0; }\n\n.stuck-banner { border: 1px solid orange; }\n"
    );

    let snapshot: Vec<Vec<u8>> = ["src/lib/api.ts", "server/routes/runs.ts", "src/index.css"]
        .iter()
        .map(|file| fs::read(project.join(file)).expect("read"))
        .collect();

    let second = run_cli(workspace, workspace, &["apply"]);
    assert!(second.status.success());
    let text = stdout(&second);
    assert!(
        text.contains("src/lib/api.ts: already patched (guard `stuckRuns` present)"),
        "{text}"
    );
    assert!(text.contains("3 already patched"), "{text}");

    let after: Vec<Vec<u8>> = ["src/lib/api.ts", "server/routes/runs.ts", "src/index.css"]
        .iter()
        .map(|file| fs::read(project.join(file)).expect("read"))
        .collect();
    assert_eq!(snapshot, after);
}

#[test]
fn json_output_carries_digests_and_counts() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = temp.path();
    seed_project(workspace);

    let (output, lines) = run_json_lines(workspace, workspace, &["apply", "--json"]);
    assert!(output.status.success());
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["file"], "src/lib/api.ts");
    assert_eq!(lines[0]["status"], "patched");
    assert_eq!(lines[0]["written"], true);
    assert_ne!(lines[0]["sha256_before"], lines[0]["sha256_after"]);
    assert_eq!(lines[1]["applied_edits"], 2);
    assert_eq!(lines[3]["status"], "ok");
    assert_eq!(lines[3]["patched"], 3);

    let (_, rerun) = run_json_lines(workspace, workspace, &["apply", "--json"]);
    for line in &rerun[..3] {
        assert_eq!(line["status"], "already_applied");
        assert_eq!(line["sha256_before"], line["sha256_after"]);
        assert_eq!(line["written"], false);
    }
    assert_eq!(rerun[0]["sha256_after"], lines[0]["sha256_after"]);
    assert_eq!(rerun[3]["already_applied"], 3);
}

#[test]
fn check_is_a_dry_run() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = temp.path();
    seed_project(workspace);
    let api = workspace.join("project/src/lib/api.ts");
    let before = fs::read(&api).expect("read");

    let output = run_cli(workspace, workspace, &["check"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("src/lib/api.ts: would patch (1 edit)"), "{text}");
    assert!(text.contains("3 would patch"), "{text}");
    assert_eq!(fs::read(&api).expect("read"), before);
}

#[test]
fn missing_anchor_is_isolated_and_fail_fast_controls_exit() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = temp.path();
    seed_project(workspace);
    let project = workspace.join("project");
    let runs = project.join("server/routes/runs.ts");
    fs::write(&runs, "import { runCli } from '../utils/cli.js';\nmodule.exports = router;\n")
        .expect("reshape runs");
    let runs_before = fs::read(&runs).expect("read runs");

    let lenient = run_cli(workspace, workspace, &["check"]);
    assert!(lenient.status.success(), "missing anchor alone does not fail the run");
    assert!(stdout(&lenient).contains(
        "server/routes/runs.ts: anchor not found (edit 2: replacement of `export default router;`)"
    ));

    let strict = run_cli(workspace, workspace, &["apply", "--fail-fast"]);
    assert!(!strict.status.success());
    let text = stdout(&strict);
    assert!(text.contains("src/lib/api.ts: patched"), "{text}");
    assert!(text.contains("(stopped early, 1 not attempted)"), "{text}");
    assert_eq!(fs::read(&runs).expect("read runs"), runs_before);
    assert_eq!(
        fs::read_to_string(project.join("src/index.css")).expect("css"),
        "body { margin: 0; }\n"
    );
    assert!(
        fs::read_to_string(project.join("src/lib/api.ts"))
            .expect("api")
            .contains("stuckRuns")
    );
}

#[test]
fn no_fail_fast_flag_overrides_manifest_setting() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = temp.path();
    seed_project(workspace);
    fs::write(
        workspace.join("anchorpatch.yml"),
        MANIFEST.replacen("root: project\n", "root: project\nfail_fast: true\n", 1),
    )
    .expect("strict manifest");
    let project = workspace.join("project");
    fs::write(
        project.join("server/routes/runs.ts"),
        "import { runCli } from '../utils/cli.js';\nmodule.exports = router;\n",
    )
    .expect("reshape runs");

    let strict = run_cli(workspace, workspace, &["check"]);
    assert!(!strict.status.success());
    assert!(stdout(&strict).contains("(stopped early, 1 not attempted)"));

    let relaxed = run_cli(workspace, workspace, &["apply", "--no-fail-fast"]);
    assert!(
        relaxed.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&relaxed.stderr)
    );
    let text = stdout(&relaxed);
    assert!(text.contains("src/index.css: patched (1 edit)"), "{text}");
    assert!(text.contains("1 anchor not found"), "{text}");
}

#[test]
fn edits_that_never_add_the_guard_are_reported_not_written() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = temp.path();
    fs::create_dir_all(workspace.join("project")).expect("project dir");
    fs::write(workspace.join("project/index.ts"), "app.listen(3000);\n").expect("seed index");
    fs::write(
        workspace.join("anchorpatch.yml"),
        r#"root: project
patches:
  - file: index.ts
    guard: antfarm-db
    edits:
      - anchor:
          first_occurrence: "import { setupWsProxy } from './ws.js';"
        placement: after
        optional: true
        text: "\nimport { runMedic } from './antfarm-db.js';"
      - anchor: end_of_file_trimmed
        placement: replace
        text: "\n// MEDIC cron\n"
"#,
    )
    .expect("manifest");

    for _ in 0..2 {
        let (output, lines) = run_json_lines(workspace, workspace, &["apply", "--json"]);
        assert!(output.status.success());
        assert_eq!(lines[0]["status"], "guard_not_introduced");
        assert_eq!(lines[0]["guard_token"], "antfarm-db");
        assert_eq!(lines[0]["written"], false);
        assert_eq!(lines[1]["guard_not_introduced"], 1);
    }
    assert_eq!(
        fs::read_to_string(workspace.join("project/index.ts")).expect("index"),
        "app.listen(3000);\n"
    );

    let strict = run_cli(workspace, workspace, &["apply", "--fail-fast"]);
    assert!(!strict.status.success());
    assert!(stdout(&strict).contains(
        "index.ts: guard not introduced (`antfarm-db` missing after edits)"
    ));
}

#[test]
fn missing_target_file_fails_run_but_other_files_are_patched() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = temp.path();
    seed_project(workspace);
    fs::remove_file(workspace.join("project/src/lib/api.ts")).expect("remove api");

    let output = run_cli(workspace, workspace, &["apply"]);
    assert!(!output.status.success());
    let text = stdout(&output);
    assert!(text.contains("src/lib/api.ts: error: file not found"), "{text}");
    assert!(text.contains("server/routes/runs.ts: patched (2 edits)"), "{text}");
    assert!(text.contains("1 failed"), "{text}");
}

#[test]
fn root_comes_from_flag_or_user_defaults() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = temp.path();
    seed_project(workspace);
    let manifest = MANIFEST.replacen("root: project\n", "", 1);
    fs::write(workspace.join("anchorpatch.yml"), manifest).expect("rootless manifest");

    let output = run_cli(workspace, workspace, &["apply"]);
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stderr).expect("json stderr");
    assert_eq!(err["error"]["code"], "missing_root");

    fs::create_dir_all(workspace.join(".anchorpatch")).expect("defaults dir");
    fs::write(
        workspace.join(".anchorpatch/config.yml"),
        "root: ~/project\n",
    )
    .expect("defaults");
    let output = run_cli(workspace, workspace, &["check"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("3 would patch"));

    let output = run_cli(workspace, workspace, &["check", "--root", "elsewhere"]);
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stderr).expect("json stderr");
    assert_eq!(err["error"]["code"], "missing_root");
}

#[test]
fn single_verbose_flag_enables_debug_diagnostics() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = temp.path();
    seed_project(workspace);
    assert!(run_cli(workspace, workspace, &["apply"]).status.success());

    let quiet = run_cli(workspace, workspace, &["check"]);
    assert!(!String::from_utf8_lossy(&quiet.stderr).contains("guard present"));

    let verbose = run_cli(workspace, workspace, &["check", "-v"]);
    assert!(verbose.status.success());
    let stderr = String::from_utf8_lossy(&verbose.stderr);
    assert!(stderr.contains("DEBUG"), "{stderr}");
    assert!(stderr.contains("guard present"), "{stderr}");
}

#[test]
fn init_writes_starter_manifest_once() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = temp.path();

    let (output, lines) = run_json_lines(workspace, workspace, &["init", "--json"]);
    assert!(output.status.success());
    assert_eq!(lines[0]["status"], "ok");
    assert!(workspace.join("anchorpatch.yml").is_file());

    let again = run_cli(workspace, workspace, &["init"]);
    assert!(!again.status.success());
    let err: Value = serde_json::from_slice(&again.stderr).expect("json stderr");
    assert_eq!(err["error"]["code"], "manifest_exists");

    let forced = run_cli(workspace, workspace, &["init", "--force"]);
    assert!(forced.status.success());
}

#[test]
fn invalid_manifest_is_a_config_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = temp.path();
    fs::write(
        workspace.join("anchorpatch.yml"),
        "root: .\npatches:\n  - file: a.ts\n    guard: g\n    edits:\n      - anchor:\n          nearest: x\n        text: y\n",
    )
    .expect("bad manifest");

    let output = run_cli(workspace, workspace, &["apply"]);
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stderr).expect("json stderr");
    assert_eq!(err["error"]["code"], "config_error");
}
