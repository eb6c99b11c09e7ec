use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
        }
    }

    fn write_payloads(&self) -> PathBuf {
        let path = self.home.join("payloads.json");
        fs::write(
            &path,
            r#"{
  "zeropath": [
    {"id": "z1", "title": "SQL Injection in login handler", "severity": "critical", "score": 95},
    {"id": "z2", "title": "Stored XSS in comment form", "severity": "high", "score": 75}
  ],
  "sentry": [
    {"id": "s1", "title": "TypeError in payment flow", "level": "warning", "count": "120", "priority": 50}
  ]
}"#,
        )
        .expect("failed to write payloads");
        path
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("triagedeck"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute triagedeck: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "triagedeck {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

#[test]
fn issues_prints_provider_groups() {
    let env = CliTestEnv::new();
    let payloads = env.write_payloads();
    let payloads = payloads.to_str().unwrap();

    let args = ["issues", payloads, "--group-by", "provider"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("3 issue(s) in 2 group(s)"));
    assert!(stdout.contains("== Zeropath (2)"));
    assert!(stdout.contains("== Sentry (1)"));
    assert!(stdout.contains("zeropath-z1"));
}

#[test]
fn issues_composes_query_with_provider_filter() {
    let env = CliTestEnv::new();
    let payloads = env.write_payloads();
    let payloads = payloads.to_str().unwrap();

    let args = [
        "issues",
        payloads,
        "--provider",
        "zeropath",
        "--query",
        "XSS",
    ];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 issue(s)"));
    assert!(stdout.contains("zeropath-z2"));
    assert!(!stdout.contains("zeropath-z1"));
}

#[test]
fn issues_honors_priority_floor() {
    let env = CliTestEnv::new();
    let payloads = env.write_payloads();
    let payloads = payloads.to_str().unwrap();

    let args = ["issues", payloads, "--min-priority", "70"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 issue(s)"));
    assert!(!stdout.contains("sentry-s1"));
}

#[test]
fn issues_rejects_non_object_payload_file() {
    let env = CliTestEnv::new();
    let path = env.home.join("broken.json");
    fs::write(&path, "[1, 2, 3]").expect("failed to write file");

    let output = run_bin(&env, &["issues", path.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("JSON object"),
        "expected payload shape error, got:\n{stderr}"
    );
}

#[test]
fn feed_replays_stream_to_completion() {
    let env = CliTestEnv::new();
    let stream = env.home.join("run.jsonl");
    fs::write(
        &stream,
        concat!(
            "{\"type\":\"assistant\",\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"patching the handler\"}]}}\n",
            "{\"type\":\"result\",\"subtype\":\"success\",\"cost_usd\":0.05,\"duration_ms\":400,\"result\":\"done\"}\n",
        ),
    )
    .expect("failed to write stream");

    let args = ["feed", "zeropath-z1", stream.to_str().unwrap()];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("patching the handler"));
    assert!(stdout.contains("iteration 1/"));
    assert!(stdout.contains("run completed"));
    assert!(stdout.contains("session zeropath-z1: completed (2 activities)"));
}
