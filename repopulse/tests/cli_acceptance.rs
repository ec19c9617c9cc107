use chrono::{Duration, Utc};
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    work: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    xdg_runtime: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let work = base.join("work");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");
        let xdg_runtime = base.join("xdg-runtime");

        for dir in [&home, &work, &xdg_data, &xdg_config, &xdg_state, &xdg_runtime] {
            fs::create_dir_all(dir).expect("failed to create test directory");
        }

        Self {
            _temp_dir: temp_dir,
            home,
            work,
            xdg_data,
            xdg_config,
            xdg_state,
            xdg_runtime,
        }
    }

    fn default_history_path(&self) -> PathBuf {
        self.xdg_data.join("repopulse/history.json")
    }

    fn history_path(&self) -> PathBuf {
        self.work.join("history.json")
    }

    fn history_arg(&self) -> String {
        self.history_path().to_string_lossy().into_owned()
    }

    fn write_snapshot(&self, name: &str, json: &str) -> String {
        let path = self.work.join(name);
        fs::write(&path, json).expect("failed to write snapshot");
        path.to_string_lossy().into_owned()
    }

    fn read_history(&self) -> Vec<serde_json::Value> {
        let content = fs::read_to_string(self.history_path()).expect("history should exist");
        serde_json::from_str(&content).expect("history should be a JSON array")
    }
}

fn tool_fixtures(set: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../repopulse-core/tests/fixtures/tools")
        .join(set)
        .to_string_lossy()
        .into_owned()
}

fn source_fixtures() -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../repopulse-core/tests/fixtures/sources")
        .to_string_lossy()
        .into_owned()
}

fn run_bin(env: &CliTestEnv, bin_name: &str, args: &[&str]) -> Output {
    let bin_path = match bin_name {
        "repopulse-record" => PathBuf::from(assert_cmd::cargo::cargo_bin!("repopulse-record")),
        "repopulse-trend" => PathBuf::from(assert_cmd::cargo::cargo_bin!("repopulse-trend")),
        _ => panic!("unsupported binary in test harness: {bin_name}"),
    };

    let mut command = Command::new(bin_path);

    command
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env("XDG_RUNTIME_DIR", &env.xdg_runtime)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute {bin_name}: {e}"))
}

fn assert_success(bin_name: &str, args: &[&str], output: &Output) {
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
        "{bin_name} {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn record(env: &CliTestEnv, args: &[&str]) -> Output {
    let output = run_bin(env, "repopulse-record", args);
    assert_success("repopulse-record", args, &output);
    output
}

#[test]
fn record_collects_tool_outputs_into_history() {
    let env = CliTestEnv::new();
    let outputs = tool_fixtures("complete");
    let history = env.history_arg();
    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();

    let output = record(&env, &["--outputs", &outputs, "--history", &history]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("Snapshot {today}")), "stdout:\n{stdout}");
    assert!(stdout.contains("Snapshots: 1 (0 pruned)"));

    let entries = env.read_history();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["date"], today.as_str());
    assert_eq!(entries[0]["quality_score"], 8.2);
    assert_eq!(entries[0]["lines.Python"], 2250.0);
}

#[test]
fn record_scans_sources_for_duplication() {
    let env = CliTestEnv::new();
    let outputs = tool_fixtures("complete");
    let sources = source_fixtures();
    let history = env.history_arg();

    record(
        &env,
        &["--outputs", &outputs, "--sources", &sources, "--history", &history],
    );

    let entries = env.read_history();
    assert_eq!(entries[0]["code_duplication_percent"], 20.0);
    assert_eq!(entries[0]["duplicated_lines"], 2.0);
}

#[test]
fn record_marks_duplication_missing_without_sources() {
    let env = CliTestEnv::new();
    let history = env.history_arg();
    let snapshot = env.write_snapshot("snap.json", r#"{"quality_score": 6.0}"#);
    let empty = env.work.join("empty-src");
    fs::create_dir(&empty).unwrap();
    let empty = empty.to_string_lossy().into_owned();

    record(
        &env,
        &["--snapshot", &snapshot, "--sources", &empty, "--history", &history],
    );

    let entries = env.read_history();
    assert!(entries[0]["code_duplication_percent"].is_null());
    assert_eq!(entries[0]["quality_score"], 6.0);
}

#[test]
fn record_uses_xdg_default_history_path() {
    let env = CliTestEnv::new();
    let outputs = tool_fixtures("complete");

    record(&env, &["--outputs", &outputs]);

    assert!(
        env.default_history_path().exists(),
        "history should exist at {}",
        env.default_history_path().display()
    );
}

#[test]
fn record_marks_failed_tools_as_null() {
    let env = CliTestEnv::new();
    let outputs = tool_fixtures("broken");
    let history = env.history_arg();

    let output = record(&env, &["--outputs", &outputs, "--history", &history]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("coverage"));
    assert!(stdout.contains("failed:"));

    let entries = env.read_history();
    assert!(entries[0]["test_coverage"].is_null());
    assert!(entries[0]["security_issues"].is_null());
}

#[test]
fn record_appends_and_replace_today_collapses_same_day() {
    let env = CliTestEnv::new();
    let history = env.history_arg();
    let first = env.write_snapshot("first.json", r#"{"quality_score": 6.0}"#);
    let second = env.write_snapshot("second.json", r#"{"quality_score": 6.5}"#);
    let third = env.write_snapshot("third.json", r#"{"quality_score": 7.0}"#);

    record(&env, &["--snapshot", &first, "--history", &history]);
    record(&env, &["--snapshot", &second, "--history", &history]);
    assert_eq!(env.read_history().len(), 2);

    record(
        &env,
        &["--snapshot", &third, "--history", &history, "--replace-today"],
    );
    let entries = env.read_history();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["quality_score"], 7.0);
}

#[test]
fn record_prunes_snapshots_outside_retention() {
    let env = CliTestEnv::new();
    let history = env.history_arg();
    let today = Utc::now().date_naive();
    let old_date = (today - Duration::days(120)).format("%Y-%m-%d").to_string();
    let kept_date = (today - Duration::days(10)).format("%Y-%m-%d").to_string();
    let snapshot = env.write_snapshot("snap.json", r#"{"total_lines": 1000}"#);

    record(
        &env,
        &["--snapshot", &snapshot, "--history", &history, "--date", &old_date, "--no-prune"],
    );
    record(
        &env,
        &["--snapshot", &snapshot, "--history", &history, "--date", &kept_date],
    );

    let entries = env.read_history();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["date"], kept_date.as_str());
}

#[test]
fn record_recovers_from_corrupt_history() {
    let env = CliTestEnv::new();
    let history = env.history_arg();
    fs::write(env.history_path(), "{ this is not a history").unwrap();
    let snapshot = env.write_snapshot("snap.json", r#"{"quality_score": 6.0}"#);

    let output = record(&env, &["--snapshot", &snapshot, "--history", &history]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unreadable history"), "stderr:\n{stderr}");
    assert_eq!(env.read_history().len(), 1);
}

#[cfg(unix)]
#[test]
fn record_fails_when_history_cannot_be_persisted() {
    let env = CliTestEnv::new();
    // Reads as a missing file, but its parent can never be created.
    let dangling = env.work.join("dangling");
    std::os::unix::fs::symlink(env.work.join("nowhere"), &dangling).unwrap();
    let history = dangling.join("history.json").to_string_lossy().into_owned();
    let snapshot = env.write_snapshot("snap.json", r#"{"quality_score": 6.0}"#);

    let output = run_bin(
        &env,
        "repopulse-record",
        &["--snapshot", &snapshot, "--history", &history],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to persist history"), "stderr:\n{stderr}");
    assert!(!env.work.join("nowhere").exists());
}

#[test]
fn record_fails_instead_of_replacing_unreadable_history() {
    let env = CliTestEnv::new();
    let history = env.history_arg();
    fs::create_dir(env.history_path()).unwrap();
    fs::write(env.history_path().join("keep"), "committed").unwrap();
    let snapshot = env.write_snapshot("snap.json", r#"{"quality_score": 6.0}"#);

    let output = run_bin(
        &env,
        "repopulse-record",
        &["--snapshot", &snapshot, "--history", &history],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load history"), "stderr:\n{stderr}");
    assert!(!stderr.contains("Unreadable history"), "stderr:\n{stderr}");
    assert_eq!(
        fs::read_to_string(env.history_path().join("keep")).unwrap(),
        "committed"
    );
}

#[cfg(unix)]
#[test]
fn record_fails_when_history_load_stalls() {
    use std::os::unix::fs::FileTypeExt;

    let env = CliTestEnv::new();
    let history = env.history_arg();
    // Opening a FIFO with no writer blocks, so the load never completes.
    let status = Command::new("mkfifo")
        .arg(env.history_path())
        .status()
        .expect("failed to run mkfifo");
    assert!(status.success());

    let config = env.work.join("config.toml");
    fs::write(&config, "[history]\nio_timeout_ms = 200\n").unwrap();
    let config_arg = config.to_string_lossy().into_owned();
    let snapshot = env.write_snapshot("snap.json", r#"{"quality_score": 6.0}"#);

    let output = run_bin(
        &env,
        "repopulse-record",
        &["--config", &config_arg, "--snapshot", &snapshot, "--history", &history],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("timed out after 200ms"), "stderr:\n{stderr}");
    let file_type = fs::symlink_metadata(env.history_path()).unwrap().file_type();
    assert!(file_type.is_fifo());
}

#[test]
fn record_dry_run_leaves_history_untouched() {
    let env = CliTestEnv::new();
    let outputs = tool_fixtures("complete");
    let history = env.history_arg();

    let output = record(
        &env,
        &["--outputs", &outputs, "--history", &history, "--dry-run"],
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Dry run - history not modified"));
    assert!(!env.history_path().exists());
}

#[test]
fn record_requires_a_snapshot_source() {
    let env = CliTestEnv::new();
    let output = run_bin(&env, "repopulse-record", &["--history", &env.history_arg()]);
    assert!(!output.status.success());
}

#[test]
fn trend_reports_improvement_and_alerts() {
    let env = CliTestEnv::new();
    let history = env.history_arg();
    let older = env.write_snapshot(
        "older.json",
        r#"{"date": "2024-01-01", "quality_score": 6.0, "dependency_vulnerabilities": 0}"#,
    );
    let newer = env.write_snapshot(
        "newer.json",
        r#"{"date": "2024-01-08", "quality_score": 7.0, "dependency_vulnerabilities": 1}"#,
    );
    record(&env, &["--snapshot", &older, "--history", &history, "--no-prune"]);
    record(&env, &["--snapshot", &newer, "--history", &history, "--no-prune"]);

    let args = [
        "--history",
        history.as_str(),
        "--metric",
        "quality_score",
        "--format",
        "json",
    ];
    let output = run_bin(&env, "repopulse-trend", &args);
    assert_success("repopulse-trend", &args, &output);

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("trend output should be JSON");
    let trend = &report["entries"][0]["trend"];
    assert_eq!(trend["metric_name"], "quality_score");
    assert_eq!(trend["direction"], "improving");
    assert!((trend["delta"].as_f64().unwrap() - 1.0).abs() < 1e-9);
    assert!((trend["slope"].as_f64().unwrap() - 1.0 / 7.0).abs() < 1e-9);
    assert_eq!(report["alerts"][0]["metric"], "dependency_vulnerabilities");
    assert_eq!(report["alerts"][0]["severity"], "critical");
    // (30 * 0.30 + 10 * 0.15) / 0.45
    assert_eq!(report["debt"]["index"], 23.33);
    assert_eq!(report["debt"]["severity"], "acceptable");
}

#[test]
fn trend_markdown_marks_single_point_metrics_unavailable() {
    let env = CliTestEnv::new();
    let history = env.history_arg();
    let snapshot = env.write_snapshot("snap.json", r#"{"date": "2024-01-01", "quality_score": 6.0}"#);
    record(&env, &["--snapshot", &snapshot, "--history", &history, "--no-prune"]);

    let args = ["--history", history.as_str(), "--format", "markdown"];
    let output = run_bin(&env, "repopulse-trend", &args);
    assert_success("repopulse-trend", &args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("## Metric Trends"));
    assert!(stdout.contains("| quality_score | n/a | insufficient data"));
}

#[test]
fn trend_without_history_reports_empty() {
    let env = CliTestEnv::new();
    let history = env.history_arg();
    let args = ["--history", history.as_str()];

    let output = run_bin(&env, "repopulse-trend", &args);
    assert_success("repopulse-trend", &args, &output);
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "No history recorded yet.\n"
    );
}

#[test]
fn invalid_config_is_rejected() {
    let env = CliTestEnv::new();
    let config = env.work.join("config.toml");
    fs::write(&config, "[history]\nretention_days = 0\n").unwrap();
    let config_arg = config.to_string_lossy().into_owned();

    let output = run_bin(
        &env,
        "repopulse-trend",
        &["--config", &config_arg, "--history", &env.history_arg()],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("retention_days"), "stderr:\n{stderr}");
}

#[test]
fn trend_lists_metrics_with_configured_polarity() {
    let env = CliTestEnv::new();
    let config = env.work.join("config.toml");
    fs::write(&config, "[trends.polarity]\nfile_count = \"lower_is_better\"\n").unwrap();
    let config_arg = config.to_string_lossy().into_owned();
    let args = ["--config", config_arg.as_str(), "--list-metrics"];

    let output = run_bin(&env, "repopulse-trend", &args);
    assert_success("repopulse-trend", &args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = |name: &str| {
        stdout
            .lines()
            .find(|l| l.starts_with(&format!("{name} ")))
            .unwrap_or_else(|| panic!("{name} not listed:\n{stdout}"))
            .to_string()
    };
    assert!(line("quality_score").contains("higher_is_better"));
    assert!(line("code_duplication_percent").contains("lower_is_better"));
    assert!(line("file_count").contains("lower_is_better"));
    assert!(line("lines.<language>").contains("cloc"));
}

#[test]
fn trend_warns_about_unregistered_metrics() {
    let env = CliTestEnv::new();
    let history = env.history_arg();
    let snapshot = env.write_snapshot("snap.json", r#"{"date": "2024-01-01", "build_seconds": 40}"#);
    record(&env, &["--snapshot", &snapshot, "--history", &history, "--no-prune"]);

    let args = ["--history", history.as_str(), "--metric", "build_seconds"];
    let output = run_bin(&env, "repopulse-trend", &args);
    assert_success("repopulse-trend", &args, &output);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unregistered metric"), "stderr:\n{stderr}");
}
