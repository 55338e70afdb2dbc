use caplog::config::{RunConfig, RunMode};
use caplog::reconstruct::RecoveryPolicy;
use caplog::run::{execute, Session};
use caplog_common::fragment_line;
use std::fs;
use std::path::{Path, PathBuf};

const PREFIX: &str = "CAP_LOG : P=4711 T=1 C=000 ";

fn long_words() -> String {
    vec!["payload"; 20].join(" ")
}

/// Object class scenario with a long line, a channel declaration, noise and
/// a close on a second process that never saw its open.
fn scenario_log() -> String {
    let mut lines = vec![
        "CAP_LOG : P=4711 MAX-CHAR-SIZE=80".to_string(),
        "CAP_LOG : P=4711 T=1 CHANNEL-ID=000 : ENABLED : VERBOSITY=3 : Core".to_string(),
        format!("{PREFIX}:-F 1 [10]::[foo.cpp]::[Foo::Foo()] 0x1"),
        format!("{PREFIX}:-> 1 [11] LOG: ObjectClass | id: [0x1] | class: [Foo]"),
    ];
    let long = format!(":-> 1 [12] LOG: {}", long_words());
    // the transport trims the padding of every fragment
    lines.extend(fragment_line(PREFIX, &long, 80).iter().map(|f| f.trim_end().to_string()));
    lines.extend([
        format!("{PREFIX}:-L 1 [13]::[foo.cpp]::[Foo::Foo()] 0x1"),
        format!("{PREFIX}-> 1 [14] LOG: ObjectClass | id: [0x1] | class: [Bar]"),
        "some unrelated console output".to_string(),
        "CAP_LOG : P=99 T=7 C=001 :-L 1 [5]::[b.cpp]::[Bar::run()] 0x9".to_string(),
    ]);
    lines.join("\n") + "\n"
}

fn file_config(files: Vec<PathBuf>, output_dir: &Path) -> RunConfig {
    RunConfig { mode: RunMode::Files, files, output_dir: output_dir.to_path_buf(), ..RunConfig::default() }
}

#[test]
fn test_scenario_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("trace.log");
    fs::write(&log, scenario_log()).unwrap();

    let session = Session::start(file_config(vec![log], dir.path())).unwrap();
    let sources = session.process_files();
    let outcome = session.finish(sources).unwrap();
    let run_dir = outcome.workdir;

    let report = fs::read_to_string(run_dir.join("report.log")).unwrap();
    let report: Vec<&str> = report.lines().collect();
    assert_eq!(report.len(), 6, "{report:#?}");
    assert_eq!(report[0], "P0 T0   ::[foo.cpp]::[Foo::Foo()] 0x1");
    assert_eq!(report[2], format!("P0 T0   LOG: {}", long_words()));
    assert_eq!(report[4], "P0 T0 LOG: ObjectClass | id: [0x1] | class: [Bar]");
    assert_eq!(report[5], "P1 T0   ::[b.cpp]::[Bar::run()] 0x9");

    let validation = fs::read_to_string(run_dir.join("validation.log")).unwrap();
    assert!(validation.contains("[PASS] line=2 src=src0:4 P0 T0 object class matches constructor"));
    assert!(validation.contains("[FAIL] line=5 "));
    assert!(validation.contains("[WARN] src=src0:"));
    assert!(!validation.contains("[ERROR]"), "{validation}");

    let parsed = fs::read_to_string(run_dir.join("parsed.log")).unwrap();
    assert!(parsed.lines().any(|l| l.contains("MAX P=4711 limit=80")));
    assert!(parsed.lines().any(|l| l.contains("CHANNEL P=4711")));

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(run_dir.join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["config"]["mode"], "files");
    assert_eq!(summary["pipeline"]["events"], 6);
    assert_eq!(summary["pipeline"]["lines"]["ignored"], 1);
    assert_eq!(summary["pipeline"]["fragments"]["completed"], 1);
    assert_eq!(summary["pipeline"]["validation"]["checks_failed"], 1);
    assert_eq!(summary["pipeline"]["channels"][0]["name"], "Core");
    assert_eq!(summary["pipeline"]["processes"][1]["raw"], "99");
    assert_eq!(summary["sources"][0]["frames"], serde_json::Value::Null);
}

#[test]
fn test_quarantine_policy_drops_thread() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("jump.log");
    fs::write(
        &log,
        "CAP_LOG : P=1 T=1 C=000 :-F 1 [1]::[a.cpp]::[a()] 0x1\n\
         CAP_LOG : P=1 T=1 C=000 :::-F 1 [2]::[a.cpp]::[b()] 0x2\n\
         CAP_LOG : P=1 T=1 C=000 :::-> 1 [3] LOG: lost\n\
         CAP_LOG : P=1 T=2 C=000 :-> 1 [4] LOG: other thread\n",
    )
    .unwrap();

    let config = RunConfig { recovery: RecoveryPolicy::Quarantine, ..file_config(vec![log.clone()], dir.path()) };
    let session = Session::start(config).unwrap();
    let sources = session.process_files();
    let outcome = session.finish(sources).unwrap();
    let reconstruction = &outcome.summary.pipeline.reconstruction;
    assert_eq!(reconstruction.quarantined_threads, 1);
    assert_eq!(reconstruction.quarantined_events, 1);
    assert_eq!(outcome.summary.pipeline.events, 2);

    // resync keeps every event and reports the jump
    let session = Session::start(file_config(vec![log], dir.path())).unwrap();
    let sources = session.process_files();
    let outcome = session.finish(sources).unwrap();
    assert_eq!(outcome.summary.pipeline.events, 4);
    assert_eq!(outcome.summary.pipeline.reconstruction.depth_mismatches, 1);
    let validation = fs::read_to_string(outcome.workdir.join("validation.log")).unwrap();
    assert!(validation.contains("Depth mismatch on P0 T0: expected 2, reported 3"));
}

#[test]
fn test_custom_rules_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("two.log");
    fs::write(
        &log,
        "CAP_LOG : P=10 T=1 C=000 :-> 1 [1] LOG: from the first process\n\
         CAP_LOG : P=20 T=1 C=000 :-> 1 [1] LOG: from the second process\n",
    )
    .unwrap();
    let rules = dir.path().join("rules.json");
    fs::write(
        &rules,
        r#"{
            "node": "check_message",
            "condition": { "equals": [ { "from_stack_node": "process_id" }, { "literal": "0" } ] },
            "description": "only the first process logs"
        }"#,
    )
    .unwrap();

    let config = RunConfig { rules: Some(rules), ..file_config(vec![log], dir.path()) };
    let session = Session::start(config).unwrap();
    let sources = session.process_files();
    let outcome = session.finish(sources).unwrap();

    assert_eq!(outcome.summary.pipeline.validation.checks_passed, 1);
    assert_eq!(outcome.summary.pipeline.validation.checks_failed, 1);
}

#[test]
fn test_invalid_rules_abort_before_output() {
    let dir = tempfile::tempdir().unwrap();
    let rules = dir.path().join("rules.json");
    fs::write(&rules, r#"{ "node": "sequence", "children": [] }"#).unwrap();
    let out = dir.path().join("out");

    let config = RunConfig { rules: Some(rules), ..file_config(Vec::new(), &out) };
    assert!(Session::start(config).is_err());
    assert!(!out.exists());
}

#[tokio::test]
async fn test_raw_dump_replays_like_text() {
    let dir = tempfile::tempdir().unwrap();
    let text = dir.path().join("trace.log");
    fs::write(&text, scenario_log()).unwrap();

    let dump = dir.path().join("trace.bin");
    let mut bytes = Vec::new();
    for line in scenario_log().lines() {
        bytes.extend(caplog_common::encode_text_frame(line));
    }
    bytes.extend(caplog_common::encode_blob_frame("../core.dmp", b"\x7fELF"));
    fs::write(&dump, bytes).unwrap();

    let from_text = execute(file_config(vec![text], &dir.path().join("a")), std::future::pending()).await.unwrap();
    let from_dump = execute(file_config(vec![dump], &dir.path().join("b")), std::future::pending()).await.unwrap();

    let read = |run: &Path| fs::read_to_string(run.join("report.log")).unwrap();
    assert_eq!(read(&from_text.workdir), read(&from_dump.workdir));
    assert_eq!(from_dump.summary.blobs.written, 1);
    assert!(from_dump.workdir.join("blobs").join("core.dmp").is_file());
    assert_eq!(from_dump.summary.sources[0].frames.map(|f| f.frames), Some(scenario_log().lines().count() as u64 + 1));
}
