#![allow(clippy::unwrap_used)]

use dlog_cli::backend::InMemoryBackend;
use dlog_cli::rules;

const CONFIG: &str = "\
vault_root: \"/vault\"
prefixes:
  - match: \"W\"
    replace: \"⚒️\"
subs:
  - match: \":100:\"
    replace: \"💯\"
  - match: \"NAS\"
    link: { page: \"FreeNAS\" }
  - match: \"^SONG$\"
    regex: true
    tool:
      command: \"spotify-song\"
";

fn seeded() -> InMemoryBackend {
    let mut backend = InMemoryBackend::default();
    backend.seed_file("/home/user/.config/dlog/config.yaml", CONFIG);
    backend
}

#[test]
fn rules_lists_in_registration_order() {
    let backend = seeded();
    let out = rules::run_for_test(&["rules"], &backend);
    assert_eq!(out.exit_code, 0, "stderr: {}", out.stderr);
    let lines: Vec<&str> = out.stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "prefix(\"W\" => \"⚒️\")",
            "gsub(\":100:\" => \"💯\")",
            "link(\"NAS\" => \"[[FreeNAS]]\")",
            "tool(\"^SONG$\")",
        ]
    );
}

#[test]
fn rules_json_output() {
    let backend = seeded();
    let out = rules::run_for_test(&["rules", "--json"], &backend);
    assert_eq!(out.exit_code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&out.stdout).unwrap();
    let list = parsed.as_array().unwrap();
    assert_eq!(list.len(), 4);
    assert_eq!(list[0]["kind"], "prefix");
    assert_eq!(list[0]["match"], "W");
    assert_eq!(list[0]["replace"], "⚒️");
    assert_eq!(list[2]["kind"], "link");
    assert_eq!(list[2]["replace"], "[[FreeNAS]]");
    assert_eq!(list[3]["kind"], "tool");
    assert!(list[3].get("replace").is_none());
}

#[test]
fn rules_empty_config_prints_nothing() {
    let mut backend = InMemoryBackend::default();
    backend.seed_file("/home/user/.config/dlog/config.yaml", "");
    let out = rules::run_for_test(&["rules"], &backend);
    assert_eq!(out.exit_code, 0);
    assert!(out.stdout.is_empty());
}

#[test]
fn rules_without_config_fails() {
    let backend = InMemoryBackend::default();
    let out = rules::run_for_test(&["rules"], &backend);
    assert_eq!(out.exit_code, 1);
    assert!(out.stderr.contains("could not find a config file"));
}

#[test]
fn rules_unknown_flag() {
    let backend = seeded();
    let out = rules::run_for_test(&["rules", "--bogus"], &backend);
    assert_eq!(out.exit_code, 1);
    assert_eq!(out.stderr, "error: unknown argument for rules: '--bogus'\n");
}
