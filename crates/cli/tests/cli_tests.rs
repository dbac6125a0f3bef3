// Integration tests driving the smem binary end to end.
//
// Run with: cargo test -p sheetmem-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const SETTINGS: &str = r#"
[[tables]]
name = "Trip"
columns = ["Date", "Location"]

[[tables]]
name = "People"
columns = ["Name", "Age"]
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self::with_settings(SETTINGS)
    }

    fn with_settings(settings: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.toml"), settings).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn chat(&self) -> PathBuf {
        self.path("chat.json")
    }

    fn smem(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_smem"))
            .arg("--config")
            .arg(self.path("settings.toml"))
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .expect("run smem")
    }

    fn smem_ok(&self, args: &[&str]) -> String {
        let output = self.smem(args);
        assert!(
            output.status.success(),
            "smem {:?} failed: {:?}\nstderr: {}",
            args,
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    fn init(&self) -> String {
        let chat = self.chat();
        self.smem_ok(&["init", s(&chat)])
    }

    fn append_ai(&self, calls: &str) -> serde_json::Value {
        let text = format!("Sure.\n<tableEdit>\n<!--\n{}\n-->\n</tableEdit>", calls);
        let chat = self.chat();
        json(&self.smem_ok(&["append", s(&chat), "--text", &text, "--json"]))
    }

    fn tables(&self) -> serde_json::Value {
        let chat = self.chat();
        json(&self.smem_ok(&["export", s(&chat), "--list"]))
    }
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout must be JSON: {}\n{}", e, stdout))
}

#[test]
fn init_creates_configured_tables() {
    let ws = Workspace::new();
    let out = ws.init();
    assert!(out.contains("2 table(s)"));

    let tables = ws.tables();
    assert_eq!(tables[0]["name"], "Trip");
    assert_eq!(tables[0]["data"], serde_json::json!([["Date", "Location"]]));
    assert_eq!(tables[1]["name"], "People");
}

#[test]
fn init_refuses_to_overwrite() {
    let ws = Workspace::new();
    ws.init();
    let chat = ws.chat();
    let output = ws.smem(&["init", s(&chat)]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--force"));
    ws.smem_ok(&["init", s(&chat), "--force"]);
}

#[test]
fn append_applies_edits_to_addressed_tables() {
    let ws = Workspace::new();
    ws.init();
    let report = ws.append_ai(r#"insertRow(0, {0: "Day1", 1: "Town"}) insertRow(1, {0: "Ann", 1: 30})"#);
    assert_eq!(report["applied"], 2);
    assert_eq!(report["changed"], true);

    let tables = ws.tables();
    assert_eq!(tables[0]["data"][1], serde_json::json!(["Day1", "Town"]));
    assert_eq!(tables[1]["data"][1], serde_json::json!(["Ann", "30"]));
}

#[test]
fn reapplying_unchanged_turn_is_skipped() {
    let ws = Workspace::new();
    ws.init();
    ws.append_ai(r#"insertRow(0, {0: "Day1"})"#);
    let chat = ws.chat();

    let report = json(&ws.smem_ok(&["apply", s(&chat), "--json"]));
    assert_eq!(report["skipped"], "unchanged");

    let forced = json(&ws.smem_ok(&["apply", s(&chat), "--force", "--json"]));
    assert!(forced.get("skipped").is_none());
    assert_eq!(forced["changed"], false);
    assert_eq!(ws.tables()[0]["data"].as_array().unwrap().len(), 2);
}

#[test]
fn user_turns_are_stored_but_not_processed() {
    let ws = Workspace::new();
    ws.init();
    let chat = ws.chat();
    let out = ws.smem_ok(&["append", s(&chat), "--user", "--text", "insertRow(0, {0: \"x\"})"]);
    assert!(out.contains("user message appended"));
    assert_eq!(ws.tables()[0]["data"].as_array().unwrap().len(), 1);
}

#[test]
fn undo_restores_earlier_state() {
    let ws = Workspace::new();
    ws.init();
    ws.append_ai(r#"insertRow(0, {0: "Day1"})"#);
    ws.append_ai(r#"insertRow(0, {0: "Day2"})"#);
    let chat = ws.chat();

    let report = json(&ws.smem_ok(&["undo", s(&chat), "--depth", "1", "--json"]));
    assert_eq!(report["turn"], 0);

    let out = ws.smem_ok(&["resolve", s(&chat), "first={{GET::Trip:B2}} second={{GET::Trip:B3}}"]);
    assert!(out.contains("first=Day1"), "{}", out);
    assert!(out.contains(r#"cell "B3" not found"#), "{}", out);
}

#[test]
fn show_renders_prompt_text() {
    let ws = Workspace::new();
    ws.init();
    ws.append_ai(r#"insertRow(0, {0: "Day1", 1: "Town"})"#);
    let chat = ws.chat();

    let out = ws.smem_ok(&["show", s(&chat)]);
    assert!(out.contains("[0:Trip]"), "{}", out);
    assert!(out.contains("Columns: [0:Date], [1:Location]"), "{}", out);
    assert!(out.contains("[0] Day1, Town"), "{}", out);

    let historic = ws.smem_ok(&["show", s(&chat), "--turn", "0", "--json"]);
    assert_eq!(json(&historic)[0]["data"][1][0], "Day1");

    let output = ws.smem(&["show", s(&chat), "--turn", "9"]);
    assert_eq!(output.status.code(), Some(11));
}

#[test]
fn check_lists_scheduled_calls_and_diagnostics() {
    let ws = Workspace::new();
    let input = ws.path("reply.txt");
    std::fs::write(
        &input,
        "<tableEdit>\n<!--\ndeleteRow(0, 0)\ninsertRow(0, {0: \"a\"})\ndeleteRow(0, 2)\nupdateRow(0, 1)\n-->\n</tableEdit>",
    )
    .unwrap();

    let out = json(&ws.smem_ok(&["check", s(&input), "--json"]));
    assert_eq!(out["regions"], 1);
    assert_eq!(
        out["actions"],
        serde_json::json!(["insertRow(0, {0: \"a\"})", "deleteRow(0, 2)", "deleteRow(0, 0)"])
    );
    assert_eq!(out["diagnostics"][0]["kind"], "malformed_call");

    let strict = ws.smem(&["check", s(&input), "--strict"]);
    assert_eq!(strict.status.code(), Some(13));
}

#[test]
fn rebuild_replaces_table_content() {
    let ws = Workspace::new();
    ws.init();
    ws.append_ai(r#"insertRow(0, {0: "Day1", 1: "Town"})"#);
    let reply = ws.path("rebuild.json");
    std::fs::write(
        &reply,
        r#"```json
[{"tableIndex": 0, "tableName": "Trip", "columns": ["Date", "Location"], "content": [["Day2", "City"], ["", ""]]}]
```"#,
    )
    .unwrap();
    let chat = ws.chat();

    ws.smem_ok(&["rebuild", s(&chat), s(&reply)]);
    let tables = ws.tables();
    assert_eq!(tables[0]["data"], serde_json::json!([["Date", "Location"], ["Day2", "City"]]));

    std::fs::write(&reply, "not json").unwrap();
    let output = ws.smem(&["rebuild", s(&chat), s(&reply)]);
    assert_eq!(output.status.code(), Some(12));
}

#[test]
fn import_converts_legacy_tables() {
    let ws = Workspace::new();
    ws.init();
    ws.append_ai("");
    let legacy = ws.path("legacy.json");
    std::fs::write(
        &legacy,
        r#"[{"tableName": "People", "columns": ["Name", "Age"], "content": [["Bob", "41"]]},
            {"tableName": "Items", "columns": ["Item"], "content": [["Lamp"]], "note": "carried"}]"#,
    )
    .unwrap();
    let chat = ws.chat();

    ws.smem_ok(&["import", s(&chat), s(&legacy)]);
    let tables = ws.tables();
    assert_eq!(tables.as_array().unwrap().len(), 3);
    assert_eq!(tables[1]["data"][1], serde_json::json!(["Bob", "41"]));
    assert_eq!(tables[2]["name"], "Items");
}

#[test]
fn missing_chat_file_is_io_error_with_hint() {
    let ws = Workspace::new();
    let chat = ws.chat();
    let output = ws.smem(&["show", s(&chat)]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("smem init"));
}

#[test]
fn append_keeps_message_when_no_table_is_enabled() {
    let ws = Workspace::with_settings(
        r#"
[[tables]]
name = "People"
columns = ["Name"]
enabled = false
"#,
    );
    ws.init();
    let chat = ws.chat();
    let output = ws.smem(&[
        "append",
        s(&chat),
        "--text",
        r#"<tableEdit><!-- insertRow(0, {0: "Ann"}) --></tableEdit>"#,
    ]);
    assert_eq!(output.status.code(), Some(10));

    let saved = json(&std::fs::read_to_string(&chat).unwrap());
    let turns = saved["turns"].as_array().unwrap();
    assert_eq!(turns.len(), 1);
    assert!(turns[0]["text"].as_str().unwrap().contains("Ann"));
    assert!(turns[0].get("piece").is_none());
}

#[test]
fn show_respects_read_switch() {
    let ws = Workspace::with_settings(&format!("ai_read_table = false\n{}", SETTINGS));
    ws.init();
    ws.append_ai(r#"insertRow(0, {0: "Day1"})"#);
    let chat = ws.chat();

    let out = ws.smem_ok(&["show", s(&chat)]);
    assert!(out.contains("(table reading disabled)"), "{}", out);
    assert!(!out.contains("Day1"), "{}", out);
    assert_eq!(json(&ws.smem_ok(&["show", s(&chat), "--json"])), serde_json::json!([]));
}

#[test]
fn show_context_places_tables_at_injection_depth() {
    let ws = Workspace::with_settings(&format!("injection_depth = 1\n{}", SETTINGS));
    ws.init();
    let chat = ws.chat();
    ws.smem_ok(&["append", s(&chat), "--user", "--text", "Where now?"]);
    ws.append_ai(r#"insertRow(0, {0: "Day1"})"#);

    let out = ws.smem_ok(&["show", s(&chat), "--context", "--pure"]);
    let user = out.find("[0:user] Where now?").unwrap();
    let tables = out.find("[tables]").unwrap();
    let reply = out.find("[1:ai] Sure.").unwrap();
    assert!(user < tables && tables < reply, "{}", out);
    assert!(out.contains("[0] Day1"), "{}", out);
}

#[test]
fn check_rewrite_normalizes_edit_region() {
    let ws = Workspace::new();
    let input = ws.path("reply.txt");
    std::fs::write(
        &input,
        "Done.\n<tableEdit>\n<!--\ndeleteRow(0, 0)\ninsertRow(0, {0:'a'})\n-->\n</tableEdit>\nBye.",
    )
    .unwrap();

    let out = ws.smem_ok(&["check", s(&input), "--rewrite"]);
    assert_eq!(
        out.trim_end(),
        "Done.\n<tableEdit>\n<!--\ninsertRow(0, {0: \"a\"})\ndeleteRow(0, 0)\n-->\n</tableEdit>\nBye."
    );

    let bare = ws.path("calls.txt");
    std::fs::write(&bare, "deleteRow(1, 3)").unwrap();
    let out = json(&ws.smem_ok(&["check", s(&bare), "--rewrite", "--json"]));
    assert_eq!(out["rewritten"], "<tableEdit>\n<!--\ndeleteRow(1, 3)\n-->\n</tableEdit>");
}
