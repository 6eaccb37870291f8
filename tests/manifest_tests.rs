use std::fs;
use std::process::Command;

use splice_loader::manifest::Manifest;
use splice_loader::registry::RecordStatus;

const APP: &str = r#"
[app]
app_base = "/app/"
main = "main.js"
splash = "splash.css"
version = "WEB:2.1.0"

[modules."main.js"]
prerequisite = ["boot.js"]
required = ["lib/util.js", { ui = "ui/widgets.js" }]
exports = { title = "demo" }

[modules."boot.js"]

[modules."lib/util.js"]
required = { "WEB:1.0.0-2.0.0" = ["old.js"], "WEB:2.0.1-*" = ["new.js"] }
delay_ms = 5

[modules."lib/new.js"]
loads = ["late.js"]

[modules."lib/late.js"]

[modules."ui/widgets.js"]
exports = { button = "ok" }
"#;

fn write_manifest(dir: &tempfile::TempDir, text: &str) -> std::path::PathBuf {
    let path = dir.path().join("app.toml");
    fs::write(&path, text).expect("write manifest");
    path
}

#[tokio::test]
async fn manifest_application_runs_to_completion() {
    let dir = tempfile::tempdir().expect("temp dir");
    let manifest = Manifest::load(&write_manifest(&dir, APP)).expect("manifest");
    let (mut loader, fetcher) = manifest.loader().expect("loader");

    let report = loader.run_application().await.expect("run");

    assert!(report.is_clean(), "{report:?}");
    assert_eq!(fetcher.fetch_count("/app/lib/old.js"), 0);
    assert_eq!(fetcher.fetch_count("/app/lib/late.js"), 1);
    assert!(
        loader
            .registry()
            .get("/app/splash.css")
            .expect("splash registered")
            .is_processed()
    );

    let processed: Vec<String> = report
        .execution
        .processed
        .iter()
        .map(|id| id.as_str().to_string())
        .collect();
    let position = |id: &str| processed.iter().position(|p| p == id).expect(id);
    assert!(position("/app/boot.js") < position("/app/main.js"));
    assert!(position("/app/lib/util.js") < position("/app/main.js"));
    assert!(position("/app/lib/new.js") < position("/app/lib/util.js"));

    let main = loader.registry().get("/app/main.js").expect("main");
    let exports = main.exports().expect("main exports");
    assert_eq!(exports.lookup("title").and_then(|v| v.as_text()), Some("demo"));
    let scope = main.scope().expect("main scope");
    assert_eq!(scope.import("ui.button").and_then(|v| v.as_text()), Some("ok"));
}

#[tokio::test]
async fn failing_manifest_module_is_reported() {
    let text = r#"
[app]
app_base = "/app/"
main = "main.js"

[modules."main.js"]
required = ["bad.js"]

[modules."bad.js"]
fail = "configuration missing"
"#;
    let manifest = Manifest::parse(text).expect("manifest");
    let (mut loader, _) = manifest.loader().expect("loader");
    let report = loader.run_application().await.expect("run");

    assert_eq!(report.execution.failed.len(), 1);
    let bad = loader.registry().get("/app/bad.js").expect("bad");
    assert!(matches!(bad.status(), RecordStatus::Failed(reason) if reason.contains("configuration missing")));
    assert_eq!(loader.list_pending().len(), 2);
}

#[tokio::test]
async fn versioned_imports_follow_declaration_order() {
    let text = r#"
[app]
app_base = "/app/"
main = "main.js"
version = "WEB:2.1.0"

[modules."main.js"]
required = { "WEB:2.0.1-*" = ["y.js"], "*" = ["a.js"] }

[modules."y.js"]

[modules."a.js"]
"#;
    let manifest = Manifest::parse(text).expect("manifest");
    let (mut loader, _) = manifest.loader().expect("loader");
    let report = loader.run_application().await.expect("run");

    assert!(report.is_clean(), "{report:?}");
    let main = loader.registry().get("/app/main.js").expect("main");
    let imports: Vec<&str> = main.imports().iter().map(|spec| spec.id.as_str()).collect();
    assert_eq!(imports, vec!["/app/y.js", "/app/a.js"]);
}

#[test]
fn cli_run_prints_json_report() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write_manifest(&dir, APP);
    let output = Command::new(env!("CARGO_BIN_EXE_splice"))
        .arg("run")
        .arg(&path)
        .arg("--json")
        .arg("--strict")
        .output()
        .expect("spawn splice");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(report["report"]["pending"].as_array().map(Vec::len), Some(0));
    let records = report["records"].as_array().expect("records");
    assert!(records.iter().all(|record| record["status"]["state"] == "processed"));
}

#[test]
fn cli_strict_run_fails_on_unresolved_dependencies() {
    let dir = tempfile::tempdir().expect("temp dir");
    let text = "[app]\napp_base = \"/app/\"\nmain = \"main.js\"\n\n[modules.\"main.js\"]\nrequired = [\"gone.js\"]\n";
    let path = write_manifest(&dir, text);
    let output = Command::new(env!("CARGO_BIN_EXE_splice"))
        .args(["run", "--strict"])
        .arg(&path)
        .output()
        .expect("spawn splice");
    assert!(!output.status.success());
}

#[test]
fn cli_resolves_identifiers() {
    let output = Command::new(env!("CARGO_BIN_EXE_splice"))
        .args(["resolve", "../b/./c.js", "--base", "/app/", "--from", "/app/lib/a.js"])
        .output()
        .expect("spawn splice");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "/app/b/c.js");
}

#[test]
fn cli_qualifies_versions() {
    let output = Command::new(env!("CARGO_BIN_EXE_splice"))
        .args(["qualify", "WEB:2.0.1-*", "--version", "WEB:2.1.0"])
        .output()
        .expect("spawn splice");
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "accepted");
}
