mod test_support;

use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{request, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("gradebook-router-smoke");
    let bundle_out = workspace.join("smoke-backup.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["ok"].as_bool(), Some(true));
    assert!(health["result"]["workspacePath"].is_null());

    let no_ws = request(&mut stdin, &mut reader, "2", "scores.get", json!({ "studentId": "s1" }));
    assert_eq!(no_ws["error"]["code"], "no_workspace");

    let selected = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["ok"].as_bool(), Some(true));
    assert_eq!(selected["result"]["config"]["outcomeGate"], "statusPass");
    assert!(workspace.join("gradebook.sqlite3").is_file());

    for (id, method) in [
        ("4", "scores.get"),
        ("5", "scores.studentScores"),
        ("6", "outcomes.levels"),
    ] {
        let resp = request(&mut stdin, &mut reader, id, method, json!({ "studentId": "s1" }));
        assert_eq!(resp["ok"].as_bool(), Some(true), "{} failed: {}", method, resp);
    }

    let exported = request(
        &mut stdin,
        &mut reader,
        "7",
        "backup.exportWorkspace",
        json!({ "outPath": bundle_out.to_string_lossy() }),
    );
    assert_eq!(exported["ok"].as_bool(), Some(true), "{}", exported);
    assert!(bundle_out.is_file());

    let imported = request(
        &mut stdin,
        &mut reader,
        "8",
        "backup.importWorkspace",
        json!({ "inPath": bundle_out.to_string_lossy() }),
    );
    assert_eq!(imported["ok"].as_bool(), Some(true), "{}", imported);
    assert_eq!(imported["result"]["dbSha256"], exported["result"]["dbSha256"]);

    let after = request(&mut stdin, &mut reader, "9", "scores.get", json!({ "studentId": "s1" }));
    assert_eq!(after["ok"].as_bool(), Some(true));

    let notes = workspace.join("notes.txt");
    std::fs::write(&notes, "not a database").expect("write notes");
    let rejected = request(
        &mut stdin,
        &mut reader,
        "9a",
        "backup.importWorkspace",
        json!({ "inPath": notes.to_string_lossy() }),
    );
    assert_eq!(rejected["error"]["code"], "io_failed");
    let usable = request(&mut stdin, &mut reader, "9b", "scores.get", json!({ "studentId": "s1" }));
    assert_eq!(usable["ok"].as_bool(), Some(true), "{}", usable);

    let unknown = request(&mut stdin, &mut reader, "10", "classes.create", json!({}));
    assert_eq!(unknown["error"]["code"], "not_implemented");

    writeln!(stdin, "not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json response");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse");
    assert_eq!(value["error"]["code"], "bad_json");

    let still_alive = request(&mut stdin, &mut reader, "11", "health", json!({}));
    assert_eq!(still_alive["ok"].as_bool(), Some(true));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
