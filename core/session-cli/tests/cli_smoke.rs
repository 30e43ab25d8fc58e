use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tempfile::TempDir;

struct SessionGuard {
    child: Child,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn command(home: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_trailhead-session"));
    command
        .env("HOME", home)
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(home.join("absent.toml"));
    command
}

fn read_json_line(stdout: &mut BufReader<ChildStdout>) -> Value {
    let mut line = String::new();
    let read = stdout.read_line(&mut line).expect("Failed to read stdout");
    assert!(read > 0, "trailhead-session closed stdout early");
    serde_json::from_str(line.trim_end()).expect("Failed to parse stdout line")
}

fn write_line(stdin: &mut ChildStdin, value: Value) {
    serde_json::to_writer(&mut *stdin, &value).expect("Failed to serialize input");
    stdin.write_all(b"\n").expect("Failed to write input");
    stdin.flush().expect("Failed to flush input");
}

#[test]
fn interactive_session_over_stdio() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let child = command(home.path())
        .args(["run", "./lessons/greet.py", "--snapshot"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn trailhead-session");
    let mut guard = SessionGuard { child };

    let mut stdin = guard.child.stdin.take().expect("stdin");
    let mut stdout = BufReader::new(guard.child.stdout.take().expect("stdout"));

    let run = read_json_line(&mut stdout);
    assert_eq!(run["type"], "RUN");
    assert_eq!(run["data"]["module"], "lessons.greet");
    let request_id = run["data"]["request_id"]
        .as_str()
        .expect("request_id")
        .to_string();

    write_line(
        &mut stdin,
        serde_json::json!({"type": "RUNNING", "data": {"request_id": request_id, "pid": 4242}}),
    );
    write_line(
        &mut stdin,
        serde_json::json!({"type": "STDOUT", "data": {"data": "Hello"}}),
    );
    write_line(
        &mut stdin,
        serde_json::json!({"type": "STDOUT", "data": {"data": "Name? ", "is_input_prompt": true}}),
    );
    write_line(&mut stdin, serde_json::json!({"action": "input", "text": "Ada"}));
    write_line(&mut stdin, serde_json::json!({"action": "submit"}));

    let stdin_message = read_json_line(&mut stdout);
    assert_eq!(
        stdin_message,
        serde_json::json!({"type": "STDIN", "data": {"data": "Ada", "pid": 4242}})
    );

    write_line(
        &mut stdin,
        serde_json::json!({"type": "EXIT", "data": {"pid": 4242}}),
    );
    let inspect = read_json_line(&mut stdout);
    assert_eq!(
        inspect,
        serde_json::json!({"type": "INSPECT", "data": {"path": "./lessons/greet.py"}})
    );

    drop(stdin);

    let snapshot = read_json_line(&mut stdout);
    assert_eq!(snapshot["snapshot"]["state"], "EXITED");
    assert_eq!(snapshot["snapshot"]["status"], "Completed");
    let transcript = snapshot["snapshot"]["transcript"]
        .as_array()
        .expect("transcript array");
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0]["type"], "stdout_group");
    assert_eq!(transcript[1]["type"], "stdin");
    assert_eq!(transcript[1]["response"], "Ada");

    let status = guard.child.wait().expect("wait for exit");
    assert!(status.success());
}

#[test]
fn events_file_rerun_and_teardown() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let events = home.path().join("events.jsonl");
    std::fs::write(
        &events,
        [
            r#"{"type":"file_modified","data":{"path":"./other.py"}}"#,
            "not json",
            r#"{"type":"file_modified","data":{"path":"./main.py"}}"#,
            r#"{"type":"RUNNING","data":{"request_id":"stale","pid":9}}"#,
            r#"{"action":"teardown"}"#,
        ]
        .join("\n"),
    )
    .expect("write events");

    let output = command(home.path())
        .args(["run", "./main.py", "--events"])
        .arg(&events)
        .stderr(Stdio::null())
        .output()
        .expect("Failed to run trailhead-session");
    assert!(output.status.success());

    let lines: Vec<Value> = String::from_utf8(output.stdout)
        .expect("utf8 stdout")
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();

    // Initial RUN, then the rerun for ./main.py. Nothing was running, so no KILL.
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|line| line["type"] == "RUN"));
    assert_eq!(lines[1]["data"]["module"], "main");
    assert_ne!(lines[0]["data"]["request_id"], lines[1]["data"]["request_id"]);
}

#[test]
fn missing_events_file_fails() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let status = command(home.path())
        .args(["run", "./main.py", "--events"])
        .arg(home.path().join("missing.jsonl"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("Failed to run trailhead-session");
    assert!(!status.success());
}
