#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};

/// Run the binary with `args`, feeding `stdin`, in a scrubbed environment
/// holding only PATH, HOME, a scratch log directory and `envs`.
pub fn run_cli(args: &[&str], stdin: &str, envs: &[(&str, &str)]) -> (i32, String, String) {
    let logs = tempfile::tempdir().unwrap();
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hookrelay"));
    cmd.args(args)
        .env_clear()
        .env("PATH", std::env::var("PATH").unwrap_or_default())
        .env("HOME", std::env::var("HOME").unwrap_or_default())
        .env("CLAUDE_HOOKS_LOG_DIR", logs.path())
        .envs(envs.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().expect("failed to spawn binary");

    // The child may exit without reading stdin; a broken pipe is fine.
    let _ = child.stdin.as_mut().unwrap().write_all(stdin.as_bytes());
    drop(child.stdin.take());

    let output = child.wait_with_output().unwrap();
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

/// Write a transcript (one JSON value per line) into `dir`.
pub fn write_transcript(dir: &Path, lines: &[serde_json::Value]) -> PathBuf {
    let path = dir.join("transcript.jsonl");
    let body: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    std::fs::write(&path, body.join("\n")).unwrap();
    path
}

pub fn user_line(text: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "user",
        "sessionId": "test-session",
        "message": { "role": "user", "content": text }
    })
}

pub fn assistant_line(text: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "assistant",
        "sessionId": "test-session",
        "message": {
            "role": "assistant",
            "model": "claude-sonnet-4-20250514",
            "content": [{ "type": "text", "text": text }],
            "usage": { "input_tokens": 10, "output_tokens": 20 }
        }
    })
}

pub fn stop_input(transcript: &Path, cwd: &Path) -> String {
    serde_json::json!({
        "hook_event_name": "Stop",
        "session_id": "test-session",
        "transcript_path": transcript,
        "cwd": cwd,
        "stop_hook_active": false
    })
    .to_string()
}

pub fn prompt_input(prompt: &str, cwd: &Path) -> String {
    serde_json::json!({
        "hook_event_name": "UserPromptSubmit",
        "session_id": "test-session",
        "transcript_path": "/tmp/t.jsonl",
        "cwd": cwd,
        "permission_mode": "default",
        "prompt": prompt
    })
    .to_string()
}

/// A Bot API stand-in answering one request. The handle yields the JSON
/// body that was posted.
pub fn bot_api_stub(status: &'static str, reply: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = v.trim().parse().unwrap();
            }
            if line == "\r\n" || line.is_empty() {
                break;
            }
        }
        let mut body = vec![0; content_length];
        reader.read_exact(&mut body).unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
            reply.len()
        );
        reader.get_mut().write_all(response.as_bytes()).unwrap();
        String::from_utf8(body).unwrap()
    });
    (base, handle)
}

/// Everything the binary logged into `dir`.
pub fn read_logs(dir: &Path) -> String {
    let mut logs = String::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        logs.push_str(&std::fs::read_to_string(entry.unwrap().path()).unwrap());
    }
    logs
}
