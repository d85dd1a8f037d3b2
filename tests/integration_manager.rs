//! Integration tests for the task manager session
//!
//! Each test runs the worker binary against a scripted task manager
//! and checks the wire traffic and exit code: handshake → heartbeats →
//! submission → terminal outcome.

mod common;

use std::time::Duration;

use assert_cmd::Command;
use common::*;

fn worker_cmd() -> Command {
    let mut cmd = Command::cargo_bin("taskbridge-worker").unwrap();
    cmd.timeout(Duration::from_secs(20));
    cmd.env("TASKBRIDGE_HEARTBEAT_INTERVAL_SECS", "1");
    cmd
}

fn run_args(port: u16, task_id: i64) -> Vec<String> {
    vec![
        "--quiet".to_string(),
        "run".to_string(),
        "--host".to_string(),
        "127.0.0.1".to_string(),
        "--port".to_string(),
        port.to_string(),
        "--task-id".to_string(),
        task_id.to_string(),
    ]
}

#[test]
fn test_handshake_then_success_outcome() {
    let manager = MockManager::start(|mut stream| {
        let handshake = read_handshake(&mut stream);
        send_submit(
            &mut stream,
            r#"{"entry_point":"demo.OkTask","packages":""}"#,
        );
        let (op, _) = next_non_heartbeat(&mut stream);
        (handshake, op)
    });

    worker_cmd()
        .args(run_args(manager.port, 42))
        .assert()
        .success();

    let (handshake, op) = manager.join();
    assert_eq!(handshake.task_id, 42);
    assert!(handshake.pid > 0);
    assert_eq!(handshake.version, 0x02);
    assert_eq!(op, OP_TASK_SUCCESS);
}

#[test]
fn test_failing_task_reports_trace() {
    let manager = MockManager::start(|mut stream| {
        read_handshake(&mut stream);
        send_submit(
            &mut stream,
            r#"{"entry_point":"demo.FailTask","packages":""}"#,
        );
        next_non_heartbeat(&mut stream)
    });

    worker_cmd()
        .args(run_args(manager.port, 43))
        .assert()
        .success();

    let (op, payload) = manager.join();
    assert_eq!(op, OP_TASK_FAIL);
    let trace = String::from_utf8(payload.unwrap()).unwrap();
    assert!(trace.contains("execute failure"));
    assert!(trace.contains("demo.FailTask"));
}

#[test]
fn test_unknown_entry_point_reports_failure() {
    let manager = MockManager::start(|mut stream| {
        read_handshake(&mut stream);
        send_submit(
            &mut stream,
            r#"{"entry_point":"missing.Task","packages":""}"#,
        );
        next_non_heartbeat(&mut stream)
    });

    worker_cmd()
        .args(run_args(manager.port, 44))
        .assert()
        .success();

    let (op, payload) = manager.join();
    assert_eq!(op, OP_TASK_FAIL);
    let trace = String::from_utf8(payload.unwrap()).unwrap();
    assert!(trace.contains("missing.Task"));
}

#[test]
fn test_kill_command_exits_cleanly() {
    let manager = MockManager::start(|mut stream| {
        read_handshake(&mut stream);
        send_kill(&mut stream);
        // the worker must close without a terminal frame; only
        // heartbeats may still be in flight
        loop {
            let mut op = [0u8; 1];
            match std::io::Read::read_exact(&mut stream, &mut op) {
                Ok(()) => {
                    if op[0] != OP_HEARTBEAT {
                        return Some(op[0]);
                    }
                }
                Err(_) => return None,
            }
        }
    });

    worker_cmd()
        .args(run_args(manager.port, 45))
        .assert()
        .success();

    assert_eq!(manager.join(), None);
}

#[test]
fn test_heartbeats_continue_while_task_executes() {
    let manager = MockManager::start(|mut stream| {
        read_handshake(&mut stream);
        // a long-running submission must not stall the heartbeat loop
        send_submit(
            &mut stream,
            r#"{"entry_point":"demo.SleepTask","packages":""}"#,
        );
        let mut heartbeats = 0;
        while heartbeats < 2 {
            let (op, _) = read_frame(&mut stream);
            if op == OP_HEARTBEAT {
                heartbeats += 1;
            }
        }
        send_kill(&mut stream);
        heartbeats
    });

    worker_cmd()
        .args(run_args(manager.port, 46))
        .assert()
        .success();

    assert!(manager.join() >= 2);
}

#[test]
fn test_unknown_opcode_is_a_protocol_violation() {
    let manager = MockManager::start(|mut stream| {
        read_handshake(&mut stream);
        send_op(&mut stream, 0x7f);
    });

    worker_cmd()
        .args(run_args(manager.port, 47))
        .assert()
        .code(40);

    manager.join();
}

#[test]
fn test_bare_fail_opcode_is_a_protocol_violation() {
    let manager = MockManager::start(|mut stream| {
        read_handshake(&mut stream);
        // no length or trace follows; the worker must flag the op
        // byte without waiting for a payload
        send_op(&mut stream, OP_TASK_FAIL);
    });

    worker_cmd()
        .args(run_args(manager.port, 50))
        .assert()
        .code(40);

    manager.join();
}

#[test]
fn test_outcome_frame_from_manager_is_a_protocol_violation() {
    let manager = MockManager::start(|mut stream| {
        read_handshake(&mut stream);
        // TASK_SUCCESS only ever flows worker to manager
        send_op(&mut stream, OP_TASK_SUCCESS);
    });

    worker_cmd()
        .args(run_args(manager.port, 48))
        .assert()
        .code(40);

    manager.join();
}

#[test]
fn test_connection_refused_is_a_connection_error() {
    // bind then drop so the port is free but unserved
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    worker_cmd().args(run_args(port, 49)).assert().code(30);
}

#[test]
fn test_task_id_is_required() {
    worker_cmd()
        .args([
            "--quiet",
            "run",
            "--host",
            "127.0.0.1",
            "--port",
            "21000",
        ])
        .assert()
        .code(10)
        .stderr(predicates::str::contains("task id"));
}
