//! Shared helpers for integration tests
//!
//! A scripted task manager listening on a loopback port, plus frame
//! helpers over std::net so test scripts stay synchronous.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;

pub const OP_HEARTBEAT: u8 = 0x01;
pub const OP_TASK_SUBMIT: u8 = 0x02;
pub const OP_TASK_SUCCESS: u8 = 0x03;
pub const OP_TASK_FAIL: u8 = 0x04;
pub const OP_TASK_KILL: u8 = 0x05;

/// Decoded handshake fields
pub struct Handshake {
    pub task_id: i64,
    pub pid: u32,
    pub version: u8,
}

/// One-connection scripted task manager
pub struct MockManager<T: Send + 'static> {
    pub port: u16,
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> MockManager<T> {
    /// Bind a listener and run `script` against the first connection
    pub fn start<F>(script: F) -> Self
    where
        F: FnOnce(TcpStream) -> T + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            script(stream)
        });
        Self { port, handle }
    }

    /// Wait for the script to finish and return its result
    pub fn join(self) -> T {
        self.handle.join().unwrap()
    }
}

/// Read and decode the 13-byte handshake
pub fn read_handshake(stream: &mut TcpStream) -> Handshake {
    let mut buf = [0u8; 13];
    stream.read_exact(&mut buf).unwrap();
    Handshake {
        task_id: i64::from_be_bytes(buf[0..8].try_into().unwrap()),
        pid: u32::from_be_bytes(buf[8..12].try_into().unwrap()),
        version: buf[12],
    }
}

/// Send a TASK_SUBMIT frame carrying a JSON payload
pub fn send_submit(stream: &mut TcpStream, json: &str) {
    let mut frame = vec![OP_TASK_SUBMIT];
    frame.extend_from_slice(&(json.len() as u32).to_be_bytes());
    frame.extend_from_slice(json.as_bytes());
    stream.write_all(&frame).unwrap();
    stream.flush().unwrap();
}

/// Send a TASK_KILL frame
pub fn send_kill(stream: &mut TcpStream) {
    stream.write_all(&[OP_TASK_KILL]).unwrap();
    stream.flush().unwrap();
}

/// Send a raw op code byte
pub fn send_op(stream: &mut TcpStream, op: u8) {
    stream.write_all(&[op]).unwrap();
    stream.flush().unwrap();
}

/// Read one frame from the worker: the op code plus the payload for
/// payload-bearing frames
pub fn read_frame(stream: &mut TcpStream) -> (u8, Option<Vec<u8>>) {
    let mut op = [0u8; 1];
    stream.read_exact(&mut op).unwrap();
    match op[0] {
        OP_TASK_SUBMIT | OP_TASK_FAIL => {
            let mut len = [0u8; 4];
            stream.read_exact(&mut len).unwrap();
            let mut payload = vec![0u8; u32::from_be_bytes(len) as usize];
            stream.read_exact(&mut payload).unwrap();
            (op[0], Some(payload))
        }
        _ => (op[0], None),
    }
}

/// Read frames until something other than a heartbeat arrives
pub fn next_non_heartbeat(stream: &mut TcpStream) -> (u8, Option<Vec<u8>>) {
    loop {
        let (op, payload) = read_frame(stream);
        if op != OP_HEARTBEAT {
            return (op, payload);
        }
    }
}
