//! Frame encoding and decoding
//!
//! Pure framing, no connection state. Payload-bearing frames carry a
//! 4-byte big-endian length followed by exactly that many bytes; reads
//! accumulate until the declared length is satisfied, a short read is
//! never treated as a complete payload.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

use super::{OpCode, HANDSHAKE_LEN, PROTOCOL_VERSION};

/// One decoded protocol frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Keep-alive
    Heartbeat,
    /// Work order with its raw JSON payload
    TaskSubmit { payload: String },
    /// Terminal success outcome
    TaskSuccess,
    /// Terminal failure outcome carrying the diagnostic trace
    TaskFail { trace: String },
    /// Unconditional shutdown command
    TaskKill,
}

impl Frame {
    /// The op code this frame is tagged with
    pub fn op_code(&self) -> OpCode {
        match self {
            Frame::Heartbeat => OpCode::Heartbeat,
            Frame::TaskSubmit { .. } => OpCode::TaskSubmit,
            Frame::TaskSuccess => OpCode::TaskSuccess,
            Frame::TaskFail { .. } => OpCode::TaskFail,
            Frame::TaskKill => OpCode::TaskKill,
        }
    }

    /// Encode this frame into wire bytes
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Frame::Heartbeat | Frame::TaskSuccess | Frame::TaskKill => {
                vec![self.op_code().as_u8()]
            }
            Frame::TaskSubmit { payload } => encode_with_payload(OpCode::TaskSubmit, payload),
            Frame::TaskFail { trace } => encode_with_payload(OpCode::TaskFail, trace),
        }
    }
}

fn encode_with_payload(op: OpCode, text: &str) -> Vec<u8> {
    let body = text.as_bytes();
    let mut buf = Vec::with_capacity(1 + 4 + body.len());
    buf.push(op.as_u8());
    buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
    buf.extend_from_slice(body);
    buf
}

/// Encode the handshake frame: task_id:8, pid:4, version:1
pub fn encode_handshake(task_id: i64, pid: u32) -> [u8; HANDSHAKE_LEN] {
    let mut buf = [0u8; HANDSHAKE_LEN];
    buf[0..8].copy_from_slice(&task_id.to_be_bytes());
    buf[8..12].copy_from_slice(&pid.to_be_bytes());
    buf[12] = PROTOCOL_VERSION;
    buf
}

/// Read one manager-to-worker frame from the connection.
///
/// An op code outside the protocol is a [`Error::ProtocolViolation`];
/// the violating byte is preserved in the error for diagnostics.
/// Outcome op codes (TASK_SUCCESS, TASK_FAIL) only ever flow worker to
/// manager, so they are violations too, flagged on the op byte alone
/// without waiting for a payload that will never arrive.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let op_byte = reader.read_u8().await.map_err(map_read_err)?;
    let op = OpCode::from_u8(op_byte).ok_or(Error::ProtocolViolation { op_code: op_byte })?;

    match op {
        OpCode::Heartbeat => Ok(Frame::Heartbeat),
        OpCode::TaskKill => Ok(Frame::TaskKill),
        OpCode::TaskSubmit => {
            let payload = read_text_payload(reader).await?;
            Ok(Frame::TaskSubmit { payload })
        }
        OpCode::TaskSuccess | OpCode::TaskFail => {
            Err(Error::ProtocolViolation { op_code: op_byte })
        }
    }
}

/// Read a 4-byte length prefix followed by exactly that many bytes
pub async fn read_block<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await.map_err(map_read_err)? as usize;
    let mut buf = vec![0u8; len];
    // read_exact loops over partial reads until the buffer is full
    reader.read_exact(&mut buf).await.map_err(map_read_err)?;
    Ok(buf)
}

/// Write a payload with an 8-byte big-endian length prefix and flush
pub async fn write_block8<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_u64(payload.len() as u64)
        .await
        .map_err(map_write_err)?;
    writer.write_all(payload).await.map_err(map_write_err)?;
    writer.flush().await.map_err(map_write_err)?;
    Ok(())
}

async fn read_text_payload<R>(reader: &mut R) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let bytes = read_block(reader).await?;
    String::from_utf8(bytes).map_err(|e| Error::ProtocolMalformed {
        message: format!("payload is not valid UTF-8: {}", e),
    })
}

fn map_read_err(e: std::io::Error) -> Error {
    Error::connection_lost(format!("read failed: {}", e))
}

fn map_write_err(e: std::io::Error) -> Error {
    Error::connection_lost(format!("write failed: {}", e))
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
