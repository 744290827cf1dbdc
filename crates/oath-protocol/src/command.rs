//! Reassembly of multi-message weblogin commands.
//!
//! A command may be split across several `MESSAGE_COMMAND`s:
//!
//! - `Complete`     : whole command, parse immediately
//! - `Incomplete`   : first chunk, start buffering
//! - `Continuation` : middle chunk, must follow `Incomplete`/`Continuation`
//! - `Final`        : last chunk, must follow `Incomplete`/`Continuation`
//!
//! The keep-alive / continue-status octets are already stripped by the
//! message decoder, so the chunks concatenate directly into:
//!
//! ```text
//! [0..4]   argument count (u32 BE)
//! then per argument:
//!   [+0..+4] length (u32 BE)
//!   [+4..]   bytes
//! ```

use thiserror::Error;

use crate::binary_codec::{read_u32_be, Command, ContinueStatus};
use crate::wire_types::ErrorCode;

/// Upper bound on buffered command data across all chunks.
pub const MAX_COMMAND_DATA: usize = 1 << 20;

/// Upper bound on the argument count of one command.
pub const MAX_COMMAND_ARGS: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("continuation without a command in progress")]
    Unexpected,

    #[error("command data exceeds {MAX_COMMAND_DATA} bytes")]
    TooMuchData,

    #[error("argument count {0} exceeds {MAX_COMMAND_ARGS}")]
    TooManyArgs(usize),

    #[error("malformed command: {0}")]
    Malformed(&'static str),
}

impl AssemblyError {
    /// Error code reported back to the client.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AssemblyError::Unexpected => ErrorCode::UnexpectedMessage,
            AssemblyError::TooMuchData => ErrorCode::TooMuchData,
            AssemblyError::TooManyArgs(_) => ErrorCode::TooManyArgs,
            AssemblyError::Malformed(_) => ErrorCode::BadCommand,
        }
    }
}

/// A fully reassembled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledCommand {
    /// Keep-alive flag of the last chunk.
    pub keep_alive: bool,
    pub args: Vec<Vec<u8>>,
}

/// Per-connection continuation buffer.
#[derive(Debug, Default)]
pub struct CommandAssembler {
    pending: Option<Vec<u8>>,
}

impl CommandAssembler {
    pub fn new() -> Self {
        CommandAssembler::default()
    }

    /// Whether a multi-part command is being buffered.
    pub fn in_progress(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed one `MESSAGE_COMMAND`.
    ///
    /// Returns `Ok(None)` while more chunks are expected. Any error drops the
    /// buffered data.
    pub fn push(&mut self, cmd: Command) -> Result<Option<AssembledCommand>, AssemblyError> {
        let Command {
            keep_alive,
            status,
            rest,
        } = cmd;

        let data = match status {
            ContinueStatus::Complete => {
                self.pending = None;
                rest
            }
            ContinueStatus::Incomplete => {
                self.pending = None;
                check_size(rest.len())?;
                self.pending = Some(rest);
                return Ok(None);
            }
            ContinueStatus::Continuation | ContinueStatus::Final => {
                let mut buf = self.pending.take().ok_or(AssemblyError::Unexpected)?;
                check_size(buf.len() + rest.len())?;
                buf.extend_from_slice(&rest);
                if status == ContinueStatus::Continuation {
                    self.pending = Some(buf);
                    return Ok(None);
                }
                buf
            }
        };

        check_size(data.len())?;
        let args = parse_args(&data)?;
        Ok(Some(AssembledCommand { keep_alive, args }))
    }
}

fn check_size(len: usize) -> Result<(), AssemblyError> {
    if len > MAX_COMMAND_DATA {
        return Err(AssemblyError::TooMuchData);
    }
    Ok(())
}

/// Parse `argc` followed by `argc` length-prefixed arguments.
pub fn parse_args(data: &[u8]) -> Result<Vec<Vec<u8>>, AssemblyError> {
    if data.len() < 4 {
        return Err(AssemblyError::Malformed("argument count truncated"));
    }
    let argc = read_u32_be(&data[0..4]) as usize;
    if argc == 0 {
        return Err(AssemblyError::Malformed("no arguments"));
    }
    if argc > MAX_COMMAND_ARGS {
        return Err(AssemblyError::TooManyArgs(argc));
    }

    let mut args = Vec::with_capacity(argc);
    let mut offset = 4;
    for _ in 0..argc {
        let len_bytes = data
            .get(offset..offset + 4)
            .ok_or(AssemblyError::Malformed("argument length truncated"))?;
        let len = read_u32_be(len_bytes) as usize;
        offset += 4;

        let arg = data
            .get(offset..offset + len)
            .ok_or(AssemblyError::Malformed("argument truncated"))?;
        args.push(arg.to_vec());
        offset += len;
    }

    if offset != data.len() {
        return Err(AssemblyError::Malformed("trailing data after arguments"));
    }

    Ok(args)
}

/// Build the argument block for `args` (client side / tests).
pub fn encode_args<A: AsRef<[u8]>>(args: &[A]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(args.len() as u32).to_be_bytes());
    for arg in args {
        let arg = arg.as_ref();
        out.extend_from_slice(&(arg.len() as u32).to_be_bytes());
        out.extend_from_slice(arg);
    }
    out
}
