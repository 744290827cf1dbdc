//! dynalogin session: one line-protocol conversation.
//!
//! Flow per connection:
//! - write the greeting,
//! - read a line (idle timeout, length limit),
//! - parse it into a `LineCommand` and execute it,
//! - repeat until QUIT, EOF, a fatal error, or too many errors.
//!
//! The session is generic over the stream so the same code serves TLS,
//! plaintext TCP and in-memory test pipes.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tracing::{debug, info_span, warn};

use oath_core::Validator;
use oath_protocol::line_codec::{format_error, format_reply, parse_command, split_args};
use oath_protocol::wire_types::MAX_LINE_LEN;
use oath_protocol::{LineCommand, LineError, Reply};

/// How long a client may stay silent while a command is expected.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Recoverable errors tolerated before the session is closed.
pub const MAX_ERRORS: u32 = 8;

/// Per-session counters, logged at teardown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub successes: u32,
    pub failures: u32,
    pub errors: u32,
}

enum LineRead {
    Line,
    Eof,
    TooLong,
    TimedOut,
}

struct Session<S> {
    io: BufReader<S>,
    validator: Arc<Validator>,
    stats: SessionStats,
    running: bool,
    /// A CR ended the previous line; swallow one LF if it comes next.
    skip_lf: bool,
}

/// Serve one dynalogin connection to completion.
///
/// Never fails: I/O errors end the session and are logged.
pub async fn serve<S>(stream: S, validator: Arc<Validator>) -> SessionStats
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = Session {
        io: BufReader::new(stream),
        validator,
        stats: SessionStats::default(),
        running: true,
        skip_lf: false,
    };

    debug!("accepting connection");
    if let Err(e) = session.converse().await {
        warn!(error = %e, "I/O error");
    }
    if let Err(e) = session.io.shutdown().await {
        debug!(error = %e, "shutdown failed");
    }

    let stats = session.stats;
    debug!(
        successes = stats.successes,
        failures = stats.failures,
        errors = stats.errors,
        "connection closed"
    );
    stats
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn converse(&mut self) -> io::Result<()> {
        self.write(&format_reply(Reply::Greeting)).await?;

        let mut line = Vec::with_capacity(MAX_LINE_LEN);
        while self.running {
            match self.read_line(&mut line).await? {
                LineRead::Line => {}
                LineRead::Eof => break,
                LineRead::TimedOut => {
                    return self.fatal(&LineError::new(Reply::Timeout)).await;
                }
                LineRead::TooLong => {
                    let err = LineError::with_message(Reply::SyntaxError, "Line too long");
                    return self.fatal(&err).await;
                }
            }

            match parse_command(&split_args(&line)) {
                Ok(cmd) => self.execute(cmd).await?,
                Err(err) => self.recoverable(&err).await?,
            }
        }

        Ok(())
    }

    async fn execute(&mut self, cmd: LineCommand) -> io::Result<()> {
        match cmd {
            LineCommand::Udata { mode, user, code } => {
                let span = info_span!("udata", %mode, %user);
                let valid = span.in_scope(|| self.validator.validate(&user, mode, &code));

                if valid {
                    self.stats.successes += 1;
                    self.write(&format_reply(Reply::Ok)).await
                } else {
                    self.stats.failures += 1;
                    self.write(&format_reply(Reply::Unauthorized)).await
                }
            }
            LineCommand::Quit => {
                self.running = false;
                self.write(&format_reply(Reply::Goodbye)).await
            }
        }
    }

    /// Report a recoverable error, escalating once the error budget is spent.
    async fn recoverable(&mut self, err: &LineError) -> io::Result<()> {
        self.stats.errors += 1;
        if self.stats.errors < MAX_ERRORS {
            return self.write(&format_error(err, false)).await;
        }

        self.write(&format_error(err, true)).await?;
        self.fatal(&LineError::new(Reply::TooManyErrors)).await
    }

    async fn fatal(&mut self, err: &LineError) -> io::Result<()> {
        debug!(code = err.reply.code(), message = %err.message, "fatal protocol error");
        self.running = false;
        self.write(&format_error(err, false)).await
    }

    async fn write(&mut self, reply: &str) -> io::Result<()> {
        self.io.write_all(reply.as_bytes()).await?;
        self.io.flush().await
    }

    /// Read one line into `line`, terminator stripped.
    ///
    /// CR, LF and CRLF all terminate a line. At most `MAX_LINE_LEN` bytes
    /// are consumed per line, terminator included. Each wait for more input
    /// is bounded by `IDLE_TIMEOUT`.
    async fn read_line(&mut self, line: &mut Vec<u8>) -> io::Result<LineRead> {
        line.clear();
        loop {
            let available = match timeout(IDLE_TIMEOUT, self.io.fill_buf()).await {
                Ok(read) => read?,
                Err(_) => return Ok(LineRead::TimedOut),
            };
            if available.is_empty() {
                if !line.is_empty() {
                    debug!(bytes = line.len(), "premature end of command");
                }
                return Ok(LineRead::Eof);
            }

            if self.skip_lf {
                self.skip_lf = false;
                if available[0] == b'\n' {
                    self.io.consume(1);
                    continue;
                }
            }

            let room = MAX_LINE_LEN - line.len();
            let window = &available[..available.len().min(room)];

            match window.iter().position(|&b| b == b'\r' || b == b'\n') {
                Some(pos) => {
                    line.extend_from_slice(&window[..pos]);
                    self.skip_lf = window[pos] == b'\r';
                    self.io.consume(pos + 1);
                    return Ok(LineRead::Line);
                }
                None => {
                    let taken = window.len();
                    line.extend_from_slice(window);
                    self.io.consume(taken);
                    if line.len() >= MAX_LINE_LEN {
                        return Ok(LineRead::TooLong);
                    }
                }
            }
        }
    }
}
