//! weblogin session: remctl-style packets inside a security context.
//!
//! Phases:
//! - initial packet (`0x51`, empty payload),
//! - context establishment (`0x42` tokens until the context is established),
//! - property check (mutual auth, confidentiality, integrity),
//! - message loop (`0x44` packets carrying wrapped messages).
//!
//! Anything unexpected at the packet or security layer drops the
//! connection without a response. Malformed messages inside an
//! established context are answered and the loop continues.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use oath_protocol::binary_codec::{decode_message, encode_message};
use oath_protocol::packet::{decode_header, encode_packet, HEADER_LEN};
use oath_protocol::{
    AssembledCommand, CommandAssembler, DecodeError, ErrorCode, Flags, Message, Packet,
    ProtocolError,
};

use crate::security::{SecurityContext, SecurityError};

/// How long a read may wait for the next bytes of a packet.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a weblogin session ended early.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for packet")]
    Timeout,

    #[error("packet framing: {0}")]
    Framing(#[from] ProtocolError),

    #[error("client wants unimplemented protocol version 1")]
    LegacyProtocol,

    #[error("packet with invalid flags {got} (expected {expected})")]
    BadFlags { got: Flags, expected: Flags },

    #[error("initial packet carries {0} bytes of payload")]
    InitialPayload(usize),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error("{0} is not enabled")]
    MissingProperty(&'static str),

    #[error("data received without confidentiality protection")]
    NotConfidential,

    #[error("outgoing message rejected: {0}")]
    Encode(ProtocolError),
}

/// Serve one weblogin connection to completion.
///
/// The context is disposed and the stream shut down on every path. The
/// returned error has already been logged.
pub async fn serve<S>(stream: S, context: Box<dyn SecurityContext>) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = Session {
        io: stream,
        ctx: context,
        commands: CommandAssembler::new(),
        running: true,
    };

    debug!("accepting connection");
    let result = session.converse().await;
    match &result {
        Ok(()) => {}
        Err(SessionError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            debug!("connection closed by peer");
        }
        Err(e) => warn!(error = %e, "session aborted"),
    }

    session.ctx.dispose();
    if let Err(e) = session.io.shutdown().await {
        debug!(error = %e, "shutdown failed");
    }
    debug!("connection closed");

    result
}

struct Session<S> {
    io: S,
    ctx: Box<dyn SecurityContext>,
    commands: CommandAssembler,
    running: bool,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn converse(&mut self) -> Result<(), SessionError> {
        self.read_initial().await?;
        self.establish().await?;
        self.check_properties()?;

        let peer = self.ctx.peer_name().unwrap_or_else(|| "<unknown>".to_string());
        info!(initiator = %peer, "security context established");

        while self.running {
            let payload = self.read_message_payload().await?;
            self.dispatch(&payload).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Handshake
    // ------------------------------------------------------------------------

    async fn read_initial(&mut self) -> Result<(), SessionError> {
        let packet = self.read_packet().await?;

        if packet.has_flags(Flags::LEGACY_INITIAL) {
            return Err(SessionError::LegacyProtocol);
        }
        expect_flags(&packet, Flags::INITIAL)?;
        if !packet.payload.is_empty() {
            return Err(SessionError::InitialPayload(packet.payload.len()));
        }
        Ok(())
    }

    async fn establish(&mut self) -> Result<(), SessionError> {
        loop {
            let packet = self.read_packet().await?;
            expect_flags(&packet, Flags::CONTEXT_TOKEN)?;

            if let Some(token) = self.ctx.accept_step(&packet.payload)? {
                self.write_packet(Packet::new(Flags::CONTEXT_TOKEN, token)).await?;
            }

            if self.ctx.is_established() {
                return Ok(());
            }
        }
    }

    fn check_properties(&self) -> Result<(), SessionError> {
        let props = self.ctx.properties();
        if let Some(missing) = props.missing_required() {
            return Err(SessionError::MissingProperty(missing));
        }

        // Older Kerberos implementations cannot negotiate these.
        if !props.replay_detection {
            warn!("replay detection is not enabled");
        }
        if !props.sequence_detection {
            warn!("out-of-sequence detection is not enabled");
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------------

    async fn read_message_payload(&mut self) -> Result<Vec<u8>, SessionError> {
        let packet = self.read_packet().await?;
        expect_flags(&packet, Flags::DATA_TOKEN)?;

        let unwrapped = self.ctx.unwrap(&packet.payload)?;
        if !unwrapped.confidential {
            return Err(SessionError::NotConfidential);
        }
        Ok(unwrapped.data)
    }

    async fn dispatch(&mut self, payload: &[u8]) -> Result<(), SessionError> {
        let msg = match decode_message(payload) {
            Ok(msg) => msg,
            Err(err) => return self.reject(err).await,
        };

        if !msg.message_type().from_client() {
            debug!(ty = ?msg.message_type(), "client sent server-only message");
            return self.send(&Message::error(ErrorCode::UnknownMessage)).await;
        }

        match msg {
            Message::Quit => {
                debug!("client quit");
                self.running = false;
                Ok(())
            }
            Message::NoOp => self.send(&Message::NoOp).await,
            Message::Command(chunk) => match self.commands.push(chunk) {
                Ok(None) => Ok(()),
                Ok(Some(cmd)) => self.run_command(cmd).await,
                Err(err) => {
                    debug!(error = %err, "command rejected");
                    self.send(&Message::error(err.error_code())).await
                }
            },
            Message::Output(_) | Message::Status { .. } | Message::Error(_) | Message::Version { .. } => {
                self.send(&Message::error(ErrorCode::UnknownMessage)).await
            }
        }
    }

    async fn reject(&mut self, err: DecodeError) -> Result<(), SessionError> {
        match err.error_code() {
            Some(code) => {
                debug!(error = %err, "undecodable message");
                self.send(&Message::error(code)).await
            }
            None => {
                info!(error = %err, "client used unknown protocol version");
                self.send(&Message::version()).await
            }
        }
    }

    /// No commands are registered, so every assembled command is unknown.
    async fn run_command(&mut self, cmd: AssembledCommand) -> Result<(), SessionError> {
        let name = cmd
            .args
            .first()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .unwrap_or_default();
        info!(command = %name, args = cmd.args.len(), keep_alive = cmd.keep_alive, "command received");

        self.send(&Message::error(ErrorCode::UnknownCommand)).await?;
        if !cmd.keep_alive {
            self.running = false;
        }
        Ok(())
    }

    async fn send(&mut self, msg: &Message) -> Result<(), SessionError> {
        let mut plain = Vec::with_capacity(64);
        encode_message(msg, &mut plain).map_err(SessionError::Encode)?;
        let wrapped = self.ctx.wrap(&plain)?;
        self.write_packet(Packet::new(Flags::DATA_TOKEN, wrapped)).await
    }

    // ------------------------------------------------------------------------
    // Packets
    // ------------------------------------------------------------------------

    async fn read_packet(&mut self) -> Result<Packet, SessionError> {
        let mut header = [0u8; HEADER_LEN];
        self.read_full(&mut header).await?;
        let (flags, len) = decode_header(&header)?;

        let mut payload = vec![0u8; len];
        self.read_full(&mut payload).await?;
        Ok(Packet::new(flags, payload))
    }

    /// Fill `buf`, giving up if any single read stalls past `IDLE_TIMEOUT`.
    async fn read_full(&mut self, buf: &mut [u8]) -> Result<(), SessionError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = timeout(IDLE_TIMEOUT, self.io.read(&mut buf[filled..]))
                .await
                .map_err(|_| SessionError::Timeout)??;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
            }
            filled += n;
        }
        Ok(())
    }

    async fn write_packet(&mut self, packet: Packet) -> Result<(), SessionError> {
        let mut buf = Vec::with_capacity(HEADER_LEN + packet.payload.len());
        encode_packet(&packet, &mut buf)?;
        self.io.write_all(&buf).await?;
        self.io.flush().await?;
        Ok(())
    }
}

fn expect_flags(packet: &Packet, expected: Flags) -> Result<(), SessionError> {
    if packet.has_flags(expected) {
        Ok(())
    } else {
        Err(SessionError::BadFlags {
            got: packet.flags,
            expected,
        })
    }
}
