use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error, trace, warn};

use mcp_transport::{
    validate_request_size, validate_response_size, LimitsConfig, Transport, TransportCapabilities,
    TransportError, TransportKind, TransportMessage, TransportMetrics, TransportResult,
    TransportState, TimeoutConfig,
};

type BoxedRead = Pin<Box<dyn AsyncRead + Send + 'static>>;
type BoxedWrite = Pin<Box<dyn AsyncWrite + Send + 'static>>;
type Reader = FramedRead<BufReader<BoxedRead>, LinesCodec>;
type Writer = FramedWrite<BoxedWrite, LinesCodec>;

/// Where this transport's byte streams come from.
enum StreamSource {
    /// The current process's stdin/stdout.
    ProcessStdio,
    /// Raw, already-boxed streams — used for `from_child`/`from_raw`.
    Raw {
        reader: Option<BoxedRead>,
        writer: Option<BoxedWrite>,
    },
}

/// A transport that speaks newline-delimited JSON-RPC over stdin/stdout.
///
/// Unlike Streamable HTTP, a stdio connection has exactly one peer and
/// exactly one logical session for its entire lifetime — there is no
/// multiplexing and no resumption after the pipe closes.
pub struct StdioTransport {
    state: TransportState,
    limits: LimitsConfig,
    timeouts: TimeoutConfig,
    metrics: Arc<mcp_transport::AtomicMetrics>,
    stream_source: Option<StreamSource>,
    writer: Option<Writer>,
    receiver: Option<mpsc::Receiver<TransportMessage>>,
    reader_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("state", &self.state)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl StdioTransport {
    /// Use the current process's stdin/stdout. This is what an MCP server
    /// binary constructs for itself; the client side of the pair instead
    /// uses [`Self::from_child`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: TransportState::Disconnected,
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::fast(),
            metrics: Arc::new(mcp_transport::AtomicMetrics::new()),
            stream_source: Some(StreamSource::ProcessStdio),
            writer: None,
            receiver: None,
            reader_task: None,
        }
    }

    /// Build a transport from a spawned child process's stdin/stdout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotAvailable`] if the child was not spawned
    /// with both `stdin` and `stdout` piped.
    pub fn from_child(child: &mut Child) -> TransportResult<Self> {
        let stdin = child.stdin.take().ok_or_else(|| {
            TransportError::NotAvailable(
                "child process stdin was not piped with Stdio::piped()".to_string(),
            )
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            TransportError::NotAvailable(
                "child process stdout was not piped with Stdio::piped()".to_string(),
            )
        })?;
        Self::from_raw(stdout, stdin)
    }

    /// Build a transport from arbitrary async read/write streams. The
    /// reader is what we receive from, the writer is what we send to —
    /// for a child process that means `(child.stdout, child.stdin)`.
    pub fn from_raw<R, W>(reader: R, writer: W) -> TransportResult<Self>
    where
        R: AsyncRead + Send + 'static,
        W: AsyncWrite + Send + 'static,
    {
        Ok(Self {
            state: TransportState::Disconnected,
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::fast(),
            metrics: Arc::new(mcp_transport::AtomicMetrics::new()),
            stream_source: Some(StreamSource::Raw {
                reader: Some(Box::pin(reader)),
                writer: Some(Box::pin(writer)),
            }),
            writer: None,
            receiver: None,
            reader_task: None,
        })
    }

    /// Override the default size limits.
    #[must_use]
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    fn parse_message(line: &str) -> TransportResult<TransportMessage> {
        let line = line.trim();
        if line.is_empty() {
            return Err(TransportError::SerializationFailed(
                "empty line on stdio".to_string(),
            ));
        }
        // Validate it's well-formed JSON before handing it upstream; the
        // session layer does the typed JSON-RPC parse.
        let _: serde_json::Value = serde_json::from_str(line)?;
        Ok(TransportMessage::new(Bytes::from(line.to_string())))
    }

    /// Per the stdio transport rules, a message MUST NOT contain an
    /// embedded newline — it is the line.
    fn serialize_message(message: &TransportMessage) -> TransportResult<String> {
        let text = std::str::from_utf8(&message.payload)
            .map_err(|e| TransportError::SerializationFailed(e.to_string()))?;
        if text.contains('\n') || text.contains('\r') {
            return Err(TransportError::SerializationFailed(
                "message contains an embedded newline, forbidden on stdio".to_string(),
            ));
        }
        let _: serde_json::Value = serde_json::from_str(text)?;
        Ok(text.to_string())
    }

    fn spawn_reader(&mut self, mut reader: Reader) {
        let (tx, rx) = mpsc::channel(1024);
        let metrics = self.metrics.clone();
        let limits = self.limits.clone();

        let handle = tokio::spawn(async move {
            while let Some(result) = reader.next().await {
                let line = match result {
                    Ok(line) => line,
                    Err(e) => {
                        error!("stdio read failed: {e}");
                        break;
                    }
                };

                if let Err(e) = validate_response_size(line.len(), &limits) {
                    warn!("dropping oversized stdio message: {e}");
                    continue;
                }

                match Self::parse_message(&line) {
                    Ok(message) => {
                        metrics.record_received(message.size() as u64);
                        if tx.try_send(message).is_err() {
                            debug!("stdio receive channel full or closed, dropping message");
                        }
                    }
                    Err(e) => error!("failed to parse stdio message: {e}"),
                }
            }
            trace!("stdio reader task exiting");
        });

        self.receiver = Some(rx);
        self.reader_task = Some(handle);
    }
}

#[async_trait]
impl Transport for StdioTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities::stdio()
    }

    fn state(&self) -> TransportState {
        self.state.clone()
    }

    async fn connect(&mut self) -> TransportResult<()> {
        if matches!(self.state, TransportState::Connected) {
            return Ok(());
        }
        self.state = TransportState::Connecting;

        let source = self.stream_source.take().ok_or(TransportError::NotAvailable(
            "stdio streams already consumed by a prior connect".to_string(),
        ))?;

        let (boxed_reader, boxed_writer): (BoxedRead, BoxedWrite) = match source {
            StreamSource::ProcessStdio => (
                Box::pin(tokio::io::stdin()),
                Box::pin(tokio::io::stdout()),
            ),
            StreamSource::Raw { mut reader, mut writer } => {
                let reader = reader.take().ok_or_else(|| {
                    TransportError::NotAvailable("raw reader already consumed".to_string())
                })?;
                let writer = writer.take().ok_or_else(|| {
                    TransportError::NotAvailable("raw writer already consumed".to_string())
                })?;
                (reader, writer)
            }
        };

        let reader = FramedRead::new(BufReader::new(boxed_reader), LinesCodec::new());
        self.writer = Some(FramedWrite::new(boxed_writer, LinesCodec::new()));
        self.spawn_reader(reader);

        self.metrics.record_connection(true);
        self.state = TransportState::Connected;
        debug!("stdio transport connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        if matches!(self.state, TransportState::Disconnected) {
            return Ok(());
        }
        self.state = TransportState::Disconnecting;
        if let Some(handle) = self.reader_task.take() {
            handle.abort();
        }
        self.writer = None;
        self.receiver = None;
        self.state = TransportState::Disconnected;
        debug!("stdio transport disconnected");
        Ok(())
    }

    async fn send(&mut self, message: TransportMessage) -> TransportResult<()> {
        if !matches!(self.state, TransportState::Connected) {
            return Err(TransportError::NotConnected);
        }

        let line = Self::serialize_message(&message)?;
        validate_request_size(line.len(), &self.limits)?;

        let writer = self
            .writer
            .as_mut()
            .ok_or(TransportError::NotConnected)?;
        writer.send(line.clone()).await.map_err(|e| {
            self.state = TransportState::Failed {
                reason: e.to_string(),
            };
            TransportError::SendFailed(e.to_string())
        })?;

        self.metrics.record_sent(line.len() as u64);
        trace!("sent {} bytes over stdio", line.len());
        Ok(())
    }

    async fn receive(&mut self) -> TransportResult<Option<TransportMessage>> {
        if !matches!(self.state, TransportState::Connected) {
            return Err(TransportError::NotConnected);
        }
        let receiver = self
            .receiver
            .as_mut()
            .ok_or(TransportError::NotConnected)?;
        Ok(receiver.recv().await)
    }

    fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_message_rejects_blank_lines() {
        assert!(StdioTransport::parse_message("   ").is_err());
    }

    #[test]
    fn parse_message_accepts_json_rpc_request() {
        let message = StdioTransport::parse_message(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        )
        .unwrap();
        assert_eq!(message.size(), 41);
    }

    #[test]
    fn serialize_message_rejects_embedded_newlines() {
        let message = TransportMessage::new(Bytes::from_static(b"{\"a\":\"line one\nline two\"}"));
        assert!(StdioTransport::serialize_message(&message).is_err());
    }

    #[tokio::test]
    async fn round_trips_over_a_duplex_pipe() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (server_read, server_write) = tokio::io::split(server_io);

        let mut client = StdioTransport::from_raw(client_read, client_write).unwrap();
        let mut server = StdioTransport::from_raw(server_read, server_write).unwrap();

        client.connect().await.unwrap();
        server.connect().await.unwrap();

        let request = TransportMessage::new(Bytes::from_static(
            br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        ));
        client.send(request).await.unwrap();

        let received = server.receive().await.unwrap().expect("message");
        assert_eq!(received.size(), 41);
    }
}
