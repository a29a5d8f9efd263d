//! TCP connection handler
//!
//! Handles individual client connections: line framing over the raw
//! stream, classification of inbound lines, and bidirectional
//! communication with the ChatServer actor.

use std::io;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};
use crate::server::ServerCommand;
use crate::types::ClientId;

/// Longest accepted input line; anything beyond is a decode error
const MAX_LINE_LENGTH: usize = 8192;

/// Outbound queue depth per client. A peer that stalls past this many
/// undelivered lines is disconnected by the dispatch pass.
const OUTBOUND_QUEUE_SIZE: usize = 64;

/// Handle a new TCP connection
///
/// Frames the stream into newline-delimited lines, registers the client
/// with the ChatServer, and runs the read/write halves until either side
/// ends, then signals disconnect.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let (mut sink, mut lines) = framed.split();

    // Generate client ID
    let client_id = ClientId::new();
    info!("Client {} connected from {}", client_id, peer_addr);

    // Create channel for server -> client messages
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE_SIZE);

    // Register with ChatServer
    if cmd_tx
        .send(ServerCommand::Connect {
            client_id,
            sender: msg_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register client {} - server closed", client_id);
        return Err(AppError::ChannelSend);
    }

    // Clone cmd_tx for read task
    let cmd_tx_read = cmd_tx.clone();

    // Spawn read task (lines -> ServerCommand)
    let read_task = tokio::spawn(async move {
        while let Some(result) = lines.next().await {
            match result {
                Ok(line) => {
                    let line = line.trim();
                    // Blank lines carry nothing
                    if line.is_empty() {
                        continue;
                    }
                    let cmd = client_message_to_command(client_id, ClientMessage::parse(line));
                    if cmd_tx_read.send(cmd).await.is_err() {
                        debug!("Server closed, ending read task for {}", client_id);
                        break;
                    }
                }
                // A malformed line is dropped; the stream stays usable
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!("Client {} sent an overlong line, discarding", client_id);
                }
                Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!("Client {} sent invalid UTF-8, discarding", client_id);
                }
                Err(LinesCodecError::Io(e)) => {
                    error!("Read error for {}: {}", client_id, e);
                    return Err(AppError::Io(e));
                }
            }
        }
        debug!("Read task ended for {}", client_id);
        Ok(())
    });

    // Spawn write task (ServerMessage -> socket). Ends when the server
    // drops this client's sender (after /bye or teardown) and the queue
    // has drained, so BYE is the last line out.
    let write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            if sink.send(msg.to_string()).await.is_err() {
                debug!("Socket send failed, ending write task");
                break;
            }
        }
        debug!("Write task ended for client");

        let _ = sink.close().await;
    });

    // Wait for either task to complete; a fatal read error surfaces here
    let result = tokio::select! {
        res = read_task => {
            debug!("Read task completed for {}", client_id);
            res.unwrap_or(Ok(()))
        }
        _ = write_task => {
            debug!("Write task completed for {}", client_id);
            Ok(())
        }
    };

    // Send disconnect command; a no-op at the server if /bye already
    // tore this client down
    let _ = cmd_tx.send(ServerCommand::Disconnect { client_id }).await;

    info!("Client {} disconnected", client_id);

    result
}

/// Convert a classified line to a ServerCommand
fn client_message_to_command(client_id: ClientId, msg: ClientMessage) -> ServerCommand {
    match msg {
        ClientMessage::Nick(name) => ServerCommand::Nick { client_id, name },
        ClientMessage::Join(room) => ServerCommand::Join { client_id, room },
        ClientMessage::Leave => ServerCommand::Leave { client_id },
        ClientMessage::Bye => ServerCommand::Bye { client_id },
        ClientMessage::Priv { to, text } => ServerCommand::Priv { client_id, to, text },
        ClientMessage::Chat(text) => ServerCommand::Chat { client_id, text },
        ClientMessage::Invalid => ServerCommand::Invalid { client_id },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::tcp::OwnedReadHalf;
    use tokio::net::TcpListener;

    use crate::server::ChatServer;

    /// Start the actor plus an accept loop on an ephemeral port
    async fn start_server() -> SocketAddr {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        tokio::spawn(ChatServer::new(cmd_rx).run());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let cmd_tx = cmd_tx.clone();
                tokio::spawn(handle_connection(stream, cmd_tx));
            }
        });
        addr
    }

    async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> String {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(1), reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .expect("read failed");
        line.trim_end().to_string()
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_dropped_and_connection_survives() {
        let addr = start_server().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        // A non-UTF-8 line, a blank line, then a valid command: only the
        // command gets a reply, on the same still-open connection
        write_half.write_all(&[0xff, 0xfe, 0xfd, b'\n']).await.unwrap();
        write_half.write_all(b"   \n").await.unwrap();
        write_half.write_all(b"/nick alice\n").await.unwrap();

        assert_eq!(read_line(&mut reader).await, "OK");
    }

    #[tokio::test]
    async fn test_overlong_line_is_discarded_and_connection_survives() {
        let addr = start_server().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut overlong = vec![b'a'; MAX_LINE_LENGTH + 128];
        overlong.push(b'\n');
        write_half.write_all(&overlong).await.unwrap();
        write_half.write_all(b"/nick bob\n").await.unwrap();

        assert_eq!(read_line(&mut reader).await, "OK");
    }

    #[tokio::test]
    async fn test_transport_failure_frees_the_nickname() {
        let addr = start_server().await;

        let stream = TcpStream::connect(addr).await.unwrap();
        // Linger 0 turns the close below into an abortive reset
        stream.set_linger(Some(Duration::ZERO)).unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        write_half.write_all(b"/nick carol\n").await.unwrap();
        assert_eq!(read_line(&mut reader).await, "OK");

        drop(write_half);
        drop(reader);

        // The server tears the client down on the read error; its
        // nickname becomes available again. Teardown is asynchronous,
        // so retry until it lands.
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut reply = String::new();
        for _ in 0..50 {
            write_half.write_all(b"/nick carol\n").await.unwrap();
            reply = read_line(&mut reader).await;
            if reply == "OK" {
                break;
            }
            assert_eq!(reply, "ERROR");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(reply, "OK");
    }
}
