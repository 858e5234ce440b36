//! Server-list directory client.
//!
//! A separate, short protocol against the directory service (default port
//! 14922): the client sends a version packet and an authentication packet,
//! the directory answers with server descriptors plus site and upgrade URLs,
//! and the connection closes. Frames here are zlib-only with no cipher:
//! `[length: u16 big-endian][zlib payload]`, the payload being the usual
//! newline-separated `[id + 32][body]` batch.

use std::time::Duration;

use bytes::BytesMut;
use reborn_proto::{
    codecs::{PacketReader, write_gchar, write_gstring},
    compression::{self, CompressionType},
    errors::ProtocolError,
};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

use crate::error::ClientError;

/// Version tag the directory protocol speaks.
const LIST_VERSION: &str = "GNW22122";

/// Overall deadline for the whole exchange.
const LIST_DEADLINE: Duration = Duration::from_secs(10);

/// Outbound: version announcement.
const SVC_VERSION: u8 = 0;
/// Outbound: account credentials.
const SVC_AUTH: u8 = 1;

/// Inbound: server descriptor list.
const SVO_SERVERLIST: u8 = 0;
/// Inbound: site URL.
const SVO_SITEURL: u8 = 3;
/// Inbound: upgrade URL.
const SVO_UPGRADEURL: u8 = 4;

/// Fields per server descriptor.
const ENTRY_FIELDS: usize = 9;

/// One game server as described by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    /// Display name.
    pub name: String,
    /// Server type tag (classic, gold, hosted…).
    pub kind: String,
    /// Language tag.
    pub language: String,
    /// Description line.
    pub description: String,
    /// Website URL.
    pub url: String,
    /// Server version string.
    pub version: String,
    /// Current player count.
    pub players: u32,
    /// IP address or host name.
    pub ip: String,
    /// TCP port.
    pub port: u16,
}

/// Everything one directory exchange yields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerListing {
    /// The advertised game servers.
    pub servers: Vec<ServerEntry>,
    /// Community site URL, when sent.
    pub site_url: Option<String>,
    /// Client upgrade URL, when sent.
    pub upgrade_url: Option<String>,
}

/// Frame a packet batch for the directory wire.
fn encode_list_frame(batch: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let payload = compression::compress(CompressionType::Zlib, batch)?;
    let mut frame = Vec::with_capacity(2 + payload.len());
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Parse one server descriptor from a list packet.
fn parse_entry(r: &mut PacketReader<'_>) -> Result<ServerEntry, ProtocolError> {
    let field_count = usize::from(r.gchar()?);
    let mut fields = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        fields.push(r.gstring()?);
    }
    fields.resize(ENTRY_FIELDS, String::new());

    let mut fields = fields.into_iter();
    let mut next = || fields.next().unwrap_or_default();
    Ok(ServerEntry {
        name: next(),
        kind: next(),
        language: next(),
        description: next(),
        url: next(),
        version: next(),
        players: next().parse().unwrap_or(0),
        ip: next(),
        port: next().parse().unwrap_or(reborn_proto::DEFAULT_GAME_PORT),
    })
}

fn parse_batch(batch: &[u8], listing: &mut ServerListing, got_list: &mut bool) {
    for segment in batch.split(|&b| b == b'\n') {
        let Some((&id_byte, body)) = segment.split_first() else {
            continue;
        };
        let mut r = PacketReader::new(body);
        match id_byte.wrapping_sub(32) {
            SVO_SERVERLIST => {
                let Ok(count) = r.gchar() else { continue };
                let mut servers = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    match parse_entry(&mut r) {
                        Ok(entry) => servers.push(entry),
                        Err(e) => {
                            tracing::warn!(error = %e, "malformed server descriptor");
                            break;
                        },
                    }
                }
                listing.servers = servers;
                *got_list = true;
            },
            SVO_SITEURL => listing.site_url = Some(r.rest_string()),
            SVO_UPGRADEURL => listing.upgrade_url = Some(r.rest_string()),
            other => tracing::debug!(id = other, "ignoring directory packet"),
        }
    }
}

/// Build the request batch: version packet plus credentials.
fn request_batch(account: &str, password: &str) -> Vec<u8> {
    let mut batch = Vec::new();
    write_gchar(&mut batch, SVC_VERSION);
    batch.extend_from_slice(LIST_VERSION.as_bytes());
    batch.push(b'\n');
    write_gchar(&mut batch, SVC_AUTH);
    write_gstring(&mut batch, account);
    write_gstring(&mut batch, password);
    batch.push(b'\n');
    batch
}

/// Fetch the server list from a directory service.
///
/// Connects, authenticates, collects descriptors until the directory closes
/// the connection, and returns the listing. Errors when the exchange times
/// out or closes without ever sending a list.
pub async fn fetch_server_list(
    host: &str,
    port: u16,
    account: &str,
    password: &str,
) -> Result<ServerListing, ClientError> {
    let exchange = async {
        let mut stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let frame = encode_list_frame(&request_batch(account, password))?;
        stream.write_all(&frame).await.map_err(|e| ClientError::Transport(e.to_string()))?;
        stream.flush().await.map_err(|e| ClientError::Transport(e.to_string()))?;

        let mut listing = ServerListing::default();
        let mut got_list = false;
        let mut buf = BytesMut::with_capacity(16 * 1024);

        loop {
            // Drain complete frames first.
            while buf.len() >= 2 {
                let declared = usize::from(u16::from_be_bytes([buf[0], buf[1]]));
                if declared == 0 {
                    return Err(ClientError::Protocol(ProtocolError::BadLength));
                }
                if buf.len() < 2 + declared {
                    break;
                }
                let frame = buf.split_to(2 + declared);
                let batch = compression::decompress(CompressionType::Zlib, &frame[2..])?;
                parse_batch(&batch, &mut listing, &mut got_list);
            }

            let read =
                stream.read_buf(&mut buf).await.map_err(|e| ClientError::Transport(e.to_string()))?;
            if read == 0 {
                // Directory closed: the exchange is over.
                if got_list {
                    return Ok(listing);
                }
                return Err(ClientError::Transport(
                    "directory closed without a server list".into(),
                ));
            }
        }
    };

    match timeout(LIST_DEADLINE, exchange).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::ConnectTimeout(LIST_DEADLINE)),
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    fn response_batch() -> Vec<u8> {
        let mut batch = Vec::new();

        write_gchar(&mut batch, SVO_SERVERLIST);
        write_gchar(&mut batch, 2); // two servers
        for (name, players, port) in [("Sanctuary", "41", "14900"), ("Dev World", "3", "14901")] {
            write_gchar(&mut batch, ENTRY_FIELDS as u8);
            for field in [
                name,
                "classic",
                "English",
                "a test world",
                "https://example.org",
                "2.1",
                players,
                "127.0.0.1",
                port,
            ] {
                write_gstring(&mut batch, field);
            }
        }
        batch.push(b'\n');

        write_gchar(&mut batch, SVO_SITEURL);
        batch.extend_from_slice(b"https://reborn.example");
        batch.push(b'\n');
        write_gchar(&mut batch, SVO_UPGRADEURL);
        batch.extend_from_slice(b"https://reborn.example/client");
        batch.push(b'\n');
        batch
    }

    #[tokio::test]
    async fn fetches_and_parses_a_listing() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Read the request frame and sanity-check the version packet.
            let mut len = [0u8; 2];
            socket.read_exact(&mut len).await.unwrap();
            let mut payload = vec![0u8; usize::from(u16::from_be_bytes(len))];
            socket.read_exact(&mut payload).await.unwrap();
            let batch = compression::decompress(CompressionType::Zlib, &payload).unwrap();
            assert_eq!(batch[0], 32); // SVC_VERSION + 32
            assert!(batch.windows(LIST_VERSION.len()).any(|w| w == LIST_VERSION.as_bytes()));

            let frame = encode_list_frame(&response_batch()).unwrap();
            socket.write_all(&frame).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        let listing =
            fetch_server_list("127.0.0.1", addr.port(), "acct", "pw").await.unwrap();
        server.await.unwrap();

        assert_eq!(listing.servers.len(), 2);
        assert_eq!(listing.servers[0].name, "Sanctuary");
        assert_eq!(listing.servers[0].players, 41);
        assert_eq!(listing.servers[1].port, 14_901);
        assert_eq!(listing.site_url.as_deref(), Some("https://reborn.example"));
        assert_eq!(listing.upgrade_url.as_deref(), Some("https://reborn.example/client"));
    }

    #[tokio::test]
    async fn close_without_list_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut scratch = [0u8; 1024];
            let _ = socket.read(&mut scratch).await;
            socket.shutdown().await.unwrap();
        });

        let result = fetch_server_list("127.0.0.1", addr.port(), "acct", "pw").await;
        assert!(matches!(result, Err(ClientError::Transport(_))));
    }
}
