#![allow(dead_code)]
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;

pub const TEST_HOSTNAME: &str = "localhost";

#[derive(Debug, Clone, Copy)]
pub enum MockReply {
    Answer(Ipv4Addr),
    NoAnswer,
    Status(u16),
    WrongId,
}

/// A DoH server over TLS with a freshly minted self-signed certificate.
pub struct MockDohServer {
    addr: SocketAddr,
    certificate: Vec<u8>,
    requests: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockDohServer {
    pub async fn start(reply: MockReply) -> Self {
        let certified = rcgen::generate_simple_self_signed(vec![TEST_HOSTNAME.to_string()]).unwrap();
        let cert_der: CertificateDer<'static> = certified.cert.der().clone();
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
            certified.key_pair.serialize_der(),
        ));

        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der.clone()], key_der)
            .unwrap();
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let requests_task = Arc::clone(&requests);
        let connections_task = Arc::clone(&connections);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    accepted = listener.accept() => {
                        let Ok((tcp, _)) = accepted else { continue };
                        let acceptor = acceptor.clone();
                        let requests = Arc::clone(&requests_task);
                        let connections = Arc::clone(&connections_task);
                        tokio::spawn(async move {
                            // A client that rejects the certificate aborts here.
                            let Ok(stream) = acceptor.accept(tcp).await else { return };
                            connections.fetch_add(1, Ordering::SeqCst);
                            serve_connection(stream, reply, requests).await;
                        });
                    }
                }
            }
        });

        Self {
            addr,
            certificate: cert_der.as_ref().to_vec(),
            requests,
            connections,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn endpoint(&self) -> String {
        format!("https://{}:{}/dns-query", TEST_HOSTNAME, self.addr.port())
    }

    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    /// Request heads (request line plus headers) in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Connections that completed the TLS handshake.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockDohServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn serve_connection<S>(mut stream: S, reply: MockReply, requests: Arc<Mutex<Vec<String>>>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let (head_end, content_length) = loop {
            if let Some(pos) = find_head_end(&buf) {
                let head = String::from_utf8_lossy(&buf[..pos]).to_string();
                break (pos + 4, content_length(&head));
            }
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        };

        while buf.len() < head_end + content_length {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }

        let head = String::from_utf8_lossy(&buf[..head_end - 4]).to_string();
        let query: Vec<u8> = buf[head_end..head_end + content_length].to_vec();
        buf.drain(..head_end + content_length);
        requests.lock().unwrap().push(head);

        let response = match reply {
            MockReply::Status(code) => format!(
                "HTTP/1.1 {} Mock\r\nContent-Length: 0\r\n\r\n",
                code
            )
            .into_bytes(),
            other => {
                let body = dns_answer(&query, other);
                let mut out = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/dns-message\r\nContent-Length: {}\r\n\r\n",
                    body.len()
                )
                .into_bytes();
                out.extend_from_slice(&body);
                out
            }
        };

        if stream.write_all(&response).await.is_err() || stream.flush().await.is_err() {
            return;
        }
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

fn dns_answer(query: &[u8], reply: MockReply) -> Vec<u8> {
    let mut out = Vec::new();
    match reply {
        MockReply::WrongId => {
            let id = u16::from_be_bytes([query[0], query[1]]).wrapping_add(1);
            out.extend_from_slice(&id.to_be_bytes());
        }
        _ => out.extend_from_slice(&query[0..2]),
    }
    out.extend_from_slice(&[0x81, 0x80, 0x00, 0x01]);

    let address = match reply {
        MockReply::Answer(addr) => Some(addr),
        MockReply::WrongId => Some(Ipv4Addr::new(192, 0, 2, 1)),
        MockReply::NoAnswer | MockReply::Status(_) => None,
    };

    out.extend_from_slice(&(address.is_some() as u16).to_be_bytes());
    out.extend_from_slice(&[0, 0, 0, 0]);
    out.extend_from_slice(&query[12..]);

    if let Some(addr) = address {
        out.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x3C, 0x00, 0x04]);
        out.extend_from_slice(&addr.octets());
    }
    out
}
