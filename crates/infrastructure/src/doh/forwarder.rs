//! DNS-over-HTTPS forwarder (RFC 8484, POST over HTTP/1.1).
//!
//! ```text
//! POST /dns-query HTTP/1.1
//! Host: cloudflare-dns.com
//! Content-Type: application/dns-message
//! Accept: application/dns-message
//!
//! <raw DNS message bytes>
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use ferrous_doh_application::ports::DohResolver;
use ferrous_doh_domain::dns_message::{build_outbound_query, message_id, parse_doh_response};
use ferrous_doh_domain::{DomainError, ResolverConfig};
use http::header::{ACCEPT, CONTENT_TYPE, HOST};
use http::{Method, Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use super::connector::DohConnector;

pub const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

/// Idle HTTP/1.1 connections kept for reuse.
const MAX_IDLE_CONNECTIONS: usize = 2;

type Sender = SendRequest<Full<Bytes>>;

pub struct DohForwarder {
    connector: Arc<DohConnector>,
    endpoint: Arc<str>,
    authority: String,
    path: String,
    timeout: Duration,
    idle: Mutex<Vec<Sender>>,
}

impl DohForwarder {
    pub fn new(config: &ResolverConfig, connector: Arc<DohConnector>) -> Result<Self, DomainError> {
        let uri: Uri = config.endpoint.parse().map_err(|e| {
            DomainError::InvalidEndpoint(format!("'{}': {}", config.endpoint, e))
        })?;
        let authority = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .ok_or_else(|| DomainError::InvalidEndpoint(format!("'{}' has no host", uri)))?;
        let path = uri
            .path_and_query()
            .map(|p| p.as_str())
            .filter(|p| !p.is_empty())
            .unwrap_or("/")
            .to_string();

        Ok(Self {
            connector,
            endpoint: Arc::clone(&config.endpoint),
            authority,
            path,
            timeout: config.timeout,
            idle: Mutex::new(Vec::new()),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    fn take_pooled(&self) -> Option<Sender> {
        let mut idle = self.idle.lock().unwrap_or_else(|p| p.into_inner());
        while let Some(sender) = idle.pop() {
            if !sender.is_closed() {
                return Some(sender);
            }
        }
        None
    }

    fn return_to_pool(&self, sender: Sender) {
        let mut idle = self.idle.lock().unwrap_or_else(|p| p.into_inner());
        if idle.len() < MAX_IDLE_CONNECTIONS {
            idle.push(sender);
        }
    }

    async fn connect_new(&self) -> Result<Sender, DomainError> {
        let stream = self.connector.connect().await?;
        let (sender, connection) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| {
                DomainError::ResolutionFailed(format!(
                    "HTTP handshake with {} failed: {}",
                    self.authority, e
                ))
            })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "DoH connection closed");
            }
        });

        Ok(sender)
    }

    fn request(&self, body: Bytes) -> Result<Request<Full<Bytes>>, DomainError> {
        Request::builder()
            .method(Method::POST)
            .uri(self.path.as_str())
            .header(HOST, self.authority.as_str())
            .header(CONTENT_TYPE, DNS_MESSAGE_CONTENT_TYPE)
            .header(ACCEPT, DNS_MESSAGE_CONTENT_TYPE)
            .body(Full::new(body))
            .map_err(|e| DomainError::ResolutionFailed(format!("Invalid DoH request: {}", e)))
    }

    async fn send_on(&self, sender: &mut Sender, body: Bytes) -> Result<Bytes, DomainError> {
        sender.ready().await.map_err(|e| {
            DomainError::ResolutionFailed(format!("DoH connection not ready: {}", e))
        })?;

        let response = sender
            .send_request(self.request(body)?)
            .await
            .map_err(|e| {
                DomainError::ResolutionFailed(format!(
                    "DoH request to {} failed: {}",
                    self.endpoint, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::ResolutionFailed(format!(
                "DoH server {} returned HTTP {}: {}",
                self.endpoint,
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .into_body()
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .map_err(|e| {
                DomainError::ResolutionFailed(format!(
                    "Failed to read DoH response from {}: {}",
                    self.endpoint, e
                ))
            })
    }

    /// One HTTP exchange, reusing an idle connection when one is available.
    async fn exchange(&self, query: Bytes) -> Result<Bytes, DomainError> {
        if let Some(mut sender) = self.take_pooled() {
            match self.send_on(&mut sender, query.clone()).await {
                Ok(body) => {
                    self.return_to_pool(sender);
                    return Ok(body);
                }
                Err(e) => {
                    debug!(error = %e, "Pooled DoH connection stale, reconnecting");
                }
            }
        }

        let mut sender = self.connect_new().await?;
        let body = self.send_on(&mut sender, query).await?;
        self.return_to_pool(sender);
        Ok(body)
    }
}

#[async_trait]
impl DohResolver for DohForwarder {
    async fn resolve(&self, domain: &str) -> Result<Vec<Ipv4Addr>, DomainError> {
        let query = build_outbound_query(domain)?;
        let id = message_id(&query);

        debug!(domain = %domain, endpoint = %self.endpoint, "Sending DoH query");

        let body = tokio::time::timeout(self.timeout, self.exchange(Bytes::from(query)))
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: self.endpoint.to_string(),
            })??;

        if message_id(&body) != id {
            return Err(DomainError::ResolutionFailed(format!(
                "DoH answer for {} carries a mismatched transaction id",
                domain
            )));
        }

        let addresses = parse_doh_response(&body);
        debug!(
            domain = %domain,
            answers = addresses.len(),
            response_len = body.len(),
            "DoH response received"
        );
        Ok(addresses)
    }
}
