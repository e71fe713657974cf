use chrono::{DateTime, Utc};
use std::time::Duration;
use telemetry_core::{Identity, ObservationGroup};

use crate::codec;
use crate::error::{PushError, TransportError};
use crate::proto::WriteRequest;
use crate::series;
use crate::timestamp::TimestampResolver;
use crate::transport::{Auth, HttpTransport, Transport};

/// Everything the client needs to know about the receiver; built once at startup.
#[derive(Clone, Debug)]
pub struct RemoteWriteConfig {
    /// The url to send remote write requests to, including the path.
    /// e.g. "https://localhost/api/v1/write"
    pub url: String,

    /// The `job` and `instance` labels added to every series.
    pub identity: Identity,

    pub auth: Auth,

    /// How long to wait for the receiver to respond; `None` waits indefinitely.
    pub timeout: Option<Duration>,

    /// How old a source artifact's modification time may be and still be used
    /// as the sample timestamp.
    pub freshness_window: chrono::Duration,
}

/// The outcome of a successful push.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PushSummary {
    pub series: usize,
    pub encoded_bytes: usize,
    pub compressed_bytes: usize,
}

/// A write request that is ready to send.
#[derive(Debug)]
pub struct PreparedPush {
    pub request: WriteRequest,
    pub body: Vec<u8>,
    pub summary: PushSummary,
}

/// A one-shot remote write client.
pub struct Client {
    identity: Identity,
    freshness_window: chrono::Duration,
    transport: Box<dyn Transport>,
}

impl Client {
    /// Build a client which sends requests over HTTP.
    pub fn new(config: &RemoteWriteConfig) -> Result<Client, TransportError> {
        let transport = HttpTransport::new(&config.url, config.auth.clone(), config.timeout)?;
        Ok(Client::with_transport(config, Box::new(transport)))
    }

    pub fn with_transport(config: &RemoteWriteConfig, transport: Box<dyn Transport>) -> Client {
        Client {
            identity: config.identity.clone(),
            freshness_window: config.freshness_window,
            transport,
        }
    }

    /// Assemble, timestamp, encode and compress a write request without sending it.
    pub fn prepare(
        &self,
        groups: &[ObservationGroup],
        collected_at: DateTime<Utc>,
    ) -> Result<PreparedPush, PushError> {
        let resolver = TimestampResolver::new(collected_at, self.freshness_window);

        let mut timeseries = Vec::with_capacity(groups.iter().map(ObservationGroup::len).sum());
        for group in groups {
            if let Some(modified) = group.source_modified {
                if resolver.group_instant(Some(modified)) != modified {
                    tracing::debug!(
                        "source modified at {} is outside the freshness window; using {}",
                        modified,
                        collected_at
                    );
                }
            }
            let assembled = series::assemble(&group.observations, &self.identity, |obs| {
                resolver.resolve(obs, group.source_modified)
            })?;
            timeseries.extend(assembled);
        }
        series::check_unique(&timeseries)?;

        let request = WriteRequest { timeseries };
        let encoded = codec::encode(&request)?;
        let body = codec::compress(&encoded)?;
        let summary = PushSummary {
            series: request.timeseries.len(),
            encoded_bytes: encoded.len(),
            compressed_bytes: body.len(),
        };
        Ok(PreparedPush {
            request,
            body,
            summary,
        })
    }

    /// Push every observation in `groups` as a single write request.
    ///
    /// A request with no series is still sent; it is a valid no-op.
    pub async fn push(
        &self,
        groups: &[ObservationGroup],
        collected_at: DateTime<Utc>,
    ) -> Result<PushSummary, PushError> {
        let PreparedPush { body, summary, .. } = self.prepare(groups, collected_at)?;
        tracing::debug!(
            "sending {} series ({} bytes, {} compressed)",
            summary.series,
            summary.encoded_bytes,
            summary.compressed_bytes
        );
        self.transport.send(body).await?;
        Ok(summary)
    }
}
