//! Transport for stream gateways that speak the Kafka REST Proxy v2 API,
//! using the binary embedded format (record values travel as base64).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use streamlat_common::topic::qualify;
use streamlat_common::{ConsumerSettings, ErrorResponse, ProducerSettings, Result, StreamError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{Consumer, PendingBatch, Producer, Record};

const BINARY_V2: &str = "application/vnd.kafka.binary.v2+json";
const KAFKA_V2: &str = "application/vnd.kafka.v2+json";

/// Added to the broker-side poll timeout to bound the whole HTTP round trip.
const POLL_GRACE: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct ProduceRequest {
    records: Vec<ProduceRecord>,
}

#[derive(Serialize)]
struct ProduceRecord {
    value: String,
}

#[derive(Deserialize)]
struct ProduceResponse {
    #[serde(default)]
    offsets: Vec<ProduceOffset>,
}

#[derive(Deserialize)]
struct ProduceOffset {
    #[serde(default)]
    error_code: Option<i32>,
    #[serde(default)]
    error: Option<String>,
}

/// Producer that POSTs batches to `/topics/{topic}`.
pub struct RestProducer {
    pub settings: ProducerSettings,
    base_url: Url,
    http_client: reqwest::Client,
    pending: PendingBatch,
}

impl RestProducer {
    pub fn new(base_url: &str, settings: ProducerSettings) -> Result<Self> {
        let base_url = parse_url(base_url)?;
        let pending = PendingBatch::new(settings.batch_size);
        Ok(Self {
            settings,
            base_url,
            http_client: reqwest::Client::new(),
            pending,
        })
    }

    /// Build the produce URL for `topic`, qualified with the default stream when bare.
    pub fn build_topic_url(&self, topic: &str) -> Result<Url> {
        let topic = qualify(&self.settings.default_stream, topic);
        join_segments(&self.base_url, &["topics", &topic])
    }

    /// Number of records queued but not yet sent.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    async fn send(&self, topic: &str, payloads: Vec<Vec<u8>>) -> Result<()> {
        let url = self.build_topic_url(topic)?;
        let count = payloads.len();
        let body = ProduceRequest {
            records: payloads
                .iter()
                .map(|p| ProduceRecord { value: STANDARD.encode(p) })
                .collect(),
        };
        let body = serde_json::to_vec(&body)
            .map_err(|e| StreamError::MalformedMessage(e.to_string()))?;

        let response = self
            .http_client
            .post(url)
            .header(CONTENT_TYPE, BINARY_V2)
            .header(ACCEPT, KAFKA_V2)
            .body(body)
            .send()
            .await
            .map_err(|e| StreamError::network(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(parse_error_response(status, response).await);
        }

        let acks = response
            .json::<ProduceResponse>()
            .await
            .map_err(|e| StreamError::network(&e))?;

        // The gateway acknowledges per record; a single failed record fails the send.
        if let Some(failed) = acks.offsets.iter().find(|o| o.error_code.is_some()) {
            return Err(StreamError::Broker {
                code: failed.error_code.unwrap_or_default(),
                message: failed.error.clone().unwrap_or_default(),
            });
        }

        debug!(topic, count, "Batch acknowledged");
        Ok(())
    }
}

impl Producer for RestProducer {
    async fn produce(&mut self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let topic = qualify(&self.settings.default_stream, topic);
        if self.pending.push(topic, payload) {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        for (topic, payloads) in self.pending.drain_by_topic() {
            self.send(&topic, payloads).await?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct CreateConsumerRequest<'a> {
    name: &'a str,
    format: &'static str,
    #[serde(rename = "auto.offset.reset")]
    auto_offset_reset: &'static str,
    #[serde(rename = "auto.commit.enable")]
    auto_commit_enable: &'static str,
    #[serde(rename = "auto.commit.interval.ms")]
    auto_commit_interval_ms: String,
}

/// Consumer instance handle returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsumerInstance {
    pub instance_id: String,
    pub base_uri: String,
}

#[derive(Serialize)]
struct SubscriptionRequest<'a> {
    topics: &'a [String],
}

#[derive(Deserialize)]
struct ConsumedRecord {
    topic: String,
    #[serde(default)]
    value: Option<String>,
    partition: i32,
    offset: i64,
}

/// Consumer group member backed by a gateway consumer instance.
///
/// One fetch may return many records; they are buffered and handed out one
/// per [`Consumer::poll`].
pub struct RestConsumer {
    pub settings: ConsumerSettings,
    instance: Option<ConsumerInstance>,
    http_client: reqwest::Client,
    buffered: VecDeque<Record>,
}

impl RestConsumer {
    /// Create a consumer instance in `settings.group_id`.
    pub async fn connect(base_url: &str, settings: ConsumerSettings) -> Result<Self> {
        let base_url = parse_url(base_url)?;
        let url = join_segments(&base_url, &["consumers", &settings.group_id])?;
        let name = format!("streamlat-{}", Uuid::new_v4());

        let body = CreateConsumerRequest {
            name: &name,
            format: "binary",
            auto_offset_reset: settings.offset_reset.as_str(),
            auto_commit_enable: "true",
            auto_commit_interval_ms: settings.auto_commit_interval_ms.to_string(),
        };
        let body = serde_json::to_vec(&body)
            .map_err(|e| StreamError::MalformedMessage(e.to_string()))?;

        let http_client = reqwest::Client::new();
        let response = http_client
            .post(url)
            .header(CONTENT_TYPE, KAFKA_V2)
            .body(body)
            .send()
            .await
            .map_err(|e| StreamError::network(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(parse_error_response(status, response).await);
        }

        let instance = response
            .json::<ConsumerInstance>()
            .await
            .map_err(|e| StreamError::network(&e))?;

        info!(group = %settings.group_id, instance = %instance.instance_id, "Consumer instance created");

        Ok(Self {
            settings,
            instance: Some(instance),
            http_client,
            buffered: VecDeque::new(),
        })
    }

    /// The live instance, or `None` after [`Consumer::close`].
    pub fn instance(&self) -> Option<&ConsumerInstance> {
        self.instance.as_ref()
    }

    fn instance_url(&self, segment: Option<&str>) -> Result<Url> {
        let instance = self.instance.as_ref().ok_or(StreamError::ConsumerClosed)?;
        let base = parse_url(&instance.base_uri)?;
        match segment {
            Some(segment) => join_segments(&base, &[segment]),
            None => Ok(base),
        }
    }
}

impl Consumer for RestConsumer {
    async fn subscribe(&mut self, topics: &[String]) -> Result<()> {
        let url = self.instance_url(Some("subscription"))?;
        let body = serde_json::to_vec(&SubscriptionRequest { topics })
            .map_err(|e| StreamError::MalformedMessage(e.to_string()))?;

        let response = self
            .http_client
            .post(url)
            .header(CONTENT_TYPE, KAFKA_V2)
            .body(body)
            .send()
            .await
            .map_err(|e| StreamError::network(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(parse_error_response(status, response).await);
        }

        info!(?topics, "Subscribed");
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Option<Record>> {
        if let Some(record) = self.buffered.pop_front() {
            return Ok(Some(record));
        }

        let mut url = self.instance_url(Some("records"))?;
        url.query_pairs_mut()
            .append_pair("timeout", &timeout.as_millis().to_string());

        let response = match self
            .http_client
            .get(url)
            .header(ACCEPT, BINARY_V2)
            .timeout(timeout + POLL_GRACE)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Ok(None),
            Err(e) => return Err(StreamError::network(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(parse_error_response(status, response).await);
        }

        let fetched = response
            .json::<Vec<ConsumedRecord>>()
            .await
            .map_err(|e| StreamError::network(&e))?;

        for record in fetched {
            let payload = match record.value.map(|value| STANDARD.decode(value)) {
                Some(Ok(payload)) => payload,
                Some(Err(e)) => {
                    warn!(topic = %record.topic, offset = record.offset, "Skipping record, value is not base64: {e}");
                    continue;
                }
                None => Vec::new(),
            };
            self.buffered.push_back(Record {
                topic: record.topic,
                partition: record.partition,
                offset: record.offset,
                payload,
            });
        }

        Ok(self.buffered.pop_front())
    }

    async fn close(&mut self) -> Result<()> {
        let url = match self.instance_url(None) {
            Ok(url) => url,
            Err(StreamError::ConsumerClosed) => return Ok(()),
            Err(e) => return Err(e),
        };
        self.instance = None;
        self.buffered.clear();

        let response = self
            .http_client
            .delete(url)
            .header(CONTENT_TYPE, KAFKA_V2)
            .send()
            .await
            .map_err(|e| StreamError::network(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(parse_error_response(status, response).await);
        }

        info!("Consumer instance closed");
        Ok(())
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| StreamError::Config(format!("invalid URL {raw:?}: {e}")))
}

/// Append path segments to `base`, percent-encoding each one (so a
/// stream-qualified topic keeps its `/` inside a single segment).
fn join_segments(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| StreamError::Config(format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn parse_error_response(status: StatusCode, response: reqwest::Response) -> StreamError {
    match response.json::<ErrorResponse>().await {
        Ok(body) => StreamError::Broker { code: body.error_code, message: body.message },
        Err(_) => StreamError::HttpError(status.as_u16(), format!("Broker returned status: {status}")),
    }
}
