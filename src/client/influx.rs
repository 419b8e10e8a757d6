//! InfluxDB v2 HTTP client (comparison baseline)
//!
//! Point writes go to `/api/v2/write` as line protocol, reads go to
//! `/api/v2/query` as flux. Both are plain blocking call-throughs.

use std::fmt::Write as _;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use super::backend::{Backend, RoundTrip};
use crate::utils::{BenchmarkError, ConnectionError, OperationError, ReadSelector, Request};

/// Measurement every benchmark point is written to
pub const MEASUREMENT: &str = "sensor_data";

/// Tag carrying the sensor id
pub const SENSOR_TAG: &str = "sensor_id";

/// Field carrying the sample value
pub const VALUE_FIELD: &str = "value";

/// Connection settings for an InfluxDB v2 server
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub url: String,
    pub token: Option<String>,
    pub org: String,
    pub bucket: String,
    pub request_timeout: Duration,
}

/// A single line-protocol point
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, f64)>,
    timestamp_ns: Option<i64>,
}

impl DataPoint {
    pub fn new(measurement: &str) -> Self {
        Self {
            measurement: measurement.to_string(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp_ns: None,
        }
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push((key.to_string(), value.to_string()));
        self
    }

    pub fn field(mut self, key: &str, value: f64) -> Self {
        self.fields.push((key.to_string(), value));
        self
    }

    pub fn timestamp(mut self, nanos: i64) -> Self {
        self.timestamp_ns = Some(nanos);
        self
    }

    /// Render as one line of InfluxDB line protocol
    pub fn to_line_protocol(&self) -> String {
        let mut line = String::with_capacity(64);
        escape_into(&mut line, &self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            line.push(',');
            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            escape_into(&mut line, value, &[',', '=', ' ']);
        }

        for (i, (key, value)) in self.fields.iter().enumerate() {
            line.push(if i == 0 { ' ' } else { ',' });
            escape_into(&mut line, key, &[',', '=', ' ']);
            let _ = write!(line, "={}", value);
        }

        if let Some(ts) = self.timestamp_ns {
            let _ = write!(line, " {}", ts);
        }

        line
    }
}

fn escape_into(out: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Build the flux query for a sensor read
///
/// Without an explicit range the last hour is scanned, matching the
/// default retention the benchmark writes into.
pub fn sensor_query(bucket: &str, sensor_id: &str, selector: &ReadSelector) -> String {
    let start = selector
        .start
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-1h".to_string());
    let range = match selector.end {
        Some(end) => format!("range(start: {}, stop: {})", start, end),
        None => format!("range(start: {})", start),
    };

    let mut query = format!(
        "from(bucket:\"{}\")\n    |> {}\n    |> filter(fn: (r) => r[\"{}\"] == \"{}\")",
        bucket,
        range,
        SENSOR_TAG,
        sensor_id.replace('\\', "\\\\").replace('"', "\\\"")
    );
    if let Some(every) = selector.downsampling.filter(|d| *d > 0) {
        let _ = write!(
            query,
            "\n    |> aggregateWindow(every: {}s, fn: mean)",
            every
        );
    }
    let _ = write!(query, "\n    |> limit(n:{})", selector.lastx.unwrap_or(100));
    query
}

/// Blocking InfluxDB client; cheap to clone
#[derive(Debug, Clone)]
pub struct InfluxClient {
    http: Client,
    config: InfluxConfig,
}

impl InfluxClient {
    pub fn new(config: InfluxConfig) -> Result<Self, BenchmarkError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    fn authorize(
        &self,
        builder: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.config.token {
            Some(token) => builder.header(AUTHORIZATION, format!("Token {}", token)),
            None => builder,
        }
    }

    /// Write one point (blocking)
    pub fn write_point(&self, point: &DataPoint) -> Result<(), OperationError> {
        let request = self
            .http
            .post(self.endpoint("/api/v2/write"))
            .query(&[
                ("org", self.config.org.as_str()),
                ("bucket", self.config.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(point.to_line_protocol());

        let response = self.authorize(request).send()?;
        check_status(response)
    }

    /// Run a flux query and drain the result
    pub fn query(&self, flux: &str) -> Result<(), OperationError> {
        let request = self
            .http
            .post(self.endpoint("/api/v2/query"))
            .query(&[("org", self.config.org.as_str())])
            .header(CONTENT_TYPE, "application/vnd.flux")
            .header(ACCEPT, "application/csv")
            .body(flux.to_string());

        let response = self.authorize(request).send()?;
        check_status(response)
    }
}

fn check_status(response: reqwest::blocking::Response) -> Result<(), OperationError> {
    let status = response.status();
    // Drain the body so the connection can be reused
    let body = response.text()?;
    if status.is_success() {
        Ok(())
    } else {
        Err(OperationError::Rejected(format!(
            "{}: {}",
            status,
            body.trim()
        )))
    }
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or_default()
}

/// Session handle; shares the client's connection pool
pub struct InfluxSession {
    client: InfluxClient,
}

impl RoundTrip for InfluxSession {
    fn round_trip(&mut self, request: &Request<'_>) -> Result<(), OperationError> {
        match request {
            Request::Write { key, write } => {
                let point = DataPoint::new(MEASUREMENT)
                    .tag(SENSOR_TAG, key)
                    .field(VALUE_FIELD, write.value)
                    .timestamp(now_nanos());
                self.client.write_point(&point)
            }
            Request::Read { key, read } => {
                let flux = sensor_query(&self.client.config.bucket, key, read);
                self.client.query(&flux)
            }
            Request::Subscribe { .. } => Err(OperationError::Unsupported {
                backend: "InfluxDB",
                operation: "subscribe",
            }),
        }
    }
}

impl Backend for InfluxClient {
    type Session = InfluxSession;

    fn name(&self) -> &'static str {
        "InfluxDB"
    }

    /// HTTP connections are pooled lazily, so opening never fails here;
    /// an unreachable server shows up as per-operation failures.
    fn open(&self) -> Result<InfluxSession, ConnectionError> {
        Ok(InfluxSession {
            client: self.clone(),
        })
    }
}
