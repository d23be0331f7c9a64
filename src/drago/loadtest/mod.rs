// SPDX-License-Identifier: MIT

//! Load generator for the trigger endpoint
//!
//! Fires a fixed number of POST requests with bounded concurrency and reports
//! throughput, success rate and latency percentiles.

use futures::stream::{self, StreamExt};
use std::fmt;
use std::time::{Duration, Instant};
use url::Url;

#[derive(Debug, Clone)]
pub struct LoadTestConfig {
    pub url: Url,
    pub requests: usize,
    pub concurrency: usize,
    pub payload: String,
}

impl LoadTestConfig {
    pub fn new(
        url: &str,
        requests: usize,
        concurrency: usize,
        payload: impl Into<String>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: Url::parse(url)?,
            requests,
            concurrency: concurrency.max(1),
            payload: payload.into(),
        })
    }
}

/// One request's outcome
#[derive(Debug, Clone, Copy)]
struct Sample {
    latency: Duration,
    accepted: bool,
}

#[derive(Debug, Clone)]
pub struct LoadTestReport {
    pub total: usize,
    pub concurrency: usize,
    pub elapsed: Duration,
    pub successes: usize,
    pub errors: usize,
    /// Sorted ascending
    pub latencies: Vec<Duration>,
}

impl LoadTestReport {
    pub fn requests_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        }
    }

    pub fn success_rate(&self) -> f64 {
        percentage(self.successes, self.total)
    }

    pub fn error_rate(&self) -> f64 {
        percentage(self.errors, self.total)
    }

    pub fn average(&self) -> Duration {
        average(&self.latencies)
    }

    pub fn p95(&self) -> Duration {
        percentile(&self.latencies, 0.95)
    }

    pub fn p99(&self) -> Duration {
        percentile(&self.latencies, 0.99)
    }
}

impl fmt::Display for LoadTestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Load Test Results:")?;
        writeln!(f, "Total Requests: {}", self.total)?;
        writeln!(f, "Concurrency: {}", self.concurrency)?;
        writeln!(f, "Total Time: {:?}", self.elapsed)?;
        writeln!(f, "Requests/sec: {:.2}", self.requests_per_second())?;
        writeln!(f, "Success: {} ({:.2}%)", self.successes, self.success_rate())?;
        writeln!(f, "Errors: {} ({:.2}%)", self.errors, self.error_rate())?;
        writeln!(f, "Average Latency: {:?}", self.average())?;
        writeln!(f, "P95 Latency: {:?}", self.p95())?;
        write!(f, "P99 Latency: {:?}", self.p99())
    }
}

/// Run the load test. Only `202 Accepted` counts as a success.
pub async fn run(config: &LoadTestConfig) -> Result<LoadTestReport, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    log::info!(
        "Sending {} requests to {} with concurrency {}",
        config.requests,
        config.url,
        config.concurrency
    );

    let started = Instant::now();
    let samples: Vec<Sample> = stream::iter(0..config.requests)
        .map(|_| send(&client, config))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;
    let elapsed = started.elapsed();

    let successes = samples.iter().filter(|s| s.accepted).count();
    let mut latencies: Vec<Duration> = samples.iter().map(|s| s.latency).collect();
    latencies.sort_unstable();

    Ok(LoadTestReport {
        total: config.requests,
        concurrency: config.concurrency,
        elapsed,
        successes,
        errors: samples.len() - successes,
        latencies,
    })
}

async fn send(client: &reqwest::Client, config: &LoadTestConfig) -> Sample {
    let started = Instant::now();
    let result = client
        .post(config.url.clone())
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(config.payload.clone())
        .send()
        .await;

    let accepted = match result {
        Ok(response) => response.status() == reqwest::StatusCode::ACCEPTED,
        Err(e) => {
            log::debug!("Request failed: {}", e);
            false
        }
    };

    Sample {
        latency: started.elapsed(),
        accepted,
    }
}

/// Element at `floor(len * p)` of a sorted slice, clamped to the last one
pub fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let index = (sorted.len() as f64 * p).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

pub fn average(latencies: &[Duration]) -> Duration {
    if latencies.is_empty() {
        return Duration::ZERO;
    }
    let total: Duration = latencies.iter().sum();
    total / latencies.len() as u32
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
