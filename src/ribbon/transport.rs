use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::warn;

use crate::config::ServerConfig;
use crate::error::{RibbonError, RibbonResult};

// A failed attempt, classified so the retry loop knows whether another
// attempt is worthwhile.
struct AttemptError {
    transient: bool,
    // a 2xx response whose body fails to decode is a data problem,
    // not an availability problem
    malformed: bool,
    detail: String,
}

/// HTTP access to one backend service.  Composes, once at
/// construction: the request timeout, a process-wide minimum
/// inter-call interval for this service, and bounded retry with a
/// fixed delay on transient failures (5xx, connect, timeout).
pub struct Backend {
    service: &'static str,
    client: reqwest::Client,
    retry_count: u32,
    retry_delay: Duration,
    min_call_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Backend {
    pub fn new(service: &'static str, config: &ServerConfig) -> Backend {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .unwrap_or_else(|err| panic!("failed to build HTTP client for {}: {}", service, err));

        Backend {
            service,
            client,
            retry_count: config.retry_count,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            min_call_interval: Duration::from_millis(config.min_call_interval_ms),
            last_call: Mutex::new(None),
        }
    }

    // Block until the shared rate gate admits another call to this
    // service.  The lock is held across the wait so concurrent callers
    // are admitted one interval apart.
    async fn admit(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let next_allowed = previous + self.min_call_interval;
            let now = Instant::now();
            if next_allowed > now {
                sleep(next_allowed - now).await;
            }
        }
        *last_call = Some(Instant::now());
    }

    async fn attempt<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)])
                                          -> Result<T, AttemptError>
    {
        let result = self.client.get(url).query(query).send().await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                return Err(AttemptError {
                    transient: err.is_timeout() || err.is_connect(),
                    malformed: false,
                    detail: format!("request failed: {}", err),
                });
            },
        };

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError {
                transient: status.is_server_error(),
                malformed: false,
                detail: format!("HTTP status {}", status),
            });
        }

        response.json().await.map_err(|err| AttemptError {
            // retrying won't help here
            transient: false,
            malformed: true,
            detail: format!("bad payload: {}", err),
        })
    }

    /// GET the given URL and deserialize the JSON response, waiting on
    /// the rate gate before every attempt.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)])
                                               -> RibbonResult<T>
    {
        let mut attempt_number = 0;

        loop {
            self.admit().await;

            match self.attempt(url, query).await {
                Ok(value) => return Ok(value),
                Err(attempt_error) => {
                    if attempt_error.transient && attempt_number < self.retry_count {
                        attempt_number += 1;
                        warn!("retrying {} call ({}/{}): {}",
                              self.service, attempt_number, self.retry_count,
                              attempt_error.detail);
                        sleep(self.retry_delay).await;
                    } else if attempt_error.malformed {
                        return Err(RibbonError::UpstreamData {
                            service: self.service,
                            detail: attempt_error.detail,
                        });
                    } else {
                        return Err(RibbonError::UpstreamUnavailable {
                            service: self.service,
                            detail: attempt_error.detail,
                        });
                    }
                },
            }
        }
    }
}
