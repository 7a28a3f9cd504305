use crate::error::{Result, ScoutError};
use crate::scrapers::transport::Transport;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Handler = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// In-memory transport routing by URL substring.
pub struct MockTransport {
    routes: Vec<(String, Handler)>,
    failures: Mutex<HashMap<String, u32>>,
    latency: Duration,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            failures: Mutex::new(HashMap::new()),
            latency: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn route(self, pattern: &str, body: &str) -> Self {
        let body = body.to_string();
        self.route_fn(pattern, move |_| Ok(body.clone()))
    }

    pub fn route_fn(
        mut self,
        pattern: &str,
        handler: impl Fn(&str) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        self.routes.push((pattern.to_string(), Box::new(handler)));
        self
    }

    /// Fail the first `times` requests matching `pattern` with a transient error.
    pub fn fail_first(self, pattern: &str, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(pattern.to_string(), times);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get_text(&self, url: &str) -> Result<String> {
        self.requests.lock().unwrap().push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures
                .iter_mut()
                .find(|(pattern, remaining)| url.contains(pattern.as_str()) && **remaining > 0)
                .map(|(_, remaining)| remaining)
            {
                *remaining -= 1;
                return Err(ScoutError::TransientNetwork {
                    url: url.to_string(),
                    reason: "HTTP 503".into(),
                });
            }
        }

        match self.routes.iter().find(|(pattern, _)| url.contains(pattern.as_str())) {
            Some((_, handler)) => handler(url),
            None => Err(ScoutError::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
