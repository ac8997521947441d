//! Mock implementations for testing.
//!
//! [`MockHttpClient`] answers GETs from a script and counts calls;
//! [`WarnRecorder`] captures advisory warnings.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_common::{HttpGet, HttpResponse, PlatformError};

#[derive(Debug, Clone)]
enum Scripted {
    Response(HttpResponse),
    Error(String),
}

/// Scripted HTTP client.
///
/// Answers are consumed in order; once the script runs out the last answer
/// repeats. With no script at all every call gets a 404.
#[derive(Debug, Default)]
pub struct MockHttpClient {
    script: Mutex<VecDeque<Scripted>>,
    last: Mutex<Option<Scripted>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    urls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MockHttpClient {
    /// Create a new mock client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a response to the script.
    #[must_use]
    pub fn respond(self, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.push_response(status, body);
        self
    }

    /// Append a transport failure to the script.
    #[must_use]
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.script.lock().push_back(Scripted::Error(message.into()));
        self
    }

    /// Delay every answer by `delay`.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Append a response to the script of a shared client.
    pub fn push_response(&self, status: u16, body: impl Into<Vec<u8>>) {
        self.script
            .lock()
            .push_back(Scripted::Response(HttpResponse::new(status, body)));
    }

    /// Number of GETs issued.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most GETs ever outstanding at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// URLs requested, in order.
    #[must_use]
    pub fn requested_urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    fn next(&self) -> Option<Scripted> {
        let next = self.script.lock().pop_front();
        let mut last = self.last.lock();
        if let Some(next) = next {
            *last = Some(next);
        }
        last.clone()
    }
}

#[async_trait]
impl HttpGet for MockHttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, PlatformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());
        let outstanding = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(outstanding, Ordering::SeqCst);
        let _done = InFlight(&self.in_flight);

        let answer = self.next();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match answer {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Error(message)) => Err(PlatformError::unavailable(message)),
            None => Ok(HttpResponse::new(404, "no scripted response")),
        }
    }
}

/// Decrements the in-flight count when a GET finishes or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Captures warnings emitted through a sink.
#[derive(Debug, Clone, Default)]
pub struct WarnRecorder {
    messages: Arc<Mutex<Vec<String>>>,
}

impl WarnRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that appends to this recorder.
    #[must_use]
    pub fn sink(&self) -> Arc<dyn Fn(&str) + Send + Sync> {
        let messages = Arc::clone(&self.messages);
        Arc::new(move |message: &str| messages.lock().push(message.to_string()))
    }

    /// Warnings recorded so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}
