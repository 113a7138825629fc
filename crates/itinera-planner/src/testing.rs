//! Scripted collaborators and observers for exercising the workflow without
//! network access.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::collaborators::{
    AccommodationSearch, Extraction, ExtractionRequest, Extractor, FlightSearch,
    ItinerarySynthesizer, SynthesisRequest,
};
use crate::error::CollaboratorError;
use crate::progress::{ProgressEvent, TurnObserver};

/// Delay, failure injection and call counting shared by every mock.
#[derive(Debug, Default)]
struct Behavior {
    delay: Option<Duration>,
    error: Mutex<Option<CollaboratorError>>,
    calls: AtomicUsize,
}

impl Behavior {
    async fn enter(&self) -> Result<(), CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        // Single-use: the next call succeeds again.
        let error = self.error.lock().take();
        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Returns queued extractions in order, then an empty one.
#[derive(Debug, Default)]
pub struct MockExtractor {
    responses: Mutex<VecDeque<Extraction>>,
    requests: Mutex<Vec<ExtractionRequest>>,
    behavior: Behavior,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: impl IntoIterator<Item = Extraction>) -> Self {
        let extractor = Self::new();
        extractor.responses.lock().extend(responses);
        extractor
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.behavior.delay = Some(delay);
        self
    }

    pub fn with_error(self, error: CollaboratorError) -> Self {
        self.fail_next(error);
        self
    }

    pub fn push(&self, extraction: Extraction) {
        self.responses.lock().push_back(extraction);
    }

    pub fn fail_next(&self, error: CollaboratorError) {
        *self.behavior.error.lock() = Some(error);
    }

    pub fn call_count(&self) -> usize {
        self.behavior.calls()
    }

    pub fn last_request(&self) -> Option<ExtractionRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> Result<Extraction, CollaboratorError> {
        self.requests.lock().push(request.clone());
        self.behavior.enter().await?;

        let next = self.responses.lock().pop_front();
        Ok(next.unwrap_or_else(|| Extraction {
            reply: "Could you tell me more about your trip?".to_string(),
            ..Default::default()
        }))
    }
}

#[derive(Debug, Default)]
pub struct MockFlightSearch {
    response: String,
    calls: Mutex<Vec<(String, Vec<String>, String)>>,
    behavior: Behavior,
}

impl MockFlightSearch {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.behavior.delay = Some(delay);
        self
    }

    pub fn with_error(self, error: CollaboratorError) -> Self {
        self.fail_next(error);
        self
    }

    pub fn fail_next(&self, error: CollaboratorError) {
        *self.behavior.error.lock() = Some(error);
    }

    pub fn call_count(&self) -> usize {
        self.behavior.calls()
    }

    /// `(origin, destinations, date)` of the most recent call.
    pub fn last_call(&self) -> Option<(String, Vec<String>, String)> {
        self.calls.lock().last().cloned()
    }
}

#[async_trait]
impl FlightSearch for MockFlightSearch {
    async fn search_flights(
        &self,
        origin: &str,
        destinations: &[String],
        date: &str,
    ) -> Result<String, CollaboratorError> {
        self.calls
            .lock()
            .push((origin.to_string(), destinations.to_vec(), date.to_string()));
        self.behavior.enter().await?;
        Ok(self.response.clone())
    }
}

#[derive(Debug, Default)]
pub struct MockAccommodationSearch {
    response: String,
    behavior: Behavior,
}

impl MockAccommodationSearch {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.behavior.delay = Some(delay);
        self
    }

    pub fn with_error(self, error: CollaboratorError) -> Self {
        self.fail_next(error);
        self
    }

    pub fn fail_next(&self, error: CollaboratorError) {
        *self.behavior.error.lock() = Some(error);
    }

    pub fn call_count(&self) -> usize {
        self.behavior.calls()
    }
}

#[async_trait]
impl AccommodationSearch for MockAccommodationSearch {
    async fn search_accommodation(
        &self,
        _destinations: &[String],
        _duration: Option<&str>,
    ) -> Result<String, CollaboratorError> {
        self.behavior.enter().await?;
        Ok(self.response.clone())
    }
}

#[derive(Debug, Default)]
pub struct MockSynthesizer {
    response: String,
    requests: Mutex<Vec<SynthesisRequest>>,
    behavior: Behavior,
}

impl MockSynthesizer {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.behavior.delay = Some(delay);
        self
    }

    pub fn with_error(self, error: CollaboratorError) -> Self {
        self.fail_next(error);
        self
    }

    pub fn fail_next(&self, error: CollaboratorError) {
        *self.behavior.error.lock() = Some(error);
    }

    pub fn call_count(&self) -> usize {
        self.behavior.calls()
    }

    pub fn last_request(&self) -> Option<SynthesisRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl ItinerarySynthesizer for MockSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String, CollaboratorError> {
        self.requests.lock().push(request.clone());
        self.behavior.enter().await?;
        Ok(self.response.clone())
    }
}

/// Keeps every event it is notified of.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    pub fn messages(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(ProgressEvent::message).collect()
    }
}

impl TurnObserver for RecordingObserver {
    fn notify(&self, event: ProgressEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::PartialSlots;

    #[tokio::test]
    async fn test_mock_extractor_queue_then_default() {
        let extractor = MockExtractor::with_responses([Extraction {
            slots: PartialSlots {
                budget: Some("100".into()),
                ..Default::default()
            },
            reply: "first".into(),
        }]);
        let request = ExtractionRequest {
            message: "hi".into(),
            missing: vec![],
            current: Default::default(),
            history: vec![],
        };

        assert_eq!(extractor.extract(&request).await.unwrap().reply, "first");
        let fallback = extractor.extract(&request).await.unwrap();
        assert_eq!(fallback.slots, PartialSlots::default());
        assert_eq!(extractor.call_count(), 2);
    }

    #[tokio::test]
    async fn test_error_is_single_use() {
        let search = MockFlightSearch::new("ok")
            .with_error(CollaboratorError::Unavailable("down".into()));

        let first = search.search_flights("ICN", &["NRT".to_string()], "2026-11-01").await;
        assert!(first.is_err());
        let second = search.search_flights("ICN", &["NRT".to_string()], "2026-11-01").await;
        assert_eq!(second.unwrap(), "ok");
        assert_eq!(search.call_count(), 2);
    }

    #[tokio::test]
    async fn test_with_delay() {
        let synthesizer = MockSynthesizer::new("plan").with_delay(Duration::from_millis(50));
        let start = tokio::time::Instant::now();
        let request = SynthesisRequest::Revision {
            request: "shorter".into(),
            previous_plan: "long".into(),
        };
        synthesizer.synthesize(&request).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(synthesizer.last_request(), Some(request));
    }

    #[test]
    fn test_recording_observer() {
        let observer = RecordingObserver::new();
        observer.notify(ProgressEvent::PlanningStarted);
        assert_eq!(observer.messages(), vec!["All_Details_Fetched"]);
    }
}
