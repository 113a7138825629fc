//! The per-turn workflow.
//!
//! ```text
//!                 ┌──────────────── RevisionPlan / skip ───────────────┐
//!                 │                                                    ▼
//!  entry ──► GatherInfo ──complete──► SearchFlights ────────┐   CompileItinerary ──► Done
//!                 │          └──────► SearchAccommodation ──┴──(join)──┘
//!                 └──incomplete──► end of turn
//! ```
//!
//! Routing decisions are pure functions over [`Stage`] and [`Route`]; the
//! [`Planner`] only executes them.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use crate::collaborators::{Collaborators, ExtractionRequest, SynthesisRequest};
use crate::error::{CollaboratorError, PlannerError};
use crate::progress::{ProgressEvent, TurnObserver};
use crate::session::{PlanMode, Role, SessionState};
use crate::slots::{merge, missing_fields, Slots};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    GatherInfo,
    SearchFlights,
    SearchAccommodation,
    CompileItinerary,
    Done,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::GatherInfo => "gather_info",
            Stage::SearchFlights => "search_flights",
            Stage::SearchAccommodation => "search_accommodation",
            Stage::CompileItinerary => "compile_itinerary",
            Stage::Done => "done",
        }
    }

    pub fn progress_message(self) -> &'static str {
        match self {
            Stage::GatherInfo => "Analyzing your request...",
            Stage::SearchFlights => "Searching for the best flights...",
            Stage::SearchAccommodation => "Searching for hotels and attractions...",
            Stage::CompileItinerary => "Compiling your final itinerary...",
            Stage::Done => "Done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where control goes after a stage finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    To(Stage),
    /// Run every branch concurrently, then continue at `join` once all of
    /// them have finished.
    FanOut { branches: [Stage; 2], join: Stage },
    /// The turn is over.
    End,
}

const RESEARCH: Route = Route::FanOut {
    branches: [Stage::SearchFlights, Stage::SearchAccommodation],
    join: Stage::CompileItinerary,
};

/// First stage of a turn.
pub fn entry_stage(mode: PlanMode, skip_gathering: bool) -> Stage {
    if mode == PlanMode::RevisionPlan || skip_gathering {
        Stage::CompileItinerary
    } else {
        Stage::GatherInfo
    }
}

pub fn after_gather(complete: bool) -> Route {
    if complete {
        RESEARCH
    } else {
        Route::End
    }
}

/// Transition table. `complete` only matters for [`Stage::GatherInfo`].
pub fn next_route(stage: Stage, complete: bool) -> Route {
    match stage {
        Stage::GatherInfo => after_gather(complete),
        Stage::SearchFlights | Stage::SearchAccommodation => Route::To(Stage::CompileItinerary),
        Stage::CompileItinerary => Route::To(Stage::Done),
        Stage::Done => Route::End,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnInput {
    pub text: String,
    /// Replaces the session's mode when present.
    pub mode: Option<PlanMode>,
    /// Jump straight to synthesis with whatever slots are known.
    pub skip_gathering: bool,
}

impl TurnInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Follow-up question or finished itinerary.
    pub reply: String,
    /// Stage the turn stopped at: [`Stage::GatherInfo`] while slots are
    /// missing, [`Stage::Done`] once a plan was written.
    pub final_stage: Stage,
}

const DEFAULT_HISTORY_WINDOW: usize = 20;

/// Runs turns against caller-owned session state. Holds no per-session
/// data, so one instance serves every connection.
pub struct Planner {
    collaborators: Collaborators,
    history_window: usize,
}

impl Planner {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Execute one turn for `input` against `session`.
    ///
    /// On error the slots merged by earlier turns are left as they were;
    /// the user message is still recorded in history.
    pub async fn run_turn(
        &self,
        session: &mut SessionState,
        input: TurnInput,
        observer: &dyn TurnObserver,
    ) -> Result<TurnOutcome, PlannerError> {
        if let Some(mode) = input.mode {
            session.mode = mode;
        }
        session.touch();
        session.push_history(Role::User, input.text.as_str());

        let mut stage = entry_stage(session.mode, input.skip_gathering);
        let mut reply = String::new();

        tracing::info!(
            session_key = %session.key,
            mode = ?session.mode,
            entry = %stage,
            "turn started"
        );

        loop {
            let complete = match stage {
                Stage::GatherInfo => {
                    reply = self.gather_info(session, &input.text, observer).await?;
                    session.all_details_complete
                }
                Stage::CompileItinerary => {
                    reply = self.compile(session, &input.text, observer).await?;
                    false
                }
                // Searches only run through the fan-out below.
                Stage::SearchFlights | Stage::SearchAccommodation | Stage::Done => false,
            };

            match next_route(stage, complete) {
                Route::To(next) => stage = next,
                Route::FanOut { branches, join } => {
                    observer.notify(ProgressEvent::PlanningStarted);
                    self.research(session, &branches, observer).await;
                    stage = join;
                }
                Route::End => break,
            }
        }

        tracing::info!(session_key = %session.key, stage = %stage, "turn finished");
        Ok(TurnOutcome {
            reply,
            final_stage: stage,
        })
    }

    async fn gather_info(
        &self,
        session: &mut SessionState,
        message: &str,
        observer: &dyn TurnObserver,
    ) -> Result<String, PlannerError> {
        observer.notify(ProgressEvent::Stage(Stage::GatherInfo));

        let request = ExtractionRequest {
            message: message.to_string(),
            missing: missing_fields(&session.slots),
            current: session.slots.clone(),
            history: session.recent_history(self.history_window).to_vec(),
        };

        let extraction = self
            .collaborators
            .extractor
            .extract(&request)
            .await
            .map_err(PlannerError::collaborator(Stage::GatherInfo))?;

        let (merged, complete) = merge(&session.slots, &extraction.slots);
        session.slots = merged;
        session.all_details_complete = complete;
        session.push_history(Role::Assistant, extraction.reply.as_str());

        tracing::debug!(
            session_key = %session.key,
            complete,
            missing = ?missing_fields(&session.slots),
            "slots merged"
        );
        Ok(extraction.reply)
    }

    /// Run the search branches concurrently over one snapshot of the slots
    /// and write their results after all have finished. A failed branch
    /// leaves its output empty.
    async fn research(
        &self,
        session: &mut SessionState,
        branches: &[Stage],
        observer: &dyn TurnObserver,
    ) {
        let snapshot = session.slots.clone();
        let results = join_all(
            branches
                .iter()
                .map(|stage| self.search(*stage, &snapshot, observer)),
        )
        .await;

        for (stage, result) in branches.iter().zip(results) {
            let output = match result {
                Ok(summary) => Some(summary),
                Err(err) => {
                    tracing::warn!(
                        session_key = %session.key,
                        stage = %stage,
                        error = %err,
                        "search failed, continuing without it"
                    );
                    None
                }
            };
            match stage {
                Stage::SearchFlights => session.stage_outputs.flight_info = output,
                Stage::SearchAccommodation => session.stage_outputs.accommodation_info = output,
                _ => {}
            }
        }
    }

    async fn search(
        &self,
        stage: Stage,
        slots: &Slots,
        observer: &dyn TurnObserver,
    ) -> Result<String, CollaboratorError> {
        observer.notify(ProgressEvent::Stage(stage));

        let destinations = slots.destination.as_deref().unwrap_or_default();
        match stage {
            Stage::SearchFlights => {
                let (Some(origin), Some(date)) =
                    (slots.departure.as_deref(), slots.start_date.as_deref())
                else {
                    return Err(CollaboratorError::InvalidInput(
                        "flight search needs a departure and a start date".to_string(),
                    ));
                };
                if destinations.is_empty() {
                    return Err(CollaboratorError::InvalidInput(
                        "flight search needs a destination".to_string(),
                    ));
                }
                self.collaborators
                    .flights
                    .search_flights(origin, destinations, date)
                    .await
            }
            Stage::SearchAccommodation => {
                if destinations.is_empty() {
                    return Err(CollaboratorError::InvalidInput(
                        "accommodation search needs a destination".to_string(),
                    ));
                }
                self.collaborators
                    .accommodation
                    .search_accommodation(destinations, slots.duration.as_deref())
                    .await
            }
            other => Err(CollaboratorError::InvalidInput(format!(
                "{other} is not a search stage"
            ))),
        }
    }

    async fn compile(
        &self,
        session: &mut SessionState,
        message: &str,
        observer: &dyn TurnObserver,
    ) -> Result<String, PlannerError> {
        let request = match session.mode {
            PlanMode::NewPlan => SynthesisRequest::NewPlan {
                slots: session.slots.clone(),
                flight_info: session.stage_outputs.flight_info.clone(),
                accommodation_info: session.stage_outputs.accommodation_info.clone(),
            },
            PlanMode::RevisionPlan => {
                let previous_plan = session
                    .stage_outputs
                    .previous_plan
                    .clone()
                    .ok_or(PlannerError::NothingToRevise)?;
                SynthesisRequest::Revision {
                    request: message.to_string(),
                    previous_plan,
                }
            }
        };

        observer.notify(ProgressEvent::Stage(Stage::CompileItinerary));

        let plan = self
            .collaborators
            .synthesizer
            .synthesize(&request)
            .await
            .map_err(PlannerError::collaborator(Stage::CompileItinerary))?;

        session.stage_outputs.previous_plan = Some(plan.clone());
        session.push_history(Role::Assistant, plan.as_str());
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::Extraction;
    use crate::slots::PartialSlots;
    use crate::testing::{
        MockAccommodationSearch, MockExtractor, MockFlightSearch, MockSynthesizer,
        RecordingObserver,
    };
    use std::time::Duration;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn complete_extraction() -> Extraction {
        Extraction {
            slots: PartialSlots {
                departure: Some("Seoul".into()),
                destination: Some(strings(&["Tokyo"])),
                start_date: Some("2026-11-01".into()),
                duration: Some("5 days".into()),
                budget: Some("2000 USD".into()),
                interests: Some(strings(&["food"])),
                extra_details: Some(strings(&["no red-eye flights"])),
            },
            reply: "Great, I have everything I need.".into(),
        }
    }

    struct Fixture {
        extractor: Arc<MockExtractor>,
        flights: Arc<MockFlightSearch>,
        accommodation: Arc<MockAccommodationSearch>,
        synthesizer: Arc<MockSynthesizer>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                extractor: Arc::new(MockExtractor::new()),
                flights: Arc::new(MockFlightSearch::new("FLIGHTS")),
                accommodation: Arc::new(MockAccommodationSearch::new("HOTELS")),
                synthesizer: Arc::new(MockSynthesizer::new("PLAN")),
            }
        }

        fn planner(&self) -> Planner {
            Planner::new(Collaborators {
                extractor: self.extractor.clone(),
                flights: self.flights.clone(),
                accommodation: self.accommodation.clone(),
                synthesizer: self.synthesizer.clone(),
            })
        }
    }

    #[test]
    fn test_entry_stage() {
        assert_eq!(entry_stage(PlanMode::NewPlan, false), Stage::GatherInfo);
        assert_eq!(entry_stage(PlanMode::NewPlan, true), Stage::CompileItinerary);
        assert_eq!(
            entry_stage(PlanMode::RevisionPlan, false),
            Stage::CompileItinerary
        );
    }

    #[test]
    fn test_transition_table() {
        assert_eq!(next_route(Stage::GatherInfo, false), Route::End);
        assert_eq!(
            next_route(Stage::GatherInfo, true),
            Route::FanOut {
                branches: [Stage::SearchFlights, Stage::SearchAccommodation],
                join: Stage::CompileItinerary,
            }
        );
        assert_eq!(
            next_route(Stage::SearchFlights, true),
            Route::To(Stage::CompileItinerary)
        );
        assert_eq!(
            next_route(Stage::CompileItinerary, false),
            Route::To(Stage::Done)
        );
        assert_eq!(next_route(Stage::Done, true), Route::End);
    }

    #[test]
    fn test_searches_are_only_reached_through_fan_out() {
        let stages = [
            Stage::GatherInfo,
            Stage::SearchFlights,
            Stage::SearchAccommodation,
            Stage::CompileItinerary,
            Stage::Done,
        ];
        for stage in stages {
            for complete in [false, true] {
                assert!(!matches!(
                    next_route(stage, complete),
                    Route::To(Stage::SearchFlights | Stage::SearchAccommodation)
                ));
            }
        }
        for mode in [PlanMode::NewPlan, PlanMode::RevisionPlan] {
            for skip in [false, true] {
                let entry = entry_stage(mode, skip);
                assert!(!matches!(entry, Stage::SearchFlights | Stage::SearchAccommodation));
            }
        }
    }

    #[tokio::test]
    async fn test_incomplete_turn_asks_follow_up() {
        let fixture = Fixture::new();
        fixture.extractor.push(Extraction {
            slots: PartialSlots {
                destination: Some(strings(&["Tokyo"])),
                ..Default::default()
            },
            reply: "Where are you flying from?".into(),
        });
        let planner = fixture.planner();
        let observer = RecordingObserver::new();
        let mut session = SessionState::new("alice");

        let outcome = planner
            .run_turn(&mut session, TurnInput::new("I want to go to Tokyo"), &observer)
            .await
            .unwrap();

        assert_eq!(outcome.reply, "Where are you flying from?");
        assert_eq!(outcome.final_stage, Stage::GatherInfo);
        assert_eq!(observer.events(), vec![ProgressEvent::Stage(Stage::GatherInfo)]);
        assert!(!session.all_details_complete);
        assert_eq!(session.slots.destination, Some(strings(&["Tokyo"])));
        assert_eq!(fixture.flights.call_count(), 0);
        assert_eq!(fixture.synthesizer.call_count(), 0);
        assert_eq!(session.history.len(), 2);
    }

    #[tokio::test]
    async fn test_extractor_sees_missing_fields() {
        let fixture = Fixture::new();
        let planner = fixture.planner();
        let mut session = SessionState::new("alice");
        session.slots.departure = Some("Seoul".into());

        planner
            .run_turn(&mut session, TurnInput::new("hello"), &RecordingObserver::new())
            .await
            .unwrap();

        let request = fixture.extractor.last_request().unwrap();
        assert_eq!(request.message, "hello");
        assert_eq!(request.missing.len(), 6);
        assert!(!request.missing.contains(&crate::SlotField::Departure));
    }

    #[tokio::test]
    async fn test_complete_turn_runs_full_pipeline_in_order() {
        let fixture = Fixture::new();
        fixture.extractor.push(complete_extraction());
        let planner = fixture.planner();
        let observer = RecordingObserver::new();
        let mut session = SessionState::new("alice");

        let outcome = planner
            .run_turn(&mut session, TurnInput::new("all the details"), &observer)
            .await
            .unwrap();

        assert_eq!(outcome.reply, "PLAN");
        assert_eq!(outcome.final_stage, Stage::Done);

        let events = observer.events();
        assert_eq!(events.first(), Some(&ProgressEvent::Stage(Stage::GatherInfo)));
        assert_eq!(events.get(1), Some(&ProgressEvent::PlanningStarted));
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::Stage(Stage::CompileItinerary))
        );
        assert!(events.contains(&ProgressEvent::Stage(Stage::SearchFlights)));
        assert!(events.contains(&ProgressEvent::Stage(Stage::SearchAccommodation)));
        assert_eq!(events.len(), 5);

        assert_eq!(session.stage_outputs.flight_info.as_deref(), Some("FLIGHTS"));
        assert_eq!(
            session.stage_outputs.accommodation_info.as_deref(),
            Some("HOTELS")
        );
        assert_eq!(session.stage_outputs.previous_plan.as_deref(), Some("PLAN"));

        let request = fixture.synthesizer.last_request().unwrap();
        assert!(matches!(
            request,
            SynthesisRequest::NewPlan { flight_info: Some(ref f), accommodation_info: Some(ref a), .. }
                if f == "FLIGHTS" && a == "HOTELS"
        ));
        assert_eq!(
            fixture.flights.last_call(),
            Some(("Seoul".to_string(), strings(&["Tokyo"]), "2026-11-01".to_string()))
        );
    }

    #[tokio::test]
    async fn test_searches_run_concurrently() {
        let mut fixture = Fixture::new();
        fixture.flights =
            Arc::new(MockFlightSearch::new("FLIGHTS").with_delay(Duration::from_millis(200)));
        fixture.accommodation = Arc::new(
            MockAccommodationSearch::new("HOTELS").with_delay(Duration::from_millis(200)),
        );
        fixture.extractor.push(complete_extraction());
        let planner = fixture.planner();
        let mut session = SessionState::new("alice");

        let started = tokio::time::Instant::now();
        planner
            .run_turn(&mut session, TurnInput::new("go"), &RecordingObserver::new())
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_millis(390));
    }

    #[tokio::test]
    async fn test_flight_failure_degrades() {
        let fixture = Fixture::new();
        fixture
            .flights
            .fail_next(CollaboratorError::Unavailable("flights down".into()));
        fixture.extractor.push(complete_extraction());
        let planner = fixture.planner();
        let mut session = SessionState::new("alice");

        let outcome = planner
            .run_turn(&mut session, TurnInput::new("go"), &RecordingObserver::new())
            .await
            .unwrap();

        assert_eq!(outcome.reply, "PLAN");
        assert_eq!(fixture.accommodation.call_count(), 1);
        assert!(session.stage_outputs.flight_info.is_none());
        assert!(matches!(
            fixture.synthesizer.last_request(),
            Some(SynthesisRequest::NewPlan { flight_info: None, accommodation_info: Some(_), .. })
        ));
    }

    #[tokio::test]
    async fn test_extraction_failure_keeps_slots() {
        let fixture = Fixture::new();
        fixture
            .extractor
            .fail_next(CollaboratorError::Provider("quota".into()));
        let planner = fixture.planner();
        let mut session = SessionState::new("alice");
        session.slots.budget = Some("900 EUR".into());
        let before = session.slots.clone();

        let err = planner
            .run_turn(&mut session, TurnInput::new("hi"), &RecordingObserver::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PlannerError::Collaborator { stage: Stage::GatherInfo, .. }
        ));
        assert_eq!(session.slots, before);
    }

    #[tokio::test]
    async fn test_synthesis_failure_surfaces_after_merge() {
        let fixture = Fixture::new();
        fixture
            .synthesizer
            .fail_next(CollaboratorError::Unavailable("busy".into()));
        fixture.extractor.push(complete_extraction());
        let planner = fixture.planner();
        let mut session = SessionState::new("alice");

        let err = planner
            .run_turn(&mut session, TurnInput::new("go"), &RecordingObserver::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PlannerError::Collaborator { stage: Stage::CompileItinerary, .. }
        ));
        assert!(session.all_details_complete);
        assert!(session.stage_outputs.previous_plan.is_none());
    }

    #[tokio::test]
    async fn test_revision_uses_previous_plan() {
        let fixture = Fixture::new();
        let planner = fixture.planner();
        let observer = RecordingObserver::new();
        let mut session = SessionState::new("alice");
        session.stage_outputs.previous_plan = Some("OLD PLAN".into());

        let input = TurnInput {
            text: "make day two less busy".into(),
            mode: Some(PlanMode::RevisionPlan),
            skip_gathering: false,
        };
        let outcome = planner.run_turn(&mut session, input, &observer).await.unwrap();

        assert_eq!(outcome.reply, "PLAN");
        assert_eq!(fixture.extractor.call_count(), 0);
        assert_eq!(
            observer.events(),
            vec![ProgressEvent::Stage(Stage::CompileItinerary)]
        );
        assert_eq!(
            fixture.synthesizer.last_request(),
            Some(SynthesisRequest::Revision {
                request: "make day two less busy".into(),
                previous_plan: "OLD PLAN".into(),
            })
        );
        assert_eq!(session.mode, PlanMode::RevisionPlan);
    }

    #[tokio::test]
    async fn test_revision_without_plan_fails() {
        let fixture = Fixture::new();
        let planner = fixture.planner();
        let mut session = SessionState::new("alice");

        let input = TurnInput {
            text: "change it".into(),
            mode: Some(PlanMode::RevisionPlan),
            skip_gathering: false,
        };
        let err = planner
            .run_turn(&mut session, input, &RecordingObserver::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PlannerError::NothingToRevise));
        assert_eq!(fixture.synthesizer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_skip_gathering_goes_straight_to_synthesis() {
        let fixture = Fixture::new();
        let planner = fixture.planner();
        let mut session = SessionState::new("alice");

        let input = TurnInput {
            text: "just plan it".into(),
            mode: None,
            skip_gathering: true,
        };
        let outcome = planner
            .run_turn(&mut session, input, &RecordingObserver::new())
            .await
            .unwrap();

        assert_eq!(outcome.final_stage, Stage::Done);
        assert_eq!(fixture.extractor.call_count(), 0);
        assert_eq!(fixture.flights.call_count(), 0);
        assert!(matches!(
            fixture.synthesizer.last_request(),
            Some(SynthesisRequest::NewPlan { flight_info: None, accommodation_info: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_mode_persists_across_turns() {
        let fixture = Fixture::new();
        let planner = fixture.planner();
        let mut session = SessionState::new("alice");
        session.stage_outputs.previous_plan = Some("OLD".into());

        let first = TurnInput {
            text: "revise".into(),
            mode: Some(PlanMode::RevisionPlan),
            skip_gathering: false,
        };
        planner
            .run_turn(&mut session, first, &RecordingObserver::new())
            .await
            .unwrap();
        planner
            .run_turn(&mut session, TurnInput::new("again"), &RecordingObserver::new())
            .await
            .unwrap();

        assert_eq!(fixture.synthesizer.call_count(), 2);
        assert_eq!(fixture.extractor.call_count(), 0);
    }
}
