//! Conversation state and workflow for the trip planner.
//!
//! A [`Planner`] is shared by every connection. Each inbound message runs one
//! turn against the caller's [`SessionState`]: slot extraction and merge,
//! then, once every slot is filled, a concurrent flight and accommodation
//! search joined into a single itinerary synthesis.

pub mod collaborators;
pub mod error;
pub mod progress;
pub mod session;
pub mod slots;
pub mod store;
pub mod testing;
pub mod workflow;

pub use collaborators::{
    AccommodationSearch, Collaborators, Extraction, ExtractionRequest, Extractor, FlightSearch,
    ItinerarySynthesizer, SynthesisRequest,
};
pub use error::{CollaboratorError, PlannerError};
pub use progress::{NoopObserver, ProgressEvent, TurnObserver, PLANNING_SENTINEL};
pub use session::{PlanMode, Role, SessionState, StageOutputs, TurnRecord};
pub use slots::{merge, missing_fields, PartialSlots, SlotField, Slots};
pub use store::{SessionHandle, SessionStore};
pub use workflow::{after_gather, entry_stage, next_route, Planner, Route, Stage, TurnInput, TurnOutcome};
