//! Backends the workflow calls out to.
//!
//! The planner only sees these traits. Production implementations live in
//! `itinera-providers`; [`crate::testing`] has scripted doubles.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::session::TurnRecord;
use crate::slots::{PartialSlots, SlotField, Slots};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    /// The user's latest message.
    pub message: String,
    /// Fields still empty before this message.
    pub missing: Vec<SlotField>,
    /// Slots known so far.
    pub current: Slots,
    pub history: Vec<TurnRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub slots: PartialSlots,
    /// Conversational reply, usually a follow-up question for the missing
    /// fields.
    pub reply: String,
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, request: &ExtractionRequest) -> Result<Extraction, CollaboratorError>;
}

#[async_trait]
pub trait FlightSearch: Send + Sync {
    /// Summarise flights from `origin` to each destination on `date`.
    async fn search_flights(
        &self,
        origin: &str,
        destinations: &[String],
        date: &str,
    ) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait AccommodationSearch: Send + Sync {
    /// Summarise hotels, attractions and restaurants for each destination.
    async fn search_accommodation(
        &self,
        destinations: &[String],
        duration: Option<&str>,
    ) -> Result<String, CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisRequest {
    /// Write a fresh itinerary. A `None` section had no data and must be
    /// left out of the plan.
    NewPlan {
        slots: Slots,
        flight_info: Option<String>,
        accommodation_info: Option<String>,
    },
    /// Rework an earlier itinerary according to the user's request.
    Revision {
        request: String,
        previous_plan: String,
    },
}

#[async_trait]
pub trait ItinerarySynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String, CollaboratorError>;
}

/// The full set of backends a [`crate::Planner`] needs.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn Extractor>,
    pub flights: Arc<dyn FlightSearch>,
    pub accommodation: Arc<dyn AccommodationSearch>,
    pub synthesizer: Arc<dyn ItinerarySynthesizer>,
}
