//! Itinerary writing and revision.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use itinera_planner::{CollaboratorError, ItinerarySynthesizer, SlotField, Slots, SynthesisRequest};

use crate::traits::{GenerateRequest, TextModel};

const PLAN_SYSTEM_PROMPT: &str = "\
You are a Senior Travel Architect. Turn the traveller's requirements and the research data \
into one clear, day-by-day itinerary in Markdown.

Strict rules:
- Use only the flights, hotels, attractions and restaurants present in the data sources. \
Never invent names, prices, flight numbers or ratings.
- If a data source is missing, leave its section out entirely. Do not mention that it is missing \
and do not fill the gap with guesses.
- Respect the budget. Give a rough cost breakdown only from prices that appear in the data.
- Weave the traveller's interests and extra details into the daily schedule.
- End with short practical tips relevant to the destination and dates.";

const REVISION_SYSTEM_PROMPT: &str = "\
You are a Travel Plan Optimizer. You receive an existing itinerary and the traveller's concern. \
Rewrite the itinerary so the concern is fully addressed while keeping everything else that still \
fits. Do not introduce new bookings, prices or venues that are not already in the plan unless the \
concern asks for them, and say clearly when something needs to be checked by the traveller. \
Return the complete updated itinerary in Markdown.";

pub struct GeminiSynthesizer {
    model: Arc<dyn TextModel>,
}

impl GeminiSynthesizer {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }
}

fn plan_prompt(
    slots: &Slots,
    flight_info: Option<&str>,
    accommodation_info: Option<&str>,
) -> String {
    let mut prompt = String::from("Traveller requirements:\n");
    for field in SlotField::ALL {
        if let Some(value) = slots.display(field) {
            let _ = writeln!(prompt, "- {}: {}", field, value);
        }
    }

    if let Some(flights) = flight_info {
        let _ = write!(prompt, "\nDATA SOURCE 1 (Flights):\n{}\n", flights);
    }
    if let Some(accommodation) = accommodation_info {
        let _ = write!(prompt, "\nDATA SOURCE 2 (Hotels):\n{}\n", accommodation);
    }

    prompt.push_str("\nWrite the itinerary now.");
    prompt
}

fn revision_prompt(request: &str, previous_plan: &str) -> String {
    format!(
        "Fix the plan based on this concern: {}\n\nPrevious Plan:\n{}",
        request, previous_plan
    )
}

fn build_request(request: &SynthesisRequest) -> GenerateRequest {
    match request {
        SynthesisRequest::NewPlan {
            slots,
            flight_info,
            accommodation_info,
        } => GenerateRequest::new(plan_prompt(
            slots,
            flight_info.as_deref(),
            accommodation_info.as_deref(),
        ))
        .with_system(PLAN_SYSTEM_PROMPT),
        SynthesisRequest::Revision {
            request,
            previous_plan,
        } => GenerateRequest::new(revision_prompt(request, previous_plan))
            .with_system(REVISION_SYSTEM_PROMPT),
    }
}

#[async_trait]
impl ItinerarySynthesizer for GeminiSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String, CollaboratorError> {
        let plan = self.model.generate(&build_request(request)).await?;
        tracing::debug!(model = self.model.model(), chars = plan.len(), "itinerary written");
        Ok(plan.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedModel;

    fn slots() -> Slots {
        Slots {
            departure: Some("Seoul".into()),
            destination: Some(vec!["Tokyo".into(), "Kyoto".into()]),
            budget: Some("3000 USD".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_prompt_lists_known_slots() {
        let prompt = plan_prompt(&slots(), Some("KE 703"), Some("Hotel Gracery"));
        assert!(prompt.contains("- Departure: Seoul"));
        assert!(prompt.contains("- Destination: Tokyo, Kyoto"));
        assert!(!prompt.contains("StartDate"));
        assert!(prompt.contains("DATA SOURCE 1 (Flights):\nKE 703"));
        assert!(prompt.contains("DATA SOURCE 2 (Hotels):\nHotel Gracery"));
    }

    #[test]
    fn test_plan_prompt_omits_missing_sources() {
        let prompt = plan_prompt(&slots(), None, Some("Hotel Gracery"));
        assert!(!prompt.contains("DATA SOURCE 1"));
        assert!(prompt.contains("DATA SOURCE 2"));
    }

    #[test]
    fn test_revision_prompt() {
        let prompt = revision_prompt("less walking", "Day 1: hike");
        assert_eq!(
            prompt,
            "Fix the plan based on this concern: less walking\n\nPrevious Plan:\nDay 1: hike"
        );
    }

    #[tokio::test]
    async fn test_synthesize_picks_system_prompt() {
        let model = ScriptedModel::new("  # Your trip  \n");
        let synthesizer = GeminiSynthesizer::new(model.clone());

        let plan = synthesizer
            .synthesize(&SynthesisRequest::NewPlan {
                slots: slots(),
                flight_info: None,
                accommodation_info: None,
            })
            .await
            .unwrap();
        assert_eq!(plan, "# Your trip");

        synthesizer
            .synthesize(&SynthesisRequest::Revision {
                request: "cheaper".into(),
                previous_plan: "# Your trip".into(),
            })
            .await
            .unwrap();

        let requests = model.requests();
        assert!(requests[0].system.as_deref().unwrap().contains("Senior Travel Architect"));
        assert!(requests[1].system.as_deref().unwrap().contains("Travel Plan Optimizer"));
        assert!(requests[1].response_schema.is_none());
    }
}
