//! Slot extraction backed by a JSON-mode model call.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use itinera_planner::{
    CollaboratorError, Extraction, ExtractionRequest, Extractor, PartialSlots, Role, SlotField,
};
use serde_json::{json, Value};

use crate::traits::{GenerateRequest, TextModel};
use crate::ProviderError;

const SYSTEM_PROMPT: &str = "\
You are a friendly travel assistant gathering what is needed to plan a trip.

From the user's latest message, extract any of these fields they state or clearly imply:
Departure, Destination, StartDate, Duration, Budget, Interest, ExtraDetail.

Rules:
- Never guess. A field the user did not mention is null.
- Destination, Interest and ExtraDetail are lists of short strings.
- StartDate is YYYY-MM-DD. Resolve relative dates (\"next Friday\", \"in two weeks\") against today's date.
- A field the user explicitly declines (\"no budget\", \"nothing else\") is filled with their answer, not null.

Then write Response: briefly acknowledge what you learned and ask, in a natural tone, for the \
fields that are still missing, at most two or three at a time. If nothing is missing, tell the \
user you are starting to research their trip.";

pub struct GeminiExtractor {
    model: Arc<dyn TextModel>,
    today: Option<NaiveDate>,
}

impl GeminiExtractor {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model, today: None }
    }

    /// Pin "today" instead of reading the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    fn build_prompt(&self, request: &ExtractionRequest) -> String {
        let today = self.today();
        let mut prompt = format!("Today's date: {} ({})\n", today, today.format("%A"));

        let known: Vec<_> = SlotField::ALL
            .into_iter()
            .filter_map(|field| request.current.display(field).map(|value| (field, value)))
            .collect();
        if !known.is_empty() {
            prompt.push_str("\nDetails collected so far:\n");
            for (field, value) in known {
                let _ = writeln!(prompt, "- {}: {}", field, value);
            }
        }

        if request.missing.is_empty() {
            prompt.push_str("\nRemaining Information: none\n");
        } else {
            prompt.push_str("\nRemaining Information:\n");
            for field in &request.missing {
                let _ = writeln!(prompt, "- {}: {}", field, field.describe());
            }
        }

        // The latest message is passed separately below.
        let earlier = request
            .history
            .split_last()
            .map(|(_, rest)| rest)
            .unwrap_or_default();
        if !earlier.is_empty() {
            prompt.push_str("\nConversation so far:\n");
            for record in earlier {
                let speaker = match record.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                let _ = writeln!(prompt, "{}: {}", speaker, record.content);
            }
        }

        let _ = write!(prompt, "\nUser Input: {}", request.message);
        prompt
    }
}

fn response_schema() -> Value {
    let text = json!({ "type": "STRING", "nullable": true });
    let list = json!({ "type": "ARRAY", "nullable": true, "items": { "type": "STRING" } });
    json!({
        "type": "OBJECT",
        "properties": {
            "Departure": text,
            "Destination": list,
            "StartDate": text,
            "Duration": text,
            "Budget": text,
            "Interest": list,
            "ExtraDetail": list,
            "Response": { "type": "STRING" }
        },
        "required": ["Response"]
    })
}

/// Parse a JSON object out of model text, tolerating a Markdown code fence.
pub(crate) fn parse_json_reply(text: &str) -> Result<Value, ProviderError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim())
        .map_err(|e| ProviderError::InvalidResponse(format!("model returned invalid JSON: {}", e)))
}

fn parse_extraction(text: &str) -> Result<Extraction, ProviderError> {
    let mut value = parse_json_reply(text)?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| ProviderError::InvalidResponse("expected a JSON object".into()))?;

    let reply = match object.remove("Response") {
        Some(Value::String(reply)) => reply,
        _ => String::new(),
    };
    let slots: PartialSlots = serde_json::from_value(value)
        .map_err(|e| ProviderError::InvalidResponse(format!("unexpected slot values: {}", e)))?;

    Ok(Extraction { slots, reply })
}

#[async_trait]
impl Extractor for GeminiExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> Result<Extraction, CollaboratorError> {
        let generate = GenerateRequest::new(self.build_prompt(request))
            .with_system(SYSTEM_PROMPT)
            .with_schema(response_schema());

        let text = self.model.generate(&generate).await?;
        let extraction = parse_extraction(&text)?;

        tracing::debug!(model = self.model.model(), slots = ?extraction.slots, "extracted slots");
        Ok(extraction)
    }
}
