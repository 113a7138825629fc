//! Flight search over SerpApi's Google Flights engine.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use futures::future::join_all;
use itinera_planner::{CollaboratorError, FlightSearch};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::extractor::parse_json_reply;
use crate::serpapi::SerpApiClient;
use crate::traits::{GenerateRequest, ProviderResult, TextModel};
use crate::ProviderError;

lazy_static! {
    static ref IATA_CODE: Regex = Regex::new(r"^[A-Z]{3}$").unwrap();
    static ref ISO_DATE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

/// SerpApi `type` for one-way trips.
const ONE_WAY: &str = "2";

pub fn is_iata_code(code: &str) -> bool {
    IATA_CODE.is_match(code)
}

/// Parse a `YYYY-MM-DD` date that is not before `today`.
pub fn validate_travel_date(date: &str, today: NaiveDate) -> ProviderResult<NaiveDate> {
    let date = date.trim();
    if !ISO_DATE.is_match(date) {
        return Err(ProviderError::InvalidInput(format!(
            "date '{}' is not in YYYY-MM-DD format",
            date
        )));
    }
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| ProviderError::InvalidInput(format!("date '{}' is invalid: {}", date, e)))?;
    if parsed < today {
        return Err(ProviderError::InvalidInput(format!(
            "date {} is in the past",
            parsed
        )));
    }
    Ok(parsed)
}

pub struct SerpApiFlightSearch {
    serp: Arc<SerpApiClient>,
    resolver: Arc<dyn TextModel>,
    currency: String,
    max_results: usize,
    today: Option<NaiveDate>,
}

impl SerpApiFlightSearch {
    /// `resolver` maps free-form place names to airport codes.
    pub fn new(serp: Arc<SerpApiClient>, resolver: Arc<dyn TextModel>) -> Self {
        Self {
            serp,
            resolver,
            currency: "USD".to_string(),
            max_results: 5,
            today: None,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Airport code for `place`, asking the model unless it already is one.
    async fn resolve_airport(&self, place: &str) -> ProviderResult<String> {
        let place = place.trim();
        if is_iata_code(place) {
            return Ok(place.to_string());
        }

        let request = GenerateRequest::new(format!(
            "Give the 3-letter IATA code of the main commercial airport (or metropolitan \
             city code) a traveller would use for: {}",
            place
        ))
        .with_schema(json!({
            "type": "OBJECT",
            "properties": { "code": { "type": "STRING" } },
            "required": ["code"]
        }));

        let reply = self.resolver.generate(&request).await?;
        let code = parse_json_reply(&reply)?
            .get("code")
            .and_then(Value::as_str)
            .map(|code| code.trim().to_uppercase())
            .unwrap_or_default();

        if !is_iata_code(&code) {
            return Err(ProviderError::InvalidInput(format!(
                "could not determine an airport for '{}'",
                place
            )));
        }
        tracing::debug!(place, code = %code, "resolved airport");
        Ok(code)
    }

    async fn search_route(
        &self,
        origin: &str,
        destination: &str,
        date: &str,
    ) -> ProviderResult<String> {
        let arrival = self.resolve_airport(destination).await?;
        let body = self
            .serp
            .search(
                "google_flights",
                &[
                    ("departure_id", origin),
                    ("arrival_id", arrival.as_str()),
                    ("outbound_date", date),
                    ("currency", self.currency.as_str()),
                    ("type", ONE_WAY),
                    ("hl", "en"),
                ],
            )
            .await?;

        let results: FlightResults = serde_json::from_value(body).map_err(|e| {
            ProviderError::InvalidResponse(format!("unexpected flight results: {}", e))
        })?;

        Ok(format_route(
            &RouteLabel {
                origin,
                arrival: &arrival,
                destination,
                date,
            },
            &results,
            &self.currency,
            self.max_results,
        ))
    }
}

#[async_trait]
impl FlightSearch for SerpApiFlightSearch {
    async fn search_flights(
        &self,
        origin: &str,
        destinations: &[String],
        date: &str,
    ) -> Result<String, CollaboratorError> {
        let date = validate_travel_date(date, self.today())?.to_string();
        let origin = self.resolve_airport(origin).await?;

        let outcomes = join_all(
            destinations
                .iter()
                .map(|destination| self.search_route(&origin, destination, &date)),
        )
        .await;

        let mut sections = Vec::new();
        let mut first_error = None;
        let mut succeeded = 0;
        for (destination, outcome) in destinations.iter().zip(outcomes) {
            match outcome {
                Ok(section) => {
                    succeeded += 1;
                    sections.push(section);
                }
                Err(err) => {
                    tracing::warn!(destination = %destination, error = %err, "flight search failed");
                    sections.push(format!("Flights to {}: unavailable ({})", destination, err));
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) if succeeded == 0 => Err(err.into()),
            _ => Ok(sections.join("\n\n")),
        }
    }
}

struct RouteLabel<'a> {
    origin: &'a str,
    arrival: &'a str,
    destination: &'a str,
    date: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct FlightResults {
    #[serde(default)]
    best_flights: Vec<FlightOption>,
    #[serde(default)]
    other_flights: Vec<FlightOption>,
    #[serde(default)]
    price_insights: Option<PriceInsights>,
}

#[derive(Debug, Deserialize)]
struct FlightOption {
    #[serde(default)]
    flights: Vec<FlightLeg>,
    #[serde(default)]
    layovers: Vec<Layover>,
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    price: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FlightLeg {
    #[serde(default)]
    airline: Option<String>,
    #[serde(default)]
    flight_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Layover {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PriceInsights {
    #[serde(default)]
    lowest_price: Option<u64>,
    #[serde(default)]
    price_level: Option<String>,
    #[serde(default)]
    typical_price_range: Option<Vec<u64>>,
}

fn format_minutes(minutes: u64) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

fn format_route(
    label: &RouteLabel<'_>,
    results: &FlightResults,
    currency: &str,
    max: usize,
) -> String {
    let mut out = format!(
        "Flights {} -> {} ({}) on {}",
        label.origin, label.arrival, label.destination, label.date
    );

    if let Some(insights) = &results.price_insights {
        let mut parts = Vec::new();
        if let Some(lowest) = insights.lowest_price {
            parts.push(format!("lowest {} {}", lowest, currency));
        }
        if let Some(level) = &insights.price_level {
            parts.push(format!("prices are {} right now", level));
        }
        if let Some([low, high]) = insights.typical_price_range.as_deref() {
            parts.push(format!("usually {}-{} {}", low, high, currency));
        }
        if !parts.is_empty() {
            let _ = write!(out, "\nPrice insights: {}", parts.join(", "));
        }
    }

    let mut options: Vec<&FlightOption> = results
        .best_flights
        .iter()
        .chain(results.other_flights.iter())
        .collect();
    options.sort_by_key(|option| option.price.unwrap_or(u64::MAX));

    if options.is_empty() {
        out.push_str("\nNo flights found for this route.");
        return out;
    }

    for (index, option) in options.iter().take(max).enumerate() {
        let price = option
            .price
            .map(|p| format!("{} {}", p, currency))
            .unwrap_or_else(|| "price unknown".to_string());
        let carriers: Vec<String> = option
            .flights
            .iter()
            .map(|leg| {
                let airline = leg.airline.as_deref().unwrap_or("Unknown airline");
                match &leg.flight_number {
                    Some(number) => format!("{} {}", airline, number),
                    None => airline.to_string(),
                }
            })
            .collect();
        let duration = option
            .total_duration
            .map(format_minutes)
            .unwrap_or_else(|| "duration unknown".to_string());
        let stops = match option.layovers.as_slice() {
            [] => "nonstop".to_string(),
            layovers => {
                let via: Vec<String> = layovers
                    .iter()
                    .map(|layover| {
                        let at = layover.id.as_deref().unwrap_or("?");
                        match layover.duration {
                            Some(minutes) => format!("{} ({})", at, format_minutes(minutes)),
                            None => at.to_string(),
                        }
                    })
                    .collect();
                let noun = if layovers.len() == 1 { "stop" } else { "stops" };
                format!("{} {} via {}", layovers.len(), noun, via.join(", "))
            }
        };

        let _ = write!(
            out,
            "\n{}. {} | {} | {} | {}",
            index + 1,
            price,
            carriers.join(" + "),
            duration,
            stops
        );
    }
    out
}
