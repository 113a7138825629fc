//! Hotels, attractions and restaurants from SerpApi's Tripadvisor engine.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use itinera_planner::{AccommodationSearch, CollaboratorError};
use serde::Deserialize;

use crate::serpapi::SerpApiClient;
use crate::traits::ProviderResult;
use crate::ProviderError;

const SNIPPET_LIMIT: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Hotels,
    Attractions,
    Restaurants,
}

impl Category {
    const ALL: [Category; 3] = [Category::Hotels, Category::Attractions, Category::Restaurants];

    /// Tripadvisor `ssrc` filter
    fn ssrc(self) -> &'static str {
        match self {
            Category::Hotels => "h",
            Category::Attractions => "A",
            Category::Restaurants => "r",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Category::Hotels => "hotels",
            Category::Attractions => "attractions",
            Category::Restaurants => "restaurants",
        }
    }

    fn heading(self) -> &'static str {
        match self {
            Category::Hotels => "Hotels",
            Category::Attractions => "Attractions",
            Category::Restaurants => "Restaurants",
        }
    }
}

pub struct SerpApiAccommodationSearch {
    serp: Arc<SerpApiClient>,
    max_results: usize,
}

impl SerpApiAccommodationSearch {
    pub fn new(serp: Arc<SerpApiClient>) -> Self {
        Self {
            serp,
            max_results: 5,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    async fn search_category(
        &self,
        place: &str,
        category: Category,
    ) -> ProviderResult<Vec<Place>> {
        let body = self
            .serp
            .search("tripadvisor", &[("q", place), ("ssrc", category.ssrc())])
            .await?;
        let results: PlaceResults = serde_json::from_value(body).map_err(|e| {
            ProviderError::InvalidResponse(format!("unexpected tripadvisor results: {}", e))
        })?;

        let mut places = results.places;
        places.truncate(self.max_results);
        Ok(places)
    }
}

#[async_trait]
impl AccommodationSearch for SerpApiAccommodationSearch {
    async fn search_accommodation(
        &self,
        destinations: &[String],
        duration: Option<&str>,
    ) -> Result<String, CollaboratorError> {
        let queries: Vec<(&str, Category)> = destinations
            .iter()
            .flat_map(|place| Category::ALL.map(|category| (place.as_str(), category)))
            .collect();

        let outcomes = join_all(
            queries
                .iter()
                .map(|(place, category)| self.search_category(place, *category)),
        )
        .await;

        let mut out = String::new();
        if let Some(duration) = duration {
            let _ = writeln!(out, "Planned stay: {}", duration);
        }

        let mut first_error = None;
        let mut succeeded = 0;
        let mut current_place = None;
        for ((place, category), outcome) in queries.iter().zip(outcomes) {
            if current_place != Some(*place) {
                let _ = write!(out, "\n## {}\n", place);
                current_place = Some(*place);
            }
            let _ = write!(out, "\n### {}\n", category.heading());

            match outcome {
                Ok(places) if places.is_empty() => {
                    succeeded += 1;
                    let _ = writeln!(out, "No {} found for {}", category.label(), place);
                }
                Ok(places) => {
                    succeeded += 1;
                    for found in &places {
                        let _ = writeln!(out, "{}", found.to_markdown());
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        place = %place,
                        category = category.label(),
                        error = %err,
                        "tripadvisor search failed"
                    );
                    let _ = writeln!(out, "No {} found for {}", category.label(), place);
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) if succeeded == 0 => Err(err.into()),
            _ => Ok(out.trim().to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PlaceResults {
    #[serde(default)]
    places: Vec<Place>,
}

#[derive(Debug, Deserialize)]
struct Place {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    reviews: Option<u64>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    highlighted_review: Option<HighlightedReview>,
}

#[derive(Debug, Deserialize)]
struct HighlightedReview {
    #[serde(default)]
    text: Option<String>,
}

impl Place {
    fn to_markdown(&self) -> String {
        let mut line = format!("- **{}**", self.title.as_deref().unwrap_or("Unnamed"));
        match (self.rating, self.reviews) {
            (Some(rating), Some(reviews)) => {
                let _ = write!(line, " ({:.1}/5, {} reviews)", rating, reviews);
            }
            (Some(rating), None) => {
                let _ = write!(line, " ({:.1}/5)", rating);
            }
            _ => {}
        }
        if let Some(location) = self.location.as_deref().filter(|l| !l.is_empty()) {
            let _ = write!(line, ", {}", location);
        }
        if let Some(description) = self.description.as_deref().map(clean_snippet) {
            if !description.is_empty() {
                let _ = write!(line, ": {}", description);
            }
        }
        let review = self
            .highlighted_review
            .as_ref()
            .and_then(|r| r.text.as_deref())
            .map(clean_snippet);
        if let Some(review) = review.filter(|r| !r.is_empty()) {
            let _ = write!(line, " Review: \"{}\"", review);
        }
        line
    }
}

/// Collapse whitespace and cut at the last word boundary before the limit.
fn clean_snippet(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= SNIPPET_LIMIT {
        return collapsed;
    }

    let cut: String = collapsed.chars().take(SNIPPET_LIMIT).collect();
    let trimmed = match cut.rfind(' ') {
        Some(space) => &cut[..space],
        None => cut.as_str(),
    };
    format!("{}...", trimmed.trim_end_matches([',', '.', ';', ':']))
}
