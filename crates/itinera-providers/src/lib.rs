//! HTTP backends for the planner's collaborator traits.
//!
//! - [`GeminiClient`] talks to the Gemini `generateContent` endpoint and
//!   backs [`GeminiExtractor`], [`GeminiSynthesizer`] and airport lookup.
//! - [`SerpApiClient`] backs [`SerpApiFlightSearch`] (Google Flights) and
//!   [`SerpApiAccommodationSearch`] (Tripadvisor).

pub mod accommodation;
pub mod error;
pub mod extractor;
pub mod flights;
pub mod gemini;
pub mod serpapi;
pub mod synthesizer;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use accommodation::SerpApiAccommodationSearch;
pub use error::ProviderError;
pub use extractor::GeminiExtractor;
pub use flights::SerpApiFlightSearch;
pub use gemini::GeminiClient;
pub use serpapi::SerpApiClient;
pub use synthesizer::GeminiSynthesizer;
pub use traits::{GenerateRequest, ProviderResult, TextModel};

use std::sync::Arc;

use itinera_config::ProvidersConfig;
use itinera_planner::Collaborators;

/// Wire every collaborator to the configured Gemini and SerpApi accounts.
pub fn collaborators_from_config(
    config: &ProvidersConfig,
) -> Result<Collaborators, ProviderError> {
    let gemini = &config.gemini;
    let fast: Arc<dyn TextModel> = Arc::new(GeminiClient::new(gemini, &gemini.model)?);
    let synthesis: Arc<dyn TextModel> =
        Arc::new(GeminiClient::new(gemini, &gemini.synthesis_model)?);
    let serp = Arc::new(SerpApiClient::new(&config.serpapi)?);

    Ok(Collaborators {
        extractor: Arc::new(GeminiExtractor::new(Arc::clone(&fast))),
        flights: Arc::new(
            SerpApiFlightSearch::new(Arc::clone(&serp), fast)
                .with_currency(config.serpapi.currency.clone())
                .with_max_results(config.serpapi.max_results),
        ),
        accommodation: Arc::new(
            SerpApiAccommodationSearch::new(serp).with_max_results(config.serpapi.max_results),
        ),
        synthesizer: Arc::new(GeminiSynthesizer::new(synthesis)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use itinera_config::{GeminiSettings, SerpApiSettings};

    #[test]
    fn test_collaborators_require_keys() {
        let err = collaborators_from_config(&ProvidersConfig::default()).err();
        assert!(matches!(err, Some(ProviderError::Configuration(_))));
    }

    #[test]
    fn test_collaborators_from_config() {
        let config = ProvidersConfig {
            gemini: GeminiSettings {
                api_key: Some("g".into()),
                ..Default::default()
            },
            serpapi: SerpApiSettings {
                api_key: Some("s".into()),
                ..Default::default()
            },
        };
        assert!(collaborators_from_config(&config).is_ok());
    }
}
