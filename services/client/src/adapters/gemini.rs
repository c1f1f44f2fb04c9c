//! services/client/src/adapters/gemini.rs
//!
//! This module contains the adapter for the crop-advice model.
//! It implements the `CropAdvisor` port from the `core` crate by calling the
//! hosted `generateContent` REST endpoint with a JSON response schema.

use agrigenius_core::domain::{AdviceReply, AdviceRequest};
use agrigenius_core::ports::{CropAdvisor, PortError, PortResult};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::network_error;

const SYSTEM_INSTRUCTIONS: &str = r#"You are AgriGenius, an agricultural expert who helps farmers with plant pathology and crop management.

What to do:
1. If an image is attached, identify any disease, pest or nutrient deficiency in plain words. When unsure, list the most likely candidates.
2. Offer a chemical treatment (a specific, commonly available product) and, where one exists, a practical organic remedy.
3. Recommend fertilizer or care changes for recovery and prevention.
4. Treat live sensor readings as primary context and ground the advice in them (for example: low nitrogen means suggesting legumes; high humidity means fungal risk and better air circulation).
5. Use the farm location and weather to tailor the advice: rain ahead suggests a fungicide window, a heatwave suggests irrigation. Mention the weather naturally in the answer.
6. With no image and no concrete question, give one useful tip based on whatever context is available.

Output format:
- Reply with a single JSON object and nothing else: no markdown fences, no text before or after it.
- The object has exactly two keys, "responseText" and "languageCode".
- "responseText" holds the full answer for the farmer, using bold headings such as '**Disease:**' and bullet points.
- "languageCode" holds the BCP 47 code of the language "responseText" is written in.
- The farmer's preferred language is {preferred}. Answer in the language of the farmer's message; if that is unclear, use the preferred language.
- Codes for Indian languages: Hindi 'hi-IN', Bengali 'bn-IN', Tamil 'ta-IN', Telugu 'te-IN', Marathi 'mr-IN', Gujarati 'gu-IN', Kannada 'kn-IN', Punjabi 'pa-IN', Malayalam 'ml-IN'. English is 'en-US'. Any other language gets its usual BCP 47 code."#;

const IMAGE_ONLY_PROMPT: &str = "Please analyze this crop image.";
const EMPTY_PROMPT: &str = "Hello!";

const NOT_CONFIGURED_REPLY: &str = "API Key is not configured. Please contact support.";
const INVALID_OUTPUT_REPLY: &str =
    "Sorry, I received an invalid response from the server. Please try again.";
const MISSING_TEXT_REPLY: &str = "I couldn't generate a proper response.";
const DEFAULT_REPLY_TAG: &str = "en-US";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CropAdvisor` with a hosted multimodal model.
#[derive(Clone)]
pub struct GeminiAdvisorAdapter {
    client: Client,
    /// `None` means every request is answered with a fixed "not configured" reply.
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiAdvisorAdapter {
    /// Creates a new `GeminiAdvisorAdapter`.
    pub fn new(client: Client, api_key: Option<String>, model: String, base_url: &str) -> Self {
        if api_key.is_none() {
            warn!("GEMINI_API_KEY is not set; chat replies will report it as not configured.");
        }
        Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn request_body(&self, request: &AdviceRequest) -> Value {
        let mut parts = Vec::new();
        if let Some(image) = &request.image {
            parts.push(json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": STANDARD.encode(&image.bytes),
                }
            }));
        }
        parts.push(json!({ "text": build_prompt(request) }));

        let instructions =
            SYSTEM_INSTRUCTIONS.replace("{preferred}", &request.language.speech_tag());

        json!({
            "systemInstruction": { "parts": [{ "text": instructions }] },
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "responseText": { "type": "STRING" },
                        "languageCode": { "type": "STRING" }
                    },
                    "required": ["responseText", "languageCode"]
                }
            }
        })
    }
}

//=========================================================================================
// Prompt & Output Helpers
//=========================================================================================

/// Builds the user turn: the farm context block (when any context exists)
/// followed by the question.
pub fn build_prompt(request: &AdviceRequest) -> String {
    let question = match request.prompt.trim() {
        "" if request.image.is_some() => IMAGE_ONLY_PROMPT.to_string(),
        "" => EMPTY_PROMPT.to_string(),
        text => text.to_string(),
    };

    let mut context = String::new();
    if let Some(s) = &request.sensor {
        context.push_str(&format!(
            "\n**Live Sensor Data:**\n- Nitrogen (N): {}\n- Phosphorus (P): {}\n- Potassium (K): {}\n- Temperature: {:.1}°C\n- Humidity: {:.1}%\n- Soil Moisture: {:.1}%\n",
            s.nitrogen, s.phosphorus, s.potassium, s.temperature, s.humidity, s.moisture
        ));
    }
    if let Some(loc) = &request.location {
        context.push_str(&format!(
            "\n**Farm Location:**\n- Latitude: {:.4}\n- Longitude: {:.4}\n",
            loc.lat(),
            loc.lon()
        ));
    }
    if let Some(weather) = &request.weather {
        context.push_str(&format!(
            "\n**Current & Forecasted Weather:**\n- Current Condition: {} at {:.1}°C\n",
            weather.current.condition, weather.current.temperature
        ));
        if let Some(today) = weather.daily.first() {
            context.push_str(&format!(
                "- Today's Forecast: High of {:.1}°C, Low of {:.1}°C. Condition: {}.\n",
                today.max_temp, today.min_temp, today.condition
            ));
        }
        let mut conditions: Vec<String> = Vec::new();
        for day in &weather.daily {
            let label = day.condition.to_lowercase();
            if !conditions.contains(&label) {
                conditions.push(label);
            }
        }
        if !conditions.is_empty() {
            context.push_str(&format!(
                "- Next 5 Days Summary: Conditions will generally be {}.\n",
                conditions.join(", ")
            ));
        }
    }

    if context.is_empty() {
        question
    } else {
        format!(
            "\nHere is the context for my farm. Use this to provide the most relevant and tailored advice.\n{}\n\n**User's Question:** {}\n",
            context, question
        )
    }
}

/// Interprets the model's text. Output that is not JSON degrades to a fixed
/// reply instead of an error.
pub fn parse_model_output(text: &str) -> AdviceReply {
    let parsed: Value = match serde_json::from_str(text.trim()) {
        Ok(value) => value,
        Err(e) => {
            warn!("Model returned non-JSON output: {}", e);
            return AdviceReply {
                text: INVALID_OUTPUT_REPLY.to_string(),
                language_tag: DEFAULT_REPLY_TAG.to_string(),
            };
        }
    };

    let field = |name: &str| {
        parsed
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    AdviceReply {
        text: field("responseText").unwrap_or_else(|| MISSING_TEXT_REPLY.to_string()),
        language_tag: field("languageCode").unwrap_or_else(|| DEFAULT_REPLY_TAG.to_string()),
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        Some(text)
    }
}

//=========================================================================================
// `CropAdvisor` Trait Implementation
//=========================================================================================

#[async_trait]
impl CropAdvisor for GeminiAdvisorAdapter {
    async fn advise(&self, request: AdviceRequest) -> PortResult<AdviceReply> {
        let Some(api_key) = &self.api_key else {
            return Ok(AdviceReply {
                text: NOT_CONFIGURED_REPLY.to_string(),
                language_tag: DEFAULT_REPLY_TAG.to_string(),
            });
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = self.request_body(&request);
        info!(
            "Asking the advisor (image: {}, sensor: {}, weather: {})",
            request.image.is_some(),
            request.sensor.is_some(),
            request.weather.is_some()
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            error!("Inference API call failed: {} - {}", status, text);
            return Err(PortError::Inference(format!(
                "Failed to get a response from the AI model (status {})",
                status
            )));
        }

        let data: GenerateResponse = response
            .json()
            .await
            .map_err(|e| PortError::Inference(format!("unreadable inference response: {}", e)))?;
        let text = data
            .text()
            .ok_or_else(|| PortError::Inference("the model returned no candidates".to_string()))?;

        Ok(parse_model_output(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrigenius_core::domain::{
        CurrentConditions, DailyForecast, FarmLocation, ImageAttachment, SensorReading,
        WeatherSnapshot,
    };
    use agrigenius_core::LanguageCode;
    use bytes::Bytes;

    fn day(condition: &str) -> DailyForecast {
        DailyForecast {
            day: "Monday".to_string(),
            min_temp: 19.0,
            max_temp: 31.25,
            condition: condition.to_string(),
        }
    }

    #[test]
    fn non_json_output_degrades_to_the_fixed_reply() {
        let reply = parse_model_output("**Disease:** leaf rust");
        assert_eq!(reply.text, INVALID_OUTPUT_REPLY);
        assert_eq!(reply.language_tag, "en-US");
    }

    #[test]
    fn missing_fields_use_their_defaults() {
        let reply = parse_model_output(r#"{"languageCode":"hi-IN"}"#);
        assert_eq!(reply.text, MISSING_TEXT_REPLY);
        assert_eq!(reply.language_tag, "hi-IN");

        let reply = parse_model_output(r#"{"responseText":"Water in the evening."}"#);
        assert_eq!(reply.text, "Water in the evening.");
        assert_eq!(reply.language_tag, "en-US");
    }

    #[test]
    fn empty_prompt_picks_the_default_question() {
        let bare = AdviceRequest::default();
        assert_eq!(build_prompt(&bare), "Hello!");

        let with_image = AdviceRequest {
            image: Some(ImageAttachment {
                file_name: "leaf.jpg".to_string(),
                mime_type: "image/jpeg".to_string(),
                bytes: Bytes::from_static(b"\xff\xd8"),
                preview: String::new(),
            }),
            ..Default::default()
        };
        assert_eq!(build_prompt(&with_image), "Please analyze this crop image.");
    }

    #[test]
    fn context_block_carries_readings_location_and_weather() {
        let request = AdviceRequest {
            prompt: "Why are my leaves yellow?".to_string(),
            sensor: Some(SensorReading {
                nitrogen: 41.0,
                phosphorus: 22.5,
                potassium: 63.0,
                temperature: 29.44,
                humidity: 71.0,
                moisture: 38.25,
            }),
            location: Some(FarmLocation::new(12.97159, 77.59456).unwrap()),
            weather: Some(WeatherSnapshot {
                current: CurrentConditions {
                    temperature: 27.0,
                    condition: "Slight Rain".to_string(),
                    humidity: 80.0,
                    wind_speed: 4.0,
                },
                hourly: vec![],
                daily: vec![day("Slight Rain"), day("Overcast"), day("Slight Rain")],
            }),
            language: LanguageCode::Hi,
            ..Default::default()
        };

        let prompt = build_prompt(&request);
        assert!(prompt.contains("- Nitrogen (N): 41\n"));
        assert!(prompt.contains("- Temperature: 29.4°C"));
        assert!(prompt.contains("- Latitude: 12.9716"));
        assert!(prompt.contains("- Longitude: 77.5946"));
        assert!(prompt.contains("Current Condition: Slight Rain at 27.0°C"));
        assert!(prompt.contains("generally be slight rain, overcast."));
        assert!(prompt.ends_with("**User's Question:** Why are my leaves yellow?\n"));
    }

    #[test]
    fn request_body_inlines_the_image_and_preferred_language() {
        let adapter = GeminiAdvisorAdapter::new(
            Client::new(),
            Some("k".to_string()),
            "gemini-2.5-flash".to_string(),
            "https://example.test/v1beta/",
        );
        let request = AdviceRequest {
            prompt: "Look".to_string(),
            image: Some(ImageAttachment {
                file_name: "leaf.png".to_string(),
                mime_type: "image/png".to_string(),
                bytes: Bytes::from_static(b"abc"),
                preview: String::new(),
            }),
            language: LanguageCode::Ta,
            ..Default::default()
        };

        let body = adapter.request_body(&request);
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["data"], "YWJj");
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["text"], "Look");
        let instructions = body["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
        assert!(instructions.contains("preferred language is ta-IN"));
        assert_eq!(adapter.base_url, "https://example.test/v1beta");
    }

    #[tokio::test]
    async fn missing_key_answers_without_calling_out() {
        let adapter = GeminiAdvisorAdapter::new(
            Client::new(),
            None,
            "gemini-2.5-flash".to_string(),
            "http://127.0.0.1:9",
        );
        let reply = adapter.advise(AdviceRequest::default()).await.unwrap();
        assert_eq!(reply.text, NOT_CONFIGURED_REPLY);
        assert_eq!(reply.language_tag, "en-US");
    }
}
