use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};

/// Marker separating the assistant's free text from its comma-separated
/// station list in a streamed chat reply.
pub const RECOMMENDATION_SENTINEL: &str = "RECOMMENDED_STATIONS:";

/// A catalog entry as served by `GET /api/radio-stations`.
///
/// Identity is the `id`; two stations with the same id are the same station
/// even if their metadata differs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Station {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub language: String,
    pub stream_url: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    /// The catalog service sends `null` for stations without tags.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_ai_generated: bool,
}

impl PartialEq for Station {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Station {}

impl Station {
    /// "City, Country • Genre" line used under the station name.
    pub fn location_line(&self) -> String {
        match self.city.as_deref() {
            Some(city) if !city.is_empty() => {
                format!("{}, {} • {}", city, self.country, self.genre)
            }
            _ => format!("{} • {}", self.country, self.genre),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Which completion backend the chat service should route a prompt to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    DeepSeek,
    OpenAi,
}

impl Provider {
    pub fn label(self) -> &'static str {
        match self {
            Provider::DeepSeek => "DeepSeek",
            Provider::OpenAi => "OpenAI",
        }
    }
}

/// Body of `POST /api/ai/chat-stream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    pub provider: Provider,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the conversation.  Messages are only ever appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub provider: Option<Provider>,
    pub at: DateTime<Local>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            provider: None,
            at: Local::now(),
        }
    }

    pub fn assistant(text: impl Into<String>, provider: Option<Provider>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            provider,
            at: Local::now(),
        }
    }
}

/// Criteria for the station list filter.  `None` for genre/country means "all".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FilterCriteria {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty() && self.genre.is_none() && self.country.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_decodes_catalog_json() {
        let json = r#"{
            "id": 7,
            "name": "FIP",
            "description": null,
            "country": "France",
            "city": "Paris",
            "genre": "Eclectic",
            "language": "French",
            "stream_url": "https://icecast.radiofrance.fr/fip-hifi.aac",
            "website": null,
            "image_url": null,
            "frequency": "105.1 FM",
            "tags": null,
            "is_ai_generated": false
        }"#;
        let station: Station = serde_json::from_str(json).unwrap();
        assert_eq!(station.id, 7);
        assert!(station.tags.is_empty());
        assert_eq!(station.city.as_deref(), Some("Paris"));
        assert_eq!(station.location_line(), "Paris, France • Eclectic");
    }

    #[test]
    fn test_station_identity_is_id() {
        let a = Station {
            id: 1,
            name: "A".into(),
            ..Default::default()
        };
        let b = Station {
            id: 1,
            name: "renamed".into(),
            ..Default::default()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_provider_wire_names() {
        let req = ChatRequest {
            prompt: "jazz".into(),
            provider: Provider::OpenAi,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"prompt":"jazz","provider":"openai"}"#);
        let p: Provider = serde_json::from_str(r#""deepseek""#).unwrap();
        assert_eq!(p, Provider::DeepSeek);
    }
}
