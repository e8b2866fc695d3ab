//! Built-in catalog used when the catalog service cannot be reached.

use crate::protocol::Station;

pub fn fallback_stations() -> Vec<Station> {
    vec![
        Station {
            id: 1,
            name: "BBC Radio 1".to_string(),
            description: Some(
                "The world's most famous radio station playing the latest hits".to_string(),
            ),
            country: "UK".to_string(),
            city: Some("London".to_string()),
            genre: "Pop".to_string(),
            language: "English".to_string(),
            stream_url: "https://stream.live.vc.bbcmedia.co.uk/bbc_radio_one".to_string(),
            website: Some("https://www.bbc.co.uk/sounds/play/live:bbc_radio_one".to_string()),
            image_url: Some(
                "https://static.bbc.co.uk/radio/station/images/base/64/c5/bbc_radio_one.png"
                    .to_string(),
            ),
            frequency: Some("97-99 FM".to_string()),
            tags: vec![
                "pop".to_string(),
                "hits".to_string(),
                "chart".to_string(),
                "new music".to_string(),
            ],
            is_ai_generated: false,
        },
        Station {
            id: 2,
            name: "KEXP 90.3 FM".to_string(),
            description: Some(
                "Seattle's influential public radio station championing musical discovery"
                    .to_string(),
            ),
            country: "USA".to_string(),
            city: Some("Seattle".to_string()),
            genre: "Alternative".to_string(),
            language: "English".to_string(),
            stream_url: "https://kexp-streams.akamaized.net/stream/1/".to_string(),
            website: Some("https://www.kexp.org".to_string()),
            image_url: Some("https://www.kexp.org/static/assets/img/kexp-logo-square.png".to_string()),
            frequency: Some("90.3 FM".to_string()),
            tags: vec![
                "alternative".to_string(),
                "indie".to_string(),
                "discovery".to_string(),
                "live sessions".to_string(),
            ],
            is_ai_generated: false,
        },
    ]
}
