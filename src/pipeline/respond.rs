//! Response lookup: recognized command → canned local response.
//!
//! Pure table lookup, no model borrow. An unknown command resolves to the
//! designated unhandled sentinel; the stage never returns an empty response.

use serde::{Deserialize, Serialize};

/// Response text for commands with no table entry.
pub const UNHANDLED_RESPONSE: &str = "Command understood but not implemented";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Command name → response text pairs.
    pub responses: Vec<(String, String)>,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        let table = [
            ("turn_on_light", "Light turned on"),
            ("turn_off_light", "Light turned off"),
            ("increase_volume", "Volume increased"),
            ("decrease_volume", "Volume decreased"),
            ("play_music", "Playing music"),
            ("stop_music", "Music stopped"),
            ("set_timer", "Timer set"),
            ("check_weather", "Weather data not available offline"),
            ("tell_time", "Clock not available"),
            ("help", "I can control lights, volume, and music"),
        ];
        Self {
            responses: table.iter().map(|(c, r)| (c.to_string(), r.to_string())).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseVerdict {
    pub response: String,
    /// False when the command fell through to the unhandled sentinel.
    pub handled: bool,
}

#[derive(Debug, Clone)]
pub struct ResponseStage {
    config: ResponseConfig,
}

impl ResponseStage {
    pub fn new(config: ResponseConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, command: &str) -> ResponseVerdict {
        match self.config.responses.iter().find(|(c, _)| c == command) {
            Some((_, response)) => ResponseVerdict { response: response.clone(), handled: true },
            None => ResponseVerdict { response: UNHANDLED_RESPONSE.to_string(), handled: false },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_command_gets_its_response() {
        let stage = ResponseStage::new(ResponseConfig::default());
        let verdict = stage.evaluate("play_music");
        assert!(verdict.handled);
        assert_eq!(verdict.response, "Playing music");
    }

    #[test]
    fn unknown_command_gets_sentinel_never_empty() {
        let stage = ResponseStage::new(ResponseConfig::default());
        let verdict = stage.evaluate("fly_to_the_moon");
        assert!(!verdict.handled);
        assert_eq!(verdict.response, UNHANDLED_RESPONSE);
        assert!(!verdict.response.is_empty());
    }
}
