//! Application-level configuration loading: leaderboard ranking rules and chat relay settings.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::models::RankOrder;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "FORVIBE_CONFIG_PATH";

/// Game whose leaderboard ranks the smallest score first (reaction time in milliseconds).
pub const REACTION_GAME: &str = "reaction";
/// Title given to conversations created without one.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Chat";

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly and creative AI assistant on forvibe, a fun creative playground website. Be helpful, playful, and engaging. When users share images, analyze and describe them thoroughly.";

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub leaderboard: LeaderboardConfig,
    pub chat: ChatConfig,
}

/// Ranking rules for the Score Service.
#[derive(Debug, Clone)]
pub struct LeaderboardConfig {
    /// Per-game ranking direction, merged over the built-in entries; games not listed
    /// rank higher scores first.
    pub games: IndexMap<String, RankOrder>,
    /// Insert a couple of demo rows at startup when the leaderboards are empty.
    pub seed_demo_scores: bool,
}

impl LeaderboardConfig {
    /// Ranking direction for `game_name`.
    pub fn rank_order(&self, game_name: &str) -> RankOrder {
        self.games.get(game_name).copied().unwrap_or_default()
    }
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            games: IndexMap::from([
                ("clicker".to_string(), RankOrder::HigherIsBetter),
                (REACTION_GAME.to_string(), RankOrder::LowerIsBetter),
            ]),
            seed_demo_scores: false,
        }
    }
}

/// Settings for the Chat Relay and its upstream model.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    /// Reply with an event stream (`true`) or a single buffered JSON body.
    pub streaming: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            streaming: true,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        games = app_config.leaderboard.games.len(),
                        streaming = app_config.chat.streaming,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document. Omitted keys keep their default value.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            leaderboard: LeaderboardConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawConfig {
    leaderboard: Option<RawLeaderboard>,
    chat: Option<RawChat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawLeaderboard {
    games: Option<IndexMap<String, RawRankOrder>>,
    seed_demo_scores: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawChat {
    model: Option<String>,
    system_prompt: Option<String>,
    max_tokens: Option<u32>,
    streaming: Option<bool>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawRankOrder {
    HigherIsBetter,
    LowerIsBetter,
}

impl From<RawRankOrder> for RankOrder {
    fn from(value: RawRankOrder) -> Self {
        match value {
            RawRankOrder::HigherIsBetter => RankOrder::HigherIsBetter,
            RawRankOrder::LowerIsBetter => RankOrder::LowerIsBetter,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let mut config = AppConfig::default();

        if let Some(leaderboard) = value.leaderboard {
            if let Some(games) = leaderboard.games {
                config.leaderboard.games.extend(
                    games
                        .into_iter()
                        .map(|(game, order)| (game, RankOrder::from(order))),
                );
            }
            if let Some(seed) = leaderboard.seed_demo_scores {
                config.leaderboard.seed_demo_scores = seed;
            }
        }

        if let Some(chat) = value.chat {
            if let Some(model) = chat.model.filter(|model| !model.trim().is_empty()) {
                config.chat.model = model;
            }
            if let Some(prompt) = chat.system_prompt {
                config.chat.system_prompt = prompt;
            }
            if let Some(max_tokens) = chat.max_tokens.filter(|max| *max > 0) {
                config.chat.max_tokens = max_tokens;
            }
            if let Some(streaming) = chat.streaming {
                config.chat.streaming = streaming;
            }
        }

        config
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_rank_reaction_ascending_and_others_descending() {
        let config = AppConfig::default();
        assert_eq!(
            config.leaderboard.rank_order(REACTION_GAME),
            RankOrder::LowerIsBetter
        );
        assert_eq!(
            config.leaderboard.rank_order("clicker"),
            RankOrder::HigherIsBetter
        );
        assert_eq!(
            config.leaderboard.rank_order("never-heard-of-it"),
            RankOrder::HigherIsBetter
        );
        assert_eq!(config.chat.model, "gpt-4o");
        assert_eq!(config.chat.max_tokens, 2048);
        assert!(config.chat.streaming);
    }

    #[test]
    fn partial_document_keeps_unspecified_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "leaderboard": {"games": {"golf": "lower_is_better"}, "seedDemoScores": true},
                "chat": {"streaming": false, "maxTokens": 0}
            }"#,
        )
        .unwrap();

        assert_eq!(config.leaderboard.rank_order("golf"), RankOrder::LowerIsBetter);
        assert_eq!(
            config.leaderboard.rank_order(REACTION_GAME),
            RankOrder::LowerIsBetter
        );
        assert!(config.leaderboard.seed_demo_scores);
        assert!(!config.chat.streaming);
        assert_eq!(config.chat.max_tokens, 2048);
        assert_eq!(config.chat.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn unknown_rank_order_is_rejected() {
        assert!(AppConfig::from_json(r#"{"leaderboard": {"games": {"x": "sideways"}}}"#).is_err());
    }

    #[test]
    fn empty_document_is_the_default() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.leaderboard.games, AppConfig::default().leaderboard.games);
    }
}
