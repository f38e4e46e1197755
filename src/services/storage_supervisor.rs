use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{dao::storage::StorageError, services::score_service, state::SharedState};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Delay between attempts, doubled after each failure up to `max`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: INITIAL_DELAY,
            max: MAX_DELAY,
        }
    }
}

/// Prepare the store schema in the background, then seed demo scores.
///
/// Requests that reach the store before the schema exists fail with a storage error.
pub async fn run(state: SharedState, backoff: Backoff) {
    let store = state.store().clone();
    let attempts = retry_until_ready(move || store.prepare_schema(), backoff).await;
    info!(attempts, "storage schema ready");

    if let Err(err) = score_service::seed_demo_scores(&state).await {
        warn!(error = %err, "demo score seeding failed");
    }
}

/// Call `attempt` until it succeeds, sleeping with exponential backoff in between.
/// Returns how many calls were made.
pub async fn retry_until_ready<F, Fut>(mut attempt: F, backoff: Backoff) -> u32
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), StorageError>>,
{
    let mut delay = backoff.initial;
    let mut calls = 0;

    loop {
        calls += 1;
        match attempt().await {
            Ok(()) => return calls,
            Err(err) => {
                warn!(attempt = calls, error = %err, retry_in = ?delay, "storage schema setup failed");
                sleep(delay).await;
                delay = (delay * 2).min(backoff.max);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{
            Arc,
            atomic::{AtomicU32, Ordering},
        },
    };

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            completion::openai::{OpenAiClient, OpenAiConfig},
            models::RankOrder,
            store::{ScoreStore, memory::MemoryStore},
        },
        state::AppState,
    };

    const FAST: Backoff = Backoff {
        initial: Duration::from_millis(1),
        max: Duration::from_millis(4),
    };

    #[tokio::test]
    async fn keeps_retrying_until_the_database_answers() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let attempts = retry_until_ready(
            move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                        Err(StorageError::unavailable(
                            "connection refused".into(),
                            io::Error::from(io::ErrorKind::ConnectionRefused),
                        ))
                    } else {
                        Ok(())
                    }
                }
            },
            FAST,
        )
        .await;

        assert_eq!(attempts, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn ready_store_is_seeded_when_enabled() {
        let mut config = AppConfig::default();
        config.leaderboard.seed_demo_scores = true;
        let store = MemoryStore::new();
        let completions = OpenAiClient::new(OpenAiConfig::from_env("gpt-4o", 16)).unwrap();
        let state = AppState::new(Arc::new(store.clone()), Arc::new(completions), config);

        run(state, FAST).await;

        let clicker = store
            .top_scores("clicker".into(), RankOrder::HigherIsBetter, 10)
            .await
            .unwrap();
        assert_eq!(clicker.len(), 1);
        assert_eq!(clicker[0].player_name, "VibeCheck");
    }
}
