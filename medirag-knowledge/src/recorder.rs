use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tracing::info;

use crate::embeddings::EmbeddingProvider;
use crate::errors::KnowledgeResult;
use crate::history::{Exchange, HistoryStore, strip_history_block};

/// Millisecond clock that never hands out the same value twice.
///
/// Exchange ids are derived from the timestamp, so two exchanges recorded
/// in the same millisecond get consecutive values instead of colliding.
#[derive(Debug, Default)]
pub struct ExchangeClock {
    last: AtomicI64,
}

impl ExchangeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

/// Persists completed exchanges into the history corpus.
#[derive(Clone)]
pub struct ExchangeRecorder {
    embedder: Arc<dyn EmbeddingProvider>,
    history: HistoryStore,
    clock: Arc<ExchangeClock>,
}

impl ExchangeRecorder {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, history: HistoryStore) -> Self {
        Self {
            embedder,
            history,
            clock: Arc::new(ExchangeClock::new()),
        }
    }

    /// Store `prompt`/`response`. Only call after the model answered.
    ///
    /// Any assembled history block is removed from the prompt first, and
    /// only the cleaned prompt is embedded.
    pub async fn record(&self, prompt: &str, response: &str) -> KnowledgeResult<Exchange> {
        let prompt = strip_history_block(prompt);
        let vector = self.embedder.embed(prompt).await?;
        let exchange = Exchange::new(self.clock.next(), prompt, response);
        self.history.append(&exchange, &vector).await?;
        info!("Stored chat exchange {}", exchange.id);
        Ok(exchange)
    }
}

impl std::fmt::Debug for ExchangeRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeRecorder")
            .field("embedder", &self.embedder.name())
            .field("history", &self.history)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_strictly_increasing() {
        let clock = ExchangeClock::new();
        let mut previous = clock.next();
        for _ in 0..1000 {
            let next = clock.next();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_clock_tracks_wall_time() {
        let before = Utc::now().timestamp_millis();
        let stamp = ExchangeClock::new().next();
        assert!(stamp >= before);
    }
}
