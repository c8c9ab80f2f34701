//! Effect executor
//!
//! Runs the effects returned by [`update`] on tokio tasks and feeds their
//! outcomes back as messages. Timers are never cancelled: a superseded
//! timer still fires and the reducer ignores it by generation.

use crate::client::CatalogClient;
use crate::state::{update, ClientState, Effect, Msg, RetryTarget};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

pub struct Runtime {
    client: Arc<dyn CatalogClient>,
    tx: mpsc::UnboundedSender<Msg>,
    rx: mpsc::UnboundedReceiver<Msg>,
}

impl Runtime {
    pub fn new(client: Arc<dyn CatalogClient>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { client, tx, rx }
    }

    /// Sender for messages produced outside the runtime (e.g. SSE notices)
    pub fn sender(&self) -> mpsc::UnboundedSender<Msg> {
        self.tx.clone()
    }

    /// Reduce `msg` into `state` and start the resulting effects
    pub fn dispatch(&self, state: ClientState, msg: Msg) -> ClientState {
        let (state, effects) = update(state, msg, Instant::now());
        for effect in effects {
            self.execute(effect);
        }
        state
    }

    /// Dispatch every message already queued, without waiting
    pub fn drain(&mut self, mut state: ClientState) -> (ClientState, usize) {
        let mut handled = 0;
        while let Ok(msg) = self.rx.try_recv() {
            state = self.dispatch(state, msg);
            handled += 1;
        }
        (state, handled)
    }

    /// Wait for the next queued message
    pub async fn recv(&mut self) -> Option<Msg> {
        self.rx.recv().await
    }

    pub fn execute(&self, effect: Effect) {
        trace!(?effect, "Executing effect");
        let tx = self.tx.clone();
        let client = Arc::clone(&self.client);

        match effect {
            Effect::FetchOverview { generation } => {
                tokio::spawn(async move {
                    let result = client.overview().await;
                    let _ = tx.send(Msg::OverviewLoaded { generation, result });
                });
            }
            Effect::FetchMastery { user, generation } => {
                tokio::spawn(async move {
                    let result = client.mastery(user).await;
                    let _ = tx.send(Msg::MasteryLoaded { generation, result });
                });
            }
            Effect::FetchPage {
                key,
                generation,
                request,
            } => {
                tokio::spawn(async move {
                    let result = client.list(request).await;
                    if let Err(e) = &result {
                        debug!(category = %key.category, error = %e, "Page fetch failed");
                    }
                    let _ = tx.send(Msg::PageLoaded {
                        key,
                        generation,
                        result,
                    });
                });
            }
            Effect::FetchSearch {
                generation,
                request,
            } => {
                tokio::spawn(async move {
                    let result = client.search(request).await;
                    let _ = tx.send(Msg::SearchLoaded { generation, result });
                });
            }
            Effect::ScheduleSearch { generation, delay } => {
                tokio::spawn(async move {
                    sleep(delay).await;
                    let _ = tx.send(Msg::SearchDue { generation });
                });
            }
            Effect::ScheduleRetry {
                target,
                generation,
                delay,
            } => {
                if let RetryTarget::Listing(key) = &target {
                    debug!(category = %key.category, delay_ms = delay.as_millis() as u64, "Retrying page fetch");
                }
                tokio::spawn(async move {
                    sleep(delay).await;
                    let _ = tx.send(Msg::RetryDue { target, generation });
                });
            }
        }
    }
}
