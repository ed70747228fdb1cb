// Wires the pipeline together and owns the poll loop:
// feed → parser → evaluator → execution, one pass per tick.

use crate::config::Settings;
use crate::exchange::ExchangeApi;
use crate::execution::{EngineOutcome, ExecutionEngine, PositionManager, PrecisionResolver};
use crate::feed::Poller;
use crate::parser;
use crate::report::JsonlReporter;
use crate::signal::SignalEvaluator;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// What a single cycle did, in coarse strokes. Mostly for logs and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Feed had nothing new
    NoNewPost,
    /// New post, but not a transfer announcement
    NotATransaction,
    /// Parsed fine, evaluator declined it
    Rejected,
    /// Signal accepted, entry guard declined it
    Skipped,
    /// A short was opened
    Opened { symbol: String },
    /// Execution errored after the signal was accepted
    Failed { symbol: String },
}

pub struct Bot {
    settings: Settings,
    poller: Poller,
    evaluator: SignalEvaluator,
    exchange: Arc<dyn ExchangeApi>,
    positions: PositionManager,
    resolver: PrecisionResolver,
    reporter: Option<JsonlReporter>,
}

impl Bot {
    pub fn new(
        settings: Settings,
        poller: Poller,
        exchange: Arc<dyn ExchangeApi>,
    ) -> anyhow::Result<Self> {
        let evaluator = SignalEvaluator::new(&settings);
        let positions = PositionManager::new(exchange.clone());
        let resolver = PrecisionResolver::new(exchange.clone());
        let reporter = settings
            .report_path
            .as_deref()
            .map(JsonlReporter::open)
            .transpose()?;
        if let Some(reporter) = &reporter {
            tracing::info!(path = %reporter.path().display(), "reporting parsed transactions");
        }

        Ok(Self {
            settings,
            poller,
            evaluator,
            exchange,
            positions,
            resolver,
            reporter,
        })
    }

    /// One full pass. Errors bubbling out of here are infrastructure
    /// failures (feed unreachable); everything downstream of a parsed
    /// post is handled and folded into the outcome.
    pub async fn run_cycle(&mut self) -> anyhow::Result<CycleOutcome> {
        let Some(post) = self.poller.poll().await? else {
            return Ok(CycleOutcome::NoNewPost);
        };
        tracing::debug!(id = %post.id, "new post observed");

        let Some(mut tx) = parser::parse(&post.text) else {
            tracing::debug!(id = %post.id, "post is not a transfer announcement");
            return Ok(CycleOutcome::NotATransaction);
        };

        if let Some(title) = &post.timestamp_title {
            tx.timestamp_text = Some(title.clone());
            tx.timestamp = parser::timestamp::normalize(title, Utc::now());
        }
        tx.source_link = post.link.clone();

        if let Some(reporter) = &mut self.reporter {
            if let Err(e) = reporter.record(&tx) {
                tracing::warn!(error = %e, "failed to append report row");
            }
        }

        let Some(signal) = self.evaluator.evaluate(&tx) else {
            return Ok(CycleOutcome::Rejected);
        };

        let Some(instrument) = self.evaluator.instrument(&signal.symbol).cloned() else {
            return Ok(CycleOutcome::Rejected);
        };

        let mut engine = ExecutionEngine::new(
            self.exchange.clone(),
            self.settings.trading.clone(),
            instrument,
            signal.symbol.clone(),
        );

        match engine.run(&mut self.positions, &self.resolver).await {
            Ok(EngineOutcome::Opened(position)) => Ok(CycleOutcome::Opened {
                symbol: position.symbol,
            }),
            Ok(EngineOutcome::Skipped { reason }) => {
                tracing::info!(symbol = %signal.symbol, reason, "entry skipped");
                Ok(CycleOutcome::Skipped)
            }
            Err(e) => {
                tracing::error!(
                    symbol = %signal.symbol,
                    error = %e,
                    "execution failed for this signal"
                );
                Ok(CycleOutcome::Failed {
                    symbol: signal.symbol,
                })
            }
        }
    }

    /// Poll on a fixed interval until shutdown flips. The shutdown check
    /// sits between cycles, so an in-flight trade always finishes before
    /// the loop stops.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.settings.feed.poll_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    tracing::info!("shutdown requested");
                    break;
                }
            }

            match self.run_cycle().await {
                Ok(outcome) => tracing::debug!(?outcome, "cycle complete"),
                Err(e) => tracing::error!(error = %e, "cycle failed"),
            }

            if *shutdown.borrow() {
                break;
            }
        }

        tracing::info!(
            positions = self.positions.recorded_count(),
            "loop stopped"
        );
    }
}
