//! Tick scheduling
//!
//! A [`Ticker`] turns startup, source change signals and timers into a
//! stream of debounced [`Tick`]s. One tick means one reconciliation pass.
//!
//! ## Modes
//!
//! - Once: a single startup tick, then the stream ends
//! - Watching: startup, every source signal, plus a fallback timer
//! - Polling: startup plus a fixed interval timer
//!
//! ## Debouncing
//!
//! Signals are collected until `debounce` passes without a new one, then
//! released as a single tick. While the consumer is busy with a pass at
//! most one tick waits for it; further ticks fold into the waiting one.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tracing::{debug, trace};

use crate::config::ReconcilerConfig;
use crate::traits::EventStream;

/// What triggered a tick
///
/// When several signals fold into one tick, the first one is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickReason {
    Startup,
    SourceChanged,
    Timer,
}

/// A request for one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Sequence number, starting at 1
    pub seq: u64,
    pub reason: TickReason,
}

/// Ticker settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerConfig {
    /// Emit the startup tick only
    pub once: bool,
    /// Subscribe to source change signals
    pub watch: bool,
    /// Timer period while not watching
    pub interval: Duration,
    /// Timer period while watching
    pub fallback_interval: Duration,
    /// Quiet period before signals become a tick
    pub debounce: Duration,
}

impl TickerConfig {
    /// Settings from the reconciler configuration
    pub fn from_config(config: &ReconcilerConfig, once: bool) -> Self {
        Self {
            once,
            watch: config.watching_enabled(),
            interval: config.interval(),
            fallback_interval: config.fallback_interval(),
            debounce: config.debounce(),
        }
    }
}

/// Debounced tick stream
///
/// Background tasks are aborted when the ticker is dropped.
pub struct Ticker {
    ticks: mpsc::Receiver<Tick>,
    tasks: Vec<JoinHandle<()>>,
}

impl Ticker {
    /// Start producing ticks
    ///
    /// `streams` are the change signals of the watched sources; they are
    /// ignored unless `config.watch` is set.
    pub fn spawn(config: TickerConfig, streams: Vec<EventStream>) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel(64);
        let (tick_tx, tick_rx) = mpsc::channel(1);
        let mut tasks = Vec::new();

        // The channel is fresh, so this cannot be full.
        let _ = signal_tx.try_send(TickReason::Startup);

        if !config.once {
            if config.watch {
                debug!("Watching {} sources", streams.len());
                for stream in streams {
                    tasks.push(tokio::spawn(forward_changes(stream, signal_tx.clone())));
                }
                tasks.push(tokio::spawn(timer(config.fallback_interval, signal_tx.clone())));
            } else {
                tasks.push(tokio::spawn(timer(config.interval, signal_tx.clone())));
            }
        }
        drop(signal_tx);

        tasks.push(tokio::spawn(debounce(config.debounce, signal_rx, tick_tx)));

        Self {
            ticks: tick_rx,
            tasks,
        }
    }

    /// Wait for the next tick
    ///
    /// Returns `None` once no more ticks will be produced.
    pub async fn next(&mut self) -> Option<Tick> {
        self.ticks.recv().await
    }

    /// Stop all background tasks
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.ticks.close();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn forward_changes(mut stream: EventStream, tx: mpsc::Sender<TickReason>) {
    while stream.next().await.is_some() {
        trace!("Source change signal");
        if tx.send(TickReason::SourceChanged).await.is_err() {
            break;
        }
    }
}

async fn timer(period: Duration, tx: mpsc::Sender<TickReason>) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if tx.send(TickReason::Timer).await.is_err() {
            break;
        }
    }
}

async fn debounce(
    quiet: Duration,
    mut signals: mpsc::Receiver<TickReason>,
    ticks: mpsc::Sender<Tick>,
) {
    let mut seq = 0u64;
    let mut pending: Option<TickReason> = None;
    let deadline = tokio::time::sleep(quiet);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(reason) => {
                    pending.get_or_insert(reason);
                    deadline.as_mut().reset(Instant::now() + quiet);
                }
                None => {
                    if let Some(reason) = pending.take() {
                        seq += 1;
                        let _ = ticks.send(Tick { seq, reason }).await;
                    }
                    break;
                }
            },
            _ = &mut deadline, if pending.is_some() => {
                if let Some(reason) = pending.take() {
                    seq += 1;
                    match ticks.try_send(Tick { seq, reason }) {
                        Ok(()) => debug!("Tick {} ({:?})", seq, reason),
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            seq -= 1;
                            trace!("A tick is already waiting, folding {:?} into it", reason);
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => break,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(once: bool, watch: bool) -> TickerConfig {
        TickerConfig {
            once,
            watch,
            interval: Duration::from_secs(60),
            fallback_interval: Duration::from_secs(3600),
            debounce: Duration::from_secs(2),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_mode_single_tick() {
        let mut ticker = Ticker::spawn(config(true, true), Vec::new());

        assert_eq!(
            ticker.next().await,
            Some(Tick {
                seq: 1,
                reason: TickReason::Startup
            })
        );
        assert_eq!(ticker.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_interval() {
        let start = Instant::now();
        let mut ticker = Ticker::spawn(config(false, false), Vec::new());

        assert_eq!(ticker.next().await.map(|t| t.reason), Some(TickReason::Startup));
        let timer_tick = ticker.next().await.unwrap();

        assert_eq!(timer_tick.seq, 2);
        assert_eq!(timer_tick.reason, TickReason::Timer);
        assert!(start.elapsed() >= Duration::from_secs(60));
    }
}
