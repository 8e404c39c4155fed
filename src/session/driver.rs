use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local};
use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    error::TrackerError,
    storage::{entities::SessionRecord, history_store::HistoryStore},
    utils::clock::Clock,
};

use super::{
    scheduler::{CountdownPair, ReminderKind},
    SessionContext, SessionSnapshot,
};

pub const DEFAULT_TICK_FREQUENCY: Duration = Duration::from_secs(1);

/// Requests from the presentation layer.
#[derive(Debug)]
pub enum SessionCommand {
    Start,
    Stop,
    /// Intervals in seconds.
    Configure {
        short_interval: u64,
        long_interval: u64,
    },
    Reset(ReminderKind),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Everything the presentation layer gets to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started {
        at: DateTime<Local>,
        countdowns: CountdownPair,
    },
    Tick(CountdownPair),
    ReminderDue(ReminderKind),
    CountdownsChanged(CountdownPair),
    Stopped {
        record: Option<SessionRecord>,
    },
    /// The command was refused, the session is unchanged.
    Rejected(String),
    /// The session ended but could not be written to history.
    PersistenceFailed(String),
}

/// Single owner of a [SessionContext]. Commands and ticks are handled one at a time by the same
/// loop, so a stop can never interleave with a tick.
pub struct SessionDriver<S> {
    context: SessionContext<S>,
    commands: mpsc::Receiver<SessionCommand>,
    events: mpsc::Sender<SessionEvent>,
    shutdown: CancellationToken,
    tick_frequency: Duration,
    clock: Box<dyn Clock>,
    next_tick: Option<Instant>,
}

impl<S: HistoryStore> SessionDriver<S> {
    pub fn new(
        context: SessionContext<S>,
        commands: mpsc::Receiver<SessionCommand>,
        events: mpsc::Sender<SessionEvent>,
        shutdown: CancellationToken,
        tick_frequency: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            context,
            commands,
            events,
            shutdown,
            tick_frequency,
            clock,
            next_tick: None,
        }
    }

    /// Executes the session event loop. Returns after shutdown or once every command sender is
    /// gone. A running session is stopped and flushed to history before returning.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let deadline = self.next_tick.unwrap_or_else(|| self.clock.instant());

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("Command channel closed");
                        break;
                    }
                },
                _ = self.clock.sleep_until(deadline), if self.next_tick.is_some() => {
                    self.handle_tick().await;
                }
            }
        }

        self.stop_session().await;
        Ok(())
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        debug!("Handling command {command:?}");
        match command {
            SessionCommand::Start => self.start_session().await,
            SessionCommand::Stop => self.stop_session().await,
            SessionCommand::Configure {
                short_interval,
                long_interval,
            } => match self.context.configure(short_interval, long_interval) {
                Ok(()) => {
                    self.emit(SessionEvent::CountdownsChanged(self.context.countdowns()))
                        .await
                }
                Err(e) => self.emit(SessionEvent::Rejected(e.to_string())).await,
            },
            SessionCommand::Reset(kind) => {
                self.context.reset(kind);
                self.emit(SessionEvent::CountdownsChanged(self.context.countdowns()))
                    .await
            }
            SessionCommand::Snapshot(reply) => {
                if reply.send(self.context.snapshot()).is_err() {
                    debug!("Snapshot requester went away");
                }
            }
        }
    }

    async fn start_session(&mut self) {
        let now = self.clock.time();
        match self.context.start(now) {
            Ok(()) => {
                self.next_tick = Some(self.clock.instant() + self.tick_frequency);
                self.emit(SessionEvent::Started {
                    at: now,
                    countdowns: self.context.countdowns(),
                })
                .await
            }
            Err(e) => self.emit(SessionEvent::Rejected(e.to_string())).await,
        }
    }

    async fn stop_session(&mut self) {
        self.next_tick = None;
        if !self.context.is_active() {
            return;
        }

        let span = info_span!("Stopping session");
        let result = self.context.stop(self.clock.time()).instrument(span).await;
        match result {
            Ok(record) => self.emit(SessionEvent::Stopped { record }).await,
            Err(e) => {
                // History loss is reported but never takes the tracker down.
                let record = match &e {
                    TrackerError::Compaction { record, .. } => {
                        warn!("Session saved, history compaction failed {e:?}");
                        Some(*record)
                    }
                    _ => {
                        error!("Failed to save session {e:?}");
                        None
                    }
                };
                self.emit(SessionEvent::PersistenceFailed(e.to_string())).await;
                self.emit(SessionEvent::Stopped { record }).await;
            }
        }
    }

    async fn handle_tick(&mut self) {
        if let Some(previous) = self.next_tick {
            let now = self.clock.instant();
            let mut next = previous + self.tick_frequency;
            if next <= now {
                // Missed ticks (a suspended machine for example) are skipped, not replayed.
                debug!("Skipping missed ticks");
                next = now + self.tick_frequency;
            }
            self.next_tick = Some(next);
        }

        let due = self.context.tick();
        self.emit(SessionEvent::Tick(self.context.countdowns())).await;
        for kind in due {
            self.emit(SessionEvent::ReminderDue(kind)).await;
        }

        if self.context.pause_requested() {
            info!("Reminder fired, pausing session");
            self.stop_session().await;
        }
    }

    async fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.events.send(event).await {
            debug!("Nobody is listening for session events {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::{DateTime, Local, NaiveDate, TimeZone};
    use tokio::{
        sync::{mpsc, oneshot},
        task::JoinHandle,
        time::Instant,
    };
    use tokio_util::sync::CancellationToken;

    use crate::{
        session::{
            scheduler::{FirePolicy, ReminderKind, ReminderScheduler},
            SessionContext,
        },
        storage::{
            entities::SessionRecord,
            history_store::{HistoryStore, MemoryHistoryStore, MockHistoryStore},
        },
        utils::{clock::Clock, logging::TEST_LOGGING},
    };

    use super::{SessionCommand, SessionDriver, SessionEvent};

    const TEST_DATE: NaiveDate = NaiveDate::from_ymd_opt(2018, 7, 4).unwrap();

    #[derive(Clone)]
    struct TestClock {
        start_time: DateTime<Local>,
        reference: Instant,
    }

    impl TestClock {
        fn new() -> Self {
            Self {
                start_time: Local
                    .from_local_datetime(&TEST_DATE.and_hms_opt(12, 0, 0).unwrap())
                    .unwrap(),
                reference: Instant::now(),
            }
        }
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Local> {
            self.start_time + self.reference.elapsed()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep_until(&self, instant: Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    struct Harness {
        commands: mpsc::Sender<SessionCommand>,
        events: mpsc::Receiver<SessionEvent>,
        shutdown: CancellationToken,
        handle: JoinHandle<Result<()>>,
    }

    impl Harness {
        fn spawn(
            store: impl HistoryStore + 'static,
            short: u64,
            long: u64,
            policy: FirePolicy,
        ) -> Self {
            *TEST_LOGGING;
            let (commands, command_receiver) = mpsc::channel(16);
            let (event_sender, events) = mpsc::channel(4096);
            let shutdown = CancellationToken::new();
            let context =
                SessionContext::new(ReminderScheduler::new(short, long, policy).unwrap(), store, 7);
            let driver = SessionDriver::new(
                context,
                command_receiver,
                event_sender,
                shutdown.clone(),
                Duration::from_secs(1),
                Box::new(TestClock::new()),
            );
            Self {
                commands,
                events,
                shutdown,
                handle: tokio::spawn(driver.run()),
            }
        }

        async fn send(&self, command: SessionCommand) -> Result<()> {
            self.commands
                .send(command)
                .await
                .map_err(|e| anyhow!("driver is gone {e}"))
        }

        async fn snapshot(&self) -> Result<super::SessionSnapshot> {
            let (sender, receiver) = oneshot::channel();
            self.send(SessionCommand::Snapshot(sender)).await?;
            Ok(receiver.await?)
        }

        fn drain(&mut self) -> Vec<SessionEvent> {
            let mut events = vec![];
            while let Ok(event) = self.events.try_recv() {
                events.push(event);
            }
            events
        }

        async fn finish(self) -> Result<Vec<SessionEvent>> {
            let Harness {
                commands,
                mut events,
                handle,
                ..
            } = self;
            drop(commands);
            handle.await??;
            let mut collected = vec![];
            while let Some(event) = events.recv().await {
                collected.push(event);
            }
            Ok(collected)
        }
    }

    fn reminders(events: &[SessionEvent]) -> Vec<ReminderKind> {
        events
            .iter()
            .filter_map(|event| match event {
                SessionEvent::ReminderDue(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    fn ticks(events: &[SessionEvent]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, SessionEvent::Tick(_)))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_minute_long_session_is_recorded() -> Result<()> {
        let store = Arc::new(MemoryHistoryStore::new());
        let harness = Harness::spawn(store.clone(), 1200, 3600, FirePolicy::PauseSession);

        harness.send(SessionCommand::Start).await?;
        tokio::time::sleep(Duration::from_millis(60_500)).await;
        harness.send(SessionCommand::Stop).await?;

        let events = harness.finish().await?;

        assert_eq!(ticks(&events), 60);
        assert_eq!(
            events.last(),
            Some(&SessionEvent::Stopped {
                record: Some(SessionRecord::new(TEST_DATE, 1))
            })
        );
        assert_eq!(store.lines().await, vec!["2018-07-04|1".to_string()]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_session_is_not_recorded() -> Result<()> {
        let store = Arc::new(MemoryHistoryStore::new());
        let harness = Harness::spawn(store.clone(), 1200, 3600, FirePolicy::PauseSession);

        harness.send(SessionCommand::Start).await?;
        tokio::time::sleep(Duration::from_millis(59_500)).await;
        harness.send(SessionCommand::Stop).await?;

        let events = harness.finish().await?;

        assert_eq!(ticks(&events), 59);
        assert_eq!(events.last(), Some(&SessionEvent::Stopped { record: None }));
        assert!(store.lines().await.is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_rejected() -> Result<()> {
        let mut harness =
            Harness::spawn(MemoryHistoryStore::new(), 1200, 3600, FirePolicy::PauseSession);

        harness.send(SessionCommand::Start).await?;
        harness.send(SessionCommand::Start).await?;
        let snapshot = harness.snapshot().await?;

        let events = harness.drain();
        assert!(matches!(events[0], SessionEvent::Started { .. }));
        assert_eq!(
            events[1],
            SessionEvent::Rejected("a session is already active".into())
        );
        assert!(snapshot.session.active);
        harness.finish().await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_reminder_pauses_session() -> Result<()> {
        let store = Arc::new(MemoryHistoryStore::new());
        let mut harness = Harness::spawn(store.clone(), 5, 3600, FirePolicy::PauseSession);

        harness.send(SessionCommand::Start).await?;
        tokio::time::sleep(Duration::from_millis(20_500)).await;
        let snapshot = harness.snapshot().await?;

        let events = harness.drain();
        assert_eq!(reminders(&events), vec![ReminderKind::LookAway]);
        assert_eq!(ticks(&events), 5);
        assert_eq!(events.last(), Some(&SessionEvent::Stopped { record: None }));
        assert!(!snapshot.session.active);
        assert_eq!(snapshot.countdowns.short_remaining, 5);
        assert_eq!(snapshot.countdowns.long_remaining, 3595);

        // Resuming continues the long countdown where it stopped.
        harness.send(SessionCommand::Start).await?;
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        let snapshot = harness.snapshot().await?;
        assert!(snapshot.session.active);
        assert_eq!(snapshot.countdowns.long_remaining, 3593);

        harness.finish().await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_continue_policy_keeps_ticking() -> Result<()> {
        let mut harness = Harness::spawn(MemoryHistoryStore::new(), 2, 5, FirePolicy::Continue);

        harness.send(SessionCommand::Start).await?;
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        let snapshot = harness.snapshot().await?;

        let events = harness.drain();
        assert_eq!(
            reminders(&events),
            vec![
                ReminderKind::LookAway,
                ReminderKind::LookAway,
                ReminderKind::Break,
                ReminderKind::LookAway,
                ReminderKind::LookAway,
                ReminderKind::LookAway,
                ReminderKind::Break,
            ]
        );
        assert!(snapshot.session.active);
        assert_eq!(snapshot.session.elapsed_seconds, 10);
        harness.finish().await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_configure_mid_session_restarts_countdowns() -> Result<()> {
        let mut harness =
            Harness::spawn(MemoryHistoryStore::new(), 1200, 3600, FirePolicy::PauseSession);

        harness.send(SessionCommand::Start).await?;
        tokio::time::sleep(Duration::from_millis(30_500)).await;
        harness
            .send(SessionCommand::Configure {
                short_interval: 600,
                long_interval: 3600,
            })
            .await?;
        harness
            .send(SessionCommand::Configure {
                short_interval: 0,
                long_interval: 3600,
            })
            .await?;
        let snapshot = harness.snapshot().await?;

        assert_eq!(snapshot.countdowns.short_remaining, 600);
        assert_eq!(snapshot.countdowns.long_remaining, 3600);
        let events = harness.drain();
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Rejected(_))
        ));
        harness.finish().await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_running_session() -> Result<()> {
        let store = Arc::new(MemoryHistoryStore::new());
        let harness = Harness::spawn(store.clone(), 1200, 3600, FirePolicy::PauseSession);

        harness.send(SessionCommand::Start).await?;
        tokio::time::sleep(Duration::from_millis(125_500)).await;
        harness.shutdown.cancel();

        let events = harness.finish().await?;

        assert_eq!(
            events.last(),
            Some(&SessionEvent::Stopped {
                record: Some(SessionRecord::new(TEST_DATE, 2))
            })
        );
        assert_eq!(store.lines().await, vec!["2018-07-04|2".to_string()]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_compaction_failure_still_reports_record() -> Result<()> {
        let mut store = MockHistoryStore::new();
        store.expect_append().times(1).returning(|_| Ok(()));
        store
            .expect_compact()
            .times(1)
            .returning(|_, _| Err(anyhow!("permission denied")));
        let harness = Harness::spawn(store, 1200, 3600, FirePolicy::PauseSession);

        harness.send(SessionCommand::Start).await?;
        tokio::time::sleep(Duration::from_millis(60_500)).await;
        harness.send(SessionCommand::Stop).await?;

        let events = harness.finish().await?;

        let warning = events
            .iter()
            .find_map(|event| match event {
                SessionEvent::PersistenceFailed(reason) => Some(reason.clone()),
                _ => None,
            })
            .ok_or_else(|| anyhow!("no persistence warning"))?;
        assert!(warning.contains("was saved"));
        assert_eq!(
            events.last(),
            Some(&SessionEvent::Stopped {
                record: Some(SessionRecord::new(TEST_DATE, 1))
            })
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_is_not_fatal() -> Result<()> {
        let mut store = MockHistoryStore::new();
        store
            .expect_append()
            .times(1)
            .returning(|_| Err(anyhow!("read-only filesystem")));
        store.expect_compact().times(0);
        let mut harness = Harness::spawn(store, 1200, 3600, FirePolicy::PauseSession);

        harness.send(SessionCommand::Start).await?;
        tokio::time::sleep(Duration::from_millis(61_500)).await;
        harness.send(SessionCommand::Stop).await?;
        harness.send(SessionCommand::Start).await?;
        let snapshot = harness.snapshot().await?;

        let events = harness.drain();
        assert!(events
            .iter()
            .any(|event| matches!(event, SessionEvent::PersistenceFailed(_))));
        assert!(matches!(events.last(), Some(SessionEvent::Started { .. })));
        assert!(snapshot.session.active);

        harness.send(SessionCommand::Stop).await?;
        harness.finish().await?;
        Ok(())
    }
}
