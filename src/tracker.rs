//! Live activity tracker
//!
//! The tracker is an actor: one task owns the [`TrackingSession`] and every
//! resource attached to it (live subscription, simulated replay, tick timer),
//! and applies three kinds of input in order:
//!
//! 1. source events (fixes, interruptions, end of a simulated route)
//! 2. timer ticks
//! 3. commands sent through a [`Tracker`] handle
//!
//! Every source is handed a sink stamped with the current source epoch. Any
//! release of a source bumps the epoch, so fixes still queued from a released
//! source are discarded instead of reaching the session.

use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::error::TrackingError;
use crate::session::TrackingSession;
use crate::source::simulated::spawn_replay;
use crate::source::{
    acquire_initial_fix, request_access, subscribe_live, LocationProvider, SampleSink,
    SimulatedRoute, SourceEvent, SourceMessage, Subscription, TaskSubscription,
};
use crate::timer::TimerDriver;
use crate::types::{FinishedSession, LocationSample, SessionSnapshot, TrackingState, Waypoint};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Capacity of the command queue
const COMMAND_QUEUE_DEPTH: usize = 32;

type Reply<T> = oneshot::Sender<Result<T, TrackingError>>;

enum Command {
    Start(Reply<SessionSnapshot>),
    Pause(Reply<SessionSnapshot>),
    Resume(Reply<SessionSnapshot>),
    Stop(Reply<FinishedSession>),
    StartSimulation(Option<SimulatedRoute>, Reply<SessionSnapshot>),
    StopSimulation(Reply<Vec<LocationSample>>),
    Snapshot(Reply<SessionSnapshot>),
    Path(Reply<Vec<LocationSample>>),
}

/// Handle to a running tracker.
///
/// Clones share the same tracker. The tracker task ends, releasing every
/// resource, once the last handle is dropped.
#[derive(Clone)]
pub struct Tracker {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl Tracker {
    /// Spawn a tracker on the current tokio runtime using the system clock
    pub fn spawn(
        provider: Arc<dyn LocationProvider>,
        config: TrackerConfig,
    ) -> Result<Self, TrackingError> {
        Self::spawn_with_clock(provider, Arc::new(SystemClock), config)
    }

    /// Spawn a tracker reading time from `clock`
    pub fn spawn_with_clock(
        provider: Arc<dyn LocationProvider>,
        clock: Arc<dyn Clock>,
        config: TrackerConfig,
    ) -> Result<Self, TrackingError> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (source_tx, source_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let actor = TrackerActor {
            provider,
            clock,
            config,
            session: None,
            live: None,
            simulation: None,
            timer: TimerDriver::new(),
            epoch: 0,
            source_tx,
            tick_tx,
            snapshot_tx,
        };
        tokio::spawn(actor.run(command_rx, source_rx, tick_rx));

        Ok(Self {
            commands: command_tx,
            snapshots: snapshot_rx,
        })
    }

    /// Begin a session from the live location source.
    ///
    /// Suspends while permission is requested and the initial fix is
    /// obtained (bounded by the configured retry policy).
    pub async fn start(&self) -> Result<SessionSnapshot, TrackingError> {
        self.request(Command::Start).await
    }

    pub async fn pause(&self) -> Result<SessionSnapshot, TrackingError> {
        self.request(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<SessionSnapshot, TrackingError> {
        self.request(Command::Resume).await
    }

    /// End the session, returning everything it recorded
    pub async fn stop(&self) -> Result<FinishedSession, TrackingError> {
        self.request(Command::Stop).await
    }

    /// Switch to the default simulated loop
    pub async fn start_simulation(&self) -> Result<SessionSnapshot, TrackingError> {
        self.request(|reply| Command::StartSimulation(None, reply)).await
    }

    /// Switch to a simulated replay of `route`
    pub async fn start_simulation_with(
        &self,
        route: SimulatedRoute,
    ) -> Result<SessionSnapshot, TrackingError> {
        self.request(|reply| Command::StartSimulation(Some(route), reply)).await
    }

    /// Return to the live source; yields the samples of the simulated segment
    pub async fn stop_simulation(&self) -> Result<Vec<LocationSample>, TrackingError> {
        self.request(Command::StopSimulation).await
    }

    /// Current statistics, after every input queued so far has been applied
    pub async fn snapshot(&self) -> Result<SessionSnapshot, TrackingError> {
        self.request(Command::Snapshot).await
    }

    /// The path recorded so far
    pub async fn path(&self) -> Result<Vec<LocationSample>, TrackingError> {
        self.request(Command::Path).await
    }

    /// Receiver updated after every change to the session
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, TrackingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| TrackingError::TrackerClosed)?;
        reply_rx.await.map_err(|_| TrackingError::TrackerClosed)?
    }
}

struct TrackerActor {
    provider: Arc<dyn LocationProvider>,
    clock: Arc<dyn Clock>,
    config: TrackerConfig,
    session: Option<TrackingSession>,
    live: Option<Box<dyn Subscription>>,
    simulation: Option<TaskSubscription>,
    timer: TimerDriver,
    epoch: u64,
    source_tx: mpsc::UnboundedSender<SourceMessage>,
    tick_tx: mpsc::UnboundedSender<()>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl TrackerActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut sources: mpsc::UnboundedReceiver<SourceMessage>,
        mut ticks: mpsc::UnboundedReceiver<()>,
    ) {
        tracing::debug!("Tracker started");

        loop {
            tokio::select! {
                biased;

                Some(message) = sources.recv() => self.on_source(message).await,

                Some(()) = ticks.recv() => self.on_tick(),

                command = commands.recv() => {
                    let Some(command) = command else { break };
                    self.handle(command).await;
                }
            }
        }

        self.release_sources();
        self.timer.stop();
        tracing::debug!("Tracker stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Start(reply) => {
                let _ = reply.send(self.start().await);
            }
            Command::Pause(reply) => {
                let _ = reply.send(self.pause());
            }
            Command::Resume(reply) => {
                let _ = reply.send(self.resume().await);
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.stop());
            }
            Command::StartSimulation(route, reply) => {
                let _ = reply.send(self.start_simulation(route));
            }
            Command::StopSimulation(reply) => {
                let _ = reply.send(self.stop_simulation().await);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(Ok(self.snapshot()));
            }
            Command::Path(reply) => {
                let path = self
                    .session
                    .as_ref()
                    .map(|s| s.samples().to_vec())
                    .unwrap_or_default();
                let _ = reply.send(Ok(path));
            }
        }
    }

    async fn start(&mut self) -> Result<SessionSnapshot, TrackingError> {
        if self.session.is_some() {
            return Err(TrackingError::SessionAlreadyActive);
        }

        let provider = Arc::clone(&self.provider);
        request_access(provider.as_ref()).await?;
        let fix = acquire_initial_fix(provider.as_ref(), &self.config).await?;
        let subscription = subscribe_live(provider.as_ref(), &self.config, self.sink()).await?;

        let now = self.clock.now_ms();
        self.session = Some(TrackingSession::with_initial_fix(
            now,
            self.config.calories_per_km,
            fix,
        ));
        self.live = Some(subscription);
        self.start_timer();

        tracing::info!(started_at = now, "Tracking session started");
        Ok(self.publish())
    }

    fn pause(&mut self) -> Result<SessionSnapshot, TrackingError> {
        let now = self.clock.now_ms();
        let session = self.session_mut("pause")?;
        session.pause(now)?;
        let elapsed = session.elapsed_seconds();
        let simulating = session.is_simulating();

        self.timer.stop();
        if simulating {
            self.end_simulation();
        }

        tracing::info!(elapsed_seconds = elapsed, "Tracking paused");
        Ok(self.publish())
    }

    async fn resume(&mut self) -> Result<SessionSnapshot, TrackingError> {
        let now = self.clock.now_ms();
        self.session_mut("resume")?.resume(now)?;
        self.start_timer();

        if self.live.is_none() && self.simulation.is_none() {
            let provider = Arc::clone(&self.provider);
            match subscribe_live(provider.as_ref(), &self.config, self.sink()).await {
                Ok(subscription) => self.live = Some(subscription),
                Err(err) => {
                    self.mark_interrupted(TrackingError::StreamInterrupted(err.to_string()))
                }
            }
        }

        tracing::info!("Tracking resumed");
        Ok(self.publish())
    }

    fn stop(&mut self) -> Result<FinishedSession, TrackingError> {
        let now = self.clock.now_ms();
        let session = self.session.take().ok_or(TrackingError::InvalidTransition {
            operation: "stop",
            state: TrackingState::Idle,
        })?;

        self.release_sources();
        self.timer.stop();

        let finished = session.finish(now);
        tracing::info!(
            elapsed_seconds = finished.elapsed_seconds,
            distance_km = finished.distance_km,
            samples = finished.samples.len(),
            "Tracking session stopped"
        );
        self.publish();
        Ok(finished)
    }

    fn start_simulation(
        &mut self,
        route: Option<SimulatedRoute>,
    ) -> Result<SessionSnapshot, TrackingError> {
        let now = self.clock.now_ms();

        match self.session.as_ref() {
            None => {
                self.session = Some(TrackingSession::new(now, self.config.calories_per_km));
                tracing::info!(started_at = now, "Simulated session started");
            }
            Some(session) if session.state() == TrackingState::Paused => {
                return Err(TrackingError::InvalidTransition {
                    operation: "start simulation",
                    state: TrackingState::Paused,
                });
            }
            Some(session) if session.is_simulating() => {
                tracing::debug!("Simulation already running");
                return Ok(self.snapshot());
            }
            Some(_) => {}
        }

        self.release_sources();

        let mut route = route.unwrap_or_default();
        let lead_in = self
            .session
            .as_ref()
            .and_then(|s| s.last_sample())
            .map(Waypoint::from);
        if let (true, Some(start)) = (self.config.simulation.lead_in_from_last_sample, lead_in) {
            route = route.with_lead_in(start);
        }

        let points = route.samples(&self.config.simulation, now);
        tracing::info!(points = points.len(), "Switching to simulated location source");

        if let Some(session) = self.session.as_mut() {
            session.begin_simulated_segment();
        }
        self.simulation = Some(spawn_replay(
            points,
            self.config.simulation.point_interval(),
            self.sink(),
        ));
        self.start_timer();

        Ok(self.publish())
    }

    async fn stop_simulation(&mut self) -> Result<Vec<LocationSample>, TrackingError> {
        let session = self.session_mut("stop simulation")?;
        if !session.is_simulating() {
            tracing::debug!("No simulation running");
            return Ok(Vec::new());
        }

        let segment = self.end_simulation();
        if let Err(err) = self.reacquire_live().await {
            self.mark_interrupted(err);
        }
        self.publish();
        Ok(segment)
    }

    /// Cancel the replay and close the simulated segment
    fn end_simulation(&mut self) -> Vec<LocationSample> {
        self.release_sources();
        let segment = self
            .session
            .as_mut()
            .map(TrackingSession::end_simulated_segment)
            .unwrap_or_default();
        tracing::info!(samples = segment.len(), "Simulation ended");
        segment
    }

    /// Re-open the live source after a simulated segment
    async fn reacquire_live(&mut self) -> Result<(), TrackingError> {
        let provider = Arc::clone(&self.provider);
        let subscription = match request_access(provider.as_ref()).await {
            Ok(()) => subscribe_live(provider.as_ref(), &self.config, self.sink()).await,
            Err(err) => Err(err),
        }
        .map_err(|err| TrackingError::StreamInterrupted(err.to_string()))?;

        self.live = Some(subscription);
        Ok(())
    }

    /// Keep the session without a source; statistics hold until a source returns
    fn mark_interrupted(&mut self, err: TrackingError) {
        tracing::warn!(%err, "Tracking continues without a location source");
        if let Some(session) = self.session.as_mut() {
            session.mark_stream_interrupted();
        }
    }

    async fn on_source(&mut self, message: SourceMessage) {
        if message.epoch != self.epoch {
            tracing::trace!(epoch = message.epoch, "Dropping event from released source");
            return;
        }

        match message.event {
            SourceEvent::Sample(sample) => self.on_sample(sample),
            SourceEvent::Interrupted(reason) => {
                if let Some(mut live) = self.live.take() {
                    live.cancel();
                    self.epoch += 1;
                }
                self.mark_interrupted(TrackingError::StreamInterrupted(reason));
                self.publish();
            }
            SourceEvent::Finished => {
                if self.session.as_ref().is_some_and(TrackingSession::is_simulating) {
                    self.end_simulation();
                    if let Err(err) = self.reacquire_live().await {
                        self.mark_interrupted(err);
                    }
                    self.publish();
                }
            }
        }
    }

    fn on_sample(&mut self, sample: LocationSample) {
        match self.session.as_mut() {
            Some(session) if session.is_active() => {
                session.apply_sample(sample);
                self.publish();
            }
            _ => tracing::debug!("Ignoring sample while not recording"),
        }
    }

    fn on_tick(&mut self) {
        let now = self.clock.now_ms();
        if let Some(session) = self.session.as_mut() {
            session.refresh_elapsed(now);
            self.publish();
        }
    }

    fn session_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut TrackingSession, TrackingError> {
        self.session.as_mut().ok_or(TrackingError::InvalidTransition {
            operation,
            state: TrackingState::Idle,
        })
    }

    fn sink(&self) -> SampleSink {
        SampleSink::new(self.epoch, self.source_tx.clone())
    }

    fn start_timer(&mut self) {
        self.timer.start(self.config.tick_interval(), self.tick_tx.clone());
    }

    /// Cancel every source and invalidate anything they already queued
    fn release_sources(&mut self) {
        let mut released = false;
        if let Some(mut live) = self.live.take() {
            live.cancel();
            released = true;
        }
        if let Some(mut simulation) = self.simulation.take() {
            simulation.cancel();
            released = true;
        }
        if released {
            self.epoch += 1;
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        self.session
            .as_ref()
            .map(TrackingSession::snapshot)
            .unwrap_or_default()
    }

    fn publish(&self) -> SessionSnapshot {
        let snapshot = self.snapshot();
        self.snapshot_tx.send_replace(snapshot.clone());
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ProviderError;
    use crate::source::scripted::ScriptedProvider;
    use crate::source::DEFAULT_LOOP;
    use std::time::Duration;

    const T0: i64 = 1_705_300_000_000;

    struct Rig {
        tracker: Tracker,
        provider: ScriptedProvider,
        clock: ManualClock,
    }

    fn rig_with(provider: ScriptedProvider) -> Rig {
        let clock = ManualClock::new(T0);
        let tracker = Tracker::spawn_with_clock(
            Arc::new(provider.clone()),
            Arc::new(clock.clone()),
            TrackerConfig::default(),
        )
        .unwrap();
        Rig {
            tracker,
            provider,
            clock,
        }
    }

    fn rig() -> Rig {
        rig_with(ScriptedProvider::with_fix(
            LocationSample::new(47.478870, -0.563408, T0).with_accuracy(5.0),
        ))
    }

    async fn settle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_then_stop_immediately() {
        let rig = rig();
        let started = rig.tracker.start().await.unwrap();
        assert_eq!(started.state, TrackingState::Active);
        assert_eq!(started.sample_count, 1);
        assert_eq!(rig.provider.open_subscriptions(), 1);

        let finished = rig.tracker.stop().await.unwrap();
        assert_eq!(finished.elapsed_seconds, 0);
        assert!(finished.samples.len() <= 1);
        assert_eq!(rig.provider.open_subscriptions(), 0);
        assert_eq!(rig.tracker.snapshot().await.unwrap(), SessionSnapshot::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_never_starts() {
        let rig = rig_with(ScriptedProvider::denied());
        let err = rig.tracker.start().await.unwrap_err();
        assert!(matches!(err, TrackingError::PermissionDenied));
        assert_eq!(rig.provider.fix_requests(), 0);
        assert_eq!(rig.tracker.snapshot().await.unwrap().state, TrackingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_fix_never_starts_and_holds_nothing() {
        let rig = rig_with(ScriptedProvider::granted());
        let err = rig.tracker.start().await.unwrap_err();
        assert!(matches!(err, TrackingError::InitialFixUnavailable { attempts: 3 }));
        assert_eq!(rig.provider.watch_calls(), 0);
        assert_eq!(rig.provider.open_subscriptions(), 0);

        // Tracker remains usable once a fix is available
        rig.provider.push_fix(Ok(LocationSample::new(1.0, 1.0, T0)));
        assert!(rig.tracker.start().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_subscription_surfaces_error() {
        let rig = rig();
        rig.provider.fail_watch(true);
        let err = rig.tracker.start().await.unwrap_err();
        assert!(matches!(err, TrackingError::Provider(_)));
        assert_eq!(rig.tracker.snapshot().await.unwrap().state, TrackingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_rejected() {
        let rig = rig();
        rig.tracker.start().await.unwrap();
        assert!(matches!(
            rig.tracker.start().await,
            Err(TrackingError::SessionAlreadyActive)
        ));
        rig.tracker.pause().await.unwrap();
        assert!(matches!(
            rig.tracker.start().await,
            Err(TrackingError::SessionAlreadyActive)
        ));
        assert_eq!(rig.provider.open_subscriptions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_update_statistics() {
        let rig = rig();
        rig.tracker.start().await.unwrap();

        for i in 1..=20 {
            let latitude = 47.478870 + 0.0005 * i as f64;
            let sample = LocationSample::new(latitude, -0.563408, T0 + i * 1000).with_speed(3.5);
            assert_eq!(rig.provider.emit(sample), 1);
        }

        let snap = rig.tracker.snapshot().await.unwrap();
        assert_eq!(snap.sample_count, 21);
        assert!(snap.distance_km > 1.0);
        assert_eq!(snap.calories, (snap.distance_km * 60.0).floor() as u32);
        assert!((snap.speed_kmh - 12.6).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_excludes_paused_interval() {
        let rig = rig();
        rig.tracker.start().await.unwrap();

        rig.clock.advance_secs(10);
        settle(1_100).await;
        assert_eq!(rig.tracker.snapshot().await.unwrap().elapsed_seconds, 10);

        let paused = rig.tracker.pause().await.unwrap();
        assert_eq!(paused.state, TrackingState::Paused);
        assert_eq!(paused.elapsed_seconds, 10);

        rig.clock.advance_secs(30);
        settle(3_000).await;
        assert_eq!(rig.tracker.snapshot().await.unwrap().elapsed_seconds, 10);

        rig.tracker.resume().await.unwrap();
        rig.clock.advance_secs(5);
        settle(1_100).await;
        assert_eq!(rig.tracker.snapshot().await.unwrap().elapsed_seconds, 15);

        let finished = rig.tracker.stop().await.unwrap();
        assert_eq!(finished.elapsed_seconds, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_ignored_while_paused() {
        let rig = rig();
        rig.tracker.start().await.unwrap();
        rig.tracker.pause().await.unwrap();

        rig.provider.emit(LocationSample::new(47.5, -0.56, T0 + 1000));
        let snap = rig.tracker.snapshot().await.unwrap();
        assert_eq!(snap.sample_count, 1);
        assert_eq!(snap.distance_km, 0.0);
        // The subscription stays open across the pause
        assert_eq!(rig.provider.open_subscriptions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_releases_everything() {
        let rig = rig();
        rig.tracker.start().await.unwrap();
        rig.provider.emit(LocationSample::new(47.4790, -0.5634, T0 + 1000));

        let finished = rig.tracker.stop().await.unwrap();
        assert_eq!(finished.samples.len(), 2);
        assert_eq!(rig.provider.open_subscriptions(), 0);
        assert_eq!(rig.provider.emit(LocationSample::new(47.48, -0.56, T0 + 2000)), 0);

        settle(5_000).await;
        let snap = rig.tracker.snapshot().await.unwrap();
        assert_eq!(snap, SessionSnapshot::default());
        assert!(rig.tracker.path().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_transitions() {
        let rig = rig();
        assert!(matches!(
            rig.tracker.pause().await,
            Err(TrackingError::InvalidTransition { state: TrackingState::Idle, .. })
        ));
        assert!(matches!(
            rig.tracker.stop().await,
            Err(TrackingError::InvalidTransition { operation: "stop", .. })
        ));
        rig.tracker.start().await.unwrap();
        assert!(matches!(
            rig.tracker.resume().await,
            Err(TrackingError::InvalidTransition { state: TrackingState::Active, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_from_idle_replays_51_points_then_returns_to_live() {
        let rig = rig();
        let snap = rig.tracker.start_simulation().await.unwrap();
        assert!(snap.simulating);
        assert_eq!(snap.state, TrackingState::Active);
        assert_eq!(rig.provider.permission_requests(), 0);

        settle(51 * 200 + 500).await;

        let snap = rig.tracker.snapshot().await.unwrap();
        assert!(!snap.simulating);
        assert_eq!(snap.sample_count, 51);
        assert_eq!(rig.provider.open_subscriptions(), 1);

        let path = rig.tracker.path().await.unwrap();
        assert_eq!(path.first().map(Waypoint::from), Some(DEFAULT_LOOP[0]));
        assert_eq!(path.last().map(Waypoint::from), Some(DEFAULT_LOOP[5]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_sources_preserves_statistics() {
        let rig = rig();
        rig.tracker.start().await.unwrap();
        rig.provider.emit(LocationSample::new(47.4792, -0.5632, T0 + 1000));
        rig.provider.emit(LocationSample::new(47.4795, -0.5638, T0 + 2000));
        rig.clock.advance_secs(5);
        settle(1_100).await;

        let before = rig.tracker.snapshot().await.unwrap();
        let live_path = rig.tracker.path().await.unwrap();
        assert_eq!(before.elapsed_seconds, 5);

        let during = rig.tracker.start_simulation().await.unwrap();
        assert!(during.simulating);
        assert_eq!(during.distance_km, before.distance_km);
        assert_eq!(during.elapsed_seconds, before.elapsed_seconds);
        assert_eq!(during.sample_count, before.sample_count);
        assert_eq!(rig.provider.open_subscriptions(), 0);

        settle(3 * 200 + 50).await;
        let segment = rig.tracker.stop_simulation().await.unwrap();
        assert_eq!(segment.len(), 3);
        // Lead-in: the replay starts where the runner was
        assert_eq!(Waypoint::from(&segment[0]), Waypoint::new(47.4795, -0.5638));

        let after = rig.tracker.snapshot().await.unwrap();
        assert!(!after.simulating);
        assert_eq!(after.sample_count, before.sample_count + 3);
        assert!(after.distance_km >= before.distance_km);
        assert_eq!(after.elapsed_seconds, before.elapsed_seconds);
        assert_eq!(rig.provider.open_subscriptions(), 1);

        let path = rig.tracker.path().await.unwrap();
        assert_eq!(path.len(), 6);
        assert_eq!(path[..3], live_path[..]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_simulated_samples_after_stop() {
        let rig = rig();
        rig.tracker.start_simulation().await.unwrap();
        settle(450).await;

        let finished = rig.tracker.stop().await.unwrap();
        assert_eq!(finished.samples.len(), 2);

        settle(15_000).await;
        assert_eq!(rig.tracker.snapshot().await.unwrap(), SessionSnapshot::default());
        assert_eq!(rig.provider.watch_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_during_simulation_then_resume_goes_live() {
        let rig = rig();
        rig.tracker.start().await.unwrap();
        rig.tracker.start_simulation().await.unwrap();
        settle(250).await;

        let paused = rig.tracker.pause().await.unwrap();
        assert!(!paused.simulating);
        assert_eq!(paused.sample_count, 2);

        settle(2_000).await;
        assert_eq!(rig.tracker.snapshot().await.unwrap().sample_count, 2);
        assert!(matches!(
            rig.tracker.start_simulation().await,
            Err(TrackingError::InvalidTransition { state: TrackingState::Paused, .. })
        ));

        rig.tracker.resume().await.unwrap();
        assert_eq!(rig.provider.open_subscriptions(), 1);
        assert_eq!(rig.provider.watch_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_interruption_keeps_session() {
        let rig = rig();
        rig.tracker.start().await.unwrap();
        rig.provider.interrupt("gps lost");

        let snap = rig.tracker.snapshot().await.unwrap();
        assert!(snap.stream_interrupted);
        assert_eq!(snap.state, TrackingState::Active);
        assert_eq!(rig.provider.open_subscriptions(), 0);

        rig.clock.advance_secs(3);
        settle(1_100).await;
        assert_eq!(rig.tracker.snapshot().await.unwrap().elapsed_seconds, 3);

        rig.tracker.pause().await.unwrap();
        let resumed = rig.tracker.resume().await.unwrap();
        assert_eq!(resumed.state, TrackingState::Active);
        assert_eq!(rig.provider.open_subscriptions(), 1);

        rig.provider.emit(LocationSample::new(47.4792, -0.5632, T0 + 5000));
        assert!(!rig.tracker.snapshot().await.unwrap().stream_interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_fallback_when_live_unavailable() {
        let rig = rig();
        rig.provider.set_permission(false);
        rig.tracker
            .start_simulation_with(SimulatedRoute::new(vec![
                Waypoint::new(0.0, 0.0),
                Waypoint::new(0.0, 0.001),
            ]))
            .await
            .unwrap();

        settle(11 * 200 + 200).await;
        let snap = rig.tracker.snapshot().await.unwrap();
        assert_eq!(snap.sample_count, 11);
        assert!(!snap.simulating);
        assert!(snap.stream_interrupted);
        assert_eq!(snap.state, TrackingState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_receiver_sees_updates() {
        let rig = rig();
        let mut updates = rig.tracker.watch();
        rig.tracker.start().await.unwrap();
        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update().state, TrackingState::Active);

        rig.tracker.stop().await.unwrap();
        assert_eq!(updates.borrow_and_update().state, TrackingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_releases_subscription() {
        let rig = rig();
        rig.tracker.start().await.unwrap();
        assert_eq!(rig.provider.open_subscriptions(), 1);

        let provider = rig.provider.clone();
        drop(rig);
        settle(10).await;
        assert_eq!(provider.open_subscriptions(), 0);
    }

    #[test]
    fn test_provider_error_maps_to_tracking_error() {
        let err: TrackingError = ProviderError::Subscription("busy".into()).into();
        assert!(err.to_string().contains("busy"));

        let interrupted = TrackingError::StreamInterrupted(err.to_string());
        assert!(interrupted.to_string().starts_with("Location stream interrupted"));
        assert!(interrupted.to_string().contains("busy"));
    }
}
