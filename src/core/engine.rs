//! Playback engine: the single owner of player, looper, observers and the
//! frame path.
//!
//! **Architecture**: every mutation goes through `&mut self` on the owning
//! context. `tick(dt)` is the pump: it advances the player, keeps the looper
//! topped up and submits the current frame to the frame worker. Property
//! watchers fire inside those calls, so no locking is needed. The frame
//! worker only receives immutable snapshots (`Playable`, time,
//! `Arc<FilterChain>`).
//!
//! # States
//!
//! ```text
//! Empty --activate--> Loading --item ready--> Ready / Playing / Paused / Waiting
//!                                               |
//!                     (no loop) end of queue -> Ended
//! any --resolution error / item failure------> Failed
//! ```
//!
//! The state is derived from the player rather than stored, so it cannot
//! drift from what the player does.
//!
//! # Teardown
//!
//! Strict order: disarm observers (barrier), stop playback, release looper,
//! release observers, release player, shut the frame worker down and detach
//! the surface. `stop()` and `Drop` share the same idempotent path.

use crossbeam_channel::Receiver;
use log::{debug, info, trace, warn};
use std::sync::Arc;
use uuid::Uuid;

use super::events::{PlaybackCommand, PlayerEvent, TimeTick};
use super::looper::Looper;
use super::observers::{EventBridge, ObserverSet};
use super::player::{ItemStatus, QueuePlayer, TimeControlStatus};
use super::surface::PresentationSurface;
use super::workers::{FrameRequest, FrameWorker};
use crate::entities::asset::{AssetLocator, MediaHandle};
use crate::entities::composition::{self, Playable};
use crate::entities::filters::{self, FilterChain, FilterDescriptor};
use crate::entities::media::{MediaBackend, TrackKind};
use crate::entities::settings::Configuration;
use crate::entities::subtitles::Cue;
use crate::error::ErrorKind;

/// Engine state as seen by consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Empty,
    Loading,
    Ready,
    Playing,
    Paused,
    WaitingToPlayAtSpecifiedRate,
    Ended,
    Failed,
}

pub struct PlaybackEngine {
    backend: Arc<dyn MediaBackend>,
    surface: Arc<dyn PresentationSurface>,
    locator: AssetLocator,
    bridge: EventBridge,
    events: Receiver<PlayerEvent>,
    ticks: Receiver<TimeTick>,

    config: Configuration,
    handle: Option<MediaHandle>,
    template: Option<Playable>,
    failure: Option<ErrorKind>,
    started: bool,

    player: Option<QueuePlayer>,
    looper: Option<Looper>,
    observers: Option<ObserverSet>,
    worker: Option<FrameWorker>,
    /// Worker running and surface attached
    live: bool,

    filters: Vec<FilterDescriptor>,
    brightness: f32,
    contrast: f32,
    chain: Arc<FilterChain>,
    chain_generation: u64,
    last_submitted: Option<(Uuid, f64, u64)>,

    last_command: Option<PlaybackCommand>,
}

impl PlaybackEngine {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        surface: Arc<dyn PresentationSurface>,
        locator: AssetLocator,
    ) -> Self {
        let (bridge, events, ticks) = EventBridge::new();
        Self {
            backend,
            surface,
            locator,
            bridge,
            events,
            ticks,
            config: Configuration::default(),
            handle: None,
            template: None,
            failure: None,
            started: false,
            player: None,
            looper: None,
            observers: None,
            worker: None,
            live: false,
            filters: Vec::new(),
            brightness: 0.0,
            contrast: 1.0,
            chain: Arc::new(filters::configure(&[], 0.0, 1.0)),
            chain_generation: 0,
            last_submitted: None,
            last_command: None,
        }
    }

    // ========== Channels & inspection ==========

    /// Discrete event channel
    pub fn events(&self) -> Receiver<PlayerEvent> {
        self.events.clone()
    }

    /// Continuous time channel
    pub fn ticks(&self) -> Receiver<TimeTick> {
        self.ticks.clone()
    }

    pub fn state(&self) -> EngineState {
        if self.failure.is_some() {
            return EngineState::Failed;
        }
        let Some(player) = &self.player else {
            return EngineState::Empty;
        };
        let Some(item) = player.current() else {
            return EngineState::Ended;
        };
        match item.status() {
            ItemStatus::Unknown => EngineState::Loading,
            ItemStatus::Failed(_) => EngineState::Failed,
            ItemStatus::ReadyToPlay => match player.time_control_status() {
                TimeControlStatus::Playing => EngineState::Playing,
                TimeControlStatus::WaitingToPlayAtSpecifiedRate => {
                    EngineState::WaitingToPlayAtSpecifiedRate
                }
                TimeControlStatus::Paused if self.started => EngineState::Paused,
                TimeControlStatus::Paused => EngineState::Ready,
            },
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Handle of the active source (the address hot-swaps compare against)
    pub fn handle(&self) -> Option<&MediaHandle> {
        self.handle.as_ref()
    }

    pub fn failure(&self) -> Option<&ErrorKind> {
        self.failure.as_ref()
    }

    pub fn last_command(&self) -> Option<&PlaybackCommand> {
        self.last_command.as_ref()
    }

    pub fn player(&self) -> Option<&QueuePlayer> {
        self.player.as_ref()
    }

    pub fn looper(&self) -> Option<&Looper> {
        self.looper.as_ref()
    }

    /// Observer sets attached and not yet released
    pub fn live_observer_sets(&self) -> usize {
        self.bridge.live_sets()
    }

    pub fn filter_chain(&self) -> Arc<FilterChain> {
        Arc::clone(&self.chain)
    }

    pub fn current_time(&self) -> f64 {
        self.player.as_ref().map_or(0.0, QueuePlayer::current_time)
    }

    /// Subtitle cue at the current time, if the item carries a text track
    pub fn current_cue(&self) -> Option<Cue> {
        let player = self.player.as_ref()?;
        match player.current()?.playable() {
            Playable::Composed(asset) => asset.cue_at(player.current_time()).cloned(),
            Playable::Media(_) => None,
        }
    }

    /// (presented, dropped) frame counts of the frame path
    pub fn frame_stats(&self) -> (u64, u64) {
        self.worker
            .as_ref()
            .map_or((0, 0), |w| (w.presented(), w.dropped()))
    }

    // ========== Activation ==========

    /// Resolve `config` and activate the result.
    ///
    /// Resolution errors put the engine in `Failed` and are reported once
    /// on the event channel as well as returned.
    pub fn load(&mut self, config: Configuration) -> Result<(), ErrorKind> {
        let located = self.locator.locate(&config);
        let handle = match (self.locator.detect_error(&config, located.as_ref()), located) {
            (None, Some(handle)) => handle,
            (Some(err), _) => return self.fail(config, err),
            (None, None) => {
                let err = ErrorKind::SourceNotFound(config.name().to_string());
                return self.fail(config, err);
            }
        };

        match self.compose(&config, handle) {
            Ok(playable) => self.activate(playable, config),
            Err(err) => self.fail(config, err),
        }
    }

    /// Install `playable` as the only item, replacing everything before it
    pub fn activate(
        &mut self,
        playable: impl Into<Playable>,
        config: Configuration,
    ) -> Result<(), ErrorKind> {
        let playable = playable.into();
        info!(
            "Activating {} (loop={}, autoplay={}, muted={})",
            playable.address(),
            config.looping(),
            config.autoplay(),
            config.muted()
        );
        self.release_item();
        self.failure = None;
        self.started = false;
        self.handle = Some(playable.handle().clone());
        self.template = Some(playable.clone());

        if let Err(e) = self.ensure_live() {
            let err = ErrorKind::PlaybackFailed(format!("frame worker: {}", e));
            return self.fail(config, err);
        }

        let mut player = QueuePlayer::new(Arc::clone(&self.backend));
        player.set_muted(config.muted());
        let observers = ObserverSet::attach(&mut player, &self.bridge, config.time_publishing());
        player.insert(playable.clone());
        if config.looping() {
            self.looper = Some(Looper::attach(&mut player, playable));
        }
        self.surface.set_gravity(config.gravity());
        if config.autoplay() {
            player.play();
            self.started = true;
        }

        self.player = Some(player);
        self.observers = Some(observers);
        self.config = config;
        Ok(())
    }

    /// Apply a new configuration: hot-swap if the asset changed, otherwise
    /// update mute and gravity in place.
    pub fn update_configuration(&mut self, config: Configuration) -> Result<(), ErrorKind> {
        let swap = self.player.is_none()
            || self.failure.is_some()
            || !config.are_unique()
            || self.locator.locate(&config).is_none()
            || config.changed_asset(self.handle.as_ref(), &self.locator).is_some()
            || config.subtitle() != self.config.subtitle()
            || config.looping() != self.config.looping()
            || config.time_publishing() != self.config.time_publishing();
        if swap {
            info!("Configuration changed, re-activating");
            return self.load(config);
        }

        debug!("Configuration updated in place");
        if let Some(player) = self.player.as_mut() {
            player.set_muted(config.muted());
        }
        self.surface.set_gravity(config.gravity());
        self.config = config;
        Ok(())
    }

    /// Video handle, merged with subtitles when configured
    fn compose(
        &mut self,
        config: &Configuration,
        handle: MediaHandle,
    ) -> Result<Playable, ErrorKind> {
        let Some(subtitle_handle) = self.locator.locate_subtitle(config) else {
            if !config.subtitle().is_empty() {
                warn!("Subtitle {} not found, playing without", config.subtitle());
            }
            return Ok(Playable::Media(handle));
        };

        let video = match self.backend.probe(&handle) {
            Ok(asset) => asset,
            Err(e) => {
                warn!("Cannot probe {} for subtitle merge: {}", handle, e);
                return Ok(Playable::Media(handle));
            }
        };
        let subtitle = match self.backend.probe(&subtitle_handle) {
            Ok(asset) => Some(asset),
            Err(e) => {
                warn!("Cannot read subtitles {}: {}", subtitle_handle, e);
                self.bridge.emit(PlayerEvent::SubtitlesDropped);
                None
            }
        };

        let composed = composition::merge(&video, subtitle.as_ref()).ok_or(ErrorKind::MergeFailed)?;
        let had_text = subtitle.as_ref().is_some_and(|s| s.has_track(TrackKind::Text));
        if had_text && composed.track(TrackKind::Text).is_none() {
            self.bridge.emit(PlayerEvent::SubtitlesDropped);
        }
        Ok(Playable::Composed(Arc::new(composed)))
    }

    fn fail(&mut self, config: Configuration, err: ErrorKind) -> Result<(), ErrorKind> {
        warn!("Engine failed: {}", err);
        self.release_item();
        self.config = config;
        self.failure = Some(err.clone());
        self.bridge.emit(PlayerEvent::Error(err.clone()));
        Err(err)
    }

    fn ensure_live(&mut self) -> std::io::Result<()> {
        if self.worker.is_none() {
            let worker = FrameWorker::spawn(Arc::clone(&self.backend), Arc::clone(&self.surface))?;
            self.worker = Some(worker);
        }
        if !self.live {
            self.surface.attach();
            self.live = true;
        }
        Ok(())
    }

    // ========== Transport ==========

    fn accept(&mut self, command: PlaybackCommand) -> Result<(), ErrorKind> {
        match self.state() {
            EngineState::Empty | EngineState::Failed => {
                let err = ErrorKind::TransportRejected(command.name());
                debug!("{} in state {:?}", err, self.state());
                self.bridge.emit(PlayerEvent::Error(err.clone()));
                Err(err)
            }
            _ => {
                trace!("Command: {:?}", command);
                self.last_command = Some(command);
                Ok(())
            }
        }
    }

    /// After the queue ran out, put the asset back for another pass
    fn requeue_if_ended(&mut self) {
        if self.state() != EngineState::Ended {
            return;
        }
        if let (Some(player), Some(template)) = (self.player.as_mut(), self.template.clone()) {
            info!("Re-queueing {}", template.address());
            player.insert(template);
        }
    }

    fn with_player(&mut self, f: impl FnOnce(&mut QueuePlayer)) {
        if let Some(player) = self.player.as_mut() {
            f(player);
        }
    }

    pub fn play(&mut self) -> Result<(), ErrorKind> {
        self.accept(PlaybackCommand::Play)?;
        self.requeue_if_ended();
        self.with_player(QueuePlayer::play);
        self.started = true;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), ErrorKind> {
        self.accept(PlaybackCommand::Pause)?;
        self.with_player(QueuePlayer::pause);
        Ok(())
    }

    /// Result arrives as `PlayerEvent::Seek` after the next tick
    pub fn seek(&mut self, to: f64) -> Result<(), ErrorKind> {
        self.accept(PlaybackCommand::Seek(to))?;
        self.requeue_if_ended();
        if let (Some(player), Some(observers)) = (self.player.as_mut(), self.observers.as_ref()) {
            player.seek(to, observers.seek_reporter(&self.bridge));
        }
        Ok(())
    }

    pub fn set_muted(&mut self, muted: bool) -> Result<(), ErrorKind> {
        self.accept(PlaybackCommand::SetMuted(muted))?;
        self.with_player(|p| p.set_muted(muted));
        Ok(())
    }

    /// Positive rate plays at that rate, zero pauses
    pub fn set_rate(&mut self, rate: f32) -> Result<(), ErrorKind> {
        self.accept(PlaybackCommand::SetRate(rate))?;
        self.with_player(|p| p.set_rate(rate));
        if rate > 0.0 {
            self.started = true;
        }
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), ErrorKind> {
        self.accept(PlaybackCommand::SetVolume(volume))?;
        self.with_player(|p| p.set_volume(volume));
        Ok(())
    }

    pub fn set_filters(&mut self, filters: Vec<FilterDescriptor>) -> Result<(), ErrorKind> {
        self.accept(PlaybackCommand::SetFilters(filters.clone()))?;
        self.filters = filters;
        self.rebuild_chain();
        Ok(())
    }

    pub fn set_brightness(&mut self, brightness: f32) -> Result<(), ErrorKind> {
        self.accept(PlaybackCommand::SetBrightness(brightness))?;
        self.brightness = brightness;
        self.rebuild_chain();
        Ok(())
    }

    pub fn set_contrast(&mut self, contrast: f32) -> Result<(), ErrorKind> {
        self.accept(PlaybackCommand::SetContrast(contrast))?;
        self.contrast = contrast;
        self.rebuild_chain();
        Ok(())
    }

    fn rebuild_chain(&mut self) {
        self.chain = Arc::new(filters::configure(&self.filters, self.brightness, self.contrast));
        self.chain_generation += 1;
    }

    // ========== Pump ==========

    /// Advance playback by `dt` seconds and feed the frame path
    pub fn tick(&mut self, dt: f64) {
        let Some(player) = self.player.as_mut() else {
            return;
        };
        let mut carry = player.tick(dt);
        if let Some(looper) = self.looper.as_mut() {
            looper.maintain(player);
        }
        while let Some(overshoot) = carry {
            carry = player.carry(overshoot);
            if let Some(looper) = self.looper.as_mut() {
                looper.maintain(player);
            }
        }
        self.submit_frame();
    }

    fn submit_frame(&mut self) {
        let (Some(player), Some(worker)) = (self.player.as_ref(), self.worker.as_ref()) else {
            return;
        };
        let Some((id, playable, time)) = player.frame_target() else {
            return;
        };
        let key = (id, time, self.chain_generation);
        if self.last_submitted == Some(key) {
            return;
        }
        let request = FrameRequest {
            playable,
            time,
            chain: Arc::clone(&self.chain),
            gravity: self.config.gravity(),
        };
        if worker.submit(request) {
            self.last_submitted = Some(key);
        }
    }

    // ========== Teardown ==========

    /// Release item-scoped resources in teardown order
    fn release_item(&mut self) {
        if let Some(observers) = &self.observers {
            observers.disarm();
        }
        if let Some(player) = self.player.as_mut() {
            player.pause();
            if let Some(mut looper) = self.looper.take() {
                looper.disable(player);
            }
            if let Some(mut observers) = self.observers.take() {
                observers.release(player);
            }
            player.remove_all_items();
        }
        self.looper = None;
        self.observers = None;
        self.player = None;
        self.last_submitted = None;
    }

    /// Explicit teardown. Idempotent; also run on drop.
    pub fn stop(&mut self) {
        if self.player.is_none() && !self.live {
            return;
        }
        info!("Tearing down playback");
        self.release_item();
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
        }
        if self.live {
            self.surface.detach();
            self.live = false;
        }
        self.failure = None;
        self.started = false;
        self.template = None;
        self.handle = None;
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::filters::FrameFilter;
    use crate::entities::media::MediaAsset;
    use crate::entities::settings::Directive;
    use crate::testing::{RecordingSurface, ScriptedBackend, bundle_dir, handle_in, video_asset};
    use std::time::Duration;

    const DT: f64 = 1.0 / 60.0;

    struct Rig {
        dir: tempfile::TempDir,
        backend: Arc<ScriptedBackend>,
        surface: Arc<RecordingSurface>,
        engine: PlaybackEngine,
    }

    fn rig(files: &[&str]) -> Rig {
        let dir = bundle_dir(files);
        let backend = ScriptedBackend::new();
        for file in files.iter().filter(|f| f.ends_with(".mp4")) {
            backend.add_video(&handle_in(dir.path(), file), 30.0);
        }
        let surface = RecordingSurface::new((64, 36));
        let engine = PlaybackEngine::new(
            backend.clone(),
            surface.clone(),
            AssetLocator::with_dir(dir.path()),
        );
        Rig {
            dir,
            backend,
            surface,
            engine,
        }
    }

    fn config(directives: Vec<Directive>) -> Configuration {
        Configuration::build(&directives)
    }

    fn named(name: &str) -> Configuration {
        config(vec![Directive::Name(name.into())])
    }

    fn drain(rx: &Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_load_plays_and_presents() {
        let mut rig = rig(&["clip.mp4"]);
        let events = rig.engine.events();
        rig.engine.load(named("clip")).unwrap();
        assert_eq!(rig.engine.state(), EngineState::Loading);

        rig.engine.tick(DT);
        assert_eq!(rig.engine.state(), EngineState::Playing);
        let got = drain(&events);
        assert!(matches!(got[0], PlayerEvent::CurrentItemChanged(Some(_))));
        assert!(got.contains(&PlayerEvent::Playing));

        let (frame, placement) = rig.surface.wait_frame(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.resolution(), (4, 2));
        assert_eq!(placement.width, 64.0);
    }

    #[test]
    fn test_not_autoplay_is_ready_then_paused() {
        let mut rig = rig(&["clip.mp4"]);
        rig.engine
            .load(config(vec![Directive::Name("clip".into()), Directive::NotAutoPlay]))
            .unwrap();
        rig.engine.tick(DT);
        assert_eq!(rig.engine.state(), EngineState::Ready);
        rig.engine.play().unwrap();
        rig.engine.pause().unwrap();
        assert_eq!(rig.engine.state(), EngineState::Paused);
        assert_eq!(rig.engine.last_command(), Some(&PlaybackCommand::Pause));
    }

    #[test]
    fn test_activate_twice_leaves_one_item_and_observer_set() {
        let mut rig = rig(&["a.mp4", "b.mp4"]);
        let a = handle_in(rig.dir.path(), "a.mp4");
        let b = handle_in(rig.dir.path(), "b.mp4");
        rig.engine.activate(a, named("a")).unwrap();
        rig.engine.activate(b.clone(), named("b")).unwrap();

        let player = rig.engine.player().unwrap();
        assert_eq!(player.items().len(), 1);
        assert_eq!(player.current().unwrap().playable().handle(), &b);
        assert_eq!(player.watcher_count(), 4);
        assert_eq!(rig.engine.live_observer_sets(), 1);
    }

    #[test]
    fn test_source_not_found_fails_until_reactivated() {
        let mut rig = rig(&["other.mp4"]);
        let events = rig.engine.events();
        let cfg = config(vec![
            Directive::Name("clip".into()),
            Directive::Ext("mp4".into()),
            Directive::Loop,
        ]);
        assert_eq!(
            rig.engine.load(cfg),
            Err(ErrorKind::SourceNotFound("clip".into()))
        );
        assert_eq!(rig.engine.state(), EngineState::Failed);
        assert_eq!(
            drain(&events),
            vec![PlayerEvent::Error(ErrorKind::SourceNotFound("clip".into()))]
        );

        assert_eq!(rig.engine.play(), Err(ErrorKind::TransportRejected("play")));
        assert_eq!(rig.engine.seek(1.0), Err(ErrorKind::TransportRejected("seek")));
        assert!(rig.engine.last_command().is_none());

        rig.engine.load(named("other")).unwrap();
        assert_eq!(rig.engine.state(), EngineState::Loading);
        assert!(rig.engine.play().is_ok());
    }

    #[test]
    fn test_duplicate_directives_fail_even_with_valid_asset() {
        let mut rig = rig(&["clip.mp4"]);
        let cfg = config(vec![
            Directive::Name("clip".into()),
            Directive::Loop,
            Directive::Loop,
        ]);
        assert_eq!(rig.engine.load(cfg), Err(ErrorKind::SettingsNotUnique));
        assert_eq!(rig.engine.state(), EngineState::Failed);
        assert!(rig.engine.player().is_none());
    }

    #[test]
    fn test_transport_rejected_when_empty() {
        let mut rig = rig(&[]);
        let events = rig.engine.events();
        assert!(rig.engine.set_brightness(0.5).is_err());
        assert!(rig.engine.set_filters(Vec::new()).is_err());
        assert_eq!(
            drain(&events),
            vec![
                PlayerEvent::Error(ErrorKind::TransportRejected("setBrightness")),
                PlayerEvent::Error(ErrorKind::TransportRejected("setFilters")),
            ]
        );
    }

    #[test]
    fn test_seek_while_playing_reports_once_and_ticks_continue() {
        let mut rig = rig(&["clip.mp4"]);
        let events = rig.engine.events();
        let ticks = rig.engine.ticks();
        rig.engine
            .load(config(vec![
                Directive::Name("clip".into()),
                Directive::TimePublishing(0.5),
            ]))
            .unwrap();
        rig.engine.tick(DT);
        assert_eq!(rig.engine.state(), EngineState::Playing);
        drain(&events);

        rig.engine.seek(12.5).unwrap();
        for _ in 0..90 {
            rig.engine.tick(DT);
        }

        let seeks: Vec<_> = drain(&events)
            .into_iter()
            .filter(|e| matches!(e, PlayerEvent::Seek { .. }))
            .collect();
        assert_eq!(seeks, vec![PlayerEvent::Seek { success: true, time: 12.5 }]);

        let times: Vec<f64> = ticks.try_iter().map(|t| t.seconds()).collect();
        let after: Vec<f64> = times.into_iter().skip_while(|t| *t < 12.5).collect();
        assert_eq!(after[0], 12.5);
        assert!(after.len() >= 3);
        assert!(after.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(rig.engine.state(), EngineState::Playing);
    }

    #[test]
    fn test_seek_against_replaced_item_is_ignored() {
        let mut rig = rig(&["a.mp4", "b.mp4"]);
        let events = rig.engine.events();
        rig.engine.load(named("a")).unwrap();
        rig.engine.tick(DT);
        rig.engine.seek(3.0).unwrap();
        rig.engine.load(named("b")).unwrap();
        rig.engine.tick(DT);

        assert!(!drain(&events).iter().any(|e| matches!(e, PlayerEvent::Seek { .. })));
        assert_eq!(rig.engine.state(), EngineState::Playing);
    }

    #[test]
    fn test_loop_never_ends() {
        let mut rig = rig(&["clip.mp4"]);
        rig.backend.add_video(&handle_in(rig.dir.path(), "clip.mp4"), 1.0);
        rig.engine
            .load(config(vec![Directive::Name("clip".into()), Directive::Loop]))
            .unwrap();
        for _ in 0..600 {
            rig.engine.tick(DT);
            assert_ne!(rig.engine.state(), EngineState::Ended);
        }
        assert_eq!(rig.engine.state(), EngineState::Playing);
        assert!(rig.engine.looper().unwrap().loop_count() >= 9);
    }

    #[test]
    fn test_ended_then_play_requeues() {
        let mut rig = rig(&["clip.mp4"]);
        rig.backend.add_video(&handle_in(rig.dir.path(), "clip.mp4"), 1.0);
        let events = rig.engine.events();
        rig.engine.load(named("clip")).unwrap();
        for _ in 0..90 {
            rig.engine.tick(DT);
        }
        assert_eq!(rig.engine.state(), EngineState::Ended);
        assert!(drain(&events).contains(&PlayerEvent::CurrentItemRemoved));

        rig.engine.play().unwrap();
        rig.engine.tick(DT);
        assert_eq!(rig.engine.state(), EngineState::Playing);
    }

    #[test]
    fn test_teardown_is_idempotent_and_silent() {
        let mut rig = rig(&["clip.mp4"]);
        let events = rig.engine.events();
        rig.engine.load(named("clip")).unwrap();
        rig.engine.tick(DT);
        drain(&events);

        rig.engine.stop();
        rig.engine.stop();
        assert_eq!(rig.engine.state(), EngineState::Empty);
        assert_eq!(rig.surface.detach_count(), 1);
        assert_eq!(rig.engine.live_observer_sets(), 0);
        assert!(drain(&events).is_empty());

        drop(rig.engine);
        assert_eq!(rig.surface.detach_count(), 1);
    }

    #[test]
    fn test_update_configuration_in_place_and_hot_swap() {
        let mut rig = rig(&["a.mp4", "b.mp4"]);
        rig.engine.load(named("a")).unwrap();
        let first = rig.engine.player().unwrap().current().unwrap().id();

        let muted = config(vec![
            Directive::Name("a".into()),
            Directive::Mute,
            Directive::Gravity(crate::entities::gravity::Gravity::Resize),
        ]);
        rig.engine.update_configuration(muted).unwrap();
        let player = rig.engine.player().unwrap();
        assert_eq!(player.current().unwrap().id(), first);
        assert!(player.is_muted());
        assert_eq!(rig.surface.gravity(), crate::entities::gravity::Gravity::Resize);

        rig.engine.update_configuration(named("b")).unwrap();
        let swapped = rig.engine.player().unwrap().current().unwrap().id();
        assert_ne!(swapped, first);
        assert!(
            rig.engine
                .configuration()
                .changed_asset(rig.engine.handle(), &AssetLocator::with_dir(rig.dir.path()))
                .is_none()
        );
    }

    #[test]
    fn test_subtitles_merged_as_text_track() {
        let mut rig = rig(&["clip.mp4", "clip.vtt"]);
        rig.backend
            .add_subtitle(&handle_in(rig.dir.path(), "clip.vtt"), &[(0.0, 5.0, "Hello")]);
        rig.engine
            .load(config(vec![
                Directive::Name("clip".into()),
                Directive::Subtitle("clip".into()),
            ]))
            .unwrap();
        rig.engine.tick(DT);

        let item = rig.engine.player().unwrap().current().unwrap();
        let Playable::Composed(asset) = item.playable() else {
            panic!("expected composition");
        };
        assert_eq!(asset.kinds(), vec![TrackKind::Video, TrackKind::Audio, TrackKind::Text]);
        assert_eq!(rig.engine.current_cue().map(|c| c.text), Some("Hello".to_string()));
    }

    #[test]
    fn test_dropped_subtitles_are_reported() {
        let mut rig = rig(&["clip.mp4", "clip.vtt"]);
        let sub = handle_in(rig.dir.path(), "clip.vtt");
        rig.backend.add_subtitle(&sub, &[(0.0, 5.0, "Hello")]);
        let mut asset: MediaAsset = rig.backend.probe(&sub).unwrap();
        asset.tracks[0].decodable = false;
        rig.backend.add(asset);
        let events = rig.engine.events();

        rig.engine
            .load(config(vec![
                Directive::Name("clip".into()),
                Directive::Subtitle("clip".into()),
            ]))
            .unwrap();
        assert!(drain(&events).contains(&PlayerEvent::SubtitlesDropped));
        assert_eq!(rig.engine.state(), EngineState::Loading);
    }

    #[test]
    fn test_merge_failure_fails_engine() {
        let mut rig = rig(&["clip.mp4", "clip.vtt"]);
        let video = handle_in(rig.dir.path(), "clip.mp4");
        let mut asset = video_asset(&video, 10.0);
        asset.tracks[0].decodable = false;
        rig.backend.add(asset);
        rig.backend
            .add_subtitle(&handle_in(rig.dir.path(), "clip.vtt"), &[(0.0, 1.0, "x")]);

        let result = rig.engine.load(config(vec![
            Directive::Name("clip".into()),
            Directive::Subtitle("clip".into()),
        ]));
        assert_eq!(result, Err(ErrorKind::MergeFailed));
        assert_eq!(rig.engine.state(), EngineState::Failed);
    }

    #[test]
    fn test_item_failure_reported_and_blocks_transport() {
        let mut rig = rig(&["clip.mp4", "broken.mp4"]);
        let events = rig.engine.events();
        let broken = handle_in(rig.dir.path(), "broken.mp4");
        rig.backend.add(MediaAsset {
            handle: broken,
            duration: 0.0,
            tracks: Vec::new(),
        });
        rig.engine.load(named("broken")).unwrap();
        rig.engine.tick(DT);

        assert_eq!(rig.engine.state(), EngineState::Failed);
        assert!(
            drain(&events)
                .iter()
                .any(|e| matches!(e, PlayerEvent::Error(ErrorKind::PlaybackFailed(_))))
        );
        assert!(rig.engine.pause().is_err());
    }

    #[test]
    fn test_filter_snapshot_reaches_frames() {
        let mut rig = rig(&["clip.mp4"]);
        rig.engine
            .load(config(vec![Directive::Name("clip".into()), Directive::NotAutoPlay]))
            .unwrap();
        rig.engine.tick(DT);
        rig.surface.wait_frame(Duration::from_secs(5)).unwrap();

        rig.engine.set_brightness(0.25).unwrap();
        let names: Vec<_> = rig.engine.filter_chain().filters().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["Brightness", "Contrast"]);

        rig.engine.tick(DT);
        let (frame, _) = rig.surface.wait_frame(Duration::from_secs(5)).unwrap();
        assert!(frame.sample(0, 0)[0] > 0.7);
        assert_eq!(rig.engine.last_command(), Some(&PlaybackCommand::SetBrightness(0.25)));
    }

    #[test]
    fn test_volume_event_and_rate() {
        let mut rig = rig(&["clip.mp4"]);
        let events = rig.engine.events();
        rig.engine.load(named("clip")).unwrap();
        rig.engine.tick(DT);
        drain(&events);

        rig.engine.set_volume(0.5).unwrap();
        rig.engine.set_rate(0.0).unwrap();
        assert_eq!(
            drain(&events),
            vec![PlayerEvent::VolumeChanged(0.5), PlayerEvent::Paused]
        );
        assert_eq!(rig.engine.state(), EngineState::Paused);
    }
}
