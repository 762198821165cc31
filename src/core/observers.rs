//! Event bridge and observer lifecycle.
//!
//! `EventBridge` owns the two outbound channels (discrete events, time
//! ticks). `ObserverSet` is the group of watchers one item installation
//! registers on the player: one per observed property plus an optional
//! periodic time watcher. Each watcher maps one property transition to at
//! most one event.
//!
//! # Teardown barrier
//!
//! All watchers of a set share one `armed` flag. `disarm()` clears it, after
//! which no watcher of the set emits anything, even if the player is still
//! changing state while being torn down. `release()` disarms and then
//! unregisters every watcher in `RELEASE_ORDER`. Both are idempotent, and a
//! dropped set is disarmed.

use crossbeam_channel::{Receiver, Sender, unbounded};
use indexmap::IndexMap;
use log::{debug, trace};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use super::events::{ItemInfo, PlayerEvent, TimeTick};
use super::player::{ItemStatus, QueuePlayer, TimeControlStatus, WatchToken};
use crate::error::ErrorKind;

/// Observed player property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatcherKind {
    Status,
    TimeControlStatus,
    CurrentItem,
    Volume,
}

/// Order in which property watchers are unregistered (the periodic time
/// watcher goes first)
pub const RELEASE_ORDER: [WatcherKind; 4] = [
    WatcherKind::Status,
    WatcherKind::TimeControlStatus,
    WatcherKind::CurrentItem,
    WatcherKind::Volume,
];

// ============================================================================
// Transition mapping
// ============================================================================

pub fn status_event(_old: &ItemStatus, new: &ItemStatus) -> Option<PlayerEvent> {
    match new {
        ItemStatus::Failed(reason) => {
            Some(PlayerEvent::Error(ErrorKind::PlaybackFailed(reason.clone())))
        }
        _ => None,
    }
}

pub fn time_control_event(
    _old: &TimeControlStatus,
    new: &TimeControlStatus,
) -> Option<PlayerEvent> {
    Some(match new {
        TimeControlStatus::Paused => PlayerEvent::Paused,
        TimeControlStatus::WaitingToPlayAtSpecifiedRate => {
            PlayerEvent::WaitingToPlayAtSpecifiedRate
        }
        TimeControlStatus::Playing => PlayerEvent::Playing,
    })
}

pub fn current_item_event(old: &Option<ItemInfo>, new: &Option<ItemInfo>) -> Option<PlayerEvent> {
    match (old, new) {
        (Some(_), None) => Some(PlayerEvent::CurrentItemRemoved),
        (None, None) => None,
        (_, new) => Some(PlayerEvent::CurrentItemChanged(new.clone())),
    }
}

pub fn volume_event(_old: &f32, new: &f32) -> Option<PlayerEvent> {
    Some(PlayerEvent::VolumeChanged(*new))
}

// ============================================================================
// EventBridge
// ============================================================================

/// Outbound channels plus a count of armed observer sets
#[derive(Debug, Clone)]
pub struct EventBridge {
    events: Sender<PlayerEvent>,
    ticks: Sender<TimeTick>,
    live_sets: Arc<AtomicUsize>,
}

impl EventBridge {
    pub fn new() -> (Self, Receiver<PlayerEvent>, Receiver<TimeTick>) {
        let (events, events_rx) = unbounded();
        let (ticks, ticks_rx) = unbounded();
        let bridge = Self {
            events,
            ticks,
            live_sets: Arc::new(AtomicUsize::new(0)),
        };
        (bridge, events_rx, ticks_rx)
    }

    /// Send an engine-originated event (errors, dropped subtitles)
    pub fn emit(&self, event: PlayerEvent) {
        if self.events.send(event).is_err() {
            trace!("Event dropped: no receiver");
        }
    }

    /// Observer sets attached and not yet released
    pub fn live_sets(&self) -> usize {
        self.live_sets.load(Ordering::Acquire)
    }
}

// ============================================================================
// ObserverSet
// ============================================================================

/// Watchers registered for one item installation
#[derive(Debug)]
pub struct ObserverSet {
    watchers: IndexMap<WatcherKind, WatchToken>,
    periodic: Option<WatchToken>,
    armed: Arc<AtomicBool>,
    live_sets: Arc<AtomicUsize>,
    released: bool,
}

/// Wrap a transition mapper into a player watcher gated by `armed`
fn gated<T, M>(
    armed: &Arc<AtomicBool>,
    tx: &Sender<PlayerEvent>,
    map: M,
) -> impl FnMut(&T, &T) + Send + 'static
where
    T: 'static,
    M: Fn(&T, &T) -> Option<PlayerEvent> + Send + 'static,
{
    let armed = Arc::clone(armed);
    let tx = tx.clone();
    move |old: &T, new: &T| {
        if !armed.load(Ordering::Acquire) {
            return;
        }
        if let Some(event) = map(old, new) {
            trace!("Event: {:?}", event);
            let _ = tx.send(event);
        }
    }
}

impl ObserverSet {
    /// Register all property watchers (and the time watcher if `interval`)
    pub fn attach(
        player: &mut QueuePlayer,
        bridge: &EventBridge,
        interval: Option<Duration>,
    ) -> Self {
        let armed = Arc::new(AtomicBool::new(true));
        let tx = &bridge.events;

        let mut watchers = IndexMap::new();
        watchers.insert(
            WatcherKind::Status,
            player.observe_status(gated(&armed, tx, status_event)),
        );
        watchers.insert(
            WatcherKind::TimeControlStatus,
            player.observe_time_control(gated(&armed, tx, time_control_event)),
        );
        watchers.insert(
            WatcherKind::CurrentItem,
            player.observe_current_item(gated(&armed, tx, current_item_event)),
        );
        watchers.insert(
            WatcherKind::Volume,
            player.observe_volume(gated(&armed, tx, volume_event)),
        );

        let periodic = interval.map(|interval| {
            let armed = Arc::clone(&armed);
            let ticks = bridge.ticks.clone();
            player.add_periodic_observer(interval, move |t| {
                if armed.load(Ordering::Acquire) {
                    let _ = ticks.send(TimeTick(t));
                }
            })
        });

        bridge.live_sets.fetch_add(1, Ordering::AcqRel);
        debug!(
            "Observers attached: {} watchers, time publishing {:?}",
            watchers.len(),
            interval
        );
        Self {
            watchers,
            periodic,
            armed,
            live_sets: Arc::clone(&bridge.live_sets),
            released: false,
        }
    }

    /// Completion for `QueuePlayer::seek` that reports through this set
    pub fn seek_reporter(&self, bridge: &EventBridge) -> impl FnOnce(bool, f64) + Send + 'static {
        let armed = Arc::clone(&self.armed);
        let tx = bridge.events.clone();
        move |success, time| {
            if armed.load(Ordering::Acquire) {
                let _ = tx.send(PlayerEvent::Seek { success, time });
            }
        }
    }

    /// Teardown barrier: from now on no watcher of this set emits
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    /// Disarm and unregister everything. Idempotent.
    pub fn release(&mut self, player: &mut QueuePlayer) {
        if self.released {
            return;
        }
        self.disarm();
        if let Some(token) = self.periodic.take() {
            player.unwatch(token);
        }
        for kind in RELEASE_ORDER {
            if let Some(token) = self.watchers.shift_remove(&kind) {
                player.unwatch(token);
            }
        }
        self.released = true;
        self.live_sets.fetch_sub(1, Ordering::AcqRel);
        debug!("Observers released");
    }

    /// Registrations still held
    pub fn len(&self) -> usize {
        self.watchers.len() + usize::from(self.periodic.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ObserverSet {
    fn drop(&mut self) {
        self.disarm();
        if !self.released {
            self.live_sets.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::asset::MediaHandle;
    use crate::entities::composition::Playable;
    use crate::testing::ScriptedBackend;

    fn setup(
        interval: Option<Duration>,
    ) -> (
        QueuePlayer,
        EventBridge,
        Receiver<PlayerEvent>,
        Receiver<TimeTick>,
        ObserverSet,
    ) {
        let backend = ScriptedBackend::new();
        let handle = MediaHandle::file("clip.mp4");
        backend.add_video(&handle, 2.0);
        let mut player = QueuePlayer::new(backend);
        let (bridge, events, ticks) = EventBridge::new();
        let set = ObserverSet::attach(&mut player, &bridge, interval);
        player.insert(Playable::Media(handle));
        (player, bridge, events, ticks, set)
    }

    #[test]
    fn test_current_item_mapping() {
        let info = ItemInfo {
            id: uuid::Uuid::new_v4(),
            address: MediaHandle::file("a.mp4").address().clone(),
            duration: None,
        };
        assert_eq!(
            current_item_event(&Some(info.clone()), &None),
            Some(PlayerEvent::CurrentItemRemoved)
        );
        assert_eq!(
            current_item_event(&None, &Some(info.clone())),
            Some(PlayerEvent::CurrentItemChanged(Some(info)))
        );
        assert_eq!(status_event(&ItemStatus::Unknown, &ItemStatus::ReadyToPlay), None);
    }

    #[test]
    fn test_watchers_emit_in_order() {
        let (mut player, _bridge, events, _ticks, _set) = setup(None);
        player.play();
        player.tick(0.0);
        player.set_volume(0.5);

        let got: Vec<_> = events.try_iter().collect();
        assert!(matches!(got[0], PlayerEvent::CurrentItemChanged(Some(_))));
        assert_eq!(
            got[1..],
            [
                PlayerEvent::WaitingToPlayAtSpecifiedRate,
                PlayerEvent::Playing,
                PlayerEvent::VolumeChanged(0.5)
            ]
        );
    }

    #[test]
    fn test_periodic_ticks_on_own_channel() {
        let (mut player, _bridge, events, ticks, _set) = setup(Some(Duration::from_millis(500)));
        player.play();
        for _ in 0..4 {
            player.tick(0.25);
        }
        let times: Vec<f64> = ticks.try_iter().map(|t| t.seconds()).collect();
        assert_eq!(times, vec![0.5, 1.0]);
        assert!(events.try_iter().all(|e| !matches!(e, PlayerEvent::Seek { .. })));
    }

    #[test]
    fn test_release_is_idempotent_and_silences() {
        let (mut player, bridge, events, ticks, mut set) = setup(Some(Duration::from_millis(100)));
        assert_eq!(player.watcher_count(), 5);
        assert_eq!(set.len(), 5);
        assert_eq!(bridge.live_sets(), 1);
        let _ = events.try_iter().count();

        set.release(&mut player);
        set.release(&mut player);
        assert_eq!(player.watcher_count(), 0);
        assert!(set.is_empty());
        assert_eq!(bridge.live_sets(), 0);

        player.play();
        player.tick(1.0);
        assert_eq!(events.try_iter().count(), 0);
        assert_eq!(ticks.try_iter().count(), 0);
    }

    #[test]
    fn test_disarmed_set_is_silent_before_release() {
        let (mut player, bridge, events, _ticks, set) = setup(None);
        let _ = events.try_iter().count();
        let report = set.seek_reporter(&bridge);
        set.disarm();
        player.play();
        report(true, 1.0);
        assert_eq!(events.try_iter().count(), 0);
        drop(set);
        assert_eq!(bridge.live_sets(), 0);
    }
}
