//! Software queued player with observable properties.
//!
//! **Architecture**: the player owns a queue of items (front = current item)
//! and a playback clock. It has no thread of its own: the owner calls
//! `tick(dt)` from its update loop, and every state change happens inside
//! that call or inside a transport method. Watchers therefore run on the
//! owner's context, synchronously, in registration order.
//!
//! # Observable properties
//!
//! | Property | Type | Changes when |
//! |----------|------|--------------|
//! | `status` | `ItemStatus` | current item finishes loading or changes |
//! | `time_control_status` | `TimeControlStatus` | play/pause, item readiness |
//! | `current_item` | `Option<ItemInfo>` | queue front changes |
//! | `volume` | `f32` | `set_volume` |
//!
//! Setting a property to an equal value notifies nobody.
//!
//! # Clock
//!
//! `tick(dt)` advances time by `dt * rate` while playing. Reaching the end
//! of the current item pops it and returns the overshoot; the owner hands
//! the overshoot back through `carry()` after it had a chance to refill the
//! queue (the looper does this). With nothing left to play the current item
//! becomes `None` and the player pauses.
//!
//! # Seek
//!
//! `seek()` is asynchronous: it completes on the next tick with the clamped
//! resulting time. A newer seek interrupts a pending one (`success = false`).
//! A pending seek whose item is no longer current is stale and is dropped
//! without calling its completion.

use log::{debug, trace};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::events::ItemInfo;
use crate::entities::composition::Playable;
use crate::entities::media::{MediaBackend, TrackKind};

/// Registration handle for watchers and periodic observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchToken(u64);

/// Load state of an item (and of the player, mirroring its current item)
#[derive(Debug, Clone, PartialEq)]
pub enum ItemStatus {
    Unknown,
    ReadyToPlay,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeControlStatus {
    Paused,
    /// Play requested but the current item cannot play yet
    WaitingToPlayAtSpecifiedRate,
    Playing,
}

type Watcher<T> = Box<dyn FnMut(&T, &T) + Send>;
type SeekCompletion = Box<dyn FnOnce(bool, f64) + Send>;
type TimeCallback = Box<dyn FnMut(f64) + Send>;

/// Value with change watchers called as `(old, new)`
pub struct Observable<T> {
    value: T,
    watchers: Vec<(WatchToken, Watcher<T>)>,
}

impl<T: PartialEq> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            watchers: Vec::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Replace the value; watchers run only if it actually changed
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        let old = std::mem::replace(&mut self.value, value);
        for (_, watcher) in self.watchers.iter_mut() {
            watcher(&old, &self.value);
        }
        true
    }

    fn watch(&mut self, token: WatchToken, watcher: Watcher<T>) {
        self.watchers.push((token, watcher));
    }

    fn unwatch(&mut self, token: WatchToken) -> bool {
        let before = self.watchers.len();
        self.watchers.retain(|(t, _)| *t != token);
        self.watchers.len() != before
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }
}

/// One queued playable
#[derive(Debug, Clone)]
pub struct PlayerItem {
    id: Uuid,
    playable: Playable,
    status: ItemStatus,
    duration: Option<f64>,
}

impl PlayerItem {
    pub fn new(playable: Playable) -> Self {
        let duration = match &playable {
            Playable::Composed(asset) => Some(asset.duration()),
            Playable::Media(_) => None,
        };
        Self {
            id: Uuid::new_v4(),
            playable,
            status: ItemStatus::Unknown,
            duration,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn playable(&self) -> &Playable {
        &self.playable
    }

    pub fn status(&self) -> &ItemStatus {
        &self.status
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn is_ready(&self) -> bool {
        self.status == ItemStatus::ReadyToPlay
    }

    pub fn info(&self) -> ItemInfo {
        ItemInfo {
            id: self.id,
            address: self.playable.address().clone(),
            duration: self.duration,
        }
    }

    /// Probe once; Unknown becomes ReadyToPlay or Failed
    fn load(&mut self, backend: &dyn MediaBackend) {
        if self.status != ItemStatus::Unknown {
            return;
        }
        let duration = match &self.playable {
            Playable::Composed(asset) => Ok(asset.duration()),
            Playable::Media(handle) => {
                backend
                    .probe(handle)
                    .map_err(|e| e.to_string())
                    .and_then(|asset| {
                        if asset.has_track(TrackKind::Video) || asset.has_track(TrackKind::Audio) {
                            Ok(asset.duration)
                        } else {
                            Err(format!("{}: no audio or video track", handle))
                        }
                    })
            }
        };
        self.status = match duration {
            Ok(d) if d.is_finite() && d > 0.0 => {
                self.duration = Some(d);
                ItemStatus::ReadyToPlay
            }
            Ok(d) => {
                ItemStatus::Failed(format!("{}: invalid duration {}", self.playable.handle(), d))
            }
            Err(reason) => ItemStatus::Failed(reason),
        };
        debug!("Item {} loaded: {:?}", self.id, self.status);
    }
}

struct PendingSeek {
    item: Uuid,
    target: f64,
    done: SeekCompletion,
}

struct PeriodicObserver {
    token: WatchToken,
    interval: f64,
    next: f64,
    callback: TimeCallback,
}

/// Queue player driven by `tick`
pub struct QueuePlayer {
    backend: Arc<dyn MediaBackend>,
    queue: VecDeque<PlayerItem>,
    status: Observable<ItemStatus>,
    time_control: Observable<TimeControlStatus>,
    current_item: Observable<Option<ItemInfo>>,
    volume: Observable<f32>,
    muted: bool,
    rate: f32,
    wants_play: bool,
    time: f64,
    pending_seek: Option<PendingSeek>,
    periodic: Vec<PeriodicObserver>,
    next_token: u64,
}

impl QueuePlayer {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            backend,
            queue: VecDeque::new(),
            status: Observable::new(ItemStatus::Unknown),
            time_control: Observable::new(TimeControlStatus::Paused),
            current_item: Observable::new(None),
            volume: Observable::new(1.0),
            muted: false,
            rate: 1.0,
            wants_play: false,
            time: 0.0,
            pending_seek: None,
            periodic: Vec::new(),
            next_token: 0,
        }
    }

    // ========== Queue ==========

    /// Append an item; it becomes current if the queue was empty
    pub fn insert(&mut self, playable: Playable) -> Uuid {
        let item = PlayerItem::new(playable);
        let id = item.id;
        trace!("Queue insert {} ({})", id, item.playable.address());
        self.queue.push_back(item);
        if self.queue.len() == 1 {
            self.current_changed();
        }
        id
    }

    /// Remove one item by id
    pub fn remove(&mut self, id: Uuid) -> bool {
        let Some(pos) = self.queue.iter().position(|i| i.id == id) else {
            return false;
        };
        self.queue.remove(pos);
        if pos == 0 {
            self.current_changed();
        }
        true
    }

    pub fn remove_all_items(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        self.queue.clear();
        self.current_changed();
    }

    pub fn items(&self) -> &VecDeque<PlayerItem> {
        &self.queue
    }

    pub fn current(&self) -> Option<&PlayerItem> {
        self.queue.front()
    }

    // ========== Transport ==========

    pub fn play(&mut self) {
        self.wants_play = true;
        self.update_time_control();
    }

    pub fn pause(&mut self) {
        self.wants_play = false;
        self.update_time_control();
    }

    /// Positive rate plays at that rate; zero (or invalid) pauses
    pub fn set_rate(&mut self, rate: f32) {
        if rate.is_finite() && rate > 0.0 {
            self.rate = rate;
            self.play();
        } else {
            self.pause();
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_finite() {
            self.volume.set(volume.clamp(0.0, 1.0));
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Request a seek; `done(success, time)` runs on a later tick
    pub fn seek<F>(&mut self, to: f64, done: F)
    where
        F: FnOnce(bool, f64) + Send + 'static,
    {
        let current = self.current().map(|i| i.id);
        if let Some(prev) = self.pending_seek.take() {
            if Some(prev.item) == current {
                trace!("Seek to {:.3} interrupted", prev.target);
                (prev.done)(false, self.time);
            }
        }
        match current {
            Some(item) => {
                self.pending_seek = Some(PendingSeek {
                    item,
                    target: to,
                    done: Box::new(done),
                })
            }
            None => done(false, self.time),
        }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn volume(&self) -> f32 {
        *self.volume.get()
    }

    pub fn status(&self) -> &ItemStatus {
        self.status.get()
    }

    pub fn time_control_status(&self) -> TimeControlStatus {
        *self.time_control.get()
    }

    /// Playback time within the current item
    pub fn current_time(&self) -> f64 {
        self.time
    }

    /// What to show now: the current item's playable and time, once ready
    pub fn frame_target(&self) -> Option<(Uuid, Playable, f64)> {
        let item = self.current().filter(|i| i.is_ready())?;
        Some((item.id, item.playable.clone(), self.time))
    }

    // ========== Watchers ==========

    fn token(&mut self) -> WatchToken {
        self.next_token += 1;
        WatchToken(self.next_token)
    }

    pub fn observe_status<F>(&mut self, f: F) -> WatchToken
    where
        F: FnMut(&ItemStatus, &ItemStatus) + Send + 'static,
    {
        let token = self.token();
        self.status.watch(token, Box::new(f));
        token
    }

    pub fn observe_time_control<F>(&mut self, f: F) -> WatchToken
    where
        F: FnMut(&TimeControlStatus, &TimeControlStatus) + Send + 'static,
    {
        let token = self.token();
        self.time_control.watch(token, Box::new(f));
        token
    }

    pub fn observe_current_item<F>(&mut self, f: F) -> WatchToken
    where
        F: FnMut(&Option<ItemInfo>, &Option<ItemInfo>) + Send + 'static,
    {
        let token = self.token();
        self.current_item.watch(token, Box::new(f));
        token
    }

    pub fn observe_volume<F>(&mut self, f: F) -> WatchToken
    where
        F: FnMut(&f32, &f32) + Send + 'static,
    {
        let token = self.token();
        self.volume.watch(token, Box::new(f));
        token
    }

    /// Call `f(time)` whenever playback time crosses a multiple of `interval`
    /// and whenever time jumps (seek).
    pub fn add_periodic_observer<F>(&mut self, interval: Duration, f: F) -> WatchToken
    where
        F: FnMut(f64) + Send + 'static,
    {
        let token = self.token();
        let interval = interval.as_secs_f64();
        let next = ((self.time / interval).floor() + 1.0) * interval;
        self.periodic.push(PeriodicObserver {
            token,
            interval,
            next,
            callback: Box::new(f),
        });
        token
    }

    /// Remove any watcher or periodic observer. False if unknown.
    pub fn unwatch(&mut self, token: WatchToken) -> bool {
        let before = self.periodic.len();
        self.periodic.retain(|p| p.token != token);
        self.periodic.len() != before
            || self.status.unwatch(token)
            || self.time_control.unwatch(token)
            || self.current_item.unwatch(token)
            || self.volume.unwatch(token)
    }

    /// Registered property watchers plus periodic observers
    pub fn watcher_count(&self) -> usize {
        self.status.watcher_count()
            + self.time_control.watcher_count()
            + self.current_item.watcher_count()
            + self.volume.watcher_count()
            + self.periodic.len()
    }

    // ========== Clock ==========

    /// Load pending items, finish a pending seek and advance the clock.
    ///
    /// Returns the overshoot (media seconds) if the current item ended and
    /// another item took its place; pass it to `carry`.
    pub fn tick(&mut self, dt: f64) -> Option<f64> {
        self.load_items();
        self.complete_seek();
        self.update_time_control();
        if self.time_control_status() != TimeControlStatus::Playing {
            return None;
        }
        self.advance(dt * self.rate as f64)
    }

    /// Apply overshoot from a previous item end to the new current item
    pub fn carry(&mut self, overshoot: f64) -> Option<f64> {
        self.load_items();
        self.update_time_control();
        if self.time_control_status() != TimeControlStatus::Playing {
            return None;
        }
        self.advance(overshoot)
    }

    fn advance(&mut self, delta: f64) -> Option<f64> {
        let duration = self.current()?.duration?;
        self.time += delta;
        if self.time < duration {
            self.fire_periodic();
            return None;
        }

        let overshoot = self.time - duration;
        if let Some(ended) = self.queue.pop_front() {
            trace!("Item {} ended, overshoot {:.4}s", ended.id, overshoot);
        }
        if self.queue.is_empty() {
            self.wants_play = false;
        }
        self.current_changed();
        (!self.queue.is_empty()).then_some(overshoot)
    }

    fn load_items(&mut self) {
        let backend = Arc::clone(&self.backend);
        for item in self.queue.iter_mut() {
            item.load(backend.as_ref());
        }
        let status = self.current().map_or(ItemStatus::Unknown, |i| i.status.clone());
        self.status.set(status);
    }

    fn complete_seek(&mut self) {
        let Some(seek) = self.pending_seek.take() else {
            return;
        };
        let Some(item) = self.queue.front() else {
            trace!("Stale seek to {:.3} dropped: queue empty", seek.target);
            return;
        };
        if item.id != seek.item {
            trace!("Stale seek to {:.3} dropped: item replaced", seek.target);
            return;
        }

        match (&item.status, item.duration) {
            (ItemStatus::Unknown, _) => self.pending_seek = Some(seek),
            (ItemStatus::ReadyToPlay, Some(duration)) if seek.target.is_finite() => {
                let time = seek.target.clamp(0.0, duration);
                self.time = time;
                self.realign_periodic();
                (seek.done)(true, time);
            }
            _ => (seek.done)(false, self.time),
        }
    }

    fn update_time_control(&mut self) {
        let ready = self.current().is_some_and(|i| i.is_ready());
        let next = match (self.wants_play, ready) {
            (false, _) => TimeControlStatus::Paused,
            (true, true) => TimeControlStatus::Playing,
            (true, false) => TimeControlStatus::WaitingToPlayAtSpecifiedRate,
        };
        self.time_control.set(next);
    }

    fn current_changed(&mut self) {
        self.time = 0.0;
        for p in self.periodic.iter_mut() {
            p.next = p.interval;
        }
        let info = self.current().map(PlayerItem::info);
        let status = self.current().map_or(ItemStatus::Unknown, |i| i.status.clone());
        self.current_item.set(info);
        self.status.set(status);
        self.update_time_control();
    }

    fn fire_periodic(&mut self) {
        let time = self.time;
        for p in self.periodic.iter_mut() {
            if time >= p.next {
                (p.callback)(time);
                p.next = ((time / p.interval).floor() + 1.0) * p.interval;
            }
        }
    }

    fn realign_periodic(&mut self) {
        let time = self.time;
        for p in self.periodic.iter_mut() {
            p.next = ((time / p.interval).floor() + 1.0) * p.interval;
            (p.callback)(time);
        }
    }
}
