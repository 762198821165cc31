//! Looper: keeps replicas of one template queued so playback never ends.
//!
//! The looper does not own the player. The engine passes the player in on
//! every call, so the looper only ever touches it on the owning context.

use log::{debug, trace};
use uuid::Uuid;

use super::player::QueuePlayer;
use crate::entities::composition::Playable;

/// Replicas kept in the queue (current + next)
pub const REPLICA_DEPTH: usize = 2;

#[derive(Debug)]
pub struct Looper {
    template: Playable,
    replicas: Vec<Uuid>,
    loops: u64,
    enabled: bool,
}

impl Looper {
    /// Start looping `template`; items already in the queue count as replicas
    pub fn attach(player: &mut QueuePlayer, template: Playable) -> Self {
        let replicas = player
            .items()
            .iter()
            .filter(|i| i.playable() == &template)
            .map(|i| i.id())
            .collect();
        let mut looper = Self {
            template,
            replicas,
            loops: 0,
            enabled: true,
        };
        looper.maintain(player);
        debug!("Looper attached: {}", looper.template.address());
        looper
    }

    /// Count finished replicas and top the queue back up
    pub fn maintain(&mut self, player: &mut QueuePlayer) {
        if !self.enabled {
            return;
        }
        let before = self.replicas.len();
        self.replicas
            .retain(|id| player.items().iter().any(|i| i.id() == *id));
        let finished = (before - self.replicas.len()) as u64;
        if finished > 0 {
            self.loops += finished;
            trace!("Looper: {} loops completed", self.loops);
        }

        while player.items().len() < REPLICA_DEPTH {
            let id = player.insert(self.template.clone());
            self.replicas.push(id);
        }
    }

    /// Stop looping: queued replicas are removed, the current item plays out
    pub fn disable(&mut self, player: &mut QueuePlayer) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        let current = player.current().map(|i| i.id());
        for id in self.replicas.drain(..) {
            if Some(id) != current {
                player.remove(id);
            }
        }
        debug!("Looper disabled after {} loops", self.loops);
    }

    pub fn loop_count(&self) -> u64 {
        self.loops
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::player::TimeControlStatus;
    use crate::entities::asset::MediaHandle;
    use crate::testing::ScriptedBackend;

    fn setup() -> (QueuePlayer, Playable) {
        let backend = ScriptedBackend::new();
        let handle = MediaHandle::file("loop.mp4");
        backend.add_video(&handle, 1.0);
        (QueuePlayer::new(backend), Playable::Media(handle))
    }

    #[test]
    fn test_attach_fills_queue() {
        let (mut player, clip) = setup();
        player.insert(clip.clone());
        let looper = Looper::attach(&mut player, clip);
        assert_eq!(player.items().len(), REPLICA_DEPTH);
        assert_eq!(looper.loop_count(), 0);
    }

    #[test]
    fn test_loops_never_end() {
        let (mut player, clip) = setup();
        player.insert(clip.clone());
        let mut looper = Looper::attach(&mut player, clip);
        player.play();

        for _ in 0..50 {
            let mut carry = player.tick(0.35);
            looper.maintain(&mut player);
            while let Some(over) = carry {
                carry = player.carry(over);
                looper.maintain(&mut player);
            }
            assert!(player.current().is_some());
        }
        assert_eq!(player.time_control_status(), TimeControlStatus::Playing);
        assert!(looper.loop_count() >= 16);
    }

    #[test]
    fn test_disable_removes_replicas() {
        let (mut player, clip) = setup();
        player.insert(clip.clone());
        let mut looper = Looper::attach(&mut player, clip);
        looper.disable(&mut player);
        assert_eq!(player.items().len(), 1);
        assert!(!looper.is_enabled());

        looper.maintain(&mut player);
        assert_eq!(player.items().len(), 1);
    }
}
