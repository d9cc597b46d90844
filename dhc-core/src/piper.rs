//! The Piper: replays the last few HT notes, one step per press of the
//! trigger key (HT index 0).
//!
//! Played HT notes go into a capacity-bounded `queue`. The next trigger
//! splices the queue into the `pipe` at the step cursor; each trigger press
//! then replays `pipe[current_step]` and the release stops it and moves the
//! cursor on, wrapping at `capacity`.
//!
//! The Piper never calls the engine itself. Replays are handed to a callback
//! and the engine feeds them back tagged as Piper-originated, so they are
//! never recorded again.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const NOTE_ON: u8 = 0x90;
pub const NOTE_OFF: u8 = 0x80;

pub const DEFAULT_CAPACITY: usize = 8;

/// A recorded or replayed note event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEvent {
    pub status_byte: u8,
    pub ctrl_key_number: i32,
    pub velocity: u8,
}

impl PendingEvent {
    pub fn note_on(ctrl_key_number: i32, velocity: u8) -> Self {
        Self {
            status_byte: NOTE_ON,
            ctrl_key_number,
            velocity,
        }
    }

    pub fn note_off(ctrl_key_number: i32) -> Self {
        Self {
            status_byte: NOTE_OFF,
            ctrl_key_number,
            velocity: 0,
        }
    }

    pub fn is_note_on(&self) -> bool {
        self.status_byte & 0xF0 == NOTE_ON && self.velocity > 0
    }
}

/// Trigger key edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    On,
    Off,
}

#[derive(Debug, Clone)]
pub struct Piper {
    capacity: usize,
    queue: VecDeque<PendingEvent>,
    pipe: Vec<PendingEvent>,
    current_step: usize,
    current_tone: Option<PendingEvent>,
}

impl Piper {
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            queue: VecDeque::with_capacity(capacity),
            pipe: Vec::with_capacity(capacity),
            current_step: 0,
            current_tone: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn current_tone(&self) -> Option<&PendingEvent> {
        self.current_tone.as_ref()
    }

    /// Recorded events not yet spliced into the pipe, oldest first.
    pub fn queue(&self) -> &VecDeque<PendingEvent> {
        &self.queue
    }

    pub fn pipe(&self) -> &[PendingEvent] {
        &self.pipe
    }

    /// Remember a played HT note. The oldest entry is evicted at capacity.
    pub fn record(&mut self, status_byte: u8, ctrl_key_number: i32, velocity: u8) {
        self.queue.push_back(PendingEvent {
            status_byte,
            ctrl_key_number,
            velocity,
        });
        while self.queue.len() > self.capacity {
            self.queue.pop_front();
        }
    }

    /// Handle one edge of the trigger key. Replayed events are passed to
    /// `replay` in the order they should be performed.
    pub fn advance(&mut self, state: TriggerState, mut replay: impl FnMut(PendingEvent)) {
        self.splice_queue();

        if self.current_step >= self.capacity {
            log::debug!(target: "piper", "step {} wrapped to 0", self.current_step);
            self.current_step = 0;
        }
        if self.pipe.is_empty() {
            return;
        }

        match state {
            TriggerState::On => {
                self.current_tone = self.pipe.get(self.current_step).copied();
                if let Some(tone) = self.current_tone {
                    log::debug!(target: "piper", "step {}: replay key {}", self.current_step, tone.ctrl_key_number);
                    replay(PendingEvent::note_on(tone.ctrl_key_number, tone.velocity));
                }
            }
            TriggerState::Off => {
                if let Some(tone) = self.current_tone.take() {
                    replay(PendingEvent::note_off(tone.ctrl_key_number));
                }
                self.current_step += 1;
            }
        }
    }

    /// Change the capacity. Queue and pipe lose their oldest entries if they
    /// no longer fit, and a cursor past the new end restarts at 0.
    pub fn set_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        while self.queue.len() > capacity {
            self.queue.pop_front();
        }
        if self.pipe.len() > capacity {
            let excess = self.pipe.len() - capacity;
            self.pipe.drain(..excess);
        }
        if self.current_step >= capacity {
            self.current_step = 0;
        }
        self.capacity = capacity;
    }

    /// Forget everything recorded. A sounding replay is left for the caller
    /// to stop.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.pipe.clear();
        self.current_step = 0;
        self.current_tone = None;
    }

    fn splice_queue(&mut self) {
        let count = self.queue.len();
        if count == 0 {
            return;
        }
        let at = self.current_step.min(self.pipe.len());
        self.pipe.splice(at..at, self.queue.drain(..));
        if self.pipe.len() > self.capacity {
            let excess = self.pipe.len() - self.capacity;
            self.pipe.drain(..excess);
        }
        self.current_step += count;
        log::debug!(target: "piper", "spliced {} events, pipe holds {}", count, self.pipe.len());
    }
}

impl Default for Piper {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(events: impl IntoIterator<Item = PendingEvent>) -> Vec<i32> {
        events.into_iter().map(|e| e.ctrl_key_number).collect()
    }

    fn press(piper: &mut Piper) -> Vec<PendingEvent> {
        let mut out = Vec::new();
        piper.advance(TriggerState::On, |e| out.push(e));
        piper.advance(TriggerState::Off, |e| out.push(e));
        out
    }

    #[test]
    fn queue_evicts_oldest_at_capacity() {
        let mut piper = Piper::new(3);
        for key in 1..=4 {
            piper.record(NOTE_ON, key, 100);
        }
        assert_eq!(keys(piper.queue().iter().copied()), vec![2, 3, 4]);
    }

    #[test]
    fn first_press_wraps_and_replays_oldest() {
        let mut piper = Piper::new(3);
        for key in 1..=4 {
            piper.record(NOTE_ON, key, 100);
        }

        let mut on = Vec::new();
        piper.advance(TriggerState::On, |e| on.push(e));
        assert!(piper.queue().is_empty());
        assert_eq!(keys(piper.pipe().iter().copied()), vec![2, 3, 4]);
        assert_eq!(piper.current_step(), 0);
        assert_eq!(on, vec![PendingEvent::note_on(2, 100)]);
    }

    #[test]
    fn four_presses_wrap_back_to_start() {
        let mut piper = Piper::new(3);
        for key in 1..=4 {
            piper.record(NOTE_ON, key, 90);
        }

        let mut played = Vec::new();
        for _ in 0..3 {
            let events = press(&mut piper);
            assert_eq!(events.len(), 2);
            assert!(events[0].is_note_on());
            assert!(!events[1].is_note_on());
            assert_eq!(events[1].velocity, 0);
            played.push(events[0].ctrl_key_number);
        }
        assert_eq!(piper.current_step(), 3);

        let mut on = Vec::new();
        piper.advance(TriggerState::On, |e| on.push(e));
        assert_eq!(piper.current_step(), 0);
        played.push(on[0].ctrl_key_number);
        piper.advance(TriggerState::Off, |_| {});

        assert_eq!(played, vec![2, 3, 4, 2]);
        assert_eq!(piper.current_step(), 1);
    }

    #[test]
    fn empty_pipe_does_nothing() {
        let mut piper = Piper::new(4);
        assert!(press(&mut piper).is_empty());
        assert_eq!(piper.current_step(), 0);
    }

    #[test]
    fn release_without_tone_still_steps() {
        let mut piper = Piper::new(4);
        piper.record(NOTE_ON, 61, 100);
        // splice puts the cursor at 1, past the only event
        let events = press(&mut piper);
        assert!(events.is_empty());
        assert_eq!(piper.current_step(), 2);
        assert!(piper.current_tone().is_none());
    }

    #[test]
    fn short_pipe_cycles_through_capacity() {
        let mut piper = Piper::new(3);
        piper.record(NOTE_ON, 61, 100);
        piper.record(NOTE_ON, 62, 100);

        let mut played = Vec::new();
        for _ in 0..6 {
            let events = press(&mut piper);
            played.extend(events.iter().filter(|e| e.is_note_on()).map(|e| e.ctrl_key_number));
        }
        // empty slot at 2, wrap, 61, 62, empty slot, wrap, 61, 62
        assert_eq!(played, vec![61, 62, 61, 62]);
    }

    #[test]
    fn new_recording_splices_at_cursor() {
        let mut piper = Piper::new(4);
        piper.record(NOTE_ON, 1, 100);
        piper.record(NOTE_ON, 2, 100);
        press(&mut piper); // splice -> [1, 2], cursor 2 -> empty slot, cursor 3

        piper.record(NOTE_ON, 3, 100);
        let mut on = Vec::new();
        piper.advance(TriggerState::On, |e| on.push(e));
        assert_eq!(keys(piper.pipe().iter().copied()), vec![1, 2, 3]);
        assert_eq!(piper.current_step(), 0);
        assert_eq!(keys(on), vec![1]);
    }

    #[test]
    fn splice_trims_pipe_to_capacity() {
        let mut piper = Piper::new(2);
        piper.record(NOTE_ON, 1, 100);
        piper.record(NOTE_ON, 2, 100);
        piper.advance(TriggerState::On, |_| {});
        piper.record(NOTE_ON, 3, 100);
        piper.advance(TriggerState::Off, |_| {});
        assert_eq!(piper.pipe().len(), 2);
        assert!(piper.pipe().len() <= piper.capacity());
    }

    #[test]
    fn shrinking_capacity_keeps_newest() {
        let mut piper = Piper::new(4);
        for key in 1..=4 {
            piper.record(NOTE_ON, key, 100);
        }
        piper.advance(TriggerState::On, |_| {});
        piper.advance(TriggerState::Off, |_| {});
        assert_eq!(piper.current_step(), 1);

        piper.set_capacity(2);
        assert_eq!(piper.capacity(), 2);
        assert_eq!(keys(piper.pipe().iter().copied()), vec![3, 4]);
        assert_eq!(piper.current_step(), 1);

        piper.set_capacity(1);
        assert_eq!(keys(piper.pipe().iter().copied()), vec![4]);
        assert_eq!(piper.current_step(), 0);
    }

    #[test]
    fn growing_capacity_keeps_contents() {
        let mut piper = Piper::new(2);
        piper.record(NOTE_ON, 1, 100);
        piper.record(NOTE_ON, 2, 100);
        piper.set_capacity(5);
        assert_eq!(keys(piper.queue().iter().copied()), vec![1, 2]);
        piper.record(NOTE_ON, 3, 100);
        assert_eq!(piper.queue().len(), 3);
    }

    #[test]
    fn zero_capacity_is_raised() {
        assert_eq!(Piper::new(0).capacity(), 1);
        let mut piper = Piper::default();
        piper.set_capacity(0);
        assert_eq!(piper.capacity(), 1);
    }

    #[test]
    fn clear_resets_state() {
        let mut piper = Piper::new(3);
        piper.record(NOTE_ON, 1, 100);
        piper.advance(TriggerState::On, |_| {});
        piper.clear();
        assert!(piper.queue().is_empty());
        assert!(piper.pipe().is_empty());
        assert_eq!(piper.current_step(), 0);
        assert!(piper.current_tone().is_none());
    }
}
