//! Focus bookkeeping for the virtual desktop.
//!
//! Two pieces live here:
//! - [`FocusStack`] is the bounded, ordered list of slots composited into the
//!   main viewing arc. Slot 0 is the centred "lap" panel.
//! - [`GazeSelector`] is the dwell-time state machine that turns consecutive
//!   gaze hits on a thumbnail into a selection.
//!
//! Both are driven from the single frame-loop thread; neither holds references
//! into the monitor registry, only dense monitor indices.

use deskconfig::FocusConfig;

/// Dense index of a monitor in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonitorId(pub usize);

impl std::fmt::Display for MonitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusSlot {
    #[default]
    Empty,
    Occupied(MonitorId),
}

impl FocusSlot {
    pub fn monitor(&self) -> Option<MonitorId> {
        match self {
            FocusSlot::Empty => None,
            FocusSlot::Occupied(id) => Some(*id),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FocusSlot::Empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusStack {
    slots: Vec<FocusSlot>,
    capacity: usize,
}

impl FocusStack {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn from_config(config: &FocusConfig) -> Self {
        Self::new(config.max_slots)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[FocusSlot] {
        &self.slots
    }

    /// The centred panel, if slot 0 exists and is occupied.
    pub fn head(&self) -> Option<MonitorId> {
        self.slots.first().and_then(FocusSlot::monitor)
    }

    /// Slots 1.. paired with their fan position (0 for slot 1).
    pub fn fan(&self) -> impl Iterator<Item = (usize, FocusSlot)> + '_ {
        self.slots.iter().skip(1).copied().enumerate()
    }

    /// Inserts an empty slot at the head, shifting everything toward the tail.
    pub fn push(&mut self) {
        self.slots.insert(0, FocusSlot::Empty);
        self.enforce_capacity();
    }

    /// Drops slot 0 and shifts the rest toward the head. No-op when empty.
    pub fn pop(&mut self) -> Option<FocusSlot> {
        if self.slots.is_empty() {
            return None;
        }
        Some(self.slots.remove(0))
    }

    /// Places `monitor` in slot 0, replacing its occupant or opening the stack.
    pub fn select(&mut self, monitor: MonitorId) {
        match self.slots.first_mut() {
            Some(slot) => *slot = FocusSlot::Occupied(monitor),
            None => self.slots.push(FocusSlot::Occupied(monitor)),
        }
        self.enforce_capacity();
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    fn enforce_capacity(&mut self) {
        if self.slots.len() > self.capacity {
            let dropped = self.slots.len() - self.capacity;
            self.slots.truncate(self.capacity);
            tracing::trace!(dropped, capacity = self.capacity, "trimmed focus stack tail");
        }
    }
}

/// Dwell progress of a [`GazeSelector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazeState {
    Idle,
    Holding { candidate: MonitorId, frames: u32 },
}

#[derive(Debug, Clone)]
pub struct GazeSelector {
    state: GazeState,
    hold_frames: u32,
}

impl GazeSelector {
    pub fn new(hold_frames: u32) -> Self {
        Self {
            state: GazeState::Idle,
            hold_frames: hold_frames.max(1),
        }
    }

    pub fn from_config(config: &FocusConfig) -> Self {
        Self::new(config.hold_frames)
    }

    pub fn state(&self) -> GazeState {
        self.state
    }

    pub fn hold_frames(&self) -> u32 {
        self.hold_frames
    }

    /// Advances the dwell timer with this tick's hit, returning a committed selection.
    ///
    /// Any tick without a hit resets to [`GazeState::Idle`]; the timer never
    /// survives a gap.
    pub fn evaluate(&mut self, hit: Option<MonitorId>) -> Option<MonitorId> {
        let Some(target) = hit else {
            self.state = GazeState::Idle;
            return None;
        };

        let frames = match self.state {
            GazeState::Holding { candidate, frames } if candidate == target => frames + 1,
            _ => 1,
        };

        if frames >= self.hold_frames {
            self.state = GazeState::Idle;
            tracing::debug!(monitor = %target, frames, "gaze selection committed");
            Some(target)
        } else {
            self.state = GazeState::Holding {
                candidate: target,
                frames,
            };
            None
        }
    }

    pub fn reset(&mut self) {
        self.state = GazeState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupied(stack: &FocusStack) -> Vec<usize> {
        stack
            .slots()
            .iter()
            .filter_map(FocusSlot::monitor)
            .map(|id| id.0)
            .collect()
    }

    #[test]
    fn pop_on_empty_is_noop() {
        let mut stack = FocusStack::new(7);
        assert_eq!(stack.pop(), None);
        assert!(stack.is_empty());
    }

    #[test]
    fn push_pop_lengths_follow_clamped_count() {
        let ops = [
            true, true, false, true, true, true, true, true, true, true, true, false, false,
            false, false, false, false, false, false, false, false, true,
        ];
        let mut stack = FocusStack::new(7);
        let mut expected = 0usize;
        for push in ops {
            if push {
                stack.push();
                expected = (expected + 1).min(7);
            } else {
                stack.pop();
                expected = expected.saturating_sub(1);
            }
            assert_eq!(stack.len(), expected);
            assert!(stack.len() <= stack.capacity());
        }
    }

    #[test]
    fn push_shifts_toward_tail_and_preserves_order() {
        let mut stack = FocusStack::new(7);
        stack.select(MonitorId(2));
        stack.push();
        stack.select(MonitorId(0));
        stack.push();
        stack.select(MonitorId(1));
        assert_eq!(occupied(&stack), vec![1, 0, 2]);

        stack.push();
        assert_eq!(stack.slots()[0], FocusSlot::Empty);
        assert_eq!(stack.head(), None);
        assert_eq!(occupied(&stack), vec![1, 0, 2]);
    }

    #[test]
    fn pop_shifts_toward_head() {
        let mut stack = FocusStack::new(7);
        stack.select(MonitorId(3));
        stack.push();
        stack.select(MonitorId(4));
        assert_eq!(stack.head(), Some(MonitorId(4)));

        assert_eq!(stack.pop(), Some(FocusSlot::Occupied(MonitorId(4))));
        assert_eq!(stack.head(), Some(MonitorId(3)));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn push_at_capacity_discards_tail() {
        let mut stack = FocusStack::new(3);
        stack.select(MonitorId(0));
        stack.push();
        stack.select(MonitorId(1));
        stack.push();
        stack.select(MonitorId(2));
        assert_eq!(occupied(&stack), vec![2, 1, 0]);

        stack.push();
        assert_eq!(stack.len(), 3);
        assert_eq!(occupied(&stack), vec![2, 1]);
    }

    #[test]
    fn select_replaces_head_or_opens_stack() {
        let mut stack = FocusStack::new(7);
        stack.select(MonitorId(5));
        assert_eq!(stack.len(), 1);
        stack.select(MonitorId(6));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.head(), Some(MonitorId(6)));
    }

    #[test]
    fn fan_enumerates_from_second_slot() {
        let mut stack = FocusStack::new(7);
        stack.select(MonitorId(0));
        stack.push();
        stack.push();
        stack.select(MonitorId(1));
        let fan: Vec<_> = stack.fan().collect();
        assert_eq!(
            fan,
            vec![(0, FocusSlot::Empty), (1, FocusSlot::Occupied(MonitorId(0)))]
        );
    }

    #[test]
    fn gaze_commits_after_exact_hold() {
        let mut gaze = GazeSelector::new(20);
        let mut selections = 0;
        for tick in 0..20 {
            let result = gaze.evaluate(Some(MonitorId(1)));
            if tick < 19 {
                assert!(result.is_none());
            } else {
                assert_eq!(result, Some(MonitorId(1)));
            }
            selections += result.is_some() as usize;
        }
        assert_eq!(selections, 1);
        assert_eq!(gaze.state(), GazeState::Idle);
    }

    #[test]
    fn gaze_gap_resets_timer() {
        let mut gaze = GazeSelector::new(20);
        let mut selections = 0;
        for _ in 0..19 {
            selections += gaze.evaluate(Some(MonitorId(0))).is_some() as usize;
        }
        selections += gaze.evaluate(None).is_some() as usize;
        assert_eq!(gaze.state(), GazeState::Idle);
        for _ in 0..19 {
            selections += gaze.evaluate(Some(MonitorId(0))).is_some() as usize;
        }
        assert_eq!(selections, 0);
        assert_eq!(
            gaze.state(),
            GazeState::Holding {
                candidate: MonitorId(0),
                frames: 19
            }
        );
    }

    #[test]
    fn gaze_switching_target_restarts_count() {
        let mut gaze = GazeSelector::new(3);
        assert!(gaze.evaluate(Some(MonitorId(0))).is_none());
        assert!(gaze.evaluate(Some(MonitorId(0))).is_none());
        assert!(gaze.evaluate(Some(MonitorId(1))).is_none());
        assert_eq!(
            gaze.state(),
            GazeState::Holding {
                candidate: MonitorId(1),
                frames: 1
            }
        );
        assert!(gaze.evaluate(Some(MonitorId(1))).is_none());
        assert_eq!(gaze.evaluate(Some(MonitorId(1))), Some(MonitorId(1)));
    }

    #[test]
    fn from_config_uses_focus_table() {
        let config = FocusConfig {
            hold_frames: 5,
            max_slots: 4,
        };
        assert_eq!(GazeSelector::from_config(&config).hold_frames(), 5);
        assert_eq!(FocusStack::from_config(&config).capacity(), 4);
    }
}
