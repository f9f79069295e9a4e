//! The physical frame table: one entry per fixed-size physical frame.

use serde::{Deserialize, Serialize};

use crate::pid::ProcessId;

/// Bookkeeping for one physical frame. The frame's raw bytes live in the
/// `MemoryManager`'s flat physical byte array, addressed by
/// `frame_number * frame_size`; this table only tracks ownership.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FrameEntry {
    pub in_use: bool,
    pub owner_pid: Option<ProcessId>,
    pub owner_vpn: u32,
    pub arrival_order: u64,
    pub dirty: bool,
}

impl FrameEntry {
    pub const fn free() -> Self {
        Self {
            in_use: false,
            owner_pid: None,
            owner_vpn: 0,
            arrival_order: 0,
            dirty: false,
        }
    }
}

impl Default for FrameEntry {
    fn default() -> Self {
        Self::free()
    }
}

/// The physical frame table: a fixed-size array of frame entries created
/// once at startup and reused for the lifetime of the run.
#[derive(Debug, Clone)]
pub struct FrameTable {
    frames: Vec<FrameEntry>,
}

impl FrameTable {
    pub fn new(total_frames: usize) -> Self {
        Self {
            frames: vec![FrameEntry::free(); total_frames],
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, frame_number: usize) -> &FrameEntry {
        &self.frames[frame_number]
    }

    pub fn get_mut(&mut self, frame_number: usize) -> &mut FrameEntry {
        &mut self.frames[frame_number]
    }

    /// Lowest-numbered free frame, if any (§4.2 step 1).
    pub fn find_free(&self) -> Option<usize> {
        self.frames.iter().position(|f| !f.in_use)
    }

    pub fn frames_in_use(&self) -> usize {
        self.frames.iter().filter(|f| f.in_use).count()
    }

    pub fn frames_free(&self) -> usize {
        self.frames.len() - self.frames_in_use()
    }

    pub fn frames_owned_by(&self, pid: ProcessId) -> usize {
        self.frames
            .iter()
            .filter(|f| f.in_use && f.owner_pid == Some(pid))
            .count()
    }

    /// Releases every frame owned by `pid`. Returns the freed frame numbers.
    pub fn release_owned_by(&mut self, pid: ProcessId) -> Vec<usize> {
        let mut released = Vec::new();
        for (idx, frame) in self.frames.iter_mut().enumerate() {
            if frame.in_use && frame.owner_pid == Some(pid) {
                *frame = FrameEntry::free();
                released.push(idx);
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_free_returns_lowest_numbered() {
        let mut t = FrameTable::new(3);
        t.get_mut(0).in_use = true;
        assert_eq!(t.find_free(), Some(1));
    }

    #[test]
    fn release_owned_by_frees_only_matching_frames() {
        let pid1 = ProcessId::first();
        let mut t = FrameTable::new(2);
        t.get_mut(0).in_use = true;
        t.get_mut(0).owner_pid = Some(pid1);
        t.get_mut(1).in_use = true;
        t.get_mut(1).owner_pid = None;

        let released = t.release_owned_by(pid1);
        assert_eq!(released, vec![0]);
        assert!(!t.get(0).in_use);
        assert!(t.get(1).in_use);
    }

    #[test]
    fn frames_in_use_and_free_are_complementary() {
        let mut t = FrameTable::new(4);
        t.get_mut(0).in_use = true;
        t.get_mut(2).in_use = true;
        assert_eq!(t.frames_in_use(), 2);
        assert_eq!(t.frames_free(), 2);
    }
}
