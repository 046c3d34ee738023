//! Weighted lane selection.
//!
//! Smooth weighted round-robin over the lane weights (6:3:1). Each pick
//! yields the lane to try first; the remaining lanes follow in priority
//! order so a worker falls through when the picked lane is empty.

use super::job::QueueLane;

#[derive(Debug, Clone)]
pub struct LaneSelector {
    lanes: Vec<(QueueLane, i64)>,
    current: Vec<i64>,
}

impl Default for LaneSelector {
    fn default() -> Self {
        Self::new(&QueueLane::ALL)
    }
}

impl LaneSelector {
    pub fn new(lanes: &[QueueLane]) -> Self {
        Self {
            lanes: lanes.iter().map(|l| (*l, i64::from(l.weight()))).collect(),
            current: vec![0; lanes.len()],
        }
    }

    /// Next lane by weight.
    pub fn pick(&mut self) -> Option<QueueLane> {
        let total: i64 = self.lanes.iter().map(|(_, w)| w).sum();
        let mut best: Option<usize> = None;

        for (i, (_, weight)) in self.lanes.iter().enumerate() {
            self.current[i] += weight;
            if best.map_or(true, |b| self.current[i] > self.current[b]) {
                best = Some(i);
            }
        }

        let best = best?;
        self.current[best] -= total;
        Some(self.lanes[best].0)
    }

    /// Lanes to try this round: the weighted pick, then the rest by priority.
    pub fn claim_order(&mut self) -> Vec<QueueLane> {
        let Some(first) = self.pick() else {
            return Vec::new();
        };
        let mut order = Vec::with_capacity(self.lanes.len());
        order.push(first);
        order.extend(
            self.lanes
                .iter()
                .map(|(lane, _)| *lane)
                .filter(|lane| *lane != first),
        );
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picks_follow_weights() {
        let mut selector = LaneSelector::default();
        let picks: Vec<QueueLane> = (0..10).filter_map(|_| selector.pick()).collect();

        let count = |lane| picks.iter().filter(|p| **p == lane).count();
        assert_eq!(count(QueueLane::Critical), 6);
        assert_eq!(count(QueueLane::Default), 3);
        assert_eq!(count(QueueLane::Low), 1);
    }

    #[test]
    fn test_picks_are_interleaved() {
        let mut selector = LaneSelector::default();
        let first_three: Vec<QueueLane> = (0..3).filter_map(|_| selector.pick()).collect();
        assert!(first_three.contains(&QueueLane::Default));
    }

    #[test]
    fn test_claim_order_includes_every_lane_once() {
        let mut selector = LaneSelector::default();
        for _ in 0..10 {
            let order = selector.claim_order();
            assert_eq!(order.len(), 3);
            for lane in QueueLane::ALL {
                assert!(order.contains(&lane));
            }
        }
    }

    #[test]
    fn test_empty_selector() {
        let mut selector = LaneSelector::new(&[]);
        assert!(selector.pick().is_none());
        assert!(selector.claim_order().is_empty());
    }
}
