//! RandomSource port - 乱数の抽象化
//!
//! tag の選択と削除判定の抽選はすべてここを通します。
//! テストでは ScriptedRandom で決定的な列を与えます。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

pub trait RandomSource: Send + Sync {
    /// Uniform integer in `[low, high]`, both inclusive. `low <= high`.
    fn next_in_range(&self, low: u32, high: u32) -> u32;
}

/// Thread-local RNG from `rand`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_in_range(&self, low: u32, high: u32) -> u32 {
        if low >= high {
            return low;
        }
        rand::thread_rng().gen_range(low..=high)
    }
}

/// Replays a fixed script of values, clamped into the requested range.
///
/// Once the script runs out the last value repeats.
#[derive(Debug)]
pub struct ScriptedRandom {
    script: Mutex<VecDeque<u32>>,
    last: Mutex<u32>,
    draws: AtomicUsize,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        let script: VecDeque<u32> = values.into_iter().collect();
        let last = script.front().copied().unwrap_or(0);
        Self {
            script: Mutex::new(script),
            last: Mutex::new(last),
            draws: AtomicUsize::new(0),
        }
    }

    /// Always return `value`.
    pub fn repeat(value: u32) -> Self {
        Self::new([value])
    }

    /// Number of values handed out so far.
    pub fn draws(&self) -> usize {
        self.draws.load(Ordering::Relaxed)
    }
}

impl RandomSource for ScriptedRandom {
    fn next_in_range(&self, low: u32, high: u32) -> u32 {
        self.draws.fetch_add(1, Ordering::Relaxed);
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(next) = self.script.lock().unwrap_or_else(|e| e.into_inner()).pop_front() {
            *last = next;
        }
        (*last).clamp(low, high.max(low))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_random_stays_in_range() {
        let rng = ThreadRandom;
        for _ in 0..1000 {
            let v = rng.next_in_range(0, 3);
            assert!(v <= 3);
        }
        assert_eq!(rng.next_in_range(5, 5), 5);
    }

    #[test]
    fn scripted_random_replays_then_repeats_last() {
        let rng = ScriptedRandom::new([1, 2]);
        assert_eq!(rng.next_in_range(0, 10), 1);
        assert_eq!(rng.next_in_range(0, 10), 2);
        assert_eq!(rng.next_in_range(0, 10), 2);
        assert_eq!(rng.draws(), 3);
    }

    #[test]
    fn scripted_random_clamps_into_range() {
        let rng = ScriptedRandom::repeat(9);
        assert_eq!(rng.next_in_range(0, 3), 3);
    }
}
