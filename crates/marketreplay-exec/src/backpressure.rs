//! Bounded FIFO queue with HIGH/LOW hysteresis for the externally-supplied
//! event stream case. Single-producer/single-consumer bookkeeping only —
//! the dispatch loop itself stays single-threaded, so this guards queue
//! depth, not concurrent access.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowSignal {
    /// No change since the last push/pop.
    None,
    /// Depth crossed up through `high`; upstream should stop producing.
    Stop,
    /// Depth crossed down through `low`; upstream may resume producing.
    Resume,
}

#[derive(Debug, Clone, Copy)]
pub struct BackpressureThresholds {
    pub high: usize,
    pub low: usize,
    pub max: usize,
}

/// A plain bounded queue, extended with the hysteresis signal the Runtime
/// forwards to the upstream producer. `try_push` beyond `max` is the
/// terminal `queue_overflow` condition; callers must fail the run rather
/// than retry.
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    thresholds: BackpressureThresholds,
    signaling_stop: bool,
}

impl<T> BoundedQueue<T> {
    pub fn new(thresholds: BackpressureThresholds) -> Self {
        Self {
            items: VecDeque::new(),
            thresholds,
            signaling_stop: false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_overflowing(&self, additional: usize) -> bool {
        self.items.len() + additional > self.thresholds.max
    }

    /// Push one item. Returns the flow signal produced by crossing HIGH
    /// (stop) or, on a later call, LOW (resume). `Err` means `max` was
    /// reached and the queue rejected the item — a terminal condition.
    pub fn try_push(&mut self, item: T) -> Result<FlowSignal, T> {
        if self.items.len() >= self.thresholds.max {
            return Err(item);
        }
        self.items.push_back(item);
        if !self.signaling_stop && self.items.len() >= self.thresholds.high {
            self.signaling_stop = true;
            return Ok(FlowSignal::Stop);
        }
        Ok(FlowSignal::None)
    }

    /// Pop the oldest item. Returns the flow signal produced by crossing
    /// back down through LOW.
    pub fn try_pop(&mut self) -> (Option<T>, FlowSignal) {
        let item = self.items.pop_front();
        if self.signaling_stop && self.items.len() <= self.thresholds.low {
            self.signaling_stop = false;
            return (item, FlowSignal::Resume);
        }
        (item, FlowSignal::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> BackpressureThresholds {
        BackpressureThresholds {
            high: 1500,
            low: 500,
            max: 2000,
        }
    }

    #[test]
    fn crossing_high_signals_stop() {
        let mut q = BoundedQueue::new(thresholds());
        let mut saw_stop = false;
        for i in 0..1600 {
            if q.try_push(i).unwrap() == FlowSignal::Stop {
                saw_stop = true;
            }
        }
        assert!(saw_stop);
        assert_eq!(q.len(), 1600);
    }

    #[test]
    fn draining_to_low_signals_resume() {
        let mut q = BoundedQueue::new(thresholds());
        for i in 0..1600 {
            q.try_push(i).unwrap();
        }
        let mut saw_resume = false;
        for _ in 0..1200 {
            let (_, signal) = q.try_pop();
            if signal == FlowSignal::Resume {
                saw_resume = true;
            }
        }
        assert!(saw_resume);
        assert_eq!(q.len(), 400);
    }

    #[test]
    fn pushing_past_max_is_rejected() {
        let mut q = BoundedQueue::new(thresholds());
        for i in 0..2000 {
            q.try_push(i).unwrap();
        }
        assert!(q.try_push(2000).is_err());
    }
}
