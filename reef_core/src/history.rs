//! Bounded water-test history for trend display.

use reef_traits::WallTime;
use std::collections::VecDeque;

/// One manually entered water test. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestPoint {
    pub at: WallTime,
    pub ca_ppm: f32,
    pub alk_dkh: f32,
    pub mg_ppm: f32,
    pub ph: f32,
    /// Optional fourth-channel reading (auxiliary supplement).
    pub aux: Option<f32>,
}

/// FIFO-evicting test history; oldest entry drops first at capacity.
#[derive(Debug, Clone)]
pub struct TestHistory {
    buf: VecDeque<TestPoint>,
    cap: usize,
}

impl TestHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(cap.max(1)),
            cap: cap.max(1),
        }
    }

    pub fn push(&mut self, tp: TestPoint) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(tp);
    }

    pub fn latest(&self) -> Option<&TestPoint> {
        self.buf.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestPoint> {
        self.buf.iter()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
