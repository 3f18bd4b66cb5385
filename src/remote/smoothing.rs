use std::collections::VecDeque;

/// Moving average over the most recent calibrated gaze points.
#[derive(Debug, Clone, Default)]
pub struct GazeSmoother {
    window: VecDeque<(f64, f64)>,
}

impl GazeSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a point and return the average of the last `size` points.
    pub fn push(&mut self, point: (f64, f64), size: usize) -> (f64, f64) {
        let size = size.max(1);
        self.window.push_back(point);
        while self.window.len() > size {
            self.window.pop_front();
        }
        let n = self.window.len() as f64;
        let (sx, sy) = self
            .window
            .iter()
            .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
        (sx / n, sy / n)
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
