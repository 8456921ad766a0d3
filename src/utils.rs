use std::sync::atomic::{AtomicU64, Ordering};

/// Row counter that logs progress at a fixed interval.
///
/// Operations call `inc` once per processed row; a log line is emitted
/// whenever the count crosses an interval boundary, and once more on
/// `finish` with the final total.
pub struct ProgressCounter {
    label: &'static str,
    interval: u64,
    count: AtomicU64,
}

impl ProgressCounter {
    pub fn new(label: &'static str, interval: u64) -> Self {
        Self {
            label,
            interval: interval.max(1),
            count: AtomicU64::new(0),
        }
    }

    pub fn inc(&self, delta: u64) {
        let prev = self.count.fetch_add(delta, Ordering::Relaxed);
        let current = prev + delta;
        if prev / self.interval < current / self.interval {
            tracing::info!("{}: {} rows", self.label, current);
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn finish(&self) {
        tracing::info!("{}: {} rows total", self.label, self.count());
    }
}

/// SQL LIKE matching with `%` (any run) and `_` (single char) wildcards.
pub fn like_match(pattern: &str, value: &str) -> bool {
    fn inner(p: &[char], v: &[char]) -> bool {
        match p.first() {
            None => v.is_empty(),
            Some('%') => (0..=v.len()).any(|skip| inner(&p[1..], &v[skip..])),
            Some('_') => !v.is_empty() && inner(&p[1..], &v[1..]),
            Some(c) => v.first() == Some(c) && inner(&p[1..], &v[1..]),
        }
    }

    let p: Vec<char> = pattern.chars().collect();
    let v: Vec<char> = value.chars().collect();
    inner(&p, &v)
}
