/// Returns a monotonic timestamp in nanoseconds.
#[cfg(unix)]
#[inline(never)]
pub fn mono_time_ns() -> u64 {
    use libc::{CLOCK_MONOTONIC, clock_gettime, timespec};
    let mut ts = timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable `timespec`; CLOCK_MONOTONIC is
    // always available on the supported platforms.
    unsafe {
        clock_gettime(CLOCK_MONOTONIC, &mut ts);
    }
    (ts.tv_sec as u64) * 1_000_000_000 + (ts.tv_nsec as u64)
}

/// A set of measurements summarized by quantiles.
///
/// Collect with [`push`](Trials::push), then [`sort`](Trials::sort) once
/// before querying; the accessors index into the sorted samples.
#[derive(Debug, Clone)]
pub struct Trials<T> {
    trials: Vec<T>,
}

impl<T> Trials<T>
where
    T: Ord + std::fmt::Display,
{
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            trials: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: T) {
        self.trials.push(value);
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn sort(&mut self) {
        self.trials.sort();
    }

    pub fn min(&self) -> Option<&T> {
        self.trials.first()
    }

    pub fn max(&self) -> Option<&T> {
        self.trials.last()
    }

    /// Returns the sample at quantile `p` (nearest rank), or `None` if no
    /// samples were collected.
    ///
    /// # Panics
    ///
    /// Panics if `p` is outside `0.0..=1.0`.
    pub fn quantile(&self, p: f64) -> Option<&T> {
        assert!((0.0..=1.0).contains(&p), "quantile out of range: {p}");
        let n = self.trials.len();
        if n == 0 {
            return None;
        }
        let idx = ((n - 1) as f64 * p).round() as usize;
        self.trials.get(idx)
    }

    /// Prints a header and one CSV row: `title,n,min,max,p50,p90,p99`.
    ///
    /// Empty sets print `-` in every statistic column.
    pub fn print_csv(&self, title: &str) {
        println!("{}", Self::CSV_HEADER);
        println!("{}", self.csv_row(title));
    }

    const CSV_HEADER: &'static str = "name,n,min,max,0.5,0.9,0.99";

    fn csv_row(&self, title: &str) -> String {
        let cell = |v: Option<&T>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
        format!(
            "{},{},{},{},{},{},{}",
            title,
            self.len(),
            cell(self.min()),
            cell(self.max()),
            cell(self.quantile(0.5)),
            cell(self.quantile(0.9)),
            cell(self.quantile(0.99)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- mono_time_ns tests -------------------------------------------------

    #[cfg(unix)]
    #[test]
    fn mono_time_ns_is_monotonic_non_decreasing() {
        let t1 = mono_time_ns();
        let t2 = mono_time_ns();
        assert!(t1 > 0);
        assert!(
            t2 >= t1,
            "mono_time_ns should be monotonic: t2={} < t1={}",
            t2,
            t1
        );
    }

    #[cfg(unix)]
    #[test]
    fn mono_time_ns_increases_over_sleep() {
        let t1 = mono_time_ns();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let t2 = mono_time_ns();
        assert!(t2 - t1 >= 5_000_000, "slept 5ms but only {}ns passed", t2 - t1);
    }

    // --- Trials tests -------------------------------------------------------

    #[test]
    fn trials_min_max_quantile_after_sort() {
        let mut trials = Trials::with_capacity(5);
        for v in [5, 1, 9, 3, 7] {
            trials.push(v);
        }
        trials.sort();

        assert_eq!(trials.len(), 5);
        assert_eq!(trials.min(), Some(&1));
        assert_eq!(trials.max(), Some(&9));
        // n = 5: idx = round(4 * p)
        assert_eq!(trials.quantile(0.0), Some(&1));
        assert_eq!(trials.quantile(0.5), Some(&5));
        assert_eq!(trials.quantile(0.9), Some(&9));
        assert_eq!(trials.quantile(1.0), Some(&9));
    }

    #[test]
    fn empty_trials_have_no_statistics() {
        let trials: Trials<u64> = Trials::with_capacity(0);
        assert!(trials.is_empty());
        assert_eq!(trials.min(), None);
        assert_eq!(trials.quantile(0.5), None);
        assert_eq!(trials.csv_row("empty"), "empty,0,-,-,-,-,-");
    }

    #[test]
    #[should_panic(expected = "quantile out of range")]
    fn quantile_panics_above_one() {
        let mut trials = Trials::with_capacity(1);
        trials.push(42);
        let _ = trials.quantile(1.1);
    }

    #[test]
    fn csv_row_lists_the_summary() {
        let mut trials = Trials::with_capacity(3);
        trials.push(30);
        trials.push(10);
        trials.push(20);
        trials.sort();
        assert_eq!(trials.csv_row("lockfree"), "lockfree,3,10,30,20,30,30");
    }
}
