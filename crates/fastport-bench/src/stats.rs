/// Latency/throughput summary for one benchmark run, matching the CSV
/// report's column set exactly.
#[derive(Debug, Clone)]
pub struct BenchmarkStats {
    pub test_name: String,
    pub iterations: usize,
    pub payload_size: usize,
    pub avg_latency_ns: f64,
    pub min_latency_ns: f64,
    pub max_latency_ns: f64,
    pub p50_latency_ns: f64,
    pub p90_latency_ns: f64,
    pub p95_latency_ns: f64,
    pub p99_latency_ns: f64,
    pub stddev_ns: f64,
    pub packets_per_sec: f64,
    pub mb_per_sec: f64,
    pub total_bytes: u64,
    pub total_elapsed_ns: u64,
}

impl BenchmarkStats {
    pub fn csv_header() -> &'static str {
        "test_name,iterations,payload_size,avg_latency_ns,min_latency_ns,max_latency_ns,\
         p50_latency_ns,p90_latency_ns,p95_latency_ns,p99_latency_ns,stddev_ns,\
         packets_per_sec,mb_per_sec"
    }

    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            self.test_name,
            self.iterations,
            self.payload_size,
            self.avg_latency_ns,
            self.min_latency_ns,
            self.max_latency_ns,
            self.p50_latency_ns,
            self.p90_latency_ns,
            self.p95_latency_ns,
            self.p99_latency_ns,
            self.stddev_ns,
            self.packets_per_sec,
            self.mb_per_sec,
        )
    }
}

impl std::fmt::Display for BenchmarkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "======================================")?;
        writeln!(f, " Benchmark: {}", self.test_name)?;
        writeln!(f, "======================================")?;
        writeln!(f, " Iterations    : {}", self.iterations)?;
        writeln!(f, " Payload Size  : {} bytes", self.payload_size)?;
        writeln!(f, "--------------------------------------")?;
        writeln!(f, " Latency (RTT):")?;
        writeln!(f, "   Average     : {:.2} us", self.avg_latency_ns / 1000.0)?;
        writeln!(f, "   Min         : {:.2} us", self.min_latency_ns / 1000.0)?;
        writeln!(f, "   Max         : {:.2} us", self.max_latency_ns / 1000.0)?;
        writeln!(f, "   P50         : {:.2} us", self.p50_latency_ns / 1000.0)?;
        writeln!(f, "   P90         : {:.2} us", self.p90_latency_ns / 1000.0)?;
        writeln!(f, "   P95         : {:.2} us", self.p95_latency_ns / 1000.0)?;
        writeln!(f, "   P99         : {:.2} us", self.p99_latency_ns / 1000.0)?;
        writeln!(f, "   Std Dev     : {:.2} us", self.stddev_ns / 1000.0)?;
        writeln!(f, "--------------------------------------")?;
        writeln!(f, " Throughput:")?;
        writeln!(f, "   Packets/sec : {:.2}", self.packets_per_sec)?;
        writeln!(f, "   MB/sec      : {:.2}", self.mb_per_sec)?;
        writeln!(f, "   Total Bytes : {}", self.total_bytes)?;
        writeln!(
            f,
            "   Elapsed     : {:.2} ms",
            self.total_elapsed_ns as f64 / 1_000_000.0
        )?;
        write!(f, "======================================")
    }
}

/// Collects raw RTT samples and reduces them to a [`BenchmarkStats`]. The
/// percentile algorithm is linear interpolation between order statistics,
/// matching the original tool's definition exactly rather than nearest-rank.
#[derive(Default)]
pub struct LatencyCollector {
    samples: Vec<u64>,
}

impl LatencyCollector {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn add_sample(&mut self, latency_ns: u64) {
        self.samples.push(latency_ns);
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn calculate(&self, test_name: impl Into<String>, payload_size: usize) -> BenchmarkStats {
        let test_name = test_name.into();
        if self.samples.is_empty() {
            return BenchmarkStats {
                test_name,
                iterations: 0,
                payload_size,
                avg_latency_ns: 0.0,
                min_latency_ns: 0.0,
                max_latency_ns: 0.0,
                p50_latency_ns: 0.0,
                p90_latency_ns: 0.0,
                p95_latency_ns: 0.0,
                p99_latency_ns: 0.0,
                stddev_ns: 0.0,
                packets_per_sec: 0.0,
                mb_per_sec: 0.0,
                total_bytes: 0,
                total_elapsed_ns: 0,
            };
        }

        let mut sorted = self.samples.clone();
        sorted.sort_unstable();

        let min_latency_ns = sorted[0] as f64;
        let max_latency_ns = *sorted.last().unwrap() as f64;

        let sum: f64 = sorted.iter().map(|&s| s as f64).sum();
        let avg_latency_ns = sum / sorted.len() as f64;

        let p50_latency_ns = percentile(&sorted, 50.0);
        let p90_latency_ns = percentile(&sorted, 90.0);
        let p95_latency_ns = percentile(&sorted, 95.0);
        let p99_latency_ns = percentile(&sorted, 99.0);

        let sq_sum: f64 = sorted
            .iter()
            .map(|&s| (s as f64 - avg_latency_ns).powi(2))
            .sum();
        let stddev_ns = (sq_sum / sorted.len() as f64).sqrt();

        let total_elapsed_ns = sum as u64;
        let total_bytes = sorted.len() as u64 * payload_size as u64;
        let elapsed_sec = total_elapsed_ns as f64 / 1_000_000_000.0;
        let (packets_per_sec, mb_per_sec) = if elapsed_sec > 0.0 {
            (
                sorted.len() as f64 / elapsed_sec,
                total_bytes as f64 / (1024.0 * 1024.0) / elapsed_sec,
            )
        } else {
            (0.0, 0.0)
        };

        BenchmarkStats {
            test_name,
            iterations: sorted.len(),
            payload_size,
            avg_latency_ns,
            min_latency_ns,
            max_latency_ns,
            p50_latency_ns,
            p90_latency_ns,
            p95_latency_ns,
            p99_latency_ns,
            stddev_ns,
            packets_per_sec,
            mb_per_sec,
            total_bytes,
            total_elapsed_ns,
        }
    }
}

/// Linear interpolation between order statistics: the same definition as
/// numpy's default `interpolation='linear'`, not nearest-rank.
fn percentile(sorted: &[u64], percent: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }
    let index = (percent / 100.0) * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    if lower == upper {
        return sorted[lower] as f64;
    }
    let fraction = index - lower as f64;
    sorted[lower] as f64 * (1.0 - fraction) + sorted[upper] as f64 * fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collector_yields_zeroed_stats() {
        let collector = LatencyCollector::default();
        let stats = collector.calculate("empty", 64);
        assert_eq!(stats.iterations, 0);
        assert_eq!(stats.avg_latency_ns, 0.0);
    }

    #[test]
    fn percentile_interpolates_between_order_statistics() {
        let sorted: Vec<u64> = (1..=10).collect();
        assert!((percentile(&sorted, 50.0) - 5.5).abs() < 1e-9);
        assert!((percentile(&sorted, 100.0) - 10.0).abs() < 1e-9);
        assert!((percentile(&sorted, 0.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn calculate_reports_min_max_avg_and_throughput() {
        let mut collector = LatencyCollector::with_capacity(4);
        for ns in [100u64, 200, 300, 400] {
            collector.add_sample(ns);
        }
        let stats = collector.calculate("t", 64);
        assert_eq!(stats.iterations, 4);
        assert_eq!(stats.min_latency_ns, 100.0);
        assert_eq!(stats.max_latency_ns, 400.0);
        assert_eq!(stats.avg_latency_ns, 250.0);
        assert!(stats.packets_per_sec > 0.0);
    }
}
