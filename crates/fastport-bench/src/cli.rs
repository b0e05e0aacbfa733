use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Standard completion-path session, privately-owned ring storage.
    Iocp,
    /// Same session contract, recv/send staging drawn from a `RioBufferPool`
    /// slice, demonstrating the seam rather than switching to a real
    /// Registered-I/O fast path (unavailable outside Windows).
    Rio,
}

#[derive(Parser, Debug)]
#[command(
    name = "fastport-bench",
    about = "FastPort network RTT/throughput benchmark driver"
)]
pub struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 9000)]
    pub port: u16,

    #[arg(long, value_enum, default_value_t = Mode::Iocp)]
    pub mode: Mode,

    #[arg(long, default_value_t = 10_000)]
    pub iterations: u64,

    #[arg(long, default_value_t = 100)]
    pub warmup: u64,

    #[arg(long, default_value_t = 64)]
    pub payload: usize,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub verbose: bool,

    #[arg(long, default_value_t = 5_000)]
    pub timeout_ms: u64,
}
