use std::net::ToSocketAddrs;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use fastport_bench::cli::Args;
use fastport_bench::driver::{BenchmarkConfig, BenchmarkDriver};
use fastport_bench::report;

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.parse().unwrap())
        .from_env_lossy();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_names(true)
        .compact();

    let log_dir = fastport_utils::directories::logs_dir("fastport-bench");
    let file_appender = tracing_appender::rolling::daily(&log_dir, "fastport-bench.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // Leaked on purpose: the guard must outlive the process for the
    // background writer thread to flush on exit.
    std::mem::forget(guard);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(args.verbose);

    let Some(server_addr) = format!("{}:{}", args.host, args.port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
    else {
        tracing::error!(host = %args.host, port = args.port, "failed to resolve server address");
        return ExitCode::FAILURE;
    };

    let driver = match BenchmarkDriver::new() {
        Ok(driver) => driver,
        Err(err) => {
            tracing::error!(%err, "failed to start reactor");
            return ExitCode::FAILURE;
        }
    };

    let config = BenchmarkConfig {
        test_name: format!("{:?}", args.mode),
        server_addr,
        mode: args.mode,
        iterations: args.iterations,
        warmup_iterations: args.warmup,
        payload_size: args.payload,
        timeout: Duration::from_millis(args.timeout_ms),
        verbose: args.verbose,
    };

    let outcome = driver.run(&config);
    driver.stop();

    let stats = match outcome {
        Ok(stats) => stats,
        Err(err) => {
            tracing::error!(%err, "benchmark run failed");
            return ExitCode::FAILURE;
        }
    };

    println!("{stats}");

    if let Some(output) = &args.output {
        let path = report::timestamped_path(output, chrono::Local::now());
        if let Err(err) = report::write_csv(&path, std::slice::from_ref(&stats)) {
            tracing::error!(%err, path = %path.display(), "failed to write report");
            return ExitCode::FAILURE;
        }
        tracing::info!(path = %path.display(), "wrote report");
    }

    ExitCode::SUCCESS
}
