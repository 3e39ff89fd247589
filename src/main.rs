use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use local_port_prober::config::{BannerOptions, ScanConfig, DEFAULT_TARGET};
use local_port_prober::ports::{self, DefaultPorts, PortSelection};
use local_port_prober::summary::{progress_line, Summary};
use local_port_prober::{logging, output, scanner, target};

/// local-port-prober — async TCP port prober with bounded concurrency and optional banner capture.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "local-port-prober",
    version,
    about = "Async TCP port prober with bounded concurrency, banner capture and JSON/CSV output.",
    long_about = None
)]
struct Cli {
    /// Probe ports 1..=COUNT. Ignored when --ports, --ports-file or --use-default-common is given.
    count: Option<u32>,

    /// Host to probe. Must resolve to a loopback address unless --allow-remote is set.
    #[arg(long, default_value = DEFAULT_TARGET)]
    target: String,

    /// Comma-separated ports and ranges, e.g. '22,80,8000-8010'. Default: common ports list.
    #[arg(long)]
    ports: Option<String>,

    /// Path to a ports file (one port or range per line, '#' comments).
    #[arg(long = "ports-file")]
    ports_file: Option<PathBuf>,

    /// Use the built-in common ports list (overrides every other port source).
    #[arg(long = "use-default-common", default_value_t = false)]
    use_default_common: bool,

    /// Maximum concurrent connect attempts.
    #[arg(long, default_value_t = 200)]
    concurrency: usize,

    /// Connect timeout in seconds.
    #[arg(long, default_value_t = 1.5)]
    timeout: f64,

    /// Attempt to read a banner after connecting.
    #[arg(long, default_value_t = false)]
    banner: bool,

    /// Send a single CRLF after connecting, before reading the banner.
    #[arg(long = "send-probe", default_value_t = false)]
    send_probe: bool,

    /// Stagger start times by this many seconds per port index.
    #[arg(long = "delay-between-starts", default_value_t = 0.0)]
    delay_between_starts: f64,

    /// Prefix for output files (<prefix>_<YYYYMMDD_HHMMSS>.json/.csv).
    #[arg(long = "out-prefix", default_value = "local_scan")]
    out_prefix: String,

    /// Allow targets that do not resolve to a loopback address.
    #[arg(long = "allow-remote", default_value_t = false)]
    allow_remote: bool,

    /// Debug-level logging.
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

impl Cli {
    fn port_selection(&self) -> PortSelection {
        if self.use_default_common {
            if self.ports.is_some() || self.ports_file.is_some() {
                tracing::warn!("--use-default-common overrides --ports/--ports-file");
            }
            PortSelection::Defaults
        } else if let Some(spec) = &self.ports {
            PortSelection::Spec(spec.clone())
        } else if let Some(path) = &self.ports_file {
            PortSelection::File(path.clone())
        } else if let Some(n) = self.count {
            PortSelection::FirstN(n)
        } else {
            PortSelection::Defaults
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_cli_logger(cli.verbose);

    // Pre-flight: everything that can abort the run happens before any probe.
    let ports = ports::resolve(&cli.port_selection(), &DefaultPorts::default())
        .context("invalid --ports")?;
    let cfg = ScanConfig::from_secs(
        cli.concurrency,
        cli.timeout,
        cli.delay_between_starts,
        BannerOptions {
            enabled: cli.banner,
            send_probe: cli.send_probe,
        },
    )
    .context("invalid scan settings")?;
    let target = target::resolve_target(&cli.target, cli.allow_remote)
        .await
        .context("target check failed")?;

    let run_at = OffsetDateTime::now_utc();
    println!(
        "Starting scan of {} ports on {} ({}) at {}",
        ports.len(),
        target.input,
        target.addr,
        run_at.format(&Rfc3339).unwrap_or_default()
    );
    println!(
        "Concurrency: {}, timeout: {:.2}s, banner: {}, send_probe: {}, delay_between_starts: {:.3}s",
        cfg.concurrency,
        cfg.timeout.as_secs_f64(),
        cfg.banner.enabled,
        cfg.banner.send_probe,
        cfg.start_delay_step.as_secs_f64()
    );

    let report = scanner::scan_target(&target, &ports, &cfg, |result, done, total| {
        println!("{}", progress_line(result, done, total));
    })
    .await;

    println!("\n{}", Summary::from_report(&report));

    let written = output::write_outputs(&report, &cli.out_prefix, run_at)
        .context("failed to write results")?;
    println!(
        "\nResults written to: {} and {}",
        written.json.display(),
        written.csv.display()
    );

    Ok(())
}
