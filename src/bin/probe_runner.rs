use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use local_port_prober::latest::{fetch_results, RunnerConfig};
use local_port_prober::logging;

/// Run the prober under a deadline and print its results as JSON, falling
/// back to the newest output file if the run times out or fails.
#[derive(Debug, Parser)]
#[command(name = "probe-runner", version, about, long_about = None)]
struct Cli {
    /// Number passed through to the prober as its positional COUNT argument.
    #[arg(default_value_t = 100)]
    count: u32,

    /// Prober executable.
    #[arg(long, default_value = "local-port-prober")]
    prober: PathBuf,

    /// Directory the prober writes into.
    #[arg(long = "output-dir", default_value = "generated_payloads")]
    output_dir: PathBuf,

    /// File name prefix inside the output directory.
    #[arg(long, default_value = "port_probe")]
    prefix: String,

    /// Seconds to wait for the prober before killing it.
    #[arg(long = "wait-secs", default_value_t = 200)]
    wait_secs: u64,

    /// Reuse or fall back to outputs younger than this many seconds.
    #[arg(long = "max-age-secs")]
    max_age_secs: Option<u64>,

    /// Extra arguments forwarded to the prober (after `--`).
    #[arg(last = true)]
    extra: Vec<OsString>,

    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_cli_logger(cli.verbose);

    let mut args: Vec<OsString> = vec![
        cli.count.to_string().into(),
        "--out-prefix".into(),
        cli.output_dir.join(&cli.prefix).into_os_string(),
    ];
    args.extend(cli.extra.iter().cloned());

    let cfg = RunnerConfig {
        program: cli.prober,
        args,
        output_dir: cli.output_dir,
        wait: Duration::from_secs(cli.wait_secs),
        max_age: cli.max_age_secs.map(Duration::from_secs),
    };

    let outcome = fetch_results(&cfg).await.context("no scan results available")?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
