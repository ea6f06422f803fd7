use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use std::path::PathBuf;
use std::process;

use lanscout::{
    config::{ConfigOverrides, ScanConfig, ScanProfile, DEFAULT_REPORT_PATH},
    discovery::DiscoveryRunner,
    output::{format_summary, ReportWriter},
};

fn print_banner(profile: ScanProfile) {
    println!("{}", "=".repeat(60).bright_blue());
    println!("{}", "lanscout - network device discovery".bright_white().bold());
    println!("{}", "=".repeat(60).bright_blue());
    let mode = match profile {
        ScanProfile::Quick => "quick (common static ranges, printers and database)",
        ScanProfile::Full => "full (all hosts, all device classes)",
    };
    println!("Mode: {}", mode.bright_cyan());
    println!();
}

fn build_cli() -> Command {
    Command::new("lanscout")
        .version(env!("CARGO_PKG_VERSION"))
        .about(
            "Finds Zebra label printers, SQL Server instances and HTTP services on the local /24",
        )
        .arg(
            Arg::new("quick")
                .short('q')
                .long("quick")
                .help("Quick scan: common static-IP ranges, printers and database only")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("full")
                .short('f')
                .long("full")
                .help("Full scan: every host in the /24, all device classes (default)")
                .conflicts_with("quick")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Report path (default: logs/discovered_devices.json)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML file with port, timeout and concurrency overrides")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("no-banner")
                .long("no-banner")
                .help("Hide the banner")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue),
        )
}

async fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let profile = if matches.get_flag("quick") {
        ScanProfile::Quick
    } else {
        ScanProfile::Full
    };

    let overrides = match matches.get_one::<PathBuf>("config") {
        Some(path) => ConfigOverrides::from_toml_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConfigOverrides::default(),
    };

    let config = overrides.apply_to_config(ScanConfig::for_profile(profile));
    config.validate().context("Invalid configuration")?;

    let output = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .or_else(|| overrides.output.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_PATH));

    let colored_output = !matches.get_flag("no-color");
    if !colored_output {
        colored::control::set_override(false);
    }

    if !matches.get_flag("no-banner") {
        print_banner(profile);
    }

    let runner = DiscoveryRunner::new(config)?;
    let (report, stats) = runner.run().await?;

    if let Err(e) = ReportWriter::new(&output).write(&report) {
        log::error!("Failed to save results: {}", e);
        let context = format!("Failed to save results to {}", output.display());
        return Err(anyhow::Error::new(e).context(context));
    }

    println!();
    print!("{}", format_summary(&report, colored_output));
    println!();
    println!(
        "{} {} probes in {:.1}s ({:.0} probes/s), results saved to {}",
        "[✓]".bright_green(),
        stats.probes,
        stats.duration.as_secs_f64(),
        stats.scan_rate(),
        output.display().to_string().bright_white()
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = build_cli().get_matches();

    if let Err(e) = run(&matches).await {
        eprintln!("{} {:#}", "[!] ERROR:".bright_red(), e);
        process::exit(1);
    }
}
