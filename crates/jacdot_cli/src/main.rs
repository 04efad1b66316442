mod output;
mod settings;

use anyhow::{bail, Context, Result};
use jacdot_core::verify::{verify_all, CheckSettings};
use jacdot_core::{derive, Printer};
use output::{format_report, Report};
use settings::Settings;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let settings = Settings::load()?;
    init_logging(&settings);
    info!(
        language = ?settings.language,
        cse = settings.cse,
        verify = settings.verify,
        "starting derivation"
    );

    let derivation = derive();
    let printer = Printer::new(settings.language);
    let rendered = derivation
        .render(&printer, settings.cse)
        .context("rendering derived expressions")?;

    let checks = if settings.verify {
        Some(verify_all(&derivation, &CheckSettings::default())?)
    } else {
        None
    };

    let report = Report {
        expressions: &rendered,
        checks: checks.as_deref(),
    };
    println!("{}", format_report(&report, &printer, settings.format)?);

    if let Some(checks) = &checks {
        let failed: Vec<&str> = checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.as_str())
            .collect();
        if !failed.is_empty() {
            bail!("Numeric checks failed: {}", failed.join(", "));
        }
    }
    Ok(())
}
