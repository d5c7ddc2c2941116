use anyhow::{Context, Result, bail};
use log::{debug, error, info};
use row_registry::{Config, Session, export};
use std::{env, path::PathBuf, process::ExitCode};

fn main() -> ExitCode {
    // Initialize logger - defaults to RUST_LOG if set, otherwise INFO
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error: {e}");
            for cause in e.chain().skip(1) {
                error!("  caused by: {cause}");
            }
            if e.chain().any(|c| c.is::<std::io::Error>()) {
                error!("Hint: Check the script path or set ROW_REGISTRY_OUTPUT_DIR.");
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let Some(script) = env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: row_registry <session.csv>");
    };

    let config = Config::from_env()?;
    info!("Reserved row id threshold: {}", config.reserved_threshold);
    match &config.output_dir {
        Some(dir) => info!("Output directory: {}", dir.display()),
        None => info!("Output directory: (current working directory)"),
    }

    let mut session = Session::new(config.reserved_threshold)?;
    let applied = session
        .replay_csv(&script)
        .with_context(|| format!("Failed to replay {}", script.display()))?;
    debug!("Applied {applied} operations from {}", script.display());

    let registry = session.registry();
    for parent in registry.parents() {
        let rows = registry.children_of(parent);
        info!("Parent {parent}: {} rows", rows.len());
        for address in rows {
            debug!("  {address}");
        }
    }
    info!("Next row id: {}", registry.peek_row_id());

    let layout = export::export_layout_to_csv_with_path(registry, config.output_dir.as_deref())?;
    info!("Row layout saved to: {}", layout.display());

    let totals = session.totals();
    if totals.is_empty() {
        info!("No scores recorded.");
        return Ok(());
    }

    let path = export::export_totals_to_csv_with_path(&totals, config.output_dir.as_deref())?;
    info!("Section totals saved to: {}", path.display());
    info!("Grand total: {}", totals.grand_total());

    Ok(())
}
