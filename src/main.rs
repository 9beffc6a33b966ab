use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use compendium::choice::ChoiceModel;
use compendium::filter::{unique_keys, Filter};
use compendium::settings::Settings;
use compendium::{CompendiumError, Result};
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage:
  compendium [--config <file>] filter <records.json> <filter.json>
  compendium [--config <file>] choices <choice.json>";

fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .map_err(|e| CompendiumError::Document(format!("{}: {e}", path.display())))?;
    Ok(serde_json::from_str(&text)?)
}

fn filter_command(settings: &Settings, records: &Path, filter: &Path) -> Result<()> {
    let records = match read_json(records)? {
        Value::Array(records) => records,
        other => vec![other],
    };
    let filter = Filter::parse(&read_json(filter)?)?;
    let filters = [filter];
    let keys: Vec<String> = unique_keys(&filters).into_iter().collect();
    info!(keys = ?keys, candidates = records.len(), locale = %settings.locale, "filtering");

    for record in settings.engine().filter_records(&records, &filters) {
        println!("{record}");
    }
    Ok(())
}

fn choices_command(path: &Path) -> Result<()> {
    let model = ChoiceModel::from_value(read_json(path)?)?;
    model.validate()?;
    info!(options = model.options.len(), "choice structure is valid");
    println!("{}", model.text_display());
    Ok(())
}

fn main() -> ExitCode {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = PathBuf::from(args.remove(i + 1));
            args.remove(i);
            Some(path)
        }
        _ => None,
    };

    let settings = match Settings::load(config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&settings.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let outcome = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["filter", records, filter] => filter_command(&settings, Path::new(records), Path::new(filter)),
        ["choices", choice] => choices_command(Path::new(choice)),
        _ => {
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(%e, "command failed");
            ExitCode::FAILURE
        }
    }
}
