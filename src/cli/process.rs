//! Document file processing command.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use console::style;
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::drivers::DriverRegistry;
use crate::models::DocumentFile;
use crate::services::DriverOutcome;

/// Run configured drivers on a file and print their results.
pub async fn cmd_process(
    config: &Config,
    file: &Path,
    document_type: &str,
    driver: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let processor = config.build_processor(Arc::new(DriverRegistry::with_defaults()))?;

    let document_file = DocumentFile::load(file, document_type)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let outcomes = match driver {
        Some(name) => vec![DriverOutcome {
            driver: name.to_string(),
            result: processor.process_with_driver(name, &document_file).await,
        }],
        None => processor.process_document_file(&document_file).await,
    };

    if outcomes.is_empty() {
        eprintln!(
            "{} No enabled drivers for document type {} apply to {}",
            style("!").yellow(),
            document_type,
            document_file.mime_type
        );
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes_to_json(&outcomes))?);
    } else {
        print_outcomes(&outcomes);
    }

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if failed == outcomes.len() {
        anyhow::bail!("All {} driver(s) failed", failed);
    }
    Ok(())
}

fn outcomes_to_json(outcomes: &[DriverOutcome]) -> Value {
    let mut by_driver = Map::new();
    for outcome in outcomes {
        let value = match outcome.result {
            Ok(ref mapping) => json!(mapping),
            Err(ref e) => json!({ "error": e.to_string() }),
        };
        by_driver.insert(outcome.driver.clone(), value);
    }
    Value::Object(by_driver)
}

fn print_outcomes(outcomes: &[DriverOutcome]) {
    for outcome in outcomes {
        match outcome.result {
            Ok(ref mapping) => {
                for (key, value) in mapping.namespaced(&outcome.driver) {
                    match value {
                        Value::String(s) => println!("{} = {}", key, s),
                        other => println!("{} = {}", key, other),
                    }
                }
            }
            Err(ref e) => eprintln!("{} {}", style("✗").red(), e),
        }
    }
}
