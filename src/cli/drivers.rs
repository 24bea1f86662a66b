//! Driver listing command.

use console::style;

use crate::config::Config;
use crate::drivers::DriverRegistry;

/// List registered drivers and the document types that use them.
pub fn cmd_drivers(config: &Config) -> anyhow::Result<()> {
    let registry = DriverRegistry::with_defaults();

    println!("\n{}", style("Registered Drivers").bold());
    println!("{}", "-".repeat(50));

    for descriptor in registry.descriptors() {
        let status = if descriptor.enabled {
            style("enabled by default").green()
        } else {
            style("disabled by default").yellow()
        };
        println!(
            "\n  {} ({})",
            style(descriptor.internal_name).cyan(),
            status
        );
        println!("    {}", descriptor.label);
        println!("    {}", style(descriptor.description).dim());
        println!("    MIME types: {}", descriptor.mime_types.join(", "));
        println!("    Arguments:  {}", descriptor.argument_names.join(", "));

        let used_by: Vec<&str> = config
            .document_types
            .iter()
            .filter(|(_, entries)| {
                entries
                    .iter()
                    .any(|entry| entry.driver == descriptor.internal_name)
            })
            .map(|(document_type, _)| document_type.as_str())
            .collect();
        if !used_by.is_empty() {
            println!("    Used by:    {}", used_by.join(", "));
        }
    }
    println!();

    Ok(())
}
