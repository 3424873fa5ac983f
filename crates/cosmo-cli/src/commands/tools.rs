//! `cosmo tools`: print the tool catalog offline.

use anyhow::Result;
use cosmo_mcp::catalog;

pub fn list(verbose: bool) -> Result<()> {
    let registry = catalog::registry();

    println!("\n🔧 Available Tools ({}):", registry.len());
    for tool in registry.list() {
        let writes = tool
            .annotations
            .as_ref()
            .and_then(|a| a.destructive)
            .unwrap_or(false);
        let marker = if writes { " [write]" } else { "" };
        println!("   • {}{}", tool.name, marker);
        if let Some(description) = &tool.description {
            println!("     {}", description);
        }
        if verbose {
            let schema = serde_json::to_string_pretty(&tool.input_schema)?;
            for line in schema.lines() {
                println!("       {}", line);
            }
        }
    }
    Ok(())
}
