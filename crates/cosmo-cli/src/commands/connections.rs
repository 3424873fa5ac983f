//! `cosmo connections`: inspect the configured connections.
//!
//! `list` prints what was loaded without touching the network; `test`
//! connects each connection once and reports the outcome. Connection strings
//! are never printed.

use super::{build_guard, build_registry, load_connections};
use anyhow::Result;
use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum ConnectionsCommand {
    /// List configured connections and their write policy.
    List,

    /// Connect to each configured connection and report the result.
    Test {
        /// Only test this connection.
        #[arg(long)]
        id: Option<String>,
    },
}

pub async fn execute(cmd: ConnectionsCommand) -> Result<()> {
    match cmd {
        ConnectionsCommand::List => list(),
        ConnectionsCommand::Test { id } => test(id).await,
    }
}

fn list() -> Result<()> {
    let loaded = load_connections()?;
    let source = loaded.source.clone();
    let registry = build_registry(loaded);
    let guard = build_guard(&registry);
    let summaries = registry.summaries(&guard);

    println!("\n🔌 Connections ({}), from {}:", summaries.len(), source);
    if summaries.is_empty() {
        println!("   (none)");
        return Ok(());
    }

    for summary in summaries {
        let marker = if summary.is_default { " (default)" } else { "" };
        let writes = if summary.allow_modifications {
            "read-write"
        } else {
            "read-only"
        };
        println!(
            "   • {}{}  database={}  {}",
            summary.id, marker, summary.database_id, writes
        );
        if let Some(description) = &summary.description {
            println!("     {}", description);
        }
    }
    Ok(())
}

async fn test(only: Option<String>) -> Result<()> {
    let registry = build_registry(load_connections()?);

    let ids = match only {
        Some(id) => {
            // Fails with the usual not-found message for unknown ids.
            registry.config(&id)?;
            vec![id]
        }
        None => registry.registered_ids(),
    };

    println!("\n🧪 Testing {} connection(s):", ids.len());
    let mut failed = 0;
    for id in &ids {
        match registry.connect(id).await {
            Ok(()) => println!("   ✓ {}", id),
            Err(e) => {
                failed += 1;
                println!("   ✗ {}: {}", id, e);
            }
        }
    }
    registry.close_all().await;

    if failed > 0 {
        anyhow::bail!("{} of {} connection(s) failed", failed, ids.len());
    }
    println!("\n✅ All connections reachable");
    Ok(())
}
