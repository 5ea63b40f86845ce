//! `ring-inspect` subcommands.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Subcommand;
use corelib::locator::{LocatorBuilder, NodeLocator};
use corelib::node::{Node, ReplicaAddress, SimpleNode};
use corelib::{LocatorConfig, LocatorRegistry, RegistryHandle};
use replication::{ReplicaKetamaNodeLocator, ReplicaPick};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Primary node, and optionally the failover sequence, for a key.
    Route {
        /// Comma-separated node addresses.
        #[arg(long, value_delimiter = ',', required = true)]
        nodes: Vec<String>,
        #[arg(long)]
        key: String,
        /// Also print the failover sequence.
        #[arg(long)]
        sequence: bool,
        /// Route with the array-modulus locator instead of Ketama.
        #[arg(long)]
        array_mod: bool,
    },
    /// Key counts per node for a batch of generated keys.
    Distribution {
        #[arg(long, value_delimiter = ',', required = true)]
        nodes: Vec<String>,
        #[arg(long, default_value_t = 10_000)]
        keys: usize,
    },
    /// Replica chosen for a key under a pick policy.
    Replica {
        /// Replica addresses, `group^M|S^host:port`.
        #[arg(long, value_delimiter = ',', required = true)]
        nodes: Vec<String>,
        #[arg(long)]
        key: String,
        #[arg(long, default_value = "master")]
        pick: ReplicaPick,
    },
    /// Registry stats of a locator built from the nodes.
    Stats {
        #[arg(long, value_delimiter = ',', required = true)]
        nodes: Vec<String>,
    },
}

/// Lines printed by a command.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub lines: Vec<String>,
}

impl CommandResult {
    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}

fn parse_nodes(addresses: &[String]) -> Result<Vec<Arc<SimpleNode>>> {
    let nodes = addresses
        .iter()
        .map(|a| SimpleNode::from_address(a.trim()))
        .collect::<corelib::Result<Vec<_>>>()?;
    Ok(nodes)
}

fn is_replica_list(addresses: &[String]) -> bool {
    !addresses.is_empty() && addresses.iter().all(|a| ReplicaAddress::is_replica_form(a))
}

fn replica_locator(addresses: &[String], config: &LocatorConfig) -> Result<ReplicaKetamaNodeLocator<SimpleNode>> {
    if !is_replica_list(addresses) {
        bail!("replica locators need group^M|S^host:port addresses");
    }
    Ok(ReplicaKetamaNodeLocator::from_config(parse_nodes(addresses)?, config)?)
}

impl Command {
    pub fn execute(&self, config: &LocatorConfig) -> Result<CommandResult> {
        match self {
            Command::Route {
                nodes,
                key,
                sequence,
                array_mod,
            } => route(nodes, key, *sequence, *array_mod, config),
            Command::Distribution { nodes, keys } => distribution(nodes, *keys, config),
            Command::Replica { nodes, key, pick } => replica(nodes, key, *pick, config),
            Command::Stats { nodes } => stats(nodes, config),
        }
    }
}

fn route(
    addresses: &[String],
    key: &str,
    sequence: bool,
    array_mod: bool,
    config: &LocatorConfig,
) -> Result<CommandResult> {
    let builder = LocatorBuilder::from_config(config.clone()).add_nodes(parse_nodes(addresses)?);
    let mut result = CommandResult::default();
    if array_mod {
        let locator = builder.build_array_mod()?;
        describe_route(&locator, key, sequence, &mut result)?;
    } else {
        let locator = builder.build()?;
        describe_route(&locator, key, sequence, &mut result)?;
    }
    Ok(result)
}

fn describe_route<L: NodeLocator<SimpleNode>>(
    locator: &L,
    key: &str,
    sequence: bool,
    result: &mut CommandResult,
) -> Result<()> {
    result.push(format!("primary: {}", locator.primary(key)?.name()));
    if sequence {
        for (i, node) in locator.sequence(key).enumerate() {
            result.push(format!("  {}: {}", i + 1, node.name()));
        }
    }
    Ok(())
}

fn distribution(addresses: &[String], keys: usize, config: &LocatorConfig) -> Result<CommandResult> {
    let locator = LocatorBuilder::from_config(config.clone())
        .add_nodes(parse_nodes(addresses)?)
        .build()?;
    let mut counts: BTreeMap<String, usize> = locator
        .all_nodes()
        .iter()
        .map(|n| (n.name().to_string(), 0))
        .collect();
    for i in 0..keys {
        let node = locator.primary(&format!("key-{}", i))?;
        *counts.entry(node.name().to_string()).or_default() += 1;
    }
    let mut result = CommandResult::default();
    for (name, count) in &counts {
        let share = if keys == 0 { 0.0 } else { *count as f64 * 100.0 / keys as f64 };
        result.push(format!("{:<24} {:>8} {:>6.2}%", name, count, share));
    }
    Ok(result)
}

fn replica(addresses: &[String], key: &str, pick: ReplicaPick, config: &LocatorConfig) -> Result<CommandResult> {
    let locator = replica_locator(addresses, config)?;
    let group = locator.group_for_key(key)?;
    let node = locator.primary_with(key, pick)?;
    let mut result = CommandResult::default();
    result.push(format!("group: {}", group.name()));
    if let Some(master) = group.master() {
        result.push(format!("master: {}", master.name()));
    }
    for slave in group.slaves() {
        result.push(format!("slave: {}", slave.name()));
    }
    result.push(format!("{} pick: {}", pick, node.name()));
    Ok(result)
}

fn stats(addresses: &[String], config: &LocatorConfig) -> Result<CommandResult> {
    let registry = LocatorRegistry::new();
    let report = if is_replica_list(addresses) {
        let _locator = replica_locator(addresses, config)?
            .with_registry(RegistryHandle::new(registry.clone(), "replica"));
        serde_json::to_string_pretty(&registry.to_json())?
    } else {
        let _locator = LocatorBuilder::from_config(config.clone())
            .with_registry(registry.clone(), "ketama")
            .add_nodes(parse_nodes(addresses)?)
            .build()?;
        serde_json::to_string_pretty(&registry.to_json())?
    };
    Ok(CommandResult { lines: vec![report] })
}
