//! Schema Resolver CLI
//!
//! Loads parsed module documents, runs the resolution pipeline and reports
//! on the result.

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use schema_resolver::naming::{full_name, identity_type_name};
use schema_resolver::{
    load_from_directory, Compiler, NodeKind, Policy, ResolvedSchema, ResolverConfig,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-resolve")]
#[command(about = "Resolve cross-module references in parsed schema modules")]
struct Cli {
    /// Directory of parsed module documents (overrides config)
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    /// Config file layered over the default locations
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Abort on the first resolution failure
    #[arg(long, global = true)]
    strict: bool,

    /// Machine-readable output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the module processing order
    Order,

    /// Run the full pipeline and report diagnostics
    Check,

    /// Print every instantiated leaf and leaf-list with its effective type name
    Types,

    /// Print base identities and identity table entries
    Identities,

    /// Resolve a schema path
    Traverse {
        /// Module whose prefixes the path uses
        #[arg(long)]
        from: String,
        /// Absolute or module-relative path
        path: String,
    },
}

#[derive(Serialize)]
struct TypeRow {
    module: String,
    node: String,
    kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct IdentityRow {
    module: String,
    submodule: String,
    identity: String,
    base: String,
    base_type: String,
    namespace: String,
    prefix: String,
}

fn main() {
    let cli = Cli::parse();

    let config = match ResolverConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load configuration: {}", e);
            std::process::exit(2);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli, config) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn run(cli: Cli, mut config: ResolverConfig) -> anyhow::Result<i32> {
    if let Some(input) = &cli.input {
        config.input.dir = input.clone();
    }
    if cli.strict {
        config.resolution.policy = Policy::Strict;
    }

    let dir = config.input_dir();
    let bundle = load_from_directory(&dir, &config.load_config())
        .with_context(|| format!("loading documents from {}", dir.display()))?;
    tracing::info!(bundle_hash = %bundle.bundle_hash, "Input bundle");

    let resolved = Compiler::from_config(&config)
        .compile(bundle.model)
        .context("resolution aborted")?;

    match cli.command {
        Commands::Order => {
            let order = resolved.order_names();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&order)?);
            } else {
                for (i, name) in order.iter().enumerate() {
                    println!("{:>3}. {}", i + 1, name);
                }
            }
            Ok(0)
        }

        Commands::Check => {
            let diagnostics = resolved.diagnostics();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(diagnostics)?);
            } else if diagnostics.is_empty() {
                println!("✅ {} module(s) resolved cleanly", resolved.order().len());
            } else {
                println!("{}", diagnostics.format_all());
            }
            Ok(if resolved.has_errors() { 1 } else { 0 })
        }

        Commands::Types => {
            let rows = type_rows(&resolved);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in &rows {
                    match (&row.type_name, &row.error) {
                        (Some(name), _) => println!("{}  {}  {}", row.module, row.node, name),
                        (_, Some(err)) => println!("{}  {}  ❌ {}", row.module, row.node, err),
                        _ => {}
                    }
                }
            }
            Ok(if rows.iter().any(|r| r.error.is_some()) { 1 } else { 0 })
        }

        Commands::Identities => {
            let model = resolved.model();
            if !cli.json {
                for module in resolved.order() {
                    for (name, root) in resolved.base_identities(*module) {
                        let type_name =
                            identity_type_name(model, resolved.context().registry(), *root)?;
                        println!("{}  base {}  -> {}", model.module(*module).name, name, type_name);
                    }
                }
            }
            let rows = identity_rows(&resolved);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in &rows {
                    println!(
                        "{}/{}  {} in {} ({} {})",
                        row.module,
                        row.submodule,
                        row.identity,
                        row.base_type,
                        row.prefix,
                        row.namespace
                    );
                }
            }
            Ok(0)
        }

        Commands::Traverse { from, path } => {
            let module = resolved
                .module(&from)
                .ok_or_else(|| anyhow!("module {} is not part of the batch", from))?;
            let node = resolved.traverse_from_module(module, &path, false)?;
            let model = resolved.model();
            let owner = model.module(model.module_of(node));
            if cli.json {
                let value = serde_json::json!({
                    "node": model.describe(node),
                    "module": owner.name,
                    "full_name": full_name(model, node),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{} ({}:{})", model.describe(node), owner.name, full_name(model, node));
            }
            Ok(0)
        }
    }
}

fn type_rows(resolved: &ResolvedSchema) -> Vec<TypeRow> {
    let model = resolved.model();
    model
        .nodes()
        .filter(|(id, node)| node.kind().is_leaf_like() && resolved.is_instantiated(*id))
        .map(|(id, node)| {
            let result = resolved.effective_type_name(id);
            TypeRow {
                module: model.module(model.module_of(id)).name.clone(),
                node: full_name(model, id),
                kind: node.kind(),
                type_name: result.as_ref().ok().cloned(),
                error: result.err().map(|e| e.to_string()),
            }
        })
        .collect()
}

fn identity_rows(resolved: &ResolvedSchema) -> Vec<IdentityRow> {
    let model = resolved.model();
    let mut rows = Vec::new();
    for module in resolved.order() {
        for sm in &model.module(*module).submodules {
            for entry in resolved.identity_entries(*sm) {
                rows.push(IdentityRow {
                    module: model.module(*module).name.clone(),
                    submodule: model.submodule(*sm).name.clone(),
                    identity: entry.identity.clone(),
                    base: model.node(entry.base).name.clone(),
                    base_type: entry.base_type.clone(),
                    namespace: entry.namespace.clone(),
                    prefix: entry.prefix.clone(),
                });
            }
        }
    }
    rows
}
