//! Command-line interface definitions.
//!
//! `devcluster cluster|registry apply|get|delete`. Resources are declared
//! either in a YAML file (`-f`) or with a handful of flags.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::Product;

/// Declarative local Kubernetes clusters and registries
#[derive(Parser, Debug)]
#[command(name = "devcluster")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Color output mode [auto, always, never]
    #[arg(
        long,
        global = true,
        default_value = "auto",
        hide_possible_values = true
    )]
    pub color: ColorChoice,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Color output mode for terminal rendering.
#[derive(Clone, Debug, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect automatically
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage local Kubernetes clusters
    #[command(subcommand)]
    Cluster(ClusterCommand),

    /// Manage local container registries
    #[command(subcommand)]
    Registry(RegistryCommand),
}

#[derive(Subcommand, Debug)]
pub enum ClusterCommand {
    /// Create or update a cluster to match the declaration
    Apply(ClusterApplyArgs),
    /// Show one cluster, or every cluster in the kubeconfig
    Get(GetArgs),
    /// Delete a cluster and its kubeconfig context
    Delete(NameArg),
}

#[derive(Subcommand, Debug)]
pub enum RegistryCommand {
    /// Create or update a registry to match the declaration
    Apply(RegistryApplyArgs),
    /// Show one registry, or every registry container
    Get(GetArgs),
    /// Delete a registry container
    Delete(NameArg),
}

/// Arguments for `cluster apply`.
#[derive(Args, Debug)]
pub struct ClusterApplyArgs {
    /// YAML file with one or more cluster declarations (`-` for stdin)
    #[arg(short = 'f', long = "filename", conflicts_with_all = ["product", "name"])]
    pub file: Option<PathBuf>,

    /// Backend product [docker-desktop, kind, k3d, minikube]
    #[arg(long, value_parser = parse_product)]
    pub product: Option<Product>,

    /// Cluster (kubeconfig context) name
    #[arg(long)]
    pub name: Option<String>,

    /// Minimum CPUs the engine must give the cluster
    #[arg(long)]
    pub min_cpus: Option<u32>,

    /// Kubernetes version, e.g. v1.29.2
    #[arg(long)]
    pub kubernetes_version: Option<String>,

    /// Registry to create and attach
    #[arg(long)]
    pub registry: Option<String>,
}

/// Arguments for `registry apply`.
#[derive(Args, Debug)]
pub struct RegistryApplyArgs {
    /// YAML file with one or more registry declarations (`-` for stdin)
    #[arg(short = 'f', long = "filename", conflicts_with = "name")]
    pub file: Option<PathBuf>,

    /// Registry container name
    #[arg(long)]
    pub name: Option<String>,

    /// Host port to publish the registry on
    #[arg(long)]
    pub port: Option<u16>,

    /// Host address to bind the registry port to
    #[arg(long)]
    pub listen_address: Option<String>,

    /// Registry image
    #[arg(long)]
    pub image: Option<String>,
}

/// Arguments shared by the `get` subcommands.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Name of a single resource
    pub name: Option<String>,

    /// Filter by fields, e.g. `product=kind,name!=kind-ci`
    #[arg(long, conflicts_with = "name")]
    pub field_selector: Option<String>,
}

#[derive(Args, Debug)]
pub struct NameArg {
    pub name: String,
}

fn parse_product(raw: &str) -> Result<Product, String> {
    raw.parse::<Product>().map_err(|e| e.to_string())
}
