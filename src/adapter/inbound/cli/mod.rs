//! clap front-end: parses a command and hands it to the controllers.

pub mod cluster;
pub mod command;
pub mod manifest;
pub mod output;
pub mod registry;

use crate::error::Result;
use crate::infrastructure::bootstrap::App;

use command::{ClusterCommand, Commands, RegistryCommand};

/// Run one parsed command against the wired controllers.
pub async fn dispatch(app: &App, command: &Commands) -> Result<()> {
    match command {
        Commands::Cluster(ClusterCommand::Apply(args)) => cluster::apply(&app.clusters, args).await,
        Commands::Cluster(ClusterCommand::Get(args)) => cluster::get(&app.clusters, args).await,
        Commands::Cluster(ClusterCommand::Delete(arg)) => cluster::delete(&app.clusters, &arg.name).await,
        Commands::Registry(RegistryCommand::Apply(args)) => registry::apply(&app.registries, args).await,
        Commands::Registry(RegistryCommand::Get(args)) => registry::get(&app.registries, args).await,
        Commands::Registry(RegistryCommand::Delete(arg)) => {
            registry::delete(&app.registries, &arg.name).await
        }
    }
}
