//! The `filter` subcommand — containers carrying this orchestrator's
//! image labels.

use clap::Args;
use stevedore_cluster::FleetCoordinator;

use crate::table::{self, ContainerRow};

#[derive(Args)]
pub struct FilterArgs {
    /// Image name label to match
    #[arg(long, default_value = ".*")]
    pub image: String,

    /// Image tag label to match
    #[arg(long, default_value = ".*")]
    pub tag: String,
}

pub async fn run(fleet: &FleetCoordinator, args: FilterArgs) -> anyhow::Result<()> {
    let stacks = fleet.tagged_containers(&args.image, &args.tag).await?;

    let mut rows = Vec::new();
    for (stack, containers) in &stacks {
        for info in containers {
            rows.push(ContainerRow::new(stack, info));
        }
    }

    println!("{}", table::render(rows));
    Ok(())
}
