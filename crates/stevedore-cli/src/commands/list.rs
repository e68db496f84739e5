//! The `list` subcommand.

use clap::Args;
use stevedore_cluster::FleetCoordinator;
use stevedore_scheduler::ContainerFilter;

use crate::table::{self, ContainerRow};

#[derive(Args)]
pub struct ListArgs {
    /// Regex filtering containers by image name
    #[arg(long = "image-filter", default_value = ".*")]
    pub image_filter: String,

    /// Regex filtering containers by image tag
    #[arg(long = "tag-filter", default_value = ".*")]
    pub tag_filter: String,

    /// Regex filtering containers by container name
    #[arg(long = "cname-filter", default_value = ".*")]
    pub cname_filter: String,

    /// Container states to include (repeatable)
    #[arg(
        long = "status-filter",
        default_values_t = [
            "restarting".to_string(),
            "running".to_string(),
            "paused".to_string(),
            "exited".to_string(),
        ],
    )]
    pub status_filter: Vec<String>,
}

pub async fn run(fleet: &FleetCoordinator, args: ListArgs) -> anyhow::Result<()> {
    let filter = ContainerFilter {
        name_regex: args.cname_filter,
        image_regex: args.image_filter,
        tag_regex: args.tag_filter,
        status: args.status_filter,
    };

    let stacks = fleet.search_containers(&filter).await?;

    let mut rows = Vec::new();
    for (stack, containers) in &stacks {
        for info in containers {
            rows.push(ContainerRow::new(stack, info));
        }
    }

    println!("{}", table::render(rows));
    Ok(())
}
