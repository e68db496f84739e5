//! Table rendering for the read-only container queries.

use stevedore_scheduler::ServiceInformation;
use tabled::{Table, Tabled};

#[derive(Tabled)]
pub struct ContainerRow {
    #[tabled(rename = "Stack")]
    pub stack: String,
    #[tabled(rename = "Node")]
    pub node: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Image")]
    pub image: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Ports")]
    pub ports: String,
}

impl ContainerRow {
    pub fn new(stack: &str, info: &ServiceInformation) -> Self {
        Self {
            stack: stack.to_string(),
            node: info.host.clone(),
            name: info.container_name.clone(),
            image: format!("{}:{}", info.image_name, info.image_tag),
            status: info.status.to_string(),
            ports: format_ports(info),
        }
    }
}

/// `"PUB->INT "` per published pair; an unpublished mapping renders as
/// the internal port alone.
pub fn format_ports(info: &ServiceInformation) -> String {
    let mut records: Vec<_> = info.ports.values().collect();
    records.sort_by_key(|p| p.internal);

    let mut out = String::new();
    for port in records {
        for public in &port.publics {
            if *public == 0 {
                out.push_str(&format!("{} ", port.internal));
            } else {
                out.push_str(&format!("{}->{} ", public, port.internal));
            }
        }
    }
    out
}

pub fn render(rows: Vec<ContainerRow>) -> String {
    Table::new(rows).to_string()
}
