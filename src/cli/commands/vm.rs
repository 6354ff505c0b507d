//! Resource listing

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::output::{self, OutputFormat};
use crate::cli::Context;
use crate::types::Resource;

#[derive(Debug, Serialize, Tabled)]
struct VmRow {
    #[tabled(rename = "VMID")]
    vmid: u32,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    #[serde(skip)]
    status_display: String,
    #[tabled(skip)]
    status: String,
    #[tabled(rename = "Node")]
    node: String,
}

impl From<Resource> for VmRow {
    fn from(r: Resource) -> Self {
        Self {
            vmid: r.id.get(),
            name: if r.name.is_empty() { "-".to_string() } else { r.name },
            status_display: output::status_indicator(&r.status),
            status: r.status,
            node: r.node,
        }
    }
}

pub async fn execute(ctx: &Context) -> Result<()> {
    let resources = ctx.default_runner().gateway().list_resources().await?;
    let rows: Vec<VmRow> = resources.into_iter().map(Into::into).collect();
    if ctx.format == OutputFormat::Table && !rows.is_empty() {
        output::print_header(&format!("Virtual machines ({})", rows.len()));
    }
    output::print_output(&rows, ctx.format)
}
