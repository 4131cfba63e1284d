use std::path::Path;

use anyhow::{bail, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};

use crate::workflow_manifest::WorkflowManifest;

pub fn list(manifest_path: Option<&Path>) -> Result<()> {
    let manifest = WorkflowManifest::load(manifest_path)?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(
        ["Name", "Event Types", "Priority", "Timeout"]
            .iter()
            .map(|header| Cell::new(header).fg(Color::Cyan)),
    );

    for workflow in &manifest.workflows {
        table.add_row(vec![
            workflow.name.clone(),
            workflow.event_types.join(", "),
            workflow.priority.to_string(),
            workflow
                .timeout_secs
                .map(|secs| format!("{secs}s"))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!("{table}");
    Ok(())
}

pub fn describe(name: &str, manifest_path: Option<&Path>) -> Result<()> {
    let manifest = WorkflowManifest::load(manifest_path)?;
    let Some(workflow) = manifest.find(name) else {
        bail!("no workflow named '{name}' in the manifest");
    };

    println!("name:        {}", workflow.name);
    println!("description: {}", workflow.description);
    println!("eventTypes:  {}", workflow.event_types.join(", "));
    println!("priority:    {}", workflow.priority);
    println!(
        "timeout:     {}",
        workflow
            .timeout_secs
            .map(|secs| format!("{secs}s"))
            .unwrap_or_else(|| "none".to_string())
    );
    Ok(())
}
