//! Catalog query command.

use anyhow::{anyhow, Result};
use clap::Args;

use crate::cli::output::{print_json, table_with_header, truncate};
use crate::domain::models::technique::{AttackDomain, Goal, Surface, Technique, ToolSupport};
use crate::domain::models::TechniqueCatalog;

#[derive(Args, Debug)]
pub struct TechniquesArgs {
    /// Filter by domain (llm, agent, aml)
    #[arg(long)]
    pub domain: Option<String>,

    /// Filter by surface (model, data, retrieval, tool)
    #[arg(long)]
    pub surface: Option<String>,

    /// Filter by goal (jailbreak, extraction, ...)
    #[arg(long)]
    pub goal: Option<String>,

    /// Filter by supporting tool (garak, promptfoo, pyrit, manual)
    #[arg(long)]
    pub tool: Option<String>,

    /// Show a single technique by id
    #[arg(long)]
    pub id: Option<String>,
}

pub fn handle_techniques(
    catalog: &TechniqueCatalog,
    args: &TechniquesArgs,
    json: bool,
) -> Result<()> {
    if let Some(id) = &args.id {
        let technique = catalog
            .by_id(id)
            .ok_or_else(|| anyhow!("technique not found: {id}"))?;
        if json {
            print_json(technique)?;
        } else {
            print_detail(technique);
        }
        return Ok(());
    }

    let mut techniques: Vec<&Technique> = catalog.all().iter().collect();

    if let Some(raw) = &args.domain {
        let domain: AttackDomain = raw.parse().map_err(|e: String| anyhow!(e))?;
        techniques.retain(|t| t.domain == domain);
    }
    if let Some(raw) = &args.surface {
        let surface: Surface = raw.parse().map_err(|e: String| anyhow!(e))?;
        techniques.retain(|t| t.surface == surface);
    }
    if let Some(raw) = &args.goal {
        let goal: Goal = raw.parse().map_err(|e: String| anyhow!(e))?;
        techniques.retain(|t| t.goals.contains(&goal));
    }
    if let Some(raw) = &args.tool {
        let tool = parse_tool(raw)?;
        techniques.retain(|t| t.tools.contains(&tool));
    }

    if json {
        print_json(&techniques)?;
    } else {
        let mut table = table_with_header(&["id", "name", "domain", "family", "cost", "signal"]);
        for technique in &techniques {
            table.add_row(vec![
                technique.id.clone(),
                truncate(&technique.name, 32),
                technique.domain.to_string(),
                technique.family.clone(),
                technique.cost.to_string(),
                format!("{:.2}", technique.signal_value),
            ]);
        }
        println!("{table}");
        println!("{} technique(s)", techniques.len());
    }
    Ok(())
}

fn parse_tool(raw: &str) -> Result<ToolSupport> {
    match raw {
        "garak" => Ok(ToolSupport::Garak),
        "promptfoo" => Ok(ToolSupport::Promptfoo),
        "pyrit" => Ok(ToolSupport::Pyrit),
        "manual" => Ok(ToolSupport::Manual),
        other => Err(anyhow!("unknown tool: {other}")),
    }
}

fn print_detail(technique: &Technique) {
    println!("{}  {}", technique.id, technique.name);
    println!("  domain: {}  surface: {}", technique.domain, technique.surface);
    println!("  family: {}", technique.family);
    println!("  min access: {}", technique.min_access);
    println!(
        "  goals: {}",
        technique
            .goals
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  cost: {}  stealth: {}  signal: {:.2}  detection risk: {:.2}",
        technique.cost, technique.stealth, technique.signal_value, technique.detection_risk
    );
    if !technique.atlas_refs.is_empty() {
        println!("  atlas: {}", technique.atlas_refs.join(", "));
    }
    if !technique.prerequisites.is_empty() {
        println!("  prerequisites: {}", technique.prerequisites.join(", "));
    }
}
