use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;

use crate::config::load_settings;
use crate::geometry::Size;
use crate::ir::{BoxContainer, ChartSource};
use crate::layout::{Diagram, LayoutState, apply};
use crate::layout_dump::{LayoutDump, write_layout_dump};

#[derive(Parser, Debug)]
#[command(name = "orglay", version, about = "Org-chart layout engine")]
pub struct Args {
    /// Input chart file (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the layout dump. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Layout settings JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,
}

/// The CLI's chart description: a flat item list keyed by string ids.
#[derive(Debug, Deserialize)]
pub struct ChartFile {
    pub items: Vec<ChartItem>,
}

#[derive(Debug, Deserialize)]
pub struct ChartItem {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub assistant: bool,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub layout_strategy: Option<String>,
    #[serde(default)]
    pub assistant_layout_strategy: Option<String>,
}

impl ChartSource for ChartFile {
    fn item_ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }

    fn parent_key_of(&self, id: &str) -> Option<String> {
        self.items
            .iter()
            .find(|item| item.id == id)
            .and_then(|item| item.parent.clone())
    }

    fn is_assistant(&self, id: &str) -> bool {
        self.items
            .iter()
            .find(|item| item.id == id)
            .is_some_and(|item| item.assistant)
    }
}

pub fn run() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let args = Args::parse();
    let settings = load_settings(args.config.as_deref())?;

    let input = read_input(args.input.as_deref())?;
    let chart: ChartFile = serde_json::from_str(&input)?;
    if chart.items.is_empty() {
        return Err(anyhow::anyhow!("no chart items found in input"));
    }

    let container = build_container(&chart);
    let sizes: HashMap<String, Size> = chart
        .items
        .iter()
        .map(|item| (item.id.clone(), Size::new(item.width, item.height)))
        .collect();

    let mut state = LayoutState::new(Diagram {
        boxes: container,
        layout_settings: settings,
    });
    state.size_lookup = Some(Box::new(move |data_id| {
        sizes.get(data_id).copied().unwrap_or_default()
    }));
    apply(&mut state)?;
    tracing::debug!(boxes = chart.items.len(), "layout completed");

    match args.output.as_deref() {
        Some(path) => write_layout_dump(path, &state)?,
        None => {
            let dump = LayoutDump::from_state(&state);
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
    }
    Ok(())
}

fn build_container(chart: &ChartFile) -> BoxContainer {
    let mut container = BoxContainer::from_source(chart);
    for item in &chart.items {
        if let Some(chart_box) = container.find_by_data_id_mut(&item.id) {
            chart_box.is_collapsed = item.collapsed;
            chart_box.layout_strategy_id = item.layout_strategy.clone();
            chart_box.assistant_layout_strategy_id = item.assistant_layout_strategy.clone();
        }
    }
    container
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
