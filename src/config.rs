use std::collections::BTreeMap;
use std::path::Path;

use crate::layout::{LayoutStrategy, ParentAlignment};

/// Diagram-wide layout configuration: the strategy registry plus global
/// spacing knobs. Immutable during a layout run.
#[derive(Debug, Clone)]
pub struct DiagramLayoutSettings {
    pub layout_strategies: BTreeMap<String, LayoutStrategy>,
    pub default_layout_strategy_id: String,
    pub default_assistant_layout_strategy_id: String,
    /// Horizontal clearance enforced between packed sibling branches.
    pub branch_spacing: f64,
    /// Vertical clearance applied around every rect merged into a boundary.
    pub box_vertical_margin: f64,
}

impl Default for DiagramLayoutSettings {
    fn default() -> Self {
        let mut layout_strategies = BTreeMap::new();
        layout_strategies.insert(
            "linear".to_string(),
            LayoutStrategy::linear(ParentAlignment::Center),
        );
        layout_strategies.insert(
            "single-column".to_string(),
            LayoutStrategy::single_column(ParentAlignment::Left),
        );
        layout_strategies.insert("fishbone".to_string(), LayoutStrategy::fishbone(2));
        layout_strategies.insert("assistants".to_string(), LayoutStrategy::assistants());
        Self {
            layout_strategies,
            default_layout_strategy_id: "linear".to_string(),
            default_assistant_layout_strategy_id: "assistants".to_string(),
            branch_spacing: 30.0,
            box_vertical_margin: 0.0,
        }
    }
}

/// Loads settings from a JSON file, overlaying only the keys the file
/// provides on top of the built-in defaults.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<DiagramLayoutSettings> {
    let mut settings = DiagramLayoutSettings::default();
    let Some(path) = path else {
        return Ok(settings);
    };
    let text = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    if let Some(strategies) = value.get("layout_strategies") {
        let parsed: BTreeMap<String, LayoutStrategy> =
            serde_json::from_value(strategies.clone())?;
        settings.layout_strategies.extend(parsed);
    }
    if let Some(id) = value
        .get("default_layout_strategy_id")
        .and_then(|v| v.as_str())
    {
        settings.default_layout_strategy_id = id.to_string();
    }
    if let Some(id) = value
        .get("default_assistant_layout_strategy_id")
        .and_then(|v| v.as_str())
    {
        settings.default_assistant_layout_strategy_id = id.to_string();
    }
    if let Some(spacing) = value.get("branch_spacing").and_then(|v| v.as_f64()) {
        settings.branch_spacing = spacing;
    }
    if let Some(margin) = value.get("box_vertical_margin").and_then(|v| v.as_f64()) {
        settings.box_vertical_margin = margin;
    }
    Ok(settings)
}
