use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::layout::state::LayoutState;
use crate::layout::{assistants, fishbone, linear, single_column};
use crate::tree::NodeIndex;

/// How a parent box aligns against its laid-out children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentAlignment {
    Left,
    Center,
    Right,
}

/// Tunables shared by every strategy variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyCore {
    pub parent_child_spacing: f64,
    pub sibling_spacing: f64,
    /// Width of the vertical lane reserved under a parent for its connector.
    pub parent_connector_shield: f64,
    pub child_connector_hook_length: f64,
    pub parent_alignment: ParentAlignment,
}

impl Default for StrategyCore {
    fn default() -> Self {
        Self {
            parent_child_spacing: 20.0,
            sibling_spacing: 10.0,
            parent_connector_shield: 10.0,
            child_connector_hook_length: 5.0,
            parent_alignment: ParentAlignment::Center,
        }
    }
}

impl StrategyCore {
    pub fn with_alignment(parent_alignment: ParentAlignment) -> Self {
        Self {
            parent_alignment,
            ..Self::default()
        }
    }
}

/// The pluggable per-node layout algorithms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LayoutStrategy {
    /// Children stacked vertically beside a single carrier.
    SingleColumn {
        #[serde(default)]
        core: StrategyCore,
    },
    /// Children in one horizontal row under the parent.
    Linear {
        #[serde(default)]
        core: StrategyCore,
    },
    /// Children packed into fishbone groups hanging off a horizontal carrier.
    MultiLineFishbone {
        #[serde(default)]
        core: StrategyCore,
        #[serde(default = "default_max_groups")]
        max_groups: usize,
    },
    /// Single-group fishbone applied to assistants roots.
    FishboneAssistants {
        #[serde(default)]
        core: StrategyCore,
    },
}

fn default_max_groups() -> usize {
    2
}

impl LayoutStrategy {
    pub fn single_column(alignment: ParentAlignment) -> Self {
        Self::SingleColumn {
            core: StrategyCore::with_alignment(alignment),
        }
    }

    pub fn linear(alignment: ParentAlignment) -> Self {
        Self::Linear {
            core: StrategyCore::with_alignment(alignment),
        }
    }

    pub fn fishbone(max_groups: usize) -> Self {
        Self::MultiLineFishbone {
            core: StrategyCore::default(),
            max_groups,
        }
    }

    pub fn assistants() -> Self {
        Self::FishboneAssistants {
            core: StrategyCore::default(),
        }
    }

    pub fn core(&self) -> &StrategyCore {
        match self {
            Self::SingleColumn { core }
            | Self::Linear { core }
            | Self::MultiLineFishbone { core, .. }
            | Self::FishboneAssistants { core } => core,
        }
    }

    pub fn core_mut(&mut self) -> &mut StrategyCore {
        match self {
            Self::SingleColumn { core }
            | Self::Linear { core }
            | Self::MultiLineFishbone { core, .. }
            | Self::FishboneAssistants { core } => core,
        }
    }

    /// Populates sibling stats and appends connector-reservation spacers.
    pub fn pre_process(&self, state: &mut LayoutState, node: NodeIndex) -> Result<()> {
        match self {
            Self::SingleColumn { core } => single_column::pre_process(core, state, node),
            Self::Linear { core } => linear::pre_process(core, state, node),
            Self::MultiLineFishbone { core, max_groups } => {
                fishbone::pre_process(core, *max_groups, state, node)
            }
            Self::FishboneAssistants { core } => assistants::pre_process(core, state, node),
        }
    }

    /// Assigns vertical positions to the branch rooted at the level.
    pub fn apply_vertical_layout(&self, state: &mut LayoutState, level: usize) -> Result<()> {
        match self {
            Self::SingleColumn { core } => single_column::apply_vertical_layout(core, state, level),
            Self::Linear { core } => linear::apply_vertical_layout(core, state, level),
            Self::MultiLineFishbone { core, max_groups } => {
                fishbone::apply_vertical_layout(core, *max_groups, state, level)
            }
            Self::FishboneAssistants { core } => {
                assistants::apply_vertical_layout(core, state, level)
            }
        }
    }

    /// Assigns horizontal positions to the branch rooted at the level.
    pub fn apply_horizontal_layout(&self, state: &mut LayoutState, level: usize) -> Result<()> {
        match self {
            Self::SingleColumn { core } => {
                single_column::apply_horizontal_layout(core, state, level)
            }
            Self::Linear { core } => linear::apply_horizontal_layout(core, state, level),
            Self::MultiLineFishbone { core, max_groups } => {
                fishbone::apply_horizontal_layout(core, *max_groups, state, level)
            }
            Self::FishboneAssistants { core } => {
                assistants::apply_horizontal_layout(core, state, level)
            }
        }
    }

    /// Emits the orthogonal parent-to-children connector for the node.
    pub fn route_connectors(&self, state: &mut LayoutState, node: NodeIndex) -> Result<()> {
        match self {
            Self::SingleColumn { core } => single_column::route_connectors(core, state, node),
            Self::Linear { core } => linear::route_connectors(core, state, node),
            Self::MultiLineFishbone { core, max_groups } => {
                fishbone::route_connectors(core, *max_groups, state, node)
            }
            Self::FishboneAssistants { core } => assistants::route_connectors(core, state, node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies_deserialize_from_tagged_json() {
        let parsed: LayoutStrategy = serde_json::from_str(
            r#"{ "type": "multi-line-fishbone", "max_groups": 3,
                 "core": { "parent_alignment": "center", "sibling_spacing": 4.0 } }"#,
        )
        .unwrap();
        match parsed {
            LayoutStrategy::MultiLineFishbone { core, max_groups } => {
                assert_eq!(max_groups, 3);
                assert_eq!(core.sibling_spacing, 4.0);
                assert_eq!(core.parent_alignment, ParentAlignment::Center);
                // untouched fields keep their defaults
                assert_eq!(core.child_connector_hook_length, 5.0);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn missing_core_defaults() {
        let parsed: LayoutStrategy =
            serde_json::from_str(r#"{ "type": "single-column" }"#).unwrap();
        assert_eq!(parsed.core().parent_child_spacing, 20.0);
    }
}
