use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::ir::BoxId;
use crate::layout::{LayoutState, compute_branch_visual_bounding_rect};

/// Serializable snapshot of a finished layout: placed boxes, connector
/// polylines and the visual bounding rect.
#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub boxes: Vec<BoxDump>,
    pub connectors: Vec<ConnectorDump>,
}

#[derive(Debug, Serialize)]
pub struct BoxDump {
    pub id: BoxId,
    pub data_id: Option<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub collapsed: bool,
}

#[derive(Debug, Serialize)]
pub struct ConnectorDump {
    pub box_id: BoxId,
    /// Segments as [from_x, from_y, to_x, to_y].
    pub segments: Vec<[f64; 4]>,
}

impl LayoutDump {
    pub fn from_state(state: &LayoutState) -> Self {
        let tree = &state.visual_tree;
        let bounding = compute_branch_visual_bounding_rect(tree);

        let mut boxes = Vec::new();
        let mut connectors = Vec::new();
        for (_, node) in tree.iter() {
            if !node.element.affects_layout {
                continue;
            }
            if !node.element.is_special {
                let rect = node.state.rect();
                boxes.push(BoxDump {
                    id: node.element.id,
                    data_id: node.element.data_id.clone(),
                    x: rect.left(),
                    y: rect.top(),
                    width: rect.size.width,
                    height: rect.size.height,
                    collapsed: node.element.is_collapsed,
                });
            }
            if let Some(connector) = &node.state.connector {
                // assistants roots report under their owner's box id
                let box_id = if node.is_assistants_root {
                    node.element.parent_id
                } else {
                    node.element.id
                };
                connectors.push(ConnectorDump {
                    box_id,
                    segments: connector
                        .segments
                        .iter()
                        .map(|edge| [edge.from.x, edge.from.y, edge.to.x, edge.to.y])
                        .collect(),
                });
            }
        }
        boxes.sort_by_key(|b| b.id);
        connectors.sort_by_key(|c| c.box_id);

        LayoutDump {
            x: bounding.left(),
            y: bounding.top(),
            width: bounding.size.width,
            height: bounding.size.height,
            boxes,
            connectors,
        }
    }
}

pub fn write_layout_dump(path: &Path, state: &LayoutState) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_state(state);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
