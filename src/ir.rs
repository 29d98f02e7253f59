use std::collections::BTreeMap;

use crate::geometry::Size;

pub type BoxId = i32;

/// Sentinel parent id for boxes that have no parent.
pub const NONE: BoxId = -1;

/// A single chart box: immutable identity plus mutable layout flags.
#[derive(Debug, Clone)]
pub struct ChartBox {
    pub id: BoxId,
    pub parent_id: BoxId,
    /// External data identity; `None` for synthetic boxes.
    pub data_id: Option<String>,
    pub size: Size,
    /// Synthetic connector-reservation box, never part of user output.
    pub is_special: bool,
    pub is_collapsed: bool,
    pub is_assistant: bool,
    /// True iff no ancestor is collapsed; recomputed on every layout run.
    pub affects_layout: bool,
    pub layout_strategy_id: Option<String>,
    pub assistant_layout_strategy_id: Option<String>,
}

impl ChartBox {
    pub fn new(id: BoxId, parent_id: BoxId, size: Size) -> Self {
        Self {
            id,
            parent_id,
            data_id: None,
            size,
            is_special: false,
            is_collapsed: false,
            is_assistant: false,
            affects_layout: true,
            layout_strategy_id: None,
            assistant_layout_strategy_id: None,
        }
    }

    pub fn special(id: BoxId, parent_id: BoxId) -> Self {
        Self {
            is_special: true,
            ..Self::new(id, parent_id, Size::default())
        }
    }
}

/// A data source the chart is ingested from. The engine assigns integer box
/// ids in iteration order; sizes arrive separately via the state's size
/// lookup callback.
pub trait ChartSource {
    fn item_ids(&self) -> Vec<String>;
    fn parent_key_of(&self, id: &str) -> Option<String>;
    fn is_assistant(&self, id: &str) -> bool;
}

/// Id-keyed box storage with a mandatory synthetic system root.
#[derive(Debug, Clone, Default)]
pub struct BoxContainer {
    boxes: BTreeMap<BoxId, ChartBox>,
    system_root_id: Option<BoxId>,
    next_id: BoxId,
}

impl BoxContainer {
    pub fn new() -> Self {
        Self {
            boxes: BTreeMap::new(),
            system_root_id: None,
            next_id: 1,
        }
    }

    /// Container with the synthetic system root already in place.
    pub fn with_system_root() -> Self {
        let mut container = Self::new();
        let id = container.allocate_id();
        container.boxes.insert(id, ChartBox::special(id, NONE));
        container.system_root_id = Some(id);
        container
    }

    pub fn from_source(source: &impl ChartSource) -> Self {
        let mut container = Self::with_system_root();
        let ids = source.item_ids();
        let mut assigned: BTreeMap<String, BoxId> = BTreeMap::new();
        for data_id in &ids {
            let id = container.allocate_id();
            let mut chart_box = ChartBox::new(id, NONE, Size::default());
            chart_box.data_id = Some(data_id.clone());
            chart_box.is_assistant = source.is_assistant(data_id);
            container.boxes.insert(id, chart_box);
            assigned.insert(data_id.clone(), id);
        }
        let system_root = container.system_root_id.unwrap_or(NONE);
        for data_id in &ids {
            let id = assigned[data_id];
            // Unknown parent keys fall back to the system root, same as items
            // that never had a parent.
            let parent = source
                .parent_key_of(data_id)
                .and_then(|key| assigned.get(&key).copied())
                .unwrap_or(system_root);
            if let Some(chart_box) = container.boxes.get_mut(&id) {
                chart_box.parent_id = parent;
            }
        }
        container
    }

    fn allocate_id(&mut self) -> BoxId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Adds a regular box under `parent_id` and returns its id.
    pub fn add(&mut self, parent_id: BoxId, size: Size) -> BoxId {
        let id = self.allocate_id();
        self.boxes.insert(id, ChartBox::new(id, parent_id, size));
        id
    }

    pub fn system_root_id(&self) -> Option<BoxId> {
        self.system_root_id
    }

    pub fn get(&self, id: BoxId) -> Option<&ChartBox> {
        self.boxes.get(&id)
    }

    pub fn get_mut(&mut self, id: BoxId) -> Option<&mut ChartBox> {
        self.boxes.get_mut(&id)
    }

    pub fn find_by_data_id_mut(&mut self, data_id: &str) -> Option<&mut ChartBox> {
        self.boxes
            .values_mut()
            .find(|b| b.data_id.as_deref() == Some(data_id))
    }

    pub fn boxes(&self) -> impl Iterator<Item = &ChartBox> {
        self.boxes.values()
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn max_id(&self) -> BoxId {
        self.boxes.keys().next_back().copied().unwrap_or(0)
    }
}
