use serde::Serialize;

use super::analysis::{ ActionItem, Category, RoomAnalysis };

const MODERATE_CLUTTER_FROM: u8 = 41;
const HIGH_CLUTTER_FROM: u8 = 71;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClutterTier {
    Low,
    Moderate,
    High,
}

impl ClutterTier {
    pub fn for_level(level: u8) -> Self {
        if level >= HIGH_CLUTTER_FROM {
            ClutterTier::High
        } else if level >= MODERATE_CLUTTER_FROM {
            ClutterTier::Moderate
        } else {
            ClutterTier::Low
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CategoryPanel {
    pub category: Category,
    pub items: Vec<ActionItem>,
}

#[derive(Clone, Debug, Serialize)]
pub struct UtilizationSlice {
    pub name: String,
    pub value: u32,
    pub percent: f64,
}

/// What the dashboard view renders for one analysis.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub room_type: String,
    pub summary: String,
    pub clutter_level: u8,
    pub clutter_tier: ClutterTier,
    pub panels: Vec<CategoryPanel>,
    pub utilization: Vec<UtilizationSlice>,
    pub aesthetic_suggestions: Vec<String>,
}

impl Dashboard {
    pub fn from_analysis(analysis: &RoomAnalysis) -> Self {
        // empty categories are not rendered
        let panels = Category::ALL
            .iter()
            .map(|&category| CategoryPanel {
                category,
                items: analysis.items_in(category).cloned().collect(),
            })
            .filter(|panel| !panel.items.is_empty())
            .collect();

        let total: u64 = analysis.space_utilization.iter().map(|u| u.value as u64).sum();
        let utilization = analysis.space_utilization
            .iter()
            .map(|usage| UtilizationSlice {
                name: usage.name.clone(),
                value: usage.value,
                percent: if total == 0 {
                    0.0
                } else {
                    (usage.value as f64) * 100.0 / (total as f64)
                },
            })
            .collect();

        Self {
            room_type: analysis.room_type.clone(),
            summary: analysis.summary.clone(),
            clutter_level: analysis.clutter_level,
            clutter_tier: ClutterTier::for_level(analysis.clutter_level),
            panels,
            utilization,
            aesthetic_suggestions: analysis.aesthetic_suggestions.clone(),
        }
    }
}
