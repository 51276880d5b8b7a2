use serde::{ Deserialize, Deserializer, Serialize };
use std::collections::HashSet;

use crate::text::sanitize;

pub const MAX_CLUTTER_LEVEL: u8 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(alias = "easy")]
    Easy,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "hard")]
    Hard,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(alias = "discard")]
    Discard,
    #[serde(alias = "organize")]
    Organize,
    #[serde(alias = "buy")]
    Buy,
}

impl Category {
    /// Dashboard panel order.
    pub const ALL: [Category; 3] = [Category::Discard, Category::Organize, Category::Buy];
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceUsage {
    pub name: String,
    pub value: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub category: Category,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAnalysis {
    pub room_type: String,
    pub clutter_level: u8,
    pub summary: String,
    pub space_utilization: Vec<SpaceUsage>,
    pub action_items: Vec<ActionItem>,
    pub aesthetic_suggestions: Vec<String>,
}

// Shape the model is asked to produce. Numbers are taken loosely and normalized afterwards.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRoomAnalysis {
    room_type: String,
    clutter_level: f64,
    summary: String,
    space_utilization: Vec<RawSpaceUsage>,
    action_items: Vec<RawActionItem>,
    aesthetic_suggestions: Vec<String>,
}

#[derive(Deserialize)]
struct RawSpaceUsage {
    name: String,
    value: f64,
}

#[derive(Deserialize)]
struct RawActionItem {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    title: String,
    description: String,
    difficulty: Difficulty,
    category: Category,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error> where D: Deserializer<'de> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

fn clamp_clutter(level: f64) -> u8 {
    if level.is_nan() {
        return 0;
    }
    level.round().clamp(0.0, MAX_CLUTTER_LEVEL as f64) as u8
}

fn clamp_usage(value: f64) -> u32 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, u32::MAX as f64) as u32
}

/// Gives every item an id unique within the analysis, keeping the first occurrence as-is.
fn unique_ids(items: &mut [ActionItem]) {
    let mut seen = HashSet::new();
    for (index, item) in items.iter_mut().enumerate() {
        let base = if item.id.trim().is_empty() {
            format!("item-{}", index + 1)
        } else {
            item.id.trim().to_string()
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{}-{}", base, n);
            n += 1;
        }
        item.id = candidate;
    }
}

impl RoomAnalysis {
    /// Parses the model's JSON object. Fails when any required field is missing or mistyped.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: RawRoomAnalysis = serde_json::from_str(json)?;
        let mut action_items: Vec<ActionItem> = raw.action_items
            .into_iter()
            .map(|item| ActionItem {
                id: item.id,
                title: item.title,
                description: item.description,
                difficulty: item.difficulty,
                category: item.category,
            })
            .collect();
        unique_ids(&mut action_items);

        Ok(Self {
            room_type: raw.room_type,
            clutter_level: clamp_clutter(raw.clutter_level),
            summary: raw.summary,
            space_utilization: raw.space_utilization
                .into_iter()
                .map(|usage| SpaceUsage { name: usage.name, value: clamp_usage(usage.value) })
                .collect(),
            action_items,
            aesthetic_suggestions: raw.aesthetic_suggestions,
        })
    }

    /// Runs the sanitizer over every free-text field. Enums and numbers are left alone.
    pub fn sanitized(self) -> Self {
        Self {
            room_type: sanitize(&self.room_type),
            clutter_level: self.clutter_level,
            summary: sanitize(&self.summary),
            space_utilization: self.space_utilization
                .into_iter()
                .map(|usage| SpaceUsage { name: sanitize(&usage.name), value: usage.value })
                .collect(),
            action_items: self.action_items
                .into_iter()
                .map(|item| ActionItem {
                    title: sanitize(&item.title),
                    description: sanitize(&item.description),
                    ..item
                })
                .collect(),
            aesthetic_suggestions: self.aesthetic_suggestions
                .iter()
                .map(|tip| sanitize(tip))
                .collect(),
        }
    }

    pub fn items_in(&self, category: Category) -> impl Iterator<Item = &ActionItem> {
        self.action_items.iter().filter(move |item| item.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "roomType": "Гостиная (Living room)",
        "clutterLevel": 85,
        "summary": "**Много** вещей на полу. Wait, maybe it's a bedroom",
        "spaceUtilization": [{"name": "Хранение", "value": 40}, {"name": "Свободно", "value": 60}],
        "actionItems": [
            {"id": "1", "title": "Note: Убрать коробки", "description": "Вынести пустые коробки", "difficulty": "Easy", "category": "Discard"},
            {"id": "1", "title": "Купить полку", "description": "Открытая полка", "difficulty": "Medium", "category": "Buy"}
        ],
        "aestheticSuggestions": ["Добавить растения (plants)"]
    }"#;

    #[test]
    fn parses_model_shape() {
        let analysis = RoomAnalysis::from_json(SAMPLE).unwrap();
        assert_eq!(analysis.clutter_level, 85);
        assert_eq!(analysis.space_utilization.len(), 2);
        assert_eq!(analysis.action_items[1].category, Category::Buy);
        assert_eq!(analysis.action_items[0].difficulty, Difficulty::Easy);
    }

    #[test]
    fn missing_field_is_an_error() {
        let json = r#"{"roomType": "Кухня", "clutterLevel": 10}"#;
        assert!(RoomAnalysis::from_json(json).is_err());
    }

    #[test]
    fn unknown_category_is_an_error() {
        let json = SAMPLE.replace("\"Buy\"", "\"Sell\"");
        assert!(RoomAnalysis::from_json(&json).is_err());
    }

    #[test]
    fn clutter_level_is_clamped_and_rounded() {
        let json = SAMPLE.replace("\"clutterLevel\": 85", "\"clutterLevel\": 140.4");
        assert_eq!(RoomAnalysis::from_json(&json).unwrap().clutter_level, 100);
        let json = SAMPLE.replace("\"clutterLevel\": 85", "\"clutterLevel\": -3");
        assert_eq!(RoomAnalysis::from_json(&json).unwrap().clutter_level, 0);
        let json = SAMPLE.replace("\"clutterLevel\": 85", "\"clutterLevel\": 72.6");
        assert_eq!(RoomAnalysis::from_json(&json).unwrap().clutter_level, 73);
    }

    #[test]
    fn duplicate_and_numeric_ids_become_unique_strings() {
        let json = SAMPLE.replacen("\"id\": \"1\"", "\"id\": 1", 1);
        let analysis = RoomAnalysis::from_json(&json).unwrap();
        let ids: Vec<_> = analysis.action_items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "1-2"]);
    }

    #[test]
    fn lowercase_enums_are_accepted() {
        let json = SAMPLE.replace("\"Easy\"", "\"easy\"").replace("\"Discard\"", "\"discard\"");
        let analysis = RoomAnalysis::from_json(&json).unwrap();
        assert_eq!(analysis.action_items[0].category, Category::Discard);
    }

    #[test]
    fn sanitized_cleans_free_text_only() {
        let analysis = RoomAnalysis::from_json(SAMPLE).unwrap().sanitized();
        assert_eq!(analysis.room_type, "Гостиная");
        assert_eq!(analysis.summary, "Много вещей на полу.");
        assert_eq!(analysis.action_items[0].title, "Убрать коробки");
        assert_eq!(analysis.aesthetic_suggestions[0], "Добавить растения");
        assert_eq!(analysis.action_items[0].category, Category::Discard);
        assert_eq!(analysis.clutter_level, 85);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let analysis = RoomAnalysis::from_json(SAMPLE).unwrap();
        let value = serde_json::to_value(&analysis).unwrap();
        assert!(value.get("roomType").is_some());
        assert!(value.get("aestheticSuggestions").is_some());
        assert_eq!(value["actionItems"][0]["category"], "Discard");
    }
}
