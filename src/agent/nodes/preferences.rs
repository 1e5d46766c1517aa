use async_trait::async_trait;
use serde_json::json;

use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::orders::UserPreferences;
use crate::schema::slots;
use crate::state::StateSnapshot;

/// Entry node: keeps long-term food preferences current.
///
/// Detects dietary keywords in the latest user message and folds them into
/// the stored `user_preferences` slot. Runs on every turn so preferences
/// mentioned in passing ("I'm vegetarian now") survive into later sessions.
pub struct PreferencesNode;

const DIETARY_KEYWORDS: [&str; 6] = [
    "vegetarian",
    "vegan",
    "gluten-free",
    "gluten free",
    "halal",
    "kosher",
];

fn detect_dietary(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    DIETARY_KEYWORDS
        .iter()
        .filter(|kw| lowered.contains(**kw))
        .map(|kw| kw.replace(' ', "-"))
        .collect()
}

#[async_trait]
impl Node for PreferencesNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let mut prefs = snapshot.user_preferences().unwrap_or_default();

        let detected = snapshot
            .last_user_message()
            .map(|m| detect_dietary(&m.content))
            .unwrap_or_default();

        let mut changed = false;
        for restriction in detected {
            if !prefs.dietary_restrictions.contains(&restriction) {
                ctx.emit("preferences", format!("noted dietary restriction: {restriction}"))?;
                prefs.dietary_restrictions.push(restriction);
                changed = true;
            }
        }

        if !changed {
            return Ok(NodePartial::default());
        }
        Ok(NodePartial::new().with_slot(slots::USER_PREFERENCES, json!(prefs)))
    }
}

impl PreferencesNode {
    /// Test helper: preferences parsed out of raw text.
    pub fn detect(text: &str) -> UserPreferences {
        UserPreferences {
            dietary_restrictions: detect_dietary(text),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_dietary_keywords() {
        let prefs = PreferencesNode::detect("We need gluten free and vegan options please");
        assert_eq!(prefs.dietary_restrictions, vec!["vegan", "gluten-free"]);
    }

    #[test]
    fn plain_text_detects_nothing() {
        let prefs = PreferencesNode::detect("Order pizza for the team");
        assert!(prefs.dietary_restrictions.is_empty());
    }
}
