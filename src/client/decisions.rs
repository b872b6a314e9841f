use super::meetings::{literal, localized};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteCategory {
    Favor,
    Against,
    Abstain,
}

impl VoteCategory {
    /// Property holding this category's voter list on an upstream decision.
    pub fn upstream_key(self) -> &'static str {
        match self {
            VoteCategory::Favor => "had_voter_favor",
            VoteCategory::Against => "had_voter_against",
            VoteCategory::Abstain => "had_voter_abstention",
        }
    }
}

impl fmt::Display for VoteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VoteCategory::Favor => "favor",
            VoteCategory::Against => "against",
            VoteCategory::Abstain => "abstain",
        };
        f.write_str(label)
    }
}

impl FromStr for VoteCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "favor" | "for" | "yes" => Ok(VoteCategory::Favor),
            "against" | "no" => Ok(VoteCategory::Against),
            "abstain" | "abstention" => Ok(VoteCategory::Abstain),
            other => Err(format!("Unknown vote category: {}", other)),
        }
    }
}

/// `person/12345` and `http://.../person/12345` both become `12345`.
pub fn normalize_voter_id(raw: &str) -> String {
    raw.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(raw)
        .to_string()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Decision {
    pub id: String,
    pub label: String,
    pub favor: Vec<String>,
    pub against: Vec<String>,
    pub abstain: Vec<String>,
}

impl Decision {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = ["activity_id", "notation_votingId", "id"]
            .iter()
            .find_map(|key| value.get(*key).and_then(literal))?;

        let label = ["activity_label", "decision_label", "referenceText"]
            .iter()
            .find_map(|key| value.get(*key).and_then(localized))
            .unwrap_or_else(|| id.clone());

        let voters = |category: VoteCategory| -> Vec<String> {
            match value.get(category.upstream_key()) {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(literal)
                    .map(|raw| normalize_voter_id(&raw))
                    .collect(),
                Some(other) => literal(other)
                    .map(|raw| vec![normalize_voter_id(&raw)])
                    .unwrap_or_default(),
                None => Vec::new(),
            }
        };

        Some(Self {
            label,
            favor: voters(VoteCategory::Favor),
            against: voters(VoteCategory::Against),
            abstain: voters(VoteCategory::Abstain),
            id,
        })
    }

    pub fn voters(&self, category: VoteCategory) -> &[String] {
        match category {
            VoteCategory::Favor => &self.favor,
            VoteCategory::Against => &self.against,
            VoteCategory::Abstain => &self.abstain,
        }
    }
}

/// Decisions listed in a `{"data": [...]}` document (or a bare array).
pub fn decisions_from_document(document: &Value) -> Vec<Decision> {
    let items = match document {
        Value::Array(items) => items.as_slice(),
        other => other
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
    };
    items.iter().filter_map(Decision::from_value).collect()
}

/// Which vote-category disclosure is open per decision, and which ones are
/// waiting on identity resolution.
#[derive(Debug, Default)]
pub struct DecisionPanel {
    open: HashMap<String, VoteCategory>,
    loading: HashSet<(String, VoteCategory)>,
}

impl DecisionPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clicking the open category closes it; any other category opens in its
    /// place. Returns the category left open, if any.
    pub fn toggle(&mut self, decision_id: &str, category: VoteCategory) -> Option<VoteCategory> {
        if self.open.get(decision_id) == Some(&category) {
            self.open.remove(decision_id);
            None
        } else {
            self.open.insert(decision_id.to_string(), category);
            Some(category)
        }
    }

    pub fn open_category(&self, decision_id: &str) -> Option<VoteCategory> {
        self.open.get(decision_id).copied()
    }

    pub fn is_open(&self, decision_id: &str, category: VoteCategory) -> bool {
        self.open_category(decision_id) == Some(category)
    }

    pub fn set_loading(&mut self, decision_id: &str, category: VoteCategory, loading: bool) {
        let key = (decision_id.to_string(), category);
        if loading {
            self.loading.insert(key);
        } else {
            self.loading.remove(&key);
        }
    }

    pub fn is_loading(&self, decision_id: &str, category: VoteCategory) -> bool {
        self.loading.contains(&(decision_id.to_string(), category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decision_from_value() {
        let value = json!({
            "activity_id": "PV-10-2025-01-21-VOT-ITM-1",
            "activity_label": { "en": "Amendment 3" },
            "had_voter_favor": ["person/1", "person/2"],
            "had_voter_against": "person/3",
        });
        let decision = Decision::from_value(&value).unwrap();
        assert_eq!(decision.id, "PV-10-2025-01-21-VOT-ITM-1");
        assert_eq!(decision.label, "Amendment 3");
        assert_eq!(decision.voters(VoteCategory::Favor), ["1", "2"]);
        assert_eq!(decision.voters(VoteCategory::Against), ["3"]);
        assert!(decision.voters(VoteCategory::Abstain).is_empty());
    }

    #[test]
    fn test_decision_without_id_is_skipped() {
        let document = json!({ "data": [ { "activity_label": { "en": "x" } }, { "id": "d-1" } ] });
        let decisions = decisions_from_document(&document);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].label, "d-1");
    }

    #[test]
    fn test_normalize_voter_id() {
        assert_eq!(normalize_voter_id("person/12345"), "12345");
        assert_eq!(
            normalize_voter_id("http://data.europarl.europa.eu/person/12345/"),
            "12345"
        );
        assert_eq!(normalize_voter_id("12345"), "12345");
    }

    #[test]
    fn test_toggle_same_category_closes() {
        let mut panel = DecisionPanel::new();
        assert_eq!(panel.toggle("d-1", VoteCategory::Favor), Some(VoteCategory::Favor));
        assert!(panel.is_open("d-1", VoteCategory::Favor));
        assert_eq!(panel.toggle("d-1", VoteCategory::Favor), None);
        assert_eq!(panel.open_category("d-1"), None);
    }

    #[test]
    fn test_toggle_other_category_switches() {
        let mut panel = DecisionPanel::new();
        panel.toggle("d-1", VoteCategory::Favor);
        panel.toggle("d-2", VoteCategory::Abstain);
        assert_eq!(panel.toggle("d-1", VoteCategory::Against), Some(VoteCategory::Against));
        assert!(panel.is_open("d-1", VoteCategory::Against));
        assert!(!panel.is_open("d-1", VoteCategory::Favor));
        assert!(panel.is_open("d-2", VoteCategory::Abstain));
    }

    #[test]
    fn test_loading_flags_are_per_decision_and_category() {
        let mut panel = DecisionPanel::new();
        panel.set_loading("d-1", VoteCategory::Favor, true);
        assert!(panel.is_loading("d-1", VoteCategory::Favor));
        assert!(!panel.is_loading("d-1", VoteCategory::Against));
        assert!(!panel.is_loading("d-2", VoteCategory::Favor));
        panel.set_loading("d-1", VoteCategory::Favor, false);
        assert!(!panel.is_loading("d-1", VoteCategory::Favor));
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("Favor".parse::<VoteCategory>(), Ok(VoteCategory::Favor));
        assert_eq!("abstention".parse::<VoteCategory>(), Ok(VoteCategory::Abstain));
        assert!("maybe".parse::<VoteCategory>().is_err());
    }
}
