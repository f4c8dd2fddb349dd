//! Milestone detection
//!
//! Milestones are derived groupings of tasks. A [`MilestoneDetector`] walks
//! tasks in order and classifies each one with the first rule whose pattern
//! matches its content. The milestone ID is derived from the rule ID and the
//! matched token, so running detection again over an overlapping task set
//! lands on the same milestones.
//!
//! Detection never touches the store. Persisting detected milestones is the
//! caller's choice (see `TaskStore::sync_milestones`).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

use super::id::{slugify, MilestoneId, TaskId};
use super::task::{Priority, Task, TaskStatus};

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Milestone rule already exists: {0}")]
    DuplicateRule(String),

    #[error("Invalid milestone rule ID '{0}': must be non-empty, without ':' or whitespace")]
    InvalidRuleId(String),

    #[error("Invalid pattern for milestone rule '{id}': {source}")]
    InvalidPattern {
        id: String,
        #[source]
        source: regex::Error,
    },
}

/// Kind of milestone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneType {
    Phase,
    Feature,
    Release,
    Checkpoint,
    #[default]
    Custom,
}

impl MilestoneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneType::Phase => "phase",
            MilestoneType::Feature => "feature",
            MilestoneType::Release => "release",
            MilestoneType::Checkpoint => "checkpoint",
            MilestoneType::Custom => "custom",
        }
    }
}

impl fmt::Display for MilestoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for MilestoneType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "phase" => Ok(MilestoneType::Phase),
            "feature" => Ok(MilestoneType::Feature),
            "release" => Ok(MilestoneType::Release),
            "checkpoint" => Ok(MilestoneType::Checkpoint),
            "custom" => Ok(MilestoneType::Custom),
            other => Err(format!("unknown milestone type '{}'", other)),
        }
    }
}

/// A derived grouping of tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: MilestoneId,

    pub name: String,

    #[serde(rename = "type")]
    pub kind: MilestoneType,

    /// Derived from member statuses, see [`calculate_milestone_status`]
    pub status: TaskStatus,

    pub priority: Priority,

    /// Member task IDs. Membership, not ownership.
    #[serde(default)]
    pub task_ids: Vec<TaskId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<DateTime<Utc>>,
}

impl Milestone {
    pub fn new(
        id: MilestoneId,
        name: impl Into<String>,
        kind: MilestoneType,
        priority: Priority,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            status: TaskStatus::Pending,
            priority,
            task_ids: Vec::new(),
            completed_date: None,
        }
    }

    /// Adds a member, ignoring duplicates
    pub fn add_task(&mut self, task_id: TaskId) -> bool {
        if self.task_ids.contains(&task_id) {
            return false;
        }
        self.task_ids.push(task_id);
        true
    }

    /// Removes a member
    pub fn remove_task(&mut self, task_id: &TaskId) -> bool {
        let before = self.task_ids.len();
        self.task_ids.retain(|id| id != task_id);
        self.task_ids.len() != before
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.task_ids.contains(task_id)
    }

    /// Appends members of `other` not already present, returning how many
    /// were added
    pub fn merge_members(&mut self, other: &Milestone) -> usize {
        other
            .task_ids
            .iter()
            .filter(|id| self.add_task((*id).clone()))
            .count()
    }
}

/// Derives a milestone's status from its members and stores it.
///
/// Completed iff every member is completed (stamping `completed_date` the
/// first time), else blocked if any member is blocked, else in progress if
/// any member is in progress, else pending. Members missing from `tasks` are
/// skipped; a milestone with no known members is pending.
pub fn calculate_milestone_status<'a>(
    milestone: &mut Milestone,
    tasks: impl IntoIterator<Item = &'a Task>,
) -> TaskStatus {
    let statuses: HashMap<&TaskId, TaskStatus> =
        tasks.into_iter().map(|t| (&t.id, t.status)).collect();

    let members: Vec<TaskStatus> = milestone
        .task_ids
        .iter()
        .filter_map(|id| statuses.get(id).copied())
        .collect();

    let status = if members.is_empty() {
        TaskStatus::Pending
    } else if members.iter().all(TaskStatus::is_complete) {
        TaskStatus::Completed
    } else if members.contains(&TaskStatus::Blocked) {
        TaskStatus::Blocked
    } else if members.contains(&TaskStatus::InProgress) {
        TaskStatus::InProgress
    } else {
        TaskStatus::Pending
    };

    if status.is_complete() {
        if milestone.completed_date.is_none() {
            milestone.completed_date = Some(Utc::now());
        }
    } else {
        milestone.completed_date = None;
    }

    milestone.status = status;
    status
}

/// A content-pattern classification rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MilestoneRule {
    #[serde(deserialize_with = "deserialize_rule_id")]
    pub id: String,

    /// Prefix for the milestone name ("Phase" -> "Phase 2")
    pub name: String,

    #[serde(with = "pattern_serde")]
    pub pattern: Regex,

    #[serde(rename = "type")]
    pub kind: MilestoneType,

    #[serde(default)]
    pub priority: Priority,

    /// Rules with `auto_create = false` are skipped by automatic detection
    #[serde(default = "default_true")]
    pub auto_create: bool,
}

fn default_true() -> bool {
    true
}

/// Rule IDs prefix milestone IDs, so they can't carry the `:` separator
fn validate_rule_id(id: &str) -> Result<(), RuleError> {
    if id.is_empty() || id.contains(':') || id.chars().any(char::is_whitespace) {
        return Err(RuleError::InvalidRuleId(id.to_string()));
    }
    Ok(())
}

fn deserialize_rule_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let id = String::deserialize(deserializer)?;
    validate_rule_id(&id).map_err(serde::de::Error::custom)?;
    Ok(id)
}

impl MilestoneRule {
    /// Creates a rule, compiling the pattern
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        pattern: &str,
        kind: MilestoneType,
        priority: Priority,
    ) -> Result<Self, RuleError> {
        let id = id.into();
        validate_rule_id(&id)?;
        let pattern = Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
            id: id.clone(),
            source,
        })?;

        Ok(Self {
            id,
            name: name.into(),
            pattern,
            kind,
            priority,
            auto_create: true,
        })
    }

    pub fn with_auto_create(mut self, auto_create: bool) -> Self {
        self.auto_create = auto_create;
        self
    }

    /// Returns the token the rule extracts from `content`: the first
    /// participating capture group, or the whole match when the pattern has
    /// no groups.
    pub fn matched_token<'c>(&self, content: &'c str) -> Option<&'c str> {
        let caps = self.pattern.captures(content)?;
        let token = caps
            .iter()
            .skip(1)
            .flatten()
            .next()
            .or_else(|| caps.get(0))?;
        Some(token.as_str().trim())
    }
}

/// Serde helper for regex patterns stored as strings
mod pattern_serde {
    use regex::Regex;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(pattern: &Regex, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(pattern.as_str())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Regex, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Regex::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub rules: Vec<MilestoneRule>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

impl DetectorConfig {
    /// A configuration with no rules
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }
}

/// The built-in rule set, in match order
pub fn default_rules() -> Vec<MilestoneRule> {
    let specs: [(&str, &str, &str, MilestoneType, Priority); 5] = [
        (
            "phase",
            "Phase",
            r"(?i)\bphase\s*#?\s*(\d+)",
            MilestoneType::Phase,
            Priority::High,
        ),
        (
            "feature",
            "Feature",
            r"(?i)\bfeature\s*[:\-]\s*([\w-]+)",
            MilestoneType::Feature,
            Priority::Medium,
        ),
        (
            "release",
            "Release",
            r"(?i)\brelease\s+v?(\d+\.\d+(?:\.\d+)?)|\bv(\d+\.\d+(?:\.\d+)?)\b",
            MilestoneType::Release,
            Priority::Critical,
        ),
        (
            "checkpoint",
            "Checkpoint",
            r"(?i)\b(?:checkpoint|milestone)\s*[:\-]\s*([\w-]+)",
            MilestoneType::Checkpoint,
            Priority::High,
        ),
        (
            "sprint",
            "Sprint",
            r"(?i)\bsprint\s*#?\s*(\d+)",
            MilestoneType::Custom,
            Priority::Medium,
        ),
    ];

    specs
        .into_iter()
        .filter_map(|(id, name, pattern, kind, priority)| {
            MilestoneRule::new(id, name, pattern, kind, priority).ok()
        })
        .collect()
}

/// Rule-driven milestone classifier
#[derive(Debug, Clone)]
pub struct MilestoneDetector {
    rules: Vec<MilestoneRule>,
}

impl Default for MilestoneDetector {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

impl MilestoneDetector {
    /// Builds a detector, checking each configured rule as [`add_rule`](Self::add_rule) does
    pub fn new(config: DetectorConfig) -> Result<Self, RuleError> {
        let mut detector = Self {
            rules: Vec::with_capacity(config.rules.len()),
        };
        for rule in config.rules {
            detector.add_rule(rule)?;
        }
        Ok(detector)
    }

    /// Returns the configured rules, in match order
    pub fn rules(&self) -> &[MilestoneRule] {
        &self.rules
    }

    /// Appends a rule to the end of the match order
    pub fn add_rule(&mut self, rule: MilestoneRule) -> Result<(), RuleError> {
        validate_rule_id(&rule.id)?;
        if self.rules.iter().any(|r| r.id == rule.id) {
            return Err(RuleError::DuplicateRule(rule.id));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Removes a rule by ID
    pub fn remove_rule(&mut self, rule_id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != rule_id);
        self.rules.len() != before
    }

    /// Classifies a single task: the first auto-create rule that matches wins
    pub fn classify(&self, task: &Task) -> Option<(&MilestoneRule, MilestoneId, String)> {
        self.rules
            .iter()
            .filter(|rule| rule.auto_create)
            .find_map(|rule| {
                let token = rule.matched_token(&task.content)?;
                if slugify(token).is_empty() {
                    return None;
                }
                let id = MilestoneId::derive(&rule.id, token);
                Some((rule, id, token.to_string()))
            })
    }

    /// Groups tasks into milestones.
    ///
    /// Each task joins at most one milestone. Milestones come back in the
    /// order they were first matched, members in task order, with statuses
    /// computed from the same task set.
    pub fn detect_milestones<'a>(&self, tasks: impl IntoIterator<Item = &'a Task>) -> Vec<Milestone> {
        let tasks: Vec<&Task> = tasks.into_iter().collect();
        let mut milestones: Vec<Milestone> = Vec::new();
        let mut index: HashMap<MilestoneId, usize> = HashMap::new();

        for task in &tasks {
            let Some((rule, id, token)) = self.classify(task) else {
                continue;
            };

            let slot = *index.entry(id.clone()).or_insert_with(|| {
                milestones.push(Milestone::new(
                    id.clone(),
                    format!("{} {}", rule.name, token),
                    rule.kind,
                    rule.priority,
                ));
                milestones.len() - 1
            });

            milestones[slot].add_task(task.id.clone());
        }

        for milestone in &mut milestones {
            calculate_milestone_status(milestone, tasks.iter().copied());
        }

        debug!(
            task_count = tasks.len(),
            milestone_count = milestones.len(),
            "milestone detection finished"
        );

        milestones
    }
}

/// An advisory grouping produced by [`suggest_groupings`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupingSuggestion {
    pub name: String,
    pub reason: String,
    pub kind: MilestoneType,
    pub task_ids: Vec<TaskId>,
    /// 0.0 to 1.0
    pub confidence: f64,
}

/// Suggests groupings that no rule produced: tasks sharing a first word, and
/// tasks with elevated priority. Sorted by descending confidence.
pub fn suggest_groupings<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Vec<GroupingSuggestion> {
    let tasks: Vec<&Task> = tasks.into_iter().collect();
    let mut suggestions = Vec::new();

    let mut by_word: Vec<(String, Vec<TaskId>)> = Vec::new();
    for task in &tasks {
        let Some(word) = first_word(&task.content) else {
            continue;
        };
        match by_word.iter_mut().find(|(w, _)| *w == word) {
            Some((_, ids)) => ids.push(task.id.clone()),
            None => by_word.push((word, vec![task.id.clone()])),
        }
    }

    for (word, ids) in by_word {
        if ids.len() < 2 {
            continue;
        }
        let confidence = (0.4 + 0.1 * ids.len() as f64).min(0.9);
        suggestions.push(GroupingSuggestion {
            name: format!("{} tasks", capitalize(&word)),
            reason: format!("{} tasks start with '{}'", ids.len(), word),
            kind: MilestoneType::Feature,
            task_ids: ids,
            confidence,
        });
    }

    let elevated: Vec<TaskId> = tasks
        .iter()
        .filter(|t| t.priority.is_some_and(|p| p.is_elevated()))
        .map(|t| t.id.clone())
        .collect();

    if elevated.len() >= 2 {
        suggestions.push(GroupingSuggestion {
            name: "High priority".to_string(),
            reason: format!("{} tasks have high or critical priority", elevated.len()),
            kind: MilestoneType::Checkpoint,
            confidence: (0.5 + 0.05 * elevated.len() as f64).min(0.8),
            task_ids: elevated,
        });
    }

    suggestions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    suggestions
}

fn first_word(content: &str) -> Option<String> {
    let word: String = content
        .split_whitespace()
        .next()?
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();

    (!word.is_empty()).then_some(word)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
