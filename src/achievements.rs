//! Achievement badges
//!
//! A fixed rule table scanned against each completed activity. Evaluation is
//! pure: it reports which badges the activity newly unlocks and leaves
//! bookkeeping to [`BadgeBook`].

use crate::types::CompletedActivity;
use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Identifier of a badge rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeId {
    FirstRun,
    SpeedDemon,
    #[serde(rename = "distance_5k")]
    Distance5k,
    #[serde(rename = "distance_10k")]
    Distance10k,
    CalorieBurner,
    EarlyBird,
    NightOwl,
    Endurance,
}

impl BadgeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeId::FirstRun => "first_run",
            BadgeId::SpeedDemon => "speed_demon",
            BadgeId::Distance5k => "distance_5k",
            BadgeId::Distance10k => "distance_10k",
            BadgeId::CalorieBurner => "calorie_burner",
            BadgeId::EarlyBird => "early_bird",
            BadgeId::NightOwl => "night_owl",
            BadgeId::Endurance => "endurance",
        }
    }
}

/// A rule of the badge table
pub struct BadgeRule {
    pub id: BadgeId,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub condition: fn(&CompletedActivity) -> bool,
}

/// Every badge that can be earned
pub static BADGE_RULES: [BadgeRule; 8] = [
    BadgeRule {
        id: BadgeId::FirstRun,
        name: "First Steps",
        description: "Complete your first running activity",
        icon: "🎯",
        condition: |_| true,
    },
    BadgeRule {
        id: BadgeId::SpeedDemon,
        name: "Speed Demon",
        description: "Maintain an average speed above 12 km/h",
        icon: "⚡",
        condition: |a| a.speed_kmh > 12.0,
    },
    BadgeRule {
        id: BadgeId::Distance5k,
        name: "5K Champion",
        description: "Complete a 5 kilometer run",
        icon: "🏃",
        condition: |a| a.distance_km >= 5.0,
    },
    BadgeRule {
        id: BadgeId::Distance10k,
        name: "10K Master",
        description: "Complete a 10 kilometer run",
        icon: "🏆",
        condition: |a| a.distance_km >= 10.0,
    },
    BadgeRule {
        id: BadgeId::CalorieBurner,
        name: "Calorie Burner",
        description: "Burn more than 500 calories in one session",
        icon: "🔥",
        condition: |a| a.calories > 500,
    },
    BadgeRule {
        id: BadgeId::EarlyBird,
        name: "Early Bird",
        description: "Start a run before 7 AM",
        icon: "🌅",
        condition: |a| a.started_at.hour() < 7,
    },
    BadgeRule {
        id: BadgeId::NightOwl,
        name: "Night Owl",
        description: "Complete a run after 8 PM",
        icon: "🌙",
        condition: |a| a.started_at.hour() >= 20,
    },
    BadgeRule {
        id: BadgeId::Endurance,
        name: "Endurance Master",
        description: "Run for more than 1 hour",
        icon: "🏃",
        condition: |a| a.duration_minutes() >= 60,
    },
];

/// A badge earned by a specific activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockedBadge {
    pub id: BadgeId,
    pub name: String,
    pub description: String,
    pub icon: String,
    /// RFC 3339 unlock time
    pub unlocked_at: String,
    pub activity_id: String,
}

impl UnlockedBadge {
    fn from_rule(rule: &BadgeRule, activity: &CompletedActivity, now: DateTime<Utc>) -> Self {
        Self {
            id: rule.id,
            name: rule.name.to_string(),
            description: rule.description.to_string(),
            icon: rule.icon.to_string(),
            unlocked_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            activity_id: activity.id.clone(),
        }
    }
}

/// Badges newly unlocked by `activity`, in rule-table order
pub fn evaluate(
    activity: &CompletedActivity,
    already_unlocked: &HashSet<BadgeId>,
    now: DateTime<Utc>,
) -> Vec<UnlockedBadge> {
    BADGE_RULES
        .iter()
        .filter(|rule| !already_unlocked.contains(&rule.id) && (rule.condition)(activity))
        .map(|rule| UnlockedBadge::from_rule(rule, activity, now))
        .collect()
}

/// The set of badges unlocked so far
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeBook {
    unlocked: Vec<UnlockedBadge>,
}

impl BadgeBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unlocked(&self) -> &[UnlockedBadge] {
        &self.unlocked
    }

    pub fn unlocked_ids(&self) -> HashSet<BadgeId> {
        self.unlocked.iter().map(|b| b.id).collect()
    }

    pub fn is_unlocked(&self, id: BadgeId) -> bool {
        self.unlocked.iter().any(|b| b.id == id)
    }

    /// Evaluate `activity`, record and return what it unlocked
    pub fn record(
        &mut self,
        activity: &CompletedActivity,
        now: DateTime<Utc>,
    ) -> Vec<UnlockedBadge> {
        let fresh = evaluate(activity, &self.unlocked_ids(), now);
        if !fresh.is_empty() {
            tracing::info!(
                activity_id = %activity.id,
                badges = ?fresh.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(),
                "Badges unlocked"
            );
        }
        self.unlocked.extend(fresh.iter().cloned());
        fresh
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Load from disk; a missing or unreadable file yields an empty book
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json).unwrap_or_else(|err| {
                tracing::error!(path = %path.display(), %err, "Error loading badges");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save to disk; failures are logged
    pub fn save(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let result = self
            .to_json()
            .map_err(std::io::Error::from)
            .and_then(|json| std::fs::write(path, json));
        if let Err(err) = result {
            tracing::error!(path = %path.display(), %err, "Error saving badges");
        }
    }
}
