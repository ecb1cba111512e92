use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CrawlerError, Result};
use crate::types::ids::{CrawlerId, TenantId, UserId};

pub const MAX_INTERVAL_SECONDS: i64 = 30 * 24 * 60 * 60;
pub const MAX_CONCURRENT_SEARCHES: i32 = 10;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_SEARCH_SLOTS: usize = 32;
pub const MAX_SLOT_NAME_LEN: usize = 64;
pub const MAX_QUERIES_PER_SLOT: usize = 20;
pub const MAX_QUERY_LEN: usize = 500;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email regex")
});

/// Entity kind a crawler proposes new records for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetEntity {
    Contact,
    Organization,
}

impl TargetEntity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Organization => "organization",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "contact" => Some(Self::Contact),
            "organization" => Some(Self::Organization),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFilter {
    Day,
    Week,
    Month,
    Year,
}

/// One named group of search queries executed together by the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSlot {
    pub name: String,
    pub queries: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParameters {
    #[serde(default)]
    pub slots: Vec<SearchSlot>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub time_filter: Option<TimeFilter>,
    #[serde(default)]
    pub target_ids: Vec<Uuid>,
    #[serde(default)]
    pub source_document_ids: Vec<Uuid>,
}

impl SearchParameters {
    pub fn validate(&self) -> Result<()> {
        if self.slots.len() > MAX_SEARCH_SLOTS {
            return Err(CrawlerError::validation(format!(
                "at most {MAX_SEARCH_SLOTS} search slots are allowed"
            )));
        }

        let mut names = HashSet::with_capacity(self.slots.len());
        for (index, slot) in self.slots.iter().enumerate() {
            let name = slot.name.trim();
            if name.is_empty() {
                return Err(CrawlerError::validation(format!(
                    "search slot {index} has an empty name"
                )));
            }
            if name.chars().count() > MAX_SLOT_NAME_LEN {
                return Err(CrawlerError::validation(format!(
                    "search slot '{name}' name exceeds {MAX_SLOT_NAME_LEN} characters"
                )));
            }
            if !names.insert(name.to_lowercase()) {
                return Err(CrawlerError::validation(format!(
                    "duplicate search slot name '{name}'"
                )));
            }
            if slot.queries.is_empty() {
                return Err(CrawlerError::validation(format!(
                    "search slot '{name}' has no queries"
                )));
            }
            if slot.queries.len() > MAX_QUERIES_PER_SLOT {
                return Err(CrawlerError::validation(format!(
                    "search slot '{name}' has more than {MAX_QUERIES_PER_SLOT} queries"
                )));
            }
            for query in &slot.queries {
                if query.trim().is_empty() {
                    return Err(CrawlerError::validation(format!(
                        "search slot '{name}' contains a blank query"
                    )));
                }
                if query.chars().count() > MAX_QUERY_LEN {
                    return Err(CrawlerError::validation(format!(
                        "search slot '{name}' query exceeds {MAX_QUERY_LEN} characters"
                    )));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Local send time as `HH:MM`.
    #[serde(default)]
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub last_sent_at: Option<DateTime<Utc>>,
}

impl DigestSettings {
    pub fn validate(&self) -> Result<()> {
        for recipient in &self.recipients {
            if !EMAIL_RE.is_match(recipient.trim()) {
                return Err(CrawlerError::validation(format!(
                    "invalid digest recipient '{recipient}'"
                )));
            }
        }
        if let Some(time) = &self.time_of_day
            && NaiveTime::parse_from_str(time, "%H:%M").is_err()
        {
            return Err(CrawlerError::validation(format!(
                "digest time_of_day '{time}' must be HH:MM"
            )));
        }
        if self.enabled && self.recipients.is_empty() {
            return Err(CrawlerError::validation(
                "digest is enabled but has no recipients",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub use_agent: bool,
    #[serde(default)]
    pub model: Option<String>,
}

/// A tenant-owned automation definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlerConfig {
    pub id: CrawlerId,
    pub tenant_id: TenantId,
    pub owner_id: UserId,
    pub name: String,
    pub target_entity: TargetEntity,
    pub enabled: bool,
    pub interval_seconds: i64,
    pub concurrent_searches: i32,
    pub compilation_target: i32,
    pub disable_on_compiled: bool,
    pub active_proposals: i64,
    pub compiled_at: Option<DateTime<Utc>>,
    pub run_count: i64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub search: SearchParameters,
    pub digest: DigestSettings,
    pub agent: AgentSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CrawlerConfig {
    pub fn from_new(
        tenant_id: TenantId,
        owner_id: UserId,
        new: NewCrawlerConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let next_run_at = new
            .enabled
            .then(|| now + Duration::seconds(new.interval_seconds));

        Self {
            id: CrawlerId::new(),
            tenant_id,
            owner_id,
            name: new.name.trim().to_string(),
            target_entity: new.target_entity,
            enabled: new.enabled,
            interval_seconds: new.interval_seconds,
            concurrent_searches: new.concurrent_searches,
            compilation_target: new.compilation_target,
            disable_on_compiled: new.disable_on_compiled,
            active_proposals: 0,
            compiled_at: None,
            run_count: 0,
            last_run_at: None,
            next_run_at,
            search: new.search,
            digest: new.digest,
            agent: new.agent,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies user-editable fields only. Aggregates maintained by run
    /// completion and the enabled flag are left untouched.
    pub fn apply_patch(&mut self, patch: CrawlerConfigPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(target) = patch.target_entity {
            self.target_entity = target;
        }
        if let Some(interval) = patch.interval_seconds {
            self.interval_seconds = interval;
        }
        if let Some(concurrent) = patch.concurrent_searches {
            self.concurrent_searches = concurrent;
        }
        if let Some(target) = patch.compilation_target {
            self.compilation_target = target;
        }
        if let Some(flag) = patch.disable_on_compiled {
            self.disable_on_compiled = flag;
        }
        if let Some(search) = patch.search {
            self.search = search;
        }
        if let Some(digest) = patch.digest {
            let last_sent_at = self.digest.last_sent_at;
            self.digest = DigestSettings {
                last_sent_at,
                ..digest
            };
        }
        if let Some(agent) = patch.agent {
            self.agent = agent;
        }
        self.updated_at = now;
    }

    /// Enabling schedules the next run one interval out; disabling clears
    /// the schedule. Proposal aggregates and `compiled_at` are kept.
    pub fn set_enabled(&mut self, enabled: bool, now: DateTime<Utc>) {
        self.enabled = enabled;
        self.next_run_at =
            enabled.then(|| now + Duration::seconds(self.interval_seconds));
        self.updated_at = now;
    }

    pub fn validate(&self) -> Result<()> {
        validate_core_fields(
            &self.name,
            self.interval_seconds,
            self.concurrent_searches,
            self.compilation_target,
        )?;
        self.search.validate()?;
        self.digest.validate()?;
        if self.active_proposals < 0 {
            return Err(CrawlerError::validation(
                "active_proposals cannot be negative",
            ));
        }
        Ok(())
    }
}

/// Request body for creating a crawler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCrawlerConfig {
    pub name: String,
    pub target_entity: TargetEntity,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub interval_seconds: i64,
    #[serde(default = "default_concurrent_searches")]
    pub concurrent_searches: i32,
    #[serde(default)]
    pub compilation_target: i32,
    #[serde(default)]
    pub disable_on_compiled: bool,
    #[serde(default)]
    pub search: SearchParameters,
    #[serde(default)]
    pub digest: DigestSettings,
    #[serde(default)]
    pub agent: AgentSettings,
}

impl NewCrawlerConfig {
    pub fn validate(&self) -> Result<()> {
        validate_core_fields(
            &self.name,
            self.interval_seconds,
            self.concurrent_searches,
            self.compilation_target,
        )?;
        self.search.validate()?;
        self.digest.validate()
    }
}

/// Partial update of the user-editable crawler fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlerConfigPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub target_entity: Option<TargetEntity>,
    #[serde(default)]
    pub interval_seconds: Option<i64>,
    #[serde(default)]
    pub concurrent_searches: Option<i32>,
    #[serde(default)]
    pub compilation_target: Option<i32>,
    #[serde(default)]
    pub disable_on_compiled: Option<bool>,
    #[serde(default)]
    pub search: Option<SearchParameters>,
    #[serde(default)]
    pub digest: Option<DigestSettings>,
    #[serde(default)]
    pub agent: Option<AgentSettings>,
}

fn validate_core_fields(
    name: &str,
    interval_seconds: i64,
    concurrent_searches: i32,
    compilation_target: i32,
) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CrawlerError::validation("name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CrawlerError::validation(format!(
            "name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    if interval_seconds <= 0 {
        return Err(CrawlerError::validation(
            "interval_seconds must be greater than zero",
        ));
    }
    if interval_seconds > MAX_INTERVAL_SECONDS {
        return Err(CrawlerError::validation(format!(
            "interval_seconds cannot exceed {MAX_INTERVAL_SECONDS}"
        )));
    }
    if !(1..=MAX_CONCURRENT_SEARCHES).contains(&concurrent_searches) {
        return Err(CrawlerError::validation(format!(
            "concurrent_searches must be between 1 and {MAX_CONCURRENT_SEARCHES}"
        )));
    }
    if compilation_target < 0 {
        return Err(CrawlerError::validation(
            "compilation_target cannot be negative",
        ));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

fn default_concurrent_searches() -> i32 {
    1
}
