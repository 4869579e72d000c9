use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Upcoming,
    Completed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Active => "active",
            Status::Upcoming => "upcoming",
            Status::Completed => "completed",
        };
        f.write_str(name)
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" | "inprogress" => Ok(Status::Active),
            "upcoming" | "pending" => Ok(Status::Upcoming),
            "completed" | "done" => Ok(Status::Completed),
            other => Err(anyhow!("unknown status: {other}")),
        }
    }
}

/// A set of reference links for one day of a theme.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceGroup {
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThemeBlock {
    pub id: Uuid,
    pub title: String,
    pub duration_days: u32,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub references: Vec<ReferenceGroup>,
    pub status: Status,
    pub order: i64,
}

/// Creation payload; the store assigns id, status and order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewThemeBlock {
    pub title: String,
    pub duration_days: u32,
    pub objectives: Vec<String>,
    pub references: Vec<ReferenceGroup>,
}

impl NewThemeBlock {
    /// Trims the payload the way the creation form does and rejects a
    /// blank title or a zero duration.
    pub fn validated(self) -> anyhow::Result<Self> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(anyhow!("theme title cannot be empty"));
        }
        if self.duration_days == 0 {
            return Err(anyhow!("theme duration must be at least one day"));
        }

        Ok(Self {
            title,
            duration_days: self.duration_days,
            objectives: clean_lines(self.objectives),
            references: clean_references(self.references),
        })
    }

    pub fn into_block(self, id: Uuid, order: i64) -> ThemeBlock {
        ThemeBlock {
            id,
            title: self.title,
            duration_days: self.duration_days,
            objectives: self.objectives,
            references: self.references,
            status: Status::Upcoming,
            order,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemePatch {
    pub title: Option<String>,
    pub duration_days: Option<u32>,
    pub objectives: Option<Vec<String>>,
    pub references: Option<Vec<ReferenceGroup>>,
    pub status: Option<Status>,
}

impl ThemePatch {
    pub fn is_empty(&self) -> bool {
        self == &ThemePatch::default()
    }

    /// Applies every field or none of them.
    pub fn apply(&self, block: &mut ThemeBlock) -> anyhow::Result<()> {
        let mut next = block.clone();
        if let Some(title) = &self.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(anyhow!("theme title cannot be empty"));
            }
            next.title = title.to_string();
        }
        if let Some(days) = self.duration_days {
            if days == 0 {
                return Err(anyhow!("theme duration must be at least one day"));
            }
            next.duration_days = days;
        }
        if let Some(objectives) = &self.objectives {
            next.objectives = clean_lines(objectives.clone());
        }
        if let Some(references) = &self.references {
            next.references = clean_references(references.clone());
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        *block = next;
        Ok(())
    }
}

fn clean_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Trims every group. Empty groups between filled ones stay as day
/// placeholders; trailing empty groups are dropped.
fn clean_references(groups: Vec<ReferenceGroup>) -> Vec<ReferenceGroup> {
    let mut cleaned: Vec<ReferenceGroup> = groups
        .into_iter()
        .map(|group| ReferenceGroup {
            remark: group.remark.trim().to_string(),
            links: clean_lines(group.links),
            used: group.used,
        })
        .collect();
    while cleaned
        .last()
        .is_some_and(|group| group.links.is_empty() && group.remark.is_empty() && !group.used)
    {
        cleaned.pop();
    }
    cleaned
}

/// One change to a theme's per-day reference groups. Days and link
/// positions are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceEdit {
    AddLink { day: u32, link: String },
    RemoveLink { day: u32, position: usize },
    SetRemark { day: u32, remark: String },
    SetUsed { day: u32, used: bool },
}

impl ReferenceEdit {
    fn day(&self) -> u32 {
        match self {
            ReferenceEdit::AddLink { day, .. }
            | ReferenceEdit::RemoveLink { day, .. }
            | ReferenceEdit::SetRemark { day, .. }
            | ReferenceEdit::SetUsed { day, .. } => *day,
        }
    }
}

/// Applies `edits` in order to a copy of `groups`, padding with empty
/// groups up to the edited day. Every day must fall in `1..=duration_days`.
pub fn edit_references(
    groups: &[ReferenceGroup],
    edits: &[ReferenceEdit],
    duration_days: u32,
) -> anyhow::Result<Vec<ReferenceGroup>> {
    let mut next = groups.to_vec();
    for edit in edits {
        let day = edit.day();
        if day == 0 || day > duration_days {
            return Err(anyhow!(
                "reference day {day} is outside the theme (1..={duration_days})"
            ));
        }
        let slot = (day - 1) as usize;
        if next.len() <= slot {
            next.resize_with(slot + 1, ReferenceGroup::default);
        }
        let group = &mut next[slot];

        match edit {
            ReferenceEdit::AddLink { link, .. } => {
                let link = link.trim();
                if link.is_empty() {
                    return Err(anyhow!("reference link cannot be empty"));
                }
                group.links.push(link.to_string());
            }
            ReferenceEdit::RemoveLink { position, .. } => {
                if *position == 0 || *position > group.links.len() {
                    return Err(anyhow!(
                        "day {day} has no reference link #{position}"
                    ));
                }
                group.links.remove(position - 1);
            }
            ReferenceEdit::SetRemark { remark, .. } => group.remark = remark.trim().to_string(),
            ReferenceEdit::SetUsed { used, .. } => group.used = *used,
        }
    }
    Ok(clean_references(next))
}
