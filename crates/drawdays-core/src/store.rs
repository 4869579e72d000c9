use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plan::{ArtifactFlags, PlanWindow};
use crate::theme::{NewThemeBlock, ThemeBlock, ThemePatch};

/// Work recorded for one plan day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    pub day_index: u32,
    #[serde(default)]
    pub links: Vec<String>,
}

/// `(id, order)` pair committed when an edit session is saved.
pub type OrderAssignment = (Uuid, i64);

/// Persistence collaborator behind the board and the calendar.
///
/// Calls are blocking request/response. An `Err` means nothing was written.
pub trait ThemeStore {
    fn fetch_theme_blocks(&self) -> anyhow::Result<Vec<ThemeBlock>>;

    fn fetch_artifacts(&self) -> anyhow::Result<Vec<Artifact>>;

    fn fetch_artifact_flags(&self, window: &PlanWindow) -> anyhow::Result<ArtifactFlags> {
        let artifacts = self.fetch_artifacts()?;
        Ok(ArtifactFlags::from_days(
            window,
            artifacts
                .iter()
                .filter(|artifact| !artifact.links.is_empty())
                .map(|artifact| artifact.day_index),
        ))
    }

    fn save_order(&mut self, assignments: &[OrderAssignment]) -> anyhow::Result<()>;

    fn create_theme_block(&mut self, block: NewThemeBlock) -> anyhow::Result<ThemeBlock>;

    fn update_theme_block(&mut self, id: Uuid, patch: &ThemePatch) -> anyhow::Result<ThemeBlock>;

    fn delete_theme_block(&mut self, id: Uuid) -> anyhow::Result<()>;

    /// Appends `links` to the artifact of `day_index`, creating it if needed.
    fn record_artifact(&mut self, day_index: u32, links: Vec<String>) -> anyhow::Result<Artifact>;
}

/// Resolves a full uuid or an unambiguous uuid prefix against `themes`.
pub fn resolve_theme_id(themes: &[ThemeBlock], token: &str) -> anyhow::Result<Uuid> {
    let token = token.trim().to_ascii_lowercase();
    if token.is_empty() {
        return Err(anyhow!("theme id cannot be empty"));
    }
    if let Ok(id) = Uuid::parse_str(&token)
        && themes.iter().any(|theme| theme.id == id)
    {
        return Ok(id);
    }

    let mut matches = themes
        .iter()
        .filter(|theme| theme.id.to_string().starts_with(&token));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no theme matches id {token}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("id prefix {token} is ambiguous"));
    }
    Ok(first.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::NewThemeBlock;

    fn block(id: &str, title: &str) -> ThemeBlock {
        NewThemeBlock {
            title: title.to_string(),
            duration_days: 3,
            ..NewThemeBlock::default()
        }
        .into_block(Uuid::parse_str(id).expect("uuid"), 1)
    }

    #[test]
    fn ids_resolve_by_unique_prefix() {
        let themes = vec![
            block("aaaa1111-0000-4000-8000-000000000001", "Gesture"),
            block("aaaa2222-0000-4000-8000-000000000002", "Color"),
        ];
        assert_eq!(
            resolve_theme_id(&themes, "AAAA2").expect("prefix"),
            themes[1].id
        );
        assert_eq!(
            resolve_theme_id(&themes, "aaaa1111-0000-4000-8000-000000000001").expect("full"),
            themes[0].id
        );
        assert!(resolve_theme_id(&themes, "aaaa").is_err());
        assert!(resolve_theme_id(&themes, "bbbb").is_err());
        assert!(resolve_theme_id(&themes, " ").is_err());
    }
}
