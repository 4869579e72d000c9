use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{Artifact, OrderAssignment, ThemeStore};
use crate::theme::{NewThemeBlock, ThemeBlock, ThemePatch};

/// Local JSONL data directory: one theme block per line in `themes.data`,
/// one artifact per line in `artifacts.data`.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub themes_path: PathBuf,
    pub artifacts_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let themes_path = data_dir.join("themes.data");
        let artifacts_path = data_dir.join("artifacts.data");

        if !themes_path.exists() {
            fs::write(&themes_path, "")?;
        }
        if !artifacts_path.exists() {
            fs::write(&artifacts_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            themes = %themes_path.display(),
            artifacts = %artifacts_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            themes_path,
            artifacts_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_themes(&self) -> anyhow::Result<Vec<ThemeBlock>> {
        load_jsonl(&self.themes_path).context("failed to load themes.data")
    }

    #[tracing::instrument(skip(self, themes))]
    pub fn save_themes(&self, themes: &[ThemeBlock]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.themes_path, themes).context("failed to save themes.data")
    }

    #[tracing::instrument(skip(self))]
    pub fn load_artifacts(&self) -> anyhow::Result<Vec<Artifact>> {
        load_jsonl(&self.artifacts_path).context("failed to load artifacts.data")
    }

    #[tracing::instrument(skip(self, artifacts))]
    pub fn save_artifacts(&self, artifacts: &[Artifact]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.artifacts_path, artifacts)
            .context("failed to save artifacts.data")
    }

    pub fn next_order(&self, themes: &[ThemeBlock]) -> i64 {
        themes.iter().map(|t| t.order).max().unwrap_or(0) + 1
    }
}

impl ThemeStore for DataStore {
    fn fetch_theme_blocks(&self) -> anyhow::Result<Vec<ThemeBlock>> {
        self.load_themes()
    }

    fn fetch_artifacts(&self) -> anyhow::Result<Vec<Artifact>> {
        self.load_artifacts()
    }

    #[tracing::instrument(skip(self, assignments), fields(count = assignments.len()))]
    fn save_order(&mut self, assignments: &[OrderAssignment]) -> anyhow::Result<()> {
        let mut themes = self.load_themes()?;
        let wanted: HashMap<Uuid, i64> = assignments.iter().copied().collect();

        for id in wanted.keys() {
            if !themes.iter().any(|theme| theme.id == *id) {
                return Err(anyhow!("theme not found: {id}"));
            }
        }

        for theme in &mut themes {
            if let Some(order) = wanted.get(&theme.id) {
                theme.order = *order;
            }
        }
        themes.sort_by_key(|t| t.order);
        self.save_themes(&themes)?;
        debug!(count = wanted.len(), "saved theme order");
        Ok(())
    }

    #[tracing::instrument(skip(self, block), fields(title = %block.title))]
    fn create_theme_block(&mut self, block: NewThemeBlock) -> anyhow::Result<ThemeBlock> {
        let block = block.validated()?;
        let mut themes = self.load_themes()?;
        let created = block.into_block(Uuid::new_v4(), self.next_order(&themes));

        themes.push(created.clone());
        self.save_themes(&themes)?;
        info!(id = %created.id, order = created.order, "created theme");
        Ok(created)
    }

    #[tracing::instrument(skip(self, patch), fields(id = %id))]
    fn update_theme_block(&mut self, id: Uuid, patch: &ThemePatch) -> anyhow::Result<ThemeBlock> {
        let mut themes = self.load_themes()?;
        let theme = themes
            .iter_mut()
            .find(|theme| theme.id == id)
            .ok_or_else(|| anyhow!("theme not found: {id}"))?;
        patch.apply(theme)?;
        let updated = theme.clone();

        self.save_themes(&themes)?;
        info!(status = %updated.status, "updated theme");
        Ok(updated)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    fn delete_theme_block(&mut self, id: Uuid) -> anyhow::Result<()> {
        let themes = self.load_themes()?;
        let before_count = themes.len();
        let kept: Vec<ThemeBlock> = themes.into_iter().filter(|theme| theme.id != id).collect();
        if kept.len() == before_count {
            return Err(anyhow!("theme not found: {id}"));
        }
        self.save_themes(&kept)?;
        info!(before = before_count, after = kept.len(), "deleted theme");
        Ok(())
    }

    #[tracing::instrument(skip(self, links))]
    fn record_artifact(&mut self, day_index: u32, links: Vec<String>) -> anyhow::Result<Artifact> {
        let links: Vec<String> = links
            .into_iter()
            .map(|link| link.trim().to_string())
            .filter(|link| !link.is_empty())
            .collect();
        if links.is_empty() {
            return Err(anyhow!("at least one work link is required"));
        }

        let mut artifacts = self.load_artifacts()?;
        let recorded = match artifacts.iter_mut().find(|a| a.day_index == day_index) {
            Some(existing) => {
                existing.links.extend(links);
                existing.clone()
            }
            None => {
                let artifact = Artifact { day_index, links };
                artifacts.push(artifact.clone());
                artifact
            }
        };
        artifacts.sort_by_key(|a| a.day_index);

        self.save_artifacts(&artifacts)?;
        info!(links = recorded.links.len(), "recorded artifact");
        Ok(recorded)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: T = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(record);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, records))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, records: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = records.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for record in records {
        let serialized = serde_json::to_string(record)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
