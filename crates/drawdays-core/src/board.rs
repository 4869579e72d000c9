//! Theme blocks grouped by status, plus the staged reorder session.
//!
//! Orders follow fixed bands: completed blocks lowest, active blocks in the
//! middle, upcoming blocks highest. Only the upcoming band is ever reordered
//! here, and every reorder renumbers it so the bands stay disjoint.

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::store::{OrderAssignment, ThemeStore};
use crate::theme::{Status, ThemeBlock};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    pub active: Vec<ThemeBlock>,
    pub upcoming: Vec<ThemeBlock>,
    pub completed: Vec<ThemeBlock>,
}

/// Splits `blocks` by status, each group sorted by `order`. Ties keep input
/// order.
pub fn partition<I>(blocks: I) -> Board
where
    I: IntoIterator<Item = ThemeBlock>,
{
    let mut board = Board::default();
    for block in blocks {
        match block.status {
            Status::Active => board.active.push(block),
            Status::Upcoming => board.upcoming.push(block),
            Status::Completed => board.completed.push(block),
        }
    }
    board.active.sort_by_key(|block| block.order);
    board.upcoming.sort_by_key(|block| block.order);
    board.completed.sort_by_key(|block| block.order);
    board
}

/// Moves the block at `from` to position `to` and renumbers the whole
/// sequence to `band_floor + 1, band_floor + 2, ...`.
///
/// With active blocks numbered `1..=n`, `band_floor` is the active count `n`.
///
/// Panics if either index is out of range.
pub fn reorder_upcoming(
    upcoming: &[ThemeBlock],
    from: usize,
    to: usize,
    band_floor: i64,
) -> Vec<ThemeBlock> {
    assert!(
        from < upcoming.len() && to < upcoming.len(),
        "reorder indices {from} -> {to} out of range for {} upcoming blocks",
        upcoming.len()
    );

    let mut next = upcoming.to_vec();
    let moved = next.remove(from);
    next.insert(to, moved);
    for (idx, block) in next.iter_mut().enumerate() {
        block.order = band_floor + idx as i64 + 1;
    }
    next
}

impl Board {
    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.upcoming.is_empty() && self.completed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.upcoming.len() + self.completed.len()
    }

    /// Completed, then active, then upcoming: the order the blocks are
    /// practised in.
    pub fn ordered(&self) -> impl Iterator<Item = &ThemeBlock> {
        self.completed
            .iter()
            .chain(self.active.iter())
            .chain(self.upcoming.iter())
    }

    /// Highest order the upcoming band must stay above: the active count, or
    /// any larger order already used by an active or completed block.
    pub fn band_floor(&self) -> i64 {
        let active_count = self.active.len() as i64;
        self.active
            .iter()
            .chain(self.completed.iter())
            .map(|block| block.order)
            .fold(active_count, i64::max)
    }

    pub fn reorder_upcoming(&mut self, from: usize, to: usize) -> anyhow::Result<()> {
        let len = self.upcoming.len();
        if from >= len || to >= len {
            return Err(anyhow!(
                "position out of range: {} -> {} (upcoming has {len} blocks)",
                from + 1,
                to + 1
            ));
        }
        self.upcoming = reorder_upcoming(&self.upcoming, from, to, self.band_floor());
        Ok(())
    }

    pub fn order_assignments(&self) -> Vec<OrderAssignment> {
        self.upcoming
            .iter()
            .map(|block| (block.id, block.order))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Browsing,
    Editing,
}

/// Two-state edit session over a committed board.
///
/// While editing, reorders touch a staged copy only. `cancel` drops it,
/// `save` commits it through the store and stays in `Editing` on failure.
#[derive(Debug, Clone)]
pub struct EditSession {
    committed: Board,
    staged: Option<Board>,
}

impl EditSession {
    pub fn new(committed: Board) -> Self {
        Self {
            committed,
            staged: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.staged.is_some() {
            SessionState::Editing
        } else {
            SessionState::Browsing
        }
    }

    /// The board to display: staged while editing, committed otherwise.
    pub fn board(&self) -> &Board {
        self.staged.as_ref().unwrap_or(&self.committed)
    }

    pub fn committed(&self) -> &Board {
        &self.committed
    }

    #[instrument(skip(self))]
    pub fn begin_edit(&mut self) -> anyhow::Result<()> {
        if self.staged.is_some() {
            return Err(anyhow!("an edit session is already open"));
        }
        debug!(upcoming = self.committed.upcoming.len(), "entering edit mode");
        self.staged = Some(self.committed.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn reorder(&mut self, from: usize, to: usize) -> anyhow::Result<()> {
        let staged = self
            .staged
            .as_mut()
            .ok_or_else(|| anyhow!("reordering requires an open edit session"))?;
        staged.reorder_upcoming(from, to)?;
        debug!(from, to, "staged upcoming reorder");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn cancel(&mut self) {
        if self.staged.take().is_some() {
            info!("discarded staged order");
        }
    }

    #[instrument(skip(self, store))]
    pub fn save(&mut self, store: &mut dyn ThemeStore) -> anyhow::Result<()> {
        let staged = self
            .staged
            .as_ref()
            .ok_or_else(|| anyhow!("nothing to save outside an edit session"))?;
        let assignments = staged.order_assignments();

        if let Err(err) = store.save_order(&assignments) {
            warn!(error = %err, "saving order failed; staying in edit mode");
            return Err(err).context("failed to save upcoming order");
        }

        if let Some(staged) = self.staged.take() {
            self.committed = staged;
        }
        info!(count = assignments.len(), "committed upcoming order");
        Ok(())
    }
}
