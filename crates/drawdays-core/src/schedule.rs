use chrono::NaiveDate;
use uuid::Uuid;

use crate::board::Board;
use crate::plan::PlanWindow;
use crate::store::Artifact;
use crate::theme::{ReferenceGroup, Status};

/// One theme placed on the plan: it covers plan days
/// `first_day..first_day + duration_days`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTheme {
    pub id: Uuid,
    pub title: String,
    pub status: Status,
    pub first_day: u32,
    pub duration_days: u32,
    pub references: Vec<ReferenceGroup>,
}

impl ScheduledTheme {
    fn covers(&self, day_index: u32) -> bool {
        day_index >= self.first_day && day_index - self.first_day < self.duration_days
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayDetail {
    pub date: NaiveDate,
    pub plan_day_index: u32,
    pub theme: Option<ThemeDay>,
    pub works: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeDay {
    pub id: Uuid,
    pub title: String,
    /// Zero-based day within the theme.
    pub day_in_theme: u32,
    pub references: Option<ReferenceGroup>,
}

/// Themes laid end to end from the plan start in practice order.
#[derive(Debug, Clone)]
pub struct Schedule {
    window: PlanWindow,
    themes: Vec<ScheduledTheme>,
}

impl Schedule {
    pub fn build(window: PlanWindow, board: &Board) -> Self {
        let mut themes = Vec::with_capacity(board.len());
        let mut next_day = 0_u32;
        for block in board.ordered() {
            themes.push(ScheduledTheme {
                id: block.id,
                title: block.title.clone(),
                status: block.status,
                first_day: next_day,
                duration_days: block.duration_days,
                references: block.references.clone(),
            });
            next_day = next_day.saturating_add(block.duration_days);
        }
        Self { window, themes }
    }

    pub fn window(&self) -> &PlanWindow {
        &self.window
    }

    pub fn themes(&self) -> &[ScheduledTheme] {
        &self.themes
    }

    /// Plan days not covered by any theme.
    pub fn unscheduled_days(&self) -> u32 {
        let covered: u32 = self
            .themes
            .iter()
            .map(|theme| theme.duration_days)
            .fold(0, u32::saturating_add);
        self.window.duration_days().saturating_sub(covered)
    }

    pub fn theme_on(&self, day_index: u32) -> Option<&ScheduledTheme> {
        self.themes.iter().find(|theme| theme.covers(day_index))
    }

    /// `None` for dates outside the plan.
    pub fn day_detail(&self, date: NaiveDate, artifacts: &[Artifact]) -> Option<DayDetail> {
        let plan_day_index = self.window.day_index(date)?;
        let theme = self.theme_on(plan_day_index).map(|theme| {
            let day_in_theme = plan_day_index - theme.first_day;
            ThemeDay {
                id: theme.id,
                title: theme.title.clone(),
                day_in_theme,
                references: theme.references.get(day_in_theme as usize).cloned(),
            }
        });
        let works = artifacts
            .iter()
            .filter(|artifact| artifact.day_index == plan_day_index)
            .flat_map(|artifact| artifact.links.iter().cloned())
            .collect();

        Some(DayDetail {
            date,
            plan_day_index,
            theme,
            works,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::partition;
    use crate::theme::ThemeBlock;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn block(title: &str, status: Status, order: i64, days: u32) -> ThemeBlock {
        ThemeBlock {
            id: Uuid::new_v4(),
            title: title.to_string(),
            duration_days: days,
            objectives: vec![],
            references: vec![
                ReferenceGroup {
                    remark: format!("{title} day one"),
                    links: vec![format!("https://refs.example/{order}/1.jpg")],
                    used: false,
                },
                ReferenceGroup {
                    remark: format!("{title} day two"),
                    links: vec![format!("https://refs.example/{order}/2.jpg")],
                    used: true,
                },
            ],
            status,
            order,
        }
    }

    #[test]
    fn themes_follow_band_order() {
        let board = partition(vec![
            block("next", Status::Upcoming, 3, 4),
            block("current", Status::Active, 2, 7),
            block("first", Status::Completed, 1, 5),
        ]);
        let schedule = Schedule::build(PlanWindow::new(date(2024, 9, 17), 100), &board);

        let layout: Vec<(&str, u32)> = schedule
            .themes()
            .iter()
            .map(|theme| (theme.title.as_str(), theme.first_day))
            .collect();
        assert_eq!(layout, vec![("first", 0), ("current", 5), ("next", 12)]);
        assert_eq!(schedule.unscheduled_days(), 84);
    }

    #[test]
    fn day_detail_resolves_theme_day_and_works() {
        let board = partition(vec![
            block("first", Status::Completed, 1, 5),
            block("second", Status::Active, 2, 7),
        ]);
        let schedule = Schedule::build(PlanWindow::new(date(2024, 9, 17), 100), &board);
        let artifacts = vec![
            Artifact {
                day_index: 6,
                links: vec!["https://works.example/6a.png".to_string()],
            },
            Artifact {
                day_index: 7,
                links: vec!["https://works.example/7.png".to_string()],
            },
        ];

        // Plan day 6 is the second block's day 1.
        let detail = schedule
            .day_detail(date(2024, 9, 23), &artifacts)
            .expect("in plan");
        assert_eq!(detail.plan_day_index, 6);
        let theme = detail.theme.expect("scheduled theme");
        assert_eq!(theme.title, "second");
        assert_eq!(theme.day_in_theme, 1);
        assert_eq!(
            theme.references.map(|group| group.remark),
            Some("second day two".to_string())
        );
        assert_eq!(detail.works, vec!["https://works.example/6a.png".to_string()]);

        let past_themes = schedule
            .day_detail(date(2024, 10, 17), &artifacts)
            .expect("in plan");
        assert!(past_themes.theme.is_none());

        assert!(schedule.day_detail(date(2024, 9, 16), &artifacts).is_none());
    }

    #[test]
    fn theme_day_without_reference_group() {
        let board = partition(vec![block("long", Status::Active, 1, 10)]);
        let schedule = Schedule::build(PlanWindow::new(date(2024, 9, 17), 100), &board);
        let detail = schedule
            .day_detail(date(2024, 9, 25), &[])
            .expect("in plan");
        let theme = detail.theme.expect("scheduled theme");
        assert_eq!(theme.day_in_theme, 8);
        assert!(theme.references.is_none());
        assert!(detail.works.is_empty());
    }
}
