use chrono::NaiveDate;
use drawdays_core::board::{EditSession, SessionState, partition};
use drawdays_core::cli::Invocation;
use drawdays_core::commands::run_command;
use drawdays_core::config::Config;
use drawdays_core::datastore::DataStore;
use drawdays_core::plan::PlanWindow;
use drawdays_core::render::Renderer;
use drawdays_core::store::ThemeStore;
use drawdays_core::theme::{NewThemeBlock, ReferenceGroup, Status, ThemePatch};
use tempfile::tempdir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn new_theme(title: &str, days: u32) -> NewThemeBlock {
    NewThemeBlock {
        title: title.to_string(),
        duration_days: days,
        ..NewThemeBlock::default()
    }
}

fn test_config() -> Config {
    let mut cfg = Config::defaults();
    cfg.apply_overrides(vec![
        ("rc.plan.start".to_string(), "2024-09-17".to_string()),
        ("rc.plan.duration".to_string(), "100".to_string()),
        ("rc.color".to_string(), "off".to_string()),
    ]);
    cfg
}

fn run(store: &mut DataStore, cfg: &Config, today: NaiveDate, command: &str, args: &[&str]) -> anyhow::Result<String> {
    let renderer = Renderer::new(cfg)?;
    let inv = Invocation {
        command: command.to_string(),
        command_args: args.iter().map(|arg| arg.to_string()).collect(),
    };
    let mut out = Vec::new();
    run_command(store, cfg, &renderer, &inv, today, &mut out)?;
    Ok(String::from_utf8(out)?)
}

#[test]
fn created_themes_join_the_end_of_the_upcoming_band() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");

    let a = store.create_theme_block(new_theme("Gesture", 5)).expect("create a");
    let b = store.create_theme_block(new_theme("  Color  ", 7)).expect("create b");
    assert_eq!(a.status, Status::Upcoming);
    assert_eq!((a.order, b.order), (1, 2));
    assert_eq!(b.title, "Color");

    assert!(store.create_theme_block(new_theme("   ", 5)).is_err());
    assert!(store.create_theme_block(new_theme("Perspective", 0)).is_err());
    assert_eq!(store.fetch_theme_blocks().expect("fetch").len(), 2);
}

#[test]
fn saved_session_renumbers_upcoming_above_active() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");

    let a = store.create_theme_block(new_theme("Gesture", 5)).expect("create a");
    let b = store.create_theme_block(new_theme("Color", 5)).expect("create b");
    let c = store.create_theme_block(new_theme("Anatomy", 5)).expect("create c");
    store
        .update_theme_block(
            a.id,
            &ThemePatch {
                status: Some(Status::Active),
                ..ThemePatch::default()
            },
        )
        .expect("activate a");

    let mut session = EditSession::new(partition(store.fetch_theme_blocks().expect("fetch")));
    session.begin_edit().expect("edit");
    session.reorder(1, 0).expect("reorder");
    session.save(&mut store).expect("save");
    assert_eq!(session.state(), SessionState::Browsing);

    let board = partition(store.fetch_theme_blocks().expect("fetch"));
    let titles: Vec<_> = board.upcoming.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Anatomy", "Color"]);
    let ids: Vec<_> = board.upcoming.iter().map(|t| (t.id, t.order)).collect();
    assert_eq!(ids, vec![(c.id, 2), (b.id, 3)]);
    assert_eq!(board.active[0].order, 1);
}

#[test]
fn save_order_with_unknown_id_writes_nothing() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let a = store.create_theme_block(new_theme("Gesture", 5)).expect("create a");

    let before = std::fs::read_to_string(&store.themes_path).expect("read");
    let result = store.save_order(&[(a.id, 9), (uuid::Uuid::new_v4(), 10)]);
    assert!(result.is_err());
    let after = std::fs::read_to_string(&store.themes_path).expect("read");
    assert_eq!(before, after);
}

#[test]
fn artifacts_accumulate_per_day() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let window = PlanWindow::new(date(2024, 9, 17), 100);

    store
        .record_artifact(3, vec!["https://img.example/a.png".to_string()])
        .expect("record");
    let merged = store
        .record_artifact(3, vec![" https://img.example/b.png ".to_string(), "".to_string()])
        .expect("record again");
    assert_eq!(merged.links.len(), 2);
    assert!(store.record_artifact(4, vec!["  ".to_string()]).is_err());

    let flags = store.fetch_artifact_flags(&window).expect("flags");
    assert!(flags.get(3));
    assert!(!flags.get(4));
    assert_eq!(flags.count(), 1);
}

#[test]
fn delete_removes_only_the_named_theme() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let a = store.create_theme_block(new_theme("Gesture", 5)).expect("create a");
    let b = store.create_theme_block(new_theme("Color", 5)).expect("create b");

    store.delete_theme_block(a.id).expect("delete");
    assert!(store.delete_theme_block(a.id).is_err());
    let left = store.fetch_theme_blocks().expect("fetch");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, b.id);
}

#[test]
fn command_flow_from_add_to_day_detail() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = test_config();
    let today = date(2024, 9, 20);

    let added = run(
        &mut store,
        &cfg,
        today,
        "add",
        &["Quick", "gesture", "days:2", "goal:loose lines", "remark:warmup", "ref:https://refs.example/1.jpg"],
    )
    .expect("add");
    assert!(added.starts_with("Created theme"));
    run(&mut store, &cfg, today, "add", &["Color", "studies"]).expect("add second");

    let themes = store.fetch_theme_blocks().expect("fetch");
    assert_eq!(themes[0].duration_days, 2);
    assert_eq!(themes[1].duration_days, 7);
    assert_eq!(
        themes[0].references,
        vec![ReferenceGroup {
            remark: "warmup".to_string(),
            links: vec!["https://refs.example/1.jpg".to_string()],
            used: false,
        }]
    );

    run(&mut store, &cfg, today, "move", &["2:1"]).expect("move");
    let board = partition(store.fetch_theme_blocks().expect("fetch"));
    assert_eq!(board.upcoming[0].title, "Color studies");
    assert_eq!(board.upcoming[0].order, 1);

    let preview = run(&mut store, &cfg, today, "preview", &["1:2"]).expect("preview");
    assert!(preview.contains("not saved"));
    let unchanged = partition(store.fetch_theme_blocks().expect("fetch"));
    assert_eq!(unchanged.upcoming[0].title, "Color studies");

    assert!(run(&mut store, &cfg, today, "move", &["1:5"]).is_err());

    run(&mut store, &cfg, today, "work", &["day1", "https://img.example/day1.png"]).expect("work");
    assert!(run(&mut store, &cfg, today, "work", &["2024-09-25", "https://x"]).is_err());

    let calendar = run(&mut store, &cfg, today, "calendar", &["2024-09"]).expect("calendar");
    assert!(calendar.contains("17*"));
    assert!(calendar.contains("20@"));
    assert!(calendar.contains("Day 1 view"));
    assert!(calendar.contains("Day 5 locked"));
    assert!(calendar.contains("1 of 100 plan days have work"));

    let day = run(&mut store, &cfg, today, "day", &["2024-09-17"]).expect("day");
    assert!(day.contains("Color studies (day 1)"));
    assert!(day.contains("https://img.example/day1.png"));
    assert!(run(&mut store, &cfg, today, "day", &["2024-09-21"]).is_err());
    assert!(run(&mut store, &cfg, today, "day", &["2024-09-01"]).is_err());
}

#[test]
fn modify_edits_references_by_theme_day() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = test_config();
    let today = date(2024, 9, 20);

    run(
        &mut store,
        &cfg,
        today,
        "add",
        &["Hands", "days:3", "ref:https://refs.example/1.jpg", "ref:https://refs.example/2.jpg"],
    )
    .expect("add");
    let id = store.fetch_theme_blocks().expect("fetch")[0].id.to_string();

    run(
        &mut store,
        &cfg,
        today,
        "modify",
        &[
            &id[..8],
            "unref:1:1",
            "used:1:yes",
            "ref:3:https://refs.example/3.jpg",
            "remark:3:foreshortening",
        ],
    )
    .expect("modify references");

    let theme = store.fetch_theme_blocks().expect("fetch").remove(0);
    assert_eq!(
        theme.references,
        vec![
            ReferenceGroup {
                remark: String::new(),
                links: vec!["https://refs.example/2.jpg".to_string()],
                used: true,
            },
            ReferenceGroup::default(),
            ReferenceGroup {
                remark: "foreshortening".to_string(),
                links: vec!["https://refs.example/3.jpg".to_string()],
                used: false,
            },
        ]
    );

    let day_three = run(&mut store, &cfg, today, "day", &["2024-09-19"]).expect("day");
    assert!(day_three.contains("Hands (day 3)"));
    assert!(day_three.contains("https://refs.example/3.jpg"));

    assert!(run(&mut store, &cfg, today, "modify", &[&id[..8], "ref:4:https://x"]).is_err());
    assert!(run(&mut store, &cfg, today, "modify", &[&id[..8], "unref:2:1"]).is_err());
    assert!(run(&mut store, &cfg, today, "modify", &[&id[..8], "used:1:maybe"]).is_err());
    let unchanged = store.fetch_theme_blocks().expect("fetch").remove(0);
    assert_eq!(unchanged.references, theme.references);
}
