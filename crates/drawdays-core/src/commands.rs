use std::io::{self, Write};

use anyhow::{Context, anyhow};
use chrono::{NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::board::{EditSession, partition};
use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::{day_key, parse_day_expr, parse_month_expr, today_in_project_tz};
use crate::plan::{PlanWindow, compute_month_grid};
use crate::render::{Renderer, short_id};
use crate::schedule::Schedule;
use crate::store::{ThemeStore, resolve_theme_id};
use crate::theme::{NewThemeBlock, ReferenceEdit, ReferenceGroup, Status, ThemePatch, edit_references};

const DEFAULT_THEME_DAYS: u32 = 7;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "calendar", "board", "add", "modify", "delete", "move", "preview", "day", "work", "info",
        "_show", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let today = today_in_project_tz(Utc::now());
    let mut out = io::stdout().lock();
    run_command(store, cfg, renderer, &inv, today, &mut out)
}

/// Runs one command against `store` with an explicit `today`.
#[instrument(skip(store, cfg, renderer, inv, out), fields(command = %inv.command))]
pub fn run_command<S, W>(
    store: &mut S,
    cfg: &Config,
    renderer: &Renderer,
    inv: &Invocation,
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()>
where
    S: ThemeStore,
    W: Write,
{
    let args = inv.command_args.as_slice();
    debug!(args = ?args, %today, "dispatching command");

    match inv.command.as_str() {
        "calendar" => cmd_calendar(store, cfg, renderer, args, today, out),
        "board" => cmd_board(store, cfg, renderer, today, out),
        "add" => cmd_add(store, args, out),
        "modify" => cmd_modify(store, args, out),
        "delete" => cmd_delete(store, args, out),
        "move" => cmd_move(store, renderer, args, true, out),
        "preview" => cmd_move(store, renderer, args, false, out),
        "day" => cmd_day(store, cfg, renderer, args, today, out),
        "work" => cmd_work(store, cfg, args, today, out),
        "info" => cmd_info(store, renderer, args, out),
        "_show" => cmd_show(cfg, out),
        "help" => cmd_help(out),
        "version" => {
            writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(store, cfg, renderer, args, out))]
fn cmd_calendar<S: ThemeStore, W: Write>(
    store: &mut S,
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command calendar");

    let selector = args.first().map(String::as_str).unwrap_or("now");
    let month = parse_month_expr(selector, today)?;
    let window = cfg.plan_window(today)?;
    let week_start = cfg.week_start()?;
    let artifacts = store.fetch_artifact_flags(&window)?;

    let cells = compute_month_grid(month, &window, today, &artifacts, week_start);
    renderer.print_month(out, month, &window, week_start, &cells)?;
    writeln!(
        out,
        "{} of {} plan days have work",
        artifacts.count(),
        window.duration_days()
    )?;
    Ok(())
}

#[instrument(skip(store, cfg, renderer, out))]
fn cmd_board<S: ThemeStore, W: Write>(
    store: &mut S,
    cfg: &Config,
    renderer: &Renderer,
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command board");

    let board = partition(store.fetch_theme_blocks()?);
    renderer.print_board(out, &board)?;

    let window = cfg.plan_window(today)?;
    let schedule = Schedule::build(window, &board);
    writeln!(
        out,
        "{} of {} plan days unscheduled",
        schedule.unscheduled_days(),
        window.duration_days()
    )?;
    Ok(())
}

#[instrument(skip(store, args, out))]
fn cmd_add<S: ThemeStore, W: Write>(
    store: &mut S,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command add");

    let (title, mods) = parse_title_and_mods(args)?;
    let mut payload = NewThemeBlock {
        title,
        duration_days: DEFAULT_THEME_DAYS,
        ..NewThemeBlock::default()
    };
    for one_mod in mods {
        match one_mod {
            Mod::Days(days) => payload.duration_days = days,
            Mod::Goal(goal) => payload.objectives.push(goal),
            Mod::Remark(remark) => payload.references.push(ReferenceGroup {
                remark,
                ..ReferenceGroup::default()
            }),
            Mod::Ref(link) => match payload.references.last_mut() {
                Some(group) => group.links.push(link),
                None => payload.references.push(ReferenceGroup {
                    links: vec![link],
                    ..ReferenceGroup::default()
                }),
            },
            Mod::Title(_) | Mod::Status(_) | Mod::Unref(_) | Mod::Used(_) => {
                return Err(anyhow!("add: title/status/unref/used modifiers are not accepted here"));
            }
        }
    }

    let created = store
        .create_theme_block(payload)
        .context("failed to create theme")?;
    writeln!(
        out,
        "Created theme {} ({} days).",
        short_id(&created),
        created.duration_days
    )?;
    Ok(())
}

#[instrument(skip(store, args, out))]
fn cmd_modify<S: ThemeStore, W: Write>(
    store: &mut S,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command modify");

    let (id_token, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("modify requires a theme id"))?;
    let themes = store.fetch_theme_blocks()?;
    let id = resolve_theme_id(&themes, id_token)?;

    let theme = themes
        .iter()
        .find(|theme| theme.id == id)
        .ok_or_else(|| anyhow!("theme not found: {id}"))?;

    let mut patch = ThemePatch::default();
    let mut objectives = Vec::new();
    let mut reference_edits = Vec::new();
    for arg in rest {
        match parse_one_mod(arg)? {
            Some(Mod::Title(title)) => patch.title = Some(title),
            Some(Mod::Days(days)) => patch.duration_days = Some(days),
            Some(Mod::Status(status)) => patch.status = Some(status),
            Some(Mod::Goal(goal)) => objectives.push(goal),
            Some(Mod::Ref(value)) => {
                let (day, link) = split_day_value(&value)?;
                reference_edits.push(ReferenceEdit::AddLink {
                    day,
                    link: link.to_string(),
                });
            }
            Some(Mod::Unref(value)) => {
                let (day, position) = split_day_value(&value)?;
                let position: usize = position
                    .parse()
                    .with_context(|| format!("invalid link position: {position}"))?;
                reference_edits.push(ReferenceEdit::RemoveLink { day, position });
            }
            Some(Mod::Remark(value)) => {
                let (day, remark) = split_day_value(&value)?;
                reference_edits.push(ReferenceEdit::SetRemark {
                    day,
                    remark: remark.to_string(),
                });
            }
            Some(Mod::Used(value)) => {
                let (day, flag) = split_day_value(&value)?;
                let used = match flag.to_ascii_lowercase().as_str() {
                    "yes" | "y" | "on" | "true" | "1" => true,
                    "no" | "n" | "off" | "false" | "0" => false,
                    other => return Err(anyhow!("invalid used flag: {other}")),
                };
                reference_edits.push(ReferenceEdit::SetUsed { day, used });
            }
            None => warn!(arg = %arg, "unrecognized modifier token ignored"),
        }
    }
    if !objectives.is_empty() {
        patch.objectives = Some(objectives);
    }
    if !reference_edits.is_empty() {
        let duration = patch.duration_days.unwrap_or(theme.duration_days);
        patch.references = Some(edit_references(&theme.references, &reference_edits, duration)?);
    }
    if patch.is_empty() {
        return Err(anyhow!("modify: nothing to change"));
    }

    let updated = store.update_theme_block(id, &patch)?;
    writeln!(out, "Modified theme {}.", short_id(&updated))?;
    Ok(())
}

#[instrument(skip(store, args, out))]
fn cmd_delete<S: ThemeStore, W: Write>(
    store: &mut S,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command delete");

    let token = args
        .first()
        .ok_or_else(|| anyhow!("delete requires a theme id"))?;
    let themes = store.fetch_theme_blocks()?;
    let id = resolve_theme_id(&themes, token)?;

    store.delete_theme_block(id)?;
    writeln!(out, "Deleted theme {}.", &id.to_string()[..8])?;
    Ok(())
}

/// `move` and `preview`: apply `FROM:TO` upcoming moves inside an edit
/// session, then save or cancel it.
#[instrument(skip(store, renderer, args, out))]
fn cmd_move<S: ThemeStore, W: Write>(
    store: &mut S,
    renderer: &Renderer,
    args: &[String],
    commit: bool,
    out: &mut W,
) -> anyhow::Result<()> {
    info!(commit, "command move");

    if args.is_empty() {
        return Err(anyhow!("move requires at least one FROM:TO pair"));
    }
    let moves = args
        .iter()
        .map(|arg| parse_move(arg))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut session = EditSession::new(partition(store.fetch_theme_blocks()?));
    session.begin_edit()?;
    for (from, to) in moves {
        if let Err(err) = session.reorder(from, to) {
            session.cancel();
            return Err(err);
        }
    }

    if commit {
        session.save(store)?;
        renderer.print_board(out, session.board())
    } else {
        renderer.print_board(out, session.board())?;
        session.cancel();
        writeln!(out, "Preview only; order not saved.")?;
        Ok(())
    }
}

#[instrument(skip(store, cfg, renderer, args, out))]
fn cmd_day<S: ThemeStore, W: Write>(
    store: &mut S,
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command day");

    let selector = args.first().map(String::as_str).unwrap_or("today");
    let date = parse_day_expr(selector, today)?;
    let window = cfg.plan_window(today)?;
    ensure_unlocked(date, today, &window)?;

    let board = partition(store.fetch_theme_blocks()?);
    let artifacts = store.fetch_artifacts()?;
    let schedule = Schedule::build(window, &board);
    let detail = schedule
        .day_detail(date, &artifacts)
        .ok_or_else(|| anyhow!("{} is outside the plan", day_key(date)))?;

    renderer.print_day_detail(out, &detail, &window)
}

#[instrument(skip(store, cfg, args, out))]
fn cmd_work<S: ThemeStore, W: Write>(
    store: &mut S,
    cfg: &Config,
    args: &[String],
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command work");

    let (day_token, links) = args
        .split_first()
        .ok_or_else(|| anyhow!("work requires a day and at least one link"))?;
    let window = cfg.plan_window(today)?;

    let date = match day_token
        .to_ascii_lowercase()
        .strip_prefix("day")
        .map(str::parse::<u32>)
    {
        Some(Ok(number)) if number >= 1 => window
            .date_for_day(number - 1)
            .ok_or_else(|| anyhow!("plan has only {} days", window.duration_days()))?,
        Some(_) => return Err(anyhow!("invalid plan day: {day_token}")),
        None => parse_day_expr(day_token, today)?,
    };
    ensure_unlocked(date, today, &window)?;

    let day_index = window
        .day_index(date)
        .ok_or_else(|| anyhow!("{} is outside the plan", day_key(date)))?;
    let artifact = store.record_artifact(day_index, links.to_vec())?;
    writeln!(
        out,
        "Recorded {} work link(s) for day {} ({}).",
        artifact.links.len(),
        day_index + 1,
        day_key(date)
    )?;
    Ok(())
}

#[instrument(skip(store, renderer, args, out))]
fn cmd_info<S: ThemeStore, W: Write>(
    store: &mut S,
    renderer: &Renderer,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command info");

    let token = args
        .first()
        .ok_or_else(|| anyhow!("info requires a theme id"))?;
    let themes = store.fetch_theme_blocks()?;
    let id = resolve_theme_id(&themes, token)?;
    let theme = themes
        .iter()
        .find(|theme| theme.id == id)
        .ok_or_else(|| anyhow!("theme not found: {id}"))?;

    renderer.print_theme_info(out, theme)
}

fn cmd_show<W: Write>(cfg: &Config, out: &mut W) -> anyhow::Result<()> {
    let mut entries: Vec<_> = cfg.iter().collect();
    entries.sort();
    for (k, v) in entries {
        writeln!(out, "{k}={v}")?;
    }
    Ok(())
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "Commands: calendar [YYYY-MM|+N|-N], board, add TITLE [days:N goal:T remark:T ref:URL], \
         modify ID [title:T days:N status:S goal:T ref:DAY:URL unref:DAY:N remark:DAY:T \
         used:DAY:yes|no], delete ID, move FROM:TO..., \
         preview FROM:TO..., day [DATE], work DAY URL..., info ID, _show, version"
    )?;
    Ok(())
}

fn ensure_unlocked(
    date: NaiveDate,
    today: NaiveDate,
    window: &PlanWindow,
) -> anyhow::Result<()> {
    let Some(index) = window.day_index(date) else {
        return Err(anyhow!("{} is outside the plan", day_key(date)));
    };
    if date > today {
        return Err(anyhow!("day {} ({}) is not open yet", index + 1, day_key(date)));
    }
    Ok(())
}

/// `DAY:REST` as used by `ref:`, `unref:`, `remark:` and `used:` on modify.
fn split_day_value(value: &str) -> anyhow::Result<(u32, &str)> {
    let (day, rest) = value
        .split_once(':')
        .ok_or_else(|| anyhow!("expected DAY:VALUE, got: {value}"))?;
    let day: u32 = day
        .trim()
        .parse()
        .with_context(|| format!("invalid theme day in {value}"))?;
    Ok((day, rest.trim()))
}

/// `FROM:TO` with 1-based upcoming positions, returned zero-based.
fn parse_move(token: &str) -> anyhow::Result<(usize, usize)> {
    let (from, to) = token
        .split_once(':')
        .ok_or_else(|| anyhow!("expected FROM:TO, got: {token}"))?;
    let from: usize = from
        .trim()
        .parse()
        .with_context(|| format!("invalid position in {token}"))?;
    let to: usize = to
        .trim()
        .parse()
        .with_context(|| format!("invalid position in {token}"))?;
    if from == 0 || to == 0 {
        return Err(anyhow!("positions start at 1: {token}"));
    }
    Ok((from - 1, to - 1))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mod {
    Title(String),
    Days(u32),
    Goal(String),
    Remark(String),
    Ref(String),
    Unref(String),
    Used(String),
    Status(Status),
}

fn parse_title_and_mods(args: &[String]) -> anyhow::Result<(String, Vec<Mod>)> {
    let mut title_parts = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg)? {
            mods.push(one_mod);
            continue;
        }

        title_parts.push(arg.clone());
    }

    if title_parts.is_empty() {
        return Err(anyhow!("add: title is required"));
    }

    Ok((title_parts.join(" "), mods))
}

fn parse_one_mod(tok: &str) -> anyhow::Result<Option<Mod>> {
    let Some((key, value)) = tok.split_once(':') else {
        return Ok(None);
    };
    let value = value.trim().to_string();

    match key.to_ascii_lowercase().as_str() {
        "title" => Ok(Some(Mod::Title(value))),
        "days" | "duration" => {
            let days: u32 = value
                .parse()
                .with_context(|| format!("invalid day count: {value}"))?;
            Ok(Some(Mod::Days(days)))
        }
        "goal" | "objective" => Ok(Some(Mod::Goal(value))),
        "remark" => Ok(Some(Mod::Remark(value))),
        "ref" => Ok(Some(Mod::Ref(value))),
        "unref" => Ok(Some(Mod::Unref(value))),
        "used" => Ok(Some(Mod::Used(value))),
        "status" => Ok(Some(Mod::Status(value.parse()?))),
        _ => Ok(None),
    }
}
