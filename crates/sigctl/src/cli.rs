use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use common::banner::{group_thousands, sources, Compositor};
use common::cache::HiscoreCache;
use common::fetcher::HiscoreFetcher;
use common::subject::Subject;
use common::types::{ClanRoster, PlayerCard, SkillRecord};

const USAGE: &str = "usage: sigctl <stats|refresh|ledger|roster|render> ...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Stats { name: String, json: bool },
    Refresh { name: String },
    Ledger { name: String },
    Roster { clan: String },
    Render {
        name: String,
        theme: Option<usize>,
        out: Option<PathBuf>,
    },
}

pub fn parse_args<I>(mut args: I) -> std::result::Result<Command, String>
where
    I: Iterator<Item = String>,
{
    // Drop argv[0].
    let _ = args.next();

    let Some(cmd) = args.next() else {
        return Err(USAGE.to_string());
    };

    match cmd.as_str() {
        "stats" => {
            let name = args
                .next()
                .ok_or_else(|| "usage: sigctl stats <player> [--json]".to_string())?;
            let json = match args.next().as_deref() {
                None => false,
                Some("--json") => true,
                Some(other) => return Err(format!("unexpected argument: {other}")),
            };
            Ok(Command::Stats { name, json })
        }
        "refresh" => {
            let name = args
                .next()
                .ok_or_else(|| "usage: sigctl refresh <player>".to_string())?;
            Ok(Command::Refresh { name })
        }
        "ledger" => {
            let name = args
                .next()
                .ok_or_else(|| "usage: sigctl ledger <player>".to_string())?;
            Ok(Command::Ledger { name })
        }
        "roster" => {
            // Clan names contain spaces; take the rest of the line.
            let clan = args.collect::<Vec<_>>().join(" ");
            if clan.trim().is_empty() {
                return Err("usage: sigctl roster <clan name>".to_string());
            }
            Ok(Command::Roster { clan })
        }
        "render" => parse_render(args),
        other => Err(format!("unknown command: {other}\n{USAGE}")),
    }
}

fn parse_render<I>(mut args: I) -> std::result::Result<Command, String>
where
    I: Iterator<Item = String>,
{
    let usage = || "usage: sigctl render <player> [--theme N] [--out FILE]".to_string();
    let name = args.next().ok_or_else(usage)?;
    let mut theme = None;
    let mut out = None;
    while let Some(flag) = args.next() {
        let value = args.next().ok_or_else(usage)?;
        match flag.as_str() {
            "--theme" => {
                theme = Some(
                    value
                        .parse()
                        .map_err(|e| format!("--theme expects a number, got {value}: {e}"))?,
                );
            }
            "--out" => out = Some(PathBuf::from(value)),
            _ => return Err(usage()),
        }
    }
    Ok(Command::Render { name, theme, out })
}

pub struct Session<'a, F> {
    pub cache: &'a HiscoreCache<F>,
    pub compositor: &'a Compositor,
    pub default_theme: usize,
    pub now: i64,
}

pub async fn run_command<F: HiscoreFetcher>(ctx: &Session<'_, F>, cmd: Command) -> Result<()> {
    match cmd {
        Command::Stats { name, json } => {
            let card = ctx.cache.player(&Subject::player(&name)?, ctx.now).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&card)?);
            } else {
                print!("{}", format_card(&card));
            }
            Ok(())
        }
        Command::Refresh { name } => {
            let card = ctx
                .cache
                .refresh_player(&Subject::player(&name)?, ctx.now)
                .await?;
            println!("{} refreshed, last updated {}", card.name, format_time(card.last_updated));
            Ok(())
        }
        Command::Ledger { name } => {
            print!("{}", format_ledger(ctx, &Subject::player(&name)?)?);
            Ok(())
        }
        Command::Roster { clan } => {
            let roster = ctx.cache.clan(&Subject::clan(&clan)?, ctx.now).await?;
            print!("{}", format_roster(&roster));
            Ok(())
        }
        Command::Render { name, theme, out } => {
            let path = render(ctx, &name, theme, out).await?;
            println!("wrote {}", path.display());
            Ok(())
        }
    }
}

async fn render<F: HiscoreFetcher>(
    ctx: &Session<'_, F>,
    name: &str,
    theme: Option<usize>,
    out: Option<PathBuf>,
) -> Result<PathBuf> {
    let player = Subject::player(name)?;
    let sources = sources::gather(ctx.cache, &player, ctx.now).await?;
    let banner = ctx
        .compositor
        .render(&sources.request(theme.unwrap_or(ctx.default_theme)));
    for missing in &banner.missing {
        tracing::info!(kind = missing.kind, reason = %missing.reason, "asset left out");
    }
    let path = out.unwrap_or_else(|| PathBuf::from(format!("{}.png", player.key())));
    std::fs::write(&path, banner.encode_png()?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn format_time(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map_or_else(|| ts.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

fn format_record(out: &mut String, r: &SkillRecord) {
    let _ = writeln!(
        out,
        "{:<14} {:>10} {:>5} {:>6} {:>13} {:>6.1}%{}",
        r.stat.as_str(),
        r.rank,
        group_thousands(u64::from(r.level)),
        group_thousands(u64::from(r.virtual_level)),
        group_thousands(r.experience),
        r.progress * 100.0,
        if r.maxed { "  maxed" } else { "" },
    );
}

pub fn format_card(card: &PlayerCard) -> String {
    let summary = &card.summary;
    let mut out = format!("{}  (updated {})\n", card.name, format_time(card.last_updated));
    if let Some(profile) = &summary.profile {
        let _ = writeln!(
            out,
            "clan: {}  title: {}",
            profile.clan.as_deref().unwrap_or("-"),
            if profile.title.is_empty() { "-" } else { &profile.title },
        );
    }
    let _ = writeln!(
        out,
        "{:<14} {:>10} {:>5} {:>6} {:>13} {:>7}",
        "stat", "rank", "level", "virt", "xp", "next"
    );
    format_record(&mut out, &summary.overall);
    format_record(&mut out, &summary.experience);
    for record in &summary.skills {
        format_record(&mut out, record);
    }
    let _ = writeln!(
        out,
        "total virtual level {}",
        group_thousands(u64::from(summary.total_virtual_level))
    );
    out
}

fn format_ledger<F: HiscoreFetcher>(ctx: &Session<'_, F>, player: &Subject) -> Result<String> {
    let freshness = ctx.cache.ledger().is_stale(player, ctx.now)?;
    let mut out = String::new();
    match ctx.cache.ledger().last_success(player)? {
        Some(ts) => {
            let _ = writeln!(out, "{player}: last fetched {}", format_time(ts));
        }
        None => {
            let _ = writeln!(out, "{player}: never fetched");
        }
    }
    let _ = writeln!(out, "stale: {}", freshness.stale);
    let history = ctx.cache.store().history(player).unwrap_or_default();
    let _ = writeln!(out, "snapshots: {}", history.len());
    for ts in history {
        let _ = writeln!(out, "  {ts}  {}", format_time(ts));
    }
    Ok(out)
}

pub fn format_roster(roster: &ClanRoster) -> String {
    let mut out = format!("{} ({} members)\n", roster.name, roster.members.len());
    for m in &roster.members {
        let _ = writeln!(
            out,
            "{:<14} {:<16} {:>15} {:>6}",
            m.name,
            m.rank,
            group_thousands(m.total_xp),
            m.kills
        );
    }
    out
}
