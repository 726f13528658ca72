//! Turns a stored player snapshot into typed, derived stats.
//!
//! A snapshot is newline-delimited: one `rank,level,experience` row for Overall,
//! one per [`Skill::ALL`] entry, optionally more activity rows (ignored), and
//! optionally a final line holding the profile object.

use thiserror::Error;

use crate::types::{AccountSummary, ProfileMeta, Skill, SkillRecord, Stat};
use crate::xp_table::{display_cap_xp, level_from_xp, xp_for_level, DISPLAY_CAP, MAX_SKILL_XP};

/// Overall plus one row per skill.
pub const STAT_ROWS: usize = Skill::ALL.len() + 1;

/// Experience of an account with every skill at the ceiling.
pub const MAX_TOTAL_XP: u64 = MAX_SKILL_XP * Skill::ALL.len() as u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatError {
    #[error("snapshot is not valid utf-8")]
    NotUtf8,
    #[error("snapshot has {found} rows, expected at least {expected}")]
    Truncated { expected: usize, found: usize },
    #[error("row {line} ({stat}) is malformed: {row:?}")]
    MalformedRow {
        line: usize,
        stat: &'static str,
        row: String,
    },
}

/// One parsed `rank,level,experience` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawRow {
    rank: i64,
    level: u32,
    experience: u64,
}

/// Derive an [`AccountSummary`] from snapshot bytes.
///
/// Fails on anything short of a full set of stat rows; a missing or unreadable
/// profile line only leaves `profile` empty.
pub fn derive(bytes: &[u8]) -> Result<AccountSummary, StatError> {
    let text = std::str::from_utf8(bytes).map_err(|_| StatError::NotUtf8)?;
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() < STAT_ROWS {
        return Err(StatError::Truncated {
            expected: STAT_ROWS,
            found: lines.len(),
        });
    }

    let overall_row = parse_row(lines[0], 0, Stat::Overall)?;
    let skills = Skill::ALL
        .iter()
        .enumerate()
        .map(|(i, skill)| {
            let line = i + 1;
            parse_row(lines[line], line, Stat::Skill(*skill)).map(|row| skill_record(*skill, row))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let profile = if lines.len() > STAT_ROWS {
        lines.last().and_then(|l| parse_profile_line(l))
    } else {
        None
    };

    Ok(summarize(overall_row, skills, profile))
}

fn parse_row(line: &str, index: usize, stat: Stat) -> Result<RawRow, StatError> {
    let malformed = || StatError::MalformedRow {
        line: index,
        stat: stat.as_str(),
        row: line.to_string(),
    };
    let mut fields = line.split(',').map(str::trim);
    let mut next_num = || -> Result<i64, StatError> {
        fields
            .next()
            .and_then(|f| f.parse::<i64>().ok())
            .ok_or_else(&malformed)
    };
    let rank = next_num()?;
    let level = next_num()?;
    let experience = next_num()?;
    Ok(RawRow {
        rank,
        // Unranked rows come through as `-1,1,-1`.
        level: u32::try_from(level.max(0)).map_err(|_| malformed())?,
        experience: u64::try_from(experience.max(0)).map_err(|_| malformed())?,
    })
}

/// Parse the trailing profile object. Anything not object-shaped yields `None`.
pub fn parse_profile_line(line: &str) -> Option<ProfileMeta> {
    let line = line.trim();
    if !(line.starts_with('{') && line.ends_with('}')) {
        return None;
    }
    serde_json::from_str(line).ok()
}

fn skill_record(skill: Skill, row: RawRow) -> SkillRecord {
    let track = skill.track();
    let virtual_level = level_from_xp(row.experience, track);
    SkillRecord {
        stat: Stat::Skill(skill),
        rank: row.rank,
        level: row.level,
        experience: row.experience,
        virtual_level,
        progress: level_progress(row.experience, virtual_level, skill),
        // Reported level, not virtual: display caps at 99 on every track.
        maxed: row.level >= DISPLAY_CAP,
    }
}

/// Fraction of the way from `level` to `level + 1`; exactly 1.0 at the cap.
fn level_progress(experience: u64, level: u32, skill: Skill) -> f64 {
    let track = skill.track();
    if level >= track.level_cap() {
        return 1.0;
    }
    let floor = xp_for_level(level, track);
    let next = xp_for_level(level + 1, track);
    experience.saturating_sub(floor) as f64 / (next - floor) as f64
}

/// Second pass: fold the finished skill records into the two synthetic rows.
fn summarize(
    overall_row: RawRow,
    skills: Vec<SkillRecord>,
    profile: Option<ProfileMeta>,
) -> AccountSummary {
    let total_virtual_level: u32 = skills.iter().map(|r| r.virtual_level).sum();
    let total_experience: u64 = skills.iter().map(|r| r.experience).sum();

    let capped_levels: u32 = skills.iter().map(|r| r.level.min(DISPLAY_CAP)).sum();
    let maxed_threshold = DISPLAY_CAP * Skill::ALL.len() as u32;

    let (capped_xp, cap_xp_total) = Skill::ALL
        .iter()
        .zip(&skills)
        .fold((0u64, 0u64), |(capped, total), (skill, record)| {
            let cap = display_cap_xp(skill.track());
            (capped + record.experience.min(cap), total + cap)
        });

    let overall = SkillRecord {
        stat: Stat::Overall,
        rank: overall_row.rank,
        level: overall_row.level,
        experience: overall_row.experience,
        virtual_level: total_virtual_level,
        progress: (capped_xp as f64 / cap_xp_total as f64).min(1.0),
        maxed: capped_levels >= maxed_threshold,
    };

    let experience = SkillRecord {
        stat: Stat::Experience,
        rank: overall_row.rank,
        level: overall_row.level,
        experience: total_experience,
        virtual_level: total_virtual_level,
        progress: (total_experience as f64 / MAX_TOTAL_XP as f64).min(1.0),
        maxed: total_experience == MAX_TOTAL_XP,
    };

    AccountSummary {
        overall,
        experience,
        skills,
        total_virtual_level,
        total_experience,
        profile,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Track;

    const XP_99: u64 = 13_034_431;

    /// Snapshot with the same row for every skill and an Overall row derived from it.
    fn uniform_snapshot(level: u32, xp: u64) -> String {
        let n = Skill::ALL.len() as u64;
        let mut out = format!("1,{},{}\n", u64::from(level) * n, xp * n);
        for _ in Skill::ALL {
            out.push_str(&format!("1,{level},{xp}\n"));
        }
        out
    }

    fn snapshot_with(rows: &[(Skill, &str)]) -> String {
        let mut out = String::from("500,1000,5000000\n");
        for skill in Skill::ALL {
            let row = rows
                .iter()
                .find(|(s, _)| *s == skill)
                .map_or("100,50,101333", |(_, r)| *r);
            out.push_str(row);
            out.push('\n');
        }
        out
    }

    #[test]
    fn test_exact_99_threshold_is_level_99_and_maxed() {
        let summary = derive(snapshot_with(&[(Skill::Attack, "1,99,13034431")]).as_bytes()).unwrap();
        let attack = summary.skill(Skill::Attack).unwrap();
        assert_eq!(attack.virtual_level, 99);
        assert!(attack.maxed);
        assert!(attack.progress.abs() < f64::EPSILON);
    }

    #[test]
    fn test_truncated_snapshot_is_fatal() {
        let rows: String = (0..10).map(|_| "1,99,13034431\n").collect();
        let err = derive(rows.as_bytes()).unwrap_err();
        assert_eq!(
            err,
            StatError::Truncated {
                expected: 28,
                found: 10
            }
        );
    }

    #[test]
    fn test_malformed_row_is_fatal() {
        let raw = snapshot_with(&[(Skill::Magic, "1,nope,3")]);
        let err = derive(raw.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            StatError::MalformedRow { line: 7, stat: "Magic", .. }
        ));
    }

    #[test]
    fn test_non_object_trailing_line_leaves_profile_empty() {
        let mut raw = snapshot_with(&[]);
        raw.push_str("jQuery000({\"clan\":\"x\"\n");
        let summary = derive(raw.as_bytes()).unwrap();
        assert!(summary.profile.is_none());
        assert_eq!(summary.skills.len(), 27);
    }

    #[test]
    fn test_trailing_profile_object_is_parsed() {
        let mut raw = snapshot_with(&[]);
        raw.push_str("-1,-1\n");
        raw.push_str(
            r#"{"isSuffix":true,"recruiting":true,"name":"Berserkguard","clan":"Chronic Demise","title":"the Insane"}"#,
        );
        let summary = derive(raw.as_bytes()).unwrap();
        let profile = summary.profile.as_ref().unwrap();
        assert_eq!(profile.title, "the Insane");
        assert!(profile.is_suffix);
        assert_eq!(summary.clan(), Some("Chronic Demise"));
    }

    #[test]
    fn test_null_title_and_missing_clan() {
        let profile = parse_profile_line(r#"{"isSuffix":false,"title":null}"#).unwrap();
        assert_eq!(profile.title, "");
        assert_eq!(profile.clan, None);
    }

    #[test]
    fn test_elite_skill_uses_elite_table_but_display_maxed() {
        let summary = derive(snapshot_with(&[(Skill::Invention, "9,99,80618654")]).as_bytes()).unwrap();
        let invention = summary.skill(Skill::Invention).unwrap();
        assert_eq!(invention.virtual_level, 120);
        assert!(invention.maxed);
        assert!(invention.progress < 1.0);

        // Same experience on a standard skill lands lower on the standard curve.
        let summary = derive(snapshot_with(&[(Skill::Slayer, "9,99,80618654")]).as_bytes()).unwrap();
        assert_eq!(summary.skill(Skill::Slayer).unwrap().virtual_level, 117);
    }

    #[test]
    fn test_maxed_follows_reported_level_only() {
        let summary = derive(snapshot_with(&[(Skill::Cooking, "1,98,200000000")]).as_bytes()).unwrap();
        let cooking = summary.skill(Skill::Cooking).unwrap();
        assert_eq!(cooking.virtual_level, 120);
        assert!(!cooking.maxed);
        assert!((cooking.progress - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_progress_bounds_and_cap() {
        let summary = derive(uniform_snapshot(99, 50_000_000).as_bytes()).unwrap();
        for record in &summary.skills {
            assert!((0.0..=1.0).contains(&record.progress));
            let Stat::Skill(skill) = record.stat else {
                panic!("unexpected stat in skills");
            };
            let at_cap = record.virtual_level >= skill.track().level_cap();
            assert_eq!((record.progress - 1.0).abs() < f64::EPSILON, at_cap);
        }
    }

    #[test]
    fn test_overall_maxed_needs_every_skill_at_99() {
        let maxed = derive(uniform_snapshot(99, XP_99).as_bytes()).unwrap();
        assert!(maxed.overall.maxed);
        assert_eq!(maxed.total_virtual_level, 26 * 99 + 77);

        let raw = uniform_snapshot(99, XP_99).replacen("\n1,99,", "\n1,98,", 1);
        let almost = derive(raw.as_bytes()).unwrap();
        assert!(!almost.overall.maxed);
    }

    #[test]
    fn test_overall_progress_caps_experience_at_99() {
        let summary = derive(uniform_snapshot(99, 150_000_000).as_bytes()).unwrap();
        assert!((summary.overall.progress - 1.0).abs() < f64::EPSILON);

        let empty = derive(uniform_snapshot(1, 0).as_bytes()).unwrap();
        assert!(empty.overall.progress.abs() < f64::EPSILON);
        assert_eq!(empty.total_virtual_level, 27);
    }

    #[test]
    fn test_experience_row_tracks_total() {
        let full = derive(uniform_snapshot(99, MAX_SKILL_XP).as_bytes()).unwrap();
        assert_eq!(full.experience.experience, MAX_TOTAL_XP);
        assert!(full.experience.maxed);
        assert!((full.experience.progress - 1.0).abs() < f64::EPSILON);

        let half = derive(uniform_snapshot(99, MAX_SKILL_XP / 2).as_bytes()).unwrap();
        assert!(!half.experience.maxed);
        assert!((half.experience.progress - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_unranked_rows_count_as_zero_experience() {
        let summary = derive(snapshot_with(&[(Skill::Divination, "-1,1,-1")]).as_bytes()).unwrap();
        let div = summary.skill(Skill::Divination).unwrap();
        assert_eq!(div.rank, -1);
        assert_eq!(div.experience, 0);
        assert_eq!(div.virtual_level, 1);
        assert!(div.progress.abs() < f64::EPSILON);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let mut raw = snapshot_with(&[(Skill::Invention, "3,120,150000000")]);
        raw.push_str(r#"{"isSuffix":false,"clan":"Chronic Demise","title":"Sir"}"#);
        let a = derive(raw.as_bytes()).unwrap();
        let b = derive(raw.as_bytes()).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.skill(Skill::Invention).unwrap().virtual_level,
            level_from_xp(150_000_000, Track::Elite)
        );
    }
}
