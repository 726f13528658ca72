use std::collections::HashSet;

use tracing::debug;

use crate::types::{ClanMember, ClanRoster};

/// Parse the clan members CSV (`Clanmate, Clan Rank, Total XP, Kills`).
///
/// The header row and rows that do not carry four fields are skipped. Upstream
/// encodes spaces in names as U+00A0.
pub fn parse_members(raw: &[u8]) -> Vec<ClanMember> {
    let text = String::from_utf8_lossy(raw);
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with("Clanmate") {
                return None;
            }
            let member = parse_member(line);
            if member.is_none() {
                debug!(row = line, "skipping unreadable roster row");
            }
            member
        })
        .collect()
}

fn parse_member(line: &str) -> Option<ClanMember> {
    let mut fields = line.split(',').map(str::trim);
    let name = fields.next()?.replace('\u{a0}', " ");
    let rank = fields.next()?.to_string();
    let total_xp = fields.next()?.parse().ok()?;
    let kills = fields.next()?.parse().ok()?;
    if name.is_empty() {
        return None;
    }
    Some(ClanMember {
        name,
        rank,
        total_xp,
        kills,
    })
}

impl ClanRoster {
    /// Case-folded member names, for membership checks.
    pub fn whitelist(&self) -> HashSet<String> {
        self.members
            .iter()
            .map(|m| m.name.trim().to_lowercase())
            .collect()
    }

    pub fn is_member(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.members
            .iter()
            .any(|m| m.name.trim().to_lowercase() == name)
    }
}
