use serde::{Deserialize, Serialize};

/// Skills in the row order returned by the hiscores API, after the leading Overall row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Skill {
    Attack,
    Defence,
    Strength,
    Constitution,
    Ranged,
    Prayer,
    Magic,
    Cooking,
    Woodcutting,
    Fletching,
    Fishing,
    Firemaking,
    Crafting,
    Smithing,
    Mining,
    Herblore,
    Agility,
    Thieving,
    Slayer,
    Farming,
    Runecrafting,
    Hunter,
    Construction,
    Summoning,
    Dungeoneering,
    Divination,
    Invention,
}

impl Skill {
    pub const ALL: [Self; 27] = [
        Self::Attack,
        Self::Defence,
        Self::Strength,
        Self::Constitution,
        Self::Ranged,
        Self::Prayer,
        Self::Magic,
        Self::Cooking,
        Self::Woodcutting,
        Self::Fletching,
        Self::Fishing,
        Self::Firemaking,
        Self::Crafting,
        Self::Smithing,
        Self::Mining,
        Self::Herblore,
        Self::Agility,
        Self::Thieving,
        Self::Slayer,
        Self::Farming,
        Self::Runecrafting,
        Self::Hunter,
        Self::Construction,
        Self::Summoning,
        Self::Dungeoneering,
        Self::Divination,
        Self::Invention,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attack => "Attack",
            Self::Defence => "Defence",
            Self::Strength => "Strength",
            Self::Constitution => "Constitution",
            Self::Ranged => "Ranged",
            Self::Prayer => "Prayer",
            Self::Magic => "Magic",
            Self::Cooking => "Cooking",
            Self::Woodcutting => "Woodcutting",
            Self::Fletching => "Fletching",
            Self::Fishing => "Fishing",
            Self::Firemaking => "Firemaking",
            Self::Crafting => "Crafting",
            Self::Smithing => "Smithing",
            Self::Mining => "Mining",
            Self::Herblore => "Herblore",
            Self::Agility => "Agility",
            Self::Thieving => "Thieving",
            Self::Slayer => "Slayer",
            Self::Farming => "Farming",
            Self::Runecrafting => "Runecrafting",
            Self::Hunter => "Hunter",
            Self::Construction => "Construction",
            Self::Summoning => "Summoning",
            Self::Dungeoneering => "Dungeoneering",
            Self::Divination => "Divination",
            Self::Invention => "Invention",
        }
    }

    pub fn track(&self) -> Track {
        match self {
            Self::Invention => Track::Elite,
            _ => Track::Standard,
        }
    }
}

/// Which experience table a skill levels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Track {
    Standard,
    Elite,
}

impl Track {
    pub fn level_cap(&self) -> u32 {
        match self {
            Self::Standard => 120,
            Self::Elite => 150,
        }
    }
}

/// What a derived record describes: a real skill or one of the two synthetic rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stat {
    Overall,
    Skill(Skill),
    /// Total experience shown as its own tile.
    Experience,
}

impl Stat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overall => "Overall",
            Self::Skill(s) => s.as_str(),
            Self::Experience => "XP",
        }
    }
}

/// Derived numbers for one tile. Never mutated after derivation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillRecord {
    pub stat: Stat,
    /// Upstream rank, -1 when unranked.
    pub rank: i64,
    /// Level as reported upstream (display-capped).
    pub level: u32,
    pub experience: u64,
    pub virtual_level: u32,
    /// Fraction of the way to the next virtual level, in `[0, 1]`.
    pub progress: f64,
    pub maxed: bool,
}

/// Profile details embedded as the last line of a player snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileMeta {
    #[serde(default)]
    pub clan: Option<String>,
    #[serde(default, deserialize_with = "de_null_as_empty")]
    pub title: String,
    #[serde(rename = "isSuffix", default)]
    pub is_suffix: bool,
}

fn de_null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSummary {
    pub overall: SkillRecord,
    pub experience: SkillRecord,
    /// One record per entry of [`Skill::ALL`], in the same order.
    pub skills: Vec<SkillRecord>,
    pub total_virtual_level: u32,
    pub total_experience: u64,
    pub profile: Option<ProfileMeta>,
}

impl AccountSummary {
    pub fn skill(&self, skill: Skill) -> Option<&SkillRecord> {
        self.skills.iter().find(|r| r.stat == Stat::Skill(skill))
    }

    pub fn record(&self, stat: Stat) -> Option<&SkillRecord> {
        match stat {
            Stat::Overall => Some(&self.overall),
            Stat::Experience => Some(&self.experience),
            Stat::Skill(s) => self.skill(s),
        }
    }

    pub fn clan(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|p| p.clan.as_deref())
            .filter(|c| !c.trim().is_empty())
    }
}

/// Everything the compositor needs about one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerCard {
    pub name: String,
    pub summary: AccountSummary,
    /// Unix seconds of the snapshot being shown.
    pub last_updated: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClanMember {
    pub name: String,
    pub rank: String,
    pub total_xp: u64,
    pub kills: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClanRoster {
    pub name: String,
    pub members: Vec<ClanMember>,
    pub last_updated: i64,
}
