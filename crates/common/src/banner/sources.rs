use tracing::debug;

use super::BannerRequest;
use crate::cache::{CacheError, HiscoreCache};
use crate::fetcher::HiscoreFetcher;
use crate::subject::Subject;
use crate::types::{ClanRoster, PlayerCard};

/// Everything a banner is drawn from, owned so it can cross into a blocking task.
#[derive(Debug, Clone)]
pub struct BannerSources {
    pub card: PlayerCard,
    pub roster: Option<ClanRoster>,
    pub avatar: Option<Vec<u8>>,
    pub motif: Option<Vec<u8>>,
}

impl BannerSources {
    pub fn request(&self, theme: usize) -> BannerRequest<'_> {
        BannerRequest {
            card: &self.card,
            theme,
            roster: self.roster.as_ref(),
            avatar: self.avatar.as_deref(),
            motif: self.motif.as_deref(),
        }
    }
}

/// Load the player's card through the cache, then the clan roster, avatar and
/// clan motif. Only the card is required; the other lookups fail soft.
pub async fn gather<F: HiscoreFetcher>(
    cache: &HiscoreCache<F>,
    player: &Subject,
    now: i64,
) -> Result<BannerSources, CacheError> {
    let card = cache.player(player, now).await?;
    let clan = card.summary.clan().and_then(|name| match Subject::clan(name) {
        Ok(clan) => Some(clan),
        Err(e) => {
            debug!(clan = name, error = %e, "clan name not usable for lookups");
            None
        }
    });

    let fetcher = cache.fetcher();
    let motif = async {
        match &clan {
            Some(clan) => soft(fetcher.fetch_motif(clan).await, "motif", clan),
            None => None,
        }
    };
    let roster = async {
        let clan = clan.as_ref()?;
        cache
            .clan(clan, now)
            .await
            .map_err(|e| debug!(subject = %clan, error = %e, "clan roster lookup failed"))
            .ok()
    };
    let avatar = async { soft(fetcher.fetch_avatar(player).await, "avatar", player) };
    let (roster, avatar, motif) = tokio::join!(roster, avatar, motif);

    Ok(BannerSources {
        card,
        roster,
        avatar,
        motif,
    })
}

fn soft(res: anyhow::Result<Vec<u8>>, what: &'static str, subject: &Subject) -> Option<Vec<u8>> {
    res.map_err(|e| debug!(subject = %subject, what, error = %e, "image lookup failed"))
        .ok()
}
