use anyhow::Result;

use crate::subject::Subject;

/// Upstream lookups the cache depends on. Implemented by
/// [`crate::runescape::RuneScapeClient`]; tests substitute in-memory fetchers.
pub trait HiscoreFetcher {
    /// Raw `rank,level,experience` rows for a player.
    fn fetch_stats(
        &self,
        player: &Subject,
    ) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    /// The profile object for a player, already isolated from its script wrapper.
    fn fetch_profile(
        &self,
        player: &Subject,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Raw roster CSV for a clan.
    fn fetch_clan_members(
        &self,
        clan: &Subject,
    ) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    /// Chat-head image bytes for a player.
    fn fetch_avatar(
        &self,
        player: &Subject,
    ) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    /// Clan motif image bytes.
    fn fetch_motif(&self, clan: &Subject)
        -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}
