use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::RuneScape;
use crate::fetcher::HiscoreFetcher;
use crate::subject::Subject;

/// JSONP callback the website API insists on.
const PROFILE_CALLBACK: &str = "jQuery000000000000000_0000000000";

pub struct RuneScapeClient {
    hiscore_url: String,
    clan_hiscore_url: String,
    website_url: String,
    avatar_url: String,
    client: reqwest::Client,
}

impl RuneScapeClient {
    pub fn new(cfg: &RuneScape) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .user_agent(concat!("sigbanner/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            hiscore_url: cfg.hiscore_url.trim_end_matches('/').to_string(),
            clan_hiscore_url: cfg.clan_hiscore_url.trim_end_matches('/').to_string(),
            website_url: cfg.website_url.trim_end_matches('/').to_string(),
            avatar_url: cfg.avatar_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn stats_url(&self, player: &Subject) -> String {
        format!("{}/index_lite.ws?player={}", self.hiscore_url, player.key())
    }

    pub fn profile_url(&self, player: &Subject) -> String {
        format!(
            "{}/playerDetails.ws?names=%5B%22{}%22%5D&callback={PROFILE_CALLBACK}",
            self.website_url,
            player.key()
        )
    }

    pub fn clan_members_url(&self, clan: &Subject) -> String {
        format!("{}/members_lite.ws?clanName={}", self.clan_hiscore_url, clan.key())
    }

    pub fn avatar_url(&self, player: &Subject) -> String {
        format!("{}/{}/chat.png", self.avatar_url, player.key())
    }

    pub fn motif_url(&self, clan: &Subject) -> String {
        format!("{}/l=3/a=869/{}/clanmotif.png", self.avatar_url, clan.key())
    }

    /// Single GET, no retry. Any transport error or non-2xx status is an error.
    async fn get_bytes(&self, url: &str, endpoint: &'static str) -> Result<Vec<u8>> {
        debug!(url = %url, endpoint, "upstream request");
        let start = Instant::now();
        let res = self.get_bytes_inner(url).await;
        let ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!("sigbanner_upstream_latency_ms", "endpoint" => endpoint).record(ms);
        let status = if res.is_ok() { "ok" } else { "error" };
        metrics::counter!("sigbanner_upstream_requests_total", "endpoint" => endpoint, "status" => status)
            .increment(1);
        res
    }

    async fn get_bytes_inner(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("{url} returned {status}");
        }
        let body = resp.bytes().await.context("failed reading body")?;
        if body.is_empty() {
            anyhow::bail!("{url} returned an empty body");
        }
        Ok(body.to_vec())
    }
}

impl HiscoreFetcher for RuneScapeClient {
    async fn fetch_stats(&self, player: &Subject) -> Result<Vec<u8>> {
        self.get_bytes(&self.stats_url(player), "stats").await
    }

    async fn fetch_profile(&self, player: &Subject) -> Result<String> {
        let body = self.get_bytes(&self.profile_url(player), "profile").await?;
        let text = String::from_utf8_lossy(&body);
        extract_object(&text)
            .map(str::to_string)
            .with_context(|| format!("no profile object in response for {player}"))
    }

    async fn fetch_clan_members(&self, clan: &Subject) -> Result<Vec<u8>> {
        self.get_bytes(&self.clan_members_url(clan), "clan_members").await
    }

    async fn fetch_avatar(&self, player: &Subject) -> Result<Vec<u8>> {
        self.get_bytes(&self.avatar_url(player), "avatar").await
    }

    async fn fetch_motif(&self, clan: &Subject) -> Result<Vec<u8>> {
        self.get_bytes(&self.motif_url(clan), "motif").await
    }
}

/// Isolate the substring from the first `{` to the last `}` of a script-wrapped payload.
pub fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RuneScapeClient {
        RuneScapeClient::new(&RuneScape {
            hiscore_url: "https://secure.runescape.com/m=hiscore/".to_string(),
            clan_hiscore_url: "https://secure.runescape.com/m=clan-hiscores".to_string(),
            website_url: "https://secure.runescape.com/m=website-data".to_string(),
            avatar_url: "https://secure.runescape.com/m=avatar-rs".to_string(),
            connect_timeout_secs: 30,
        })
        .unwrap()
    }

    #[test]
    fn test_urls_use_normalized_key() {
        let c = client();
        let player = Subject::player(" Zezima ").unwrap();
        assert_eq!(
            c.stats_url(&player),
            "https://secure.runescape.com/m=hiscore/index_lite.ws?player=zezima"
        );
        assert!(c.profile_url(&player).contains("names=%5B%22zezima%22%5D"));
        assert!(c.avatar_url(&player).ends_with("/zezima/chat.png"));

        let clan = Subject::clan("Chronic Demise").unwrap();
        assert!(c
            .clan_members_url(&clan)
            .ends_with("members_lite.ws?clanName=chronic%20demise"));
        assert!(c.motif_url(&clan).ends_with("/chronic%20demise/clanmotif.png"));
    }

    #[test]
    fn test_extract_object_from_jsonp() {
        let raw = r#"jQuery000000000000000_0000000000([{"isSuffix":true,"name":"Zezima","clan":"Lost","title":"the Insane"}]);"#;
        assert_eq!(
            extract_object(raw),
            Some(r#"{"isSuffix":true,"name":"Zezima","clan":"Lost","title":"the Insane"}"#)
        );
    }

    #[test]
    fn test_extract_object_missing_braces() {
        assert_eq!(extract_object("jQuery([]);"), None);
        assert_eq!(extract_object("} backwards {"), None);
    }
}
