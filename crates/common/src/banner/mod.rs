//! Signature banner compositor.
//!
//! Layers, bottom to top: theme background, clan panel (when the player's clan
//! roster could be loaded), avatar with frame, name and title, the stat tile grid, and the
//! "last updated" stamp. Every image and font is optional: a missing asset
//! leaves its layer out and is reported in [`Banner::missing`].

pub mod assets;
pub mod sources;
pub mod theme;

use std::path::PathBuf;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::codecs::png::PngEncoder;
use image::imageops;
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{ClanRoster, PlayerCard, Skill, SkillRecord, Stat};
use assets::{AssetError, Resources};
use theme::{Theme, CYAN, GOLD, GREEN, RED, WHITE};

pub const WIDTH: u32 = 728;
pub const HEIGHT: u32 = 150;

const TEXT_FONT: &str = "GFSArtemisia.otf";
const NAME_FONT: &str = "Averia-Regular.ttf";

const LEVEL_POINTS: f32 = 11.0;
const STAMP_POINTS: f32 = 12.0;
const NAME_POINTS: f32 = 20.0;
const TITLE_POINTS: f32 = 12.0;
const CLAN_MAX_POINTS: f32 = 18.0;
const CLAN_MIN_POINTS: f32 = 6.0;

const AVATAR_SCALE: f64 = 0.5;
const MOTIF_WIDTH_RATIO: f64 = 0.7;

const TILE_GAP: i32 = 3;

/// Tile grid rows: leading horizontal offset, then the stats left to right.
const GRID: [(i32, &[Stat]); 5] = [
    (60, &[Stat::Overall, Stat::Experience]),
    (
        0,
        &[
            Stat::Skill(Skill::Attack),
            Stat::Skill(Skill::Defence),
            Stat::Skill(Skill::Strength),
            Stat::Skill(Skill::Constitution),
            Stat::Skill(Skill::Ranged),
            Stat::Skill(Skill::Prayer),
            Stat::Skill(Skill::Magic),
        ],
    ),
    (
        0,
        &[
            Stat::Skill(Skill::Cooking),
            Stat::Skill(Skill::Woodcutting),
            Stat::Skill(Skill::Fletching),
            Stat::Skill(Skill::Fishing),
            Stat::Skill(Skill::Firemaking),
            Stat::Skill(Skill::Crafting),
            Stat::Skill(Skill::Smithing),
        ],
    ),
    (
        0,
        &[
            Stat::Skill(Skill::Mining),
            Stat::Skill(Skill::Herblore),
            Stat::Skill(Skill::Agility),
            Stat::Skill(Skill::Thieving),
            Stat::Skill(Skill::Slayer),
            Stat::Skill(Skill::Farming),
            Stat::Skill(Skill::Runecrafting),
        ],
    ),
    (
        0,
        &[
            Stat::Skill(Skill::Hunter),
            Stat::Skill(Skill::Construction),
            Stat::Skill(Skill::Summoning),
            Stat::Skill(Skill::Dungeoneering),
            Stat::Skill(Skill::Divination),
            Stat::Skill(Skill::Invention),
        ],
    ),
];

fn tile_size(stat: Stat) -> (u32, u32) {
    match stat {
        Stat::Overall => (70, 24),
        Stat::Experience => (130, 24),
        Stat::Skill(_) => (47, 19),
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to encode banner: {0}")]
    Encode(#[from] image::ImageError),
}

/// Visual tier of a tile, chosen from its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Normal,
    Maxed,
    TrueMaxed,
}

impl Tier {
    pub fn of(record: &SkillRecord) -> Self {
        match record.stat {
            Stat::Overall if record.maxed => Self::Maxed,
            Stat::Overall | Stat::Experience => Self::Normal,
            Stat::Skill(_) => match record.virtual_level {
                0..=98 => Self::Normal,
                99..=119 => Self::Maxed,
                _ => Self::TrueMaxed,
            },
        }
    }

    fn pick<T>(self, normal: T, maxed: T, true_maxed: T) -> T {
        match self {
            Self::Normal => normal,
            Self::Maxed => maxed,
            Self::TrueMaxed => true_maxed,
        }
    }

    fn icon_background(self) -> &'static str {
        self.pick("normal_bg.png", "maxed_bg.png", "true_bg.png")
    }
}

/// An asset the compositor had to leave out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingAsset {
    pub kind: &'static str,
    pub reason: String,
}

/// Input for one render. `avatar` and `motif` are raw upstream image bytes.
#[derive(Debug, Clone, Copy)]
pub struct BannerRequest<'a> {
    pub card: &'a PlayerCard,
    pub theme: usize,
    pub roster: Option<&'a ClanRoster>,
    pub avatar: Option<&'a [u8]>,
    pub motif: Option<&'a [u8]>,
}

pub struct Banner {
    pub image: RgbaImage,
    pub missing: Vec<MissingAsset>,
}

impl Banner {
    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf).write_image(
            self.image.as_raw(),
            self.image.width(),
            self.image.height(),
            ExtendedColorType::Rgba8,
        )?;
        Ok(buf)
    }
}

#[derive(Clone, Copy)]
enum Face {
    Text,
    Name,
}

/// Holds the resources directory and the fonts loaded from it.
pub struct Compositor {
    resources: Resources,
    text_font: Option<FontArc>,
    name_font: Option<FontArc>,
    font_issues: Vec<MissingAsset>,
}

impl Compositor {
    pub fn new(resources_dir: impl Into<PathBuf>) -> Self {
        let resources = Resources::new(resources_dir);
        let mut font_issues = Vec::new();
        let mut load = |file: &str| match resources.font(file) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!(font = file, error = %e, "font unavailable, text using it will be skipped");
                font_issues.push(MissingAsset {
                    kind: "font",
                    reason: e.to_string(),
                });
                None
            }
        };
        let text_font = load(TEXT_FONT);
        let name_font = load(NAME_FONT);
        Self {
            resources,
            text_font,
            name_font,
            font_issues,
        }
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn render(&self, request: &BannerRequest<'_>) -> Banner {
        let theme = theme::theme(request.theme);
        let mut frame = Frame::new(self, theme);

        if let Some(roster) = request.roster {
            frame.clan_panel(&roster.name, request.motif, 544, 24, 180);
        }
        frame.avatar(request.avatar, 8, 4);
        frame.name(request.card, 67, 27);
        frame.tiles(request.card, 8, 34);
        frame.stamp(request.card.last_updated);

        metrics::counter!("sigbanner_banners_rendered_total", "theme" => request.theme.min(theme::THEMES.len() - 1).to_string())
            .increment(1);
        Banner {
            image: frame.canvas,
            missing: frame.missing,
        }
    }
}

struct Frame<'a> {
    compositor: &'a Compositor,
    theme: &'static Theme,
    canvas: RgbaImage,
    missing: Vec<MissingAsset>,
}

impl<'a> Frame<'a> {
    fn new(compositor: &'a Compositor, theme: &'static Theme) -> Self {
        let mut frame = Self {
            compositor,
            theme,
            canvas: RgbaImage::from_pixel(WIDTH, HEIGHT, theme::FALLBACK_BACKGROUND),
            missing: compositor.font_issues.clone(),
        };
        let background = compositor
            .resources
            .image(&format!("backgrounds/{}", theme.background));
        if let Some(bg) = frame.asset("background", background) {
            imageops::overlay(&mut frame.canvas, &bg, 0, 0);
        }
        frame
    }

    fn asset<T>(&mut self, kind: &'static str, res: Result<T, AssetError>) -> Option<T> {
        match res {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(kind, error = %e, "asset skipped");
                metrics::counter!("sigbanner_assets_missing_total", "asset" => kind).increment(1);
                self.missing.push(MissingAsset {
                    kind,
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    fn resource(&mut self, kind: &'static str, relative: &str) -> Option<RgbaImage> {
        let res = self.compositor.resources.image(relative);
        self.asset(kind, res)
    }

    fn upstream(&mut self, kind: &'static str, bytes: Option<&[u8]>) -> Option<RgbaImage> {
        let Some(bytes) = bytes else {
            self.missing.push(MissingAsset {
                kind,
                reason: "not fetched".to_string(),
            });
            return None;
        };
        self.asset(kind, assets::decode(kind, bytes))
    }

    fn font(&self, face: Face) -> Option<&'a FontArc> {
        let compositor: &'a Compositor = self.compositor;
        match face {
            Face::Text => compositor.text_font.as_ref(),
            Face::Name => compositor.name_font.as_ref(),
        }
    }

    fn text_width(&self, face: Face, points: f32, text: &str) -> i32 {
        self.font(face)
            .map_or(0, |font| text_size(scale(points), font, text).0 as i32)
    }

    /// Draw `text` with its baseline at `baseline`.
    fn text(&mut self, face: Face, points: f32, x: i32, baseline: i32, color: Rgba<u8>, text: &str) {
        let Some(font) = self.font(face) else {
            return;
        };
        let px = scale(points);
        let ascent = font.as_scaled(px).ascent().round() as i32;
        draw_text_mut(&mut self.canvas, color, x, baseline - ascent, px, font, text);
    }

    fn paste(&mut self, img: &RgbaImage, x: i32, y: i32) {
        imageops::overlay(&mut self.canvas, img, i64::from(x), i64::from(y));
    }

    fn fill(&mut self, x: i32, y: i32, w: u32, h: u32, color: Rgba<u8>) {
        if w > 0 && h > 0 {
            draw_filled_rect_mut(&mut self.canvas, Rect::at(x, y).of_size(w, h), color);
        }
    }

    fn border(&mut self, x: i32, y: i32, w: u32, h: u32, color: Rgba<u8>) {
        if w > 0 && h > 0 {
            draw_hollow_rect_mut(&mut self.canvas, Rect::at(x, y).of_size(w, h), color);
        }
    }

    /// Alpha-blend `color` over a rectangle of the opaque canvas.
    fn shade(&mut self, x: i32, y: i32, w: u32, h: u32, color: Rgba<u8>) {
        let alpha = f32::from(color[3]) / 255.0;
        for py in y.max(0)..(y + h as i32).min(HEIGHT as i32) {
            for px in x.max(0)..(x + w as i32).min(WIDTH as i32) {
                let pixel = self.canvas.get_pixel_mut(px as u32, py as u32);
                for c in 0..3 {
                    let blended = f32::from(pixel[c]) * (1.0 - alpha) + f32::from(color[c]) * alpha;
                    pixel[c] = blended.round() as u8;
                }
            }
        }
    }

    fn clan_panel(&mut self, clan: &str, motif: Option<&[u8]>, x: i32, y: i32, width: u32) {
        let mut points = CLAN_MAX_POINTS;
        let mut text_width = self.text_width(Face::Text, points, clan);
        while text_width > width as i32 && points > CLAN_MIN_POINTS {
            points -= 1.0;
            text_width = self.text_width(Face::Text, points, clan);
        }
        let on_bg = self.theme.on_bg;
        self.text(Face::Text, points, x + (width as i32 - text_width) / 2, y, on_bg, clan);

        let bar_y = y + 6;
        let mut bar_height = 0;
        if let Some(bar) = self.resource("motif_bar", "motif_bar.png") {
            let bar = assets::scaled_to_width(&bar, width);
            bar_height = bar.height();
            self.paste(&bar, x, bar_y);
        }
        if let Some(motif) = self.upstream("motif", motif) {
            let motif_width = (f64::from(width) * MOTIF_WIDTH_RATIO).round() as u32;
            let motif = assets::scaled_to_width(&motif, motif_width);
            let x_offset = (width as i32 - motif.width() as i32) / 2;
            let y_offset = (f64::from(bar_height) * MOTIF_WIDTH_RATIO).round() as i32;
            self.paste(&motif, x + x_offset, bar_y + y_offset);
        }
    }

    fn avatar(&mut self, avatar: Option<&[u8]>, x: i32, y: i32) {
        let background = format!("backgrounds/{}", self.theme.avatar_background);
        if let Some(bg) = self.resource("avatar_background", &background) {
            self.paste(&assets::scaled_by(&bg, AVATAR_SCALE), x, y);
        }
        if let Some(avatar) = self.upstream("avatar", avatar) {
            self.paste(&assets::scaled_by(&avatar, AVATAR_SCALE), x, y);
        }
        if let Some(frame) = self.resource("avatar_frame", "avatar_frame.png") {
            self.paste(&assets::scaled_by(&frame, AVATAR_SCALE), x, y);
        }
    }

    fn name(&mut self, card: &PlayerCard, x: i32, baseline: i32) {
        let (title, suffix) = card
            .summary
            .profile
            .as_ref()
            .map_or(("", true), |p| (p.title.trim(), p.is_suffix));
        let on_bg = self.theme.on_bg;
        let alt = self.theme.alt_on_bg;

        if suffix || title.is_empty() {
            let name_width = self.text_width(Face::Name, NAME_POINTS, &card.name);
            self.text(Face::Name, NAME_POINTS, x, baseline, on_bg, &card.name);
            if !title.is_empty() {
                self.text(Face::Name, TITLE_POINTS, x + 8 + name_width, baseline, alt, title);
            }
        } else {
            let title_width = self.text_width(Face::Name, TITLE_POINTS, title);
            self.text(Face::Name, TITLE_POINTS, x, baseline, alt, title);
            self.text(Face::Name, NAME_POINTS, x + 8 + title_width, baseline, on_bg, &card.name);
        }
    }

    fn tiles(&mut self, card: &PlayerCard, x: i32, y: i32) {
        let mut row_y = y;
        for (offset, stats) in GRID {
            let mut tile_x = x + offset;
            let mut row_height = 0;
            for &stat in stats {
                let (w, h) = tile_size(stat);
                if let Some(record) = card.summary.record(stat) {
                    self.tile(tile_x, row_y, w, h, record);
                }
                tile_x += w as i32 + TILE_GAP;
                row_height = h as i32;
            }
            row_y += row_height + TILE_GAP;
        }
    }

    fn tile(&mut self, x: i32, y: i32, w: u32, h: u32, record: &SkillRecord) {
        let tier = Tier::of(record);
        let hi = h as i32;

        self.shade(x + hi - 1, y, w + 1 - h, h, theme::TILE_SHADE);
        self.icon(x, y, h, record.stat, tier);
        self.border(x, y, w, h, tier.pick(self.theme.stat_border, GOLD, CYAN));

        let value = match record.stat {
            Stat::Experience => record.experience,
            _ => u64::from(record.virtual_level),
        };
        let text = group_thousands(value);
        let text_width = self.text_width(Face::Text, LEVEL_POINTS, &text);
        let text_x = x + (w as i32 - text_width) / 2 + hi / 2 - 1;
        let baseline = y + (hi - LEVEL_POINTS as i32) / 2 + LEVEL_POINTS as i32;
        self.text(Face::Text, LEVEL_POINTS, text_x, baseline, tier.pick(WHITE, GOLD, CYAN), &text);

        self.progress_bar(
            x + 1,
            y + hi - 2,
            h.saturating_sub(3),
            record.progress,
            tier.pick(GREEN, CYAN, CYAN),
            tier.pick(RED, RED, CYAN),
        );
    }

    /// Skill icon over its tier background, inset by one pixel.
    fn icon(&mut self, x: i32, y: i32, size: u32, stat: Stat, tier: Tier) {
        let mut icon = match self.resource("tile_background", tier.icon_background()) {
            Some(bg) => assets::scaled(&bg, size, size),
            None => RgbaImage::new(size, size),
        };
        let path = format!("skill_icons/{}.png", stat.as_str().to_lowercase());
        if let Some(glyph) = self.resource("skill_icon", &path) {
            imageops::overlay(&mut icon, &assets::scaled(&glyph, size, size), 0, 0);
        }
        let inset = imageops::crop_imm(&icon, 1, 1, size - 1, size - 1).to_image();
        self.paste(&inset, x, y);
    }

    fn progress_bar(&mut self, x: i32, y: i32, w: u32, ratio: f64, done: Rgba<u8>, remaining: Rgba<u8>) {
        self.fill(x, y, w, 1, remaining);
        let filled = ((f64::from(w) * ratio.clamp(0.0, 1.0)) as u32).max(1);
        self.fill(x, y, filled.min(w), 1, done);
    }

    fn stamp(&mut self, last_updated: i64) {
        let Some(when) = chrono::DateTime::from_timestamp(last_updated, 0) else {
            return;
        };
        let text = when.format("%m/%-d/%Y %H:%M:%S").to_string();
        let text_width = self.text_width(Face::Text, STAMP_POINTS, &text);
        let on_bg = self.theme.on_bg;
        self.text(
            Face::Text,
            STAMP_POINTS,
            WIDTH as i32 - text_width - 3,
            HEIGHT as i32 - 5,
            on_bg,
            &text,
        );
    }
}

/// Font points to pixels at 96 dpi.
fn scale(points: f32) -> PxScale {
    PxScale::from(points * 96.0 / 72.0)
}

/// `1234567` -> `"1,234,567"`.
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats;
    use crate::types::ProfileMeta;
    use std::path::Path;

    const SAMPLE: &str = include_str!("../../tests/fixtures/index_lite_sample.txt");

    fn card() -> PlayerCard {
        PlayerCard {
            name: "Berserkguard".to_string(),
            summary: stats::derive(SAMPLE.as_bytes()).unwrap(),
            last_updated: 1_465_269_902,
        }
    }

    fn request(card: &PlayerCard) -> BannerRequest<'_> {
        BannerRequest {
            card,
            theme: 0,
            roster: None,
            avatar: None,
            motif: None,
        }
    }

    fn save(dir: &Path, relative: &str, img: &RgbaImage) {
        let path = dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        img.save(path).unwrap();
    }

    fn record(stat: Stat, virtual_level: u32, maxed: bool) -> SkillRecord {
        SkillRecord {
            stat,
            rank: 1,
            level: virtual_level.min(99),
            experience: 0,
            virtual_level,
            progress: 0.0,
            maxed,
        }
    }

    #[test]
    fn test_empty_resources_still_renders_full_size_png() {
        let dir = tempfile::tempdir().unwrap();
        let compositor = Compositor::new(dir.path());
        let card = card();
        let banner = compositor.render(&request(&card));

        assert_eq!(banner.image.dimensions(), (WIDTH, HEIGHT));
        let kinds: Vec<_> = banner.missing.iter().map(|m| m.kind).collect();
        assert!(kinds.contains(&"background"));
        assert!(kinds.contains(&"font"));
        assert!(kinds.contains(&"avatar"));

        let png = banner.encode_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_background_is_drawn_from_theme() {
        let dir = tempfile::tempdir().unwrap();
        let red = Rgba([200, 0, 0, 255]);
        save(dir.path(), "backgrounds/bg_04.png", &RgbaImage::from_pixel(WIDTH, HEIGHT, red));

        let compositor = Compositor::new(dir.path());
        let card = card();
        let mut req = request(&card);
        req.theme = 42;
        let banner = compositor.render(&req);

        assert_eq!(*banner.image.get_pixel(WIDTH - 1, 0), red);
        assert!(!banner.missing.iter().any(|m| m.kind == "background"));
    }

    #[test]
    fn test_garbage_avatar_degrades_to_background() {
        let dir = tempfile::tempdir().unwrap();
        let compositor = Compositor::new(dir.path());
        let card = card();
        let mut req = request(&card);
        req.avatar = Some(b"<html>404</html>");
        let banner = compositor.render(&req);

        let avatar = banner.missing.iter().find(|m| m.kind == "avatar").unwrap();
        assert!(avatar.reason.contains("decode"));
        assert_eq!(*banner.image.get_pixel(10, 6), theme::FALLBACK_BACKGROUND);
    }

    #[test]
    fn test_clan_panel_only_with_loaded_roster() {
        let dir = tempfile::tempdir().unwrap();
        let compositor = Compositor::new(dir.path());

        let loner = card();
        let banner = compositor.render(&request(&loner));
        assert!(!banner.missing.iter().any(|m| m.kind == "motif_bar"));

        let mut member = card();
        member.summary.profile = Some(ProfileMeta {
            clan: Some("Chronic Demise".to_string()),
            title: "the Insane".to_string(),
            is_suffix: true,
        });
        // Profile names a clan but its roster was not loaded.
        let banner = compositor.render(&request(&member));
        assert!(!banner.missing.iter().any(|m| m.kind == "motif_bar"));

        let roster = ClanRoster {
            name: "Chronic Demise".to_string(),
            members: Vec::new(),
            last_updated: 0,
        };
        let mut req = request(&member);
        req.roster = Some(&roster);
        let banner = compositor.render(&req);
        assert!(banner.missing.iter().any(|m| m.kind == "motif_bar"));
        assert!(banner.missing.iter().any(|m| m.kind == "motif"));
    }

    #[test]
    fn test_tier_selection() {
        assert_eq!(Tier::of(&record(Stat::Skill(Skill::Attack), 98, false)), Tier::Normal);
        assert_eq!(Tier::of(&record(Stat::Skill(Skill::Attack), 99, true)), Tier::Maxed);
        assert_eq!(Tier::of(&record(Stat::Skill(Skill::Attack), 119, true)), Tier::Maxed);
        assert_eq!(Tier::of(&record(Stat::Skill(Skill::Attack), 120, true)), Tier::TrueMaxed);
        assert_eq!(Tier::of(&record(Stat::Overall, 2673, true)), Tier::Maxed);
        assert_eq!(Tier::of(&record(Stat::Overall, 2673, false)), Tier::Normal);
        assert_eq!(Tier::of(&record(Stat::Experience, 0, true)), Tier::Normal);
    }

    #[test]
    fn test_progress_bar_fill() {
        let dir = tempfile::tempdir().unwrap();
        let compositor = Compositor::new(dir.path());
        let mut frame = Frame::new(&compositor, theme::theme(0));

        frame.progress_bar(10, 10, 20, 0.5, GREEN, RED);
        assert_eq!(*frame.canvas.get_pixel(19, 10), GREEN);
        assert_eq!(*frame.canvas.get_pixel(20, 10), RED);
        assert_eq!(*frame.canvas.get_pixel(29, 10), RED);

        frame.progress_bar(10, 20, 20, 0.0, GREEN, RED);
        assert_eq!(*frame.canvas.get_pixel(10, 20), GREEN);
        assert_eq!(*frame.canvas.get_pixel(11, 20), RED);
    }

    #[test]
    fn test_tile_shade_darkens_canvas() {
        let dir = tempfile::tempdir().unwrap();
        let compositor = Compositor::new(dir.path());
        let mut frame = Frame::new(&compositor, theme::theme(0));
        let before = *frame.canvas.get_pixel(5, 5);
        frame.shade(0, 0, 10, 10, theme::TILE_SHADE);
        let after = *frame.canvas.get_pixel(5, 5);
        assert!(after[0] < before[0]);
        assert_eq!(after[3], 255);
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(439_714_431), "439,714,431");
    }
}
