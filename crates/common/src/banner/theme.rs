use image::Rgba;

/// `0xRRGGBB` to an opaque pixel.
pub const fn rgb(hex: u32) -> Rgba<u8> {
    Rgba([
        ((hex >> 16) & 0xFF) as u8,
        ((hex >> 8) & 0xFF) as u8,
        (hex & 0xFF) as u8,
        0xFF,
    ])
}

pub const WHITE: Rgba<u8> = rgb(0xFF_FFFF);
pub const RED: Rgba<u8> = rgb(0x99_0000);
pub const GREEN: Rgba<u8> = rgb(0x00_9900);
pub const GOLD: Rgba<u8> = rgb(0x7E_712A);
pub const CYAN: Rgba<u8> = rgb(0x00_99BB);

/// Shade drawn behind a tile's level text.
pub const TILE_SHADE: Rgba<u8> = Rgba([0, 0, 0, 190]);

/// Canvas color used when a theme's background cannot be loaded.
pub const FALLBACK_BACKGROUND: Rgba<u8> = rgb(0x22_2222);

#[derive(Debug, PartialEq, Eq)]
pub struct Theme {
    pub background: &'static str,
    pub avatar_background: &'static str,
    pub on_bg: Rgba<u8>,
    pub alt_on_bg: Rgba<u8>,
    pub stat_border: Rgba<u8>,
}

pub const THEMES: [Theme; 6] = [
    Theme {
        background: "bg_06.png",
        avatar_background: "avatar_bg_02.png",
        on_bg: rgb(0xFF_FFFF),
        alt_on_bg: rgb(0xA9_1000),
        stat_border: rgb(0x44_4444),
    },
    Theme {
        background: "bg_02.png",
        avatar_background: "avatar_bg_01.png",
        on_bg: rgb(0xFF_7F00),
        alt_on_bg: rgb(0x99_FF00),
        stat_border: rgb(0x00_0000),
    },
    Theme {
        background: "bg_07.png",
        avatar_background: "avatar_bg_03.png",
        on_bg: rgb(0x00_0000),
        alt_on_bg: rgb(0x33_3333),
        stat_border: rgb(0x00_0000),
    },
    Theme {
        background: "bg_01.png",
        avatar_background: "avatar_bg_02.png",
        on_bg: rgb(0x00_FFFF),
        alt_on_bg: rgb(0xFF_FFFF),
        stat_border: rgb(0x00_0000),
    },
    Theme {
        background: "bg_03.png",
        avatar_background: "avatar_bg_02.png",
        on_bg: rgb(0x99_AADD),
        alt_on_bg: rgb(0xFF_FFFF),
        stat_border: rgb(0x00_0000),
    },
    Theme {
        background: "bg_04.png",
        avatar_background: "avatar_bg_02.png",
        on_bg: rgb(0x00_2200),
        alt_on_bg: rgb(0x00_FF00),
        stat_border: rgb(0x00_0000),
    },
];

/// Theme for a requested index, clamped into range.
pub fn theme(index: usize) -> &'static Theme {
    &THEMES[index.min(THEMES.len() - 1)]
}
