//! Level <-> experience lookup tables.
//!
//! Both tables are indexed by level (`table[level - 1]`) and strictly increasing.

use std::sync::OnceLock;

use crate::types::Track;

/// Experience ceiling of a single skill.
pub const MAX_SKILL_XP: u64 = 200_000_000;

/// Level at which a skill's display level stops increasing.
pub const DISPLAY_CAP: u32 = 99;

static STANDARD_XP: OnceLock<Vec<u64>> = OnceLock::new();

/// Elite skills do not follow the standard curve, so the table is spelled out.
const ELITE_XP: [u64; 150] = [
    0, 830, 1_861, 2_902, 3_980, 5_126, 6_380, 7_787, 9_400, 11_275,
    13_605, 16_372, 19_656, 23_546, 28_138, 33_520, 39_809, 47_109, 55_535, 64_802,
    77_190, 90_811, 106_221, 123_573, 143_025, 164_742, 188_893, 215_651, 245_196, 277_713,
    316_311, 358_547, 404_634, 454_796, 509_259, 568_254, 632_019, 700_797, 774_834, 854_383,
    946_227, 1_044_569, 1_149_696, 1_261_903, 1_381_488, 1_508_756, 1_644_015, 1_787_581, 1_939_773, 2_100_917,
    2_283_490, 2_476_369, 2_679_907, 2_894_505, 3_120_508, 3_358_307, 3_608_290, 3_870_846, 4_146_374, 4_435_275,
    4_758_122, 5_096_111, 5_449_685, 5_819_299, 6_205_407, 6_608_473, 7_028_964, 7_467_354, 7_924_122, 8_399_751,
    8_925_664, 9_472_665, 10_041_285, 10_632_061, 11_245_538, 11_882_262, 12_542_789, 13_227_679, 13_937_496, 14_672_812,
    15_478_994, 16_313_404, 17_176_661, 18_069_395, 18_992_239, 19_945_833, 20_930_821, 21_947_856, 22_997_593, 24_080_695,
    25_259_906, 26_475_754, 27_728_955, 29_020_233, 30_350_318, 31_719_944, 33_129_852, 34_580_790, 36_073_511, 37_608_773,
    39_270_442, 40_978_509, 42_733_789, 44_537_107, 46_389_292, 48_291_180, 50_243_611, 52_247_435, 54_303_504, 56_412_678,
    58_575_823, 60_793_812, 63_067_521, 65_397_835, 67_785_643, 70_231_841, 72_737_330, 75_303_019, 77_929_820, 80_618_654,
    83_370_445, 86_186_124, 89_066_630, 92_012_904, 95_025_896, 98_106_559, 101_255_855, 104_474_750, 107_764_216, 111_125_230,
    114_558_777, 118_065_845, 121_647_430, 125_304_532, 129_038_159, 132_849_323, 136_739_041, 140_708_338, 144_758_242, 148_889_790,
    153_104_021, 157_401_983, 161_784_728, 166_253_312, 170_808_801, 175_452_262, 180_184_770, 185_007_406, 189_921_255, 194_927_409,
];

fn standard_table() -> &'static [u64] {
    STANDARD_XP.get_or_init(|| {
        let cap = Track::Standard.level_cap();
        let mut table = Vec::with_capacity(cap as usize);
        table.push(0);
        let mut points = 0.0_f64;
        for n in 1..cap {
            let n = f64::from(n);
            points += (n + 300.0 * 2f64.powf(n / 7.0)).floor();
            table.push((points / 4.0).floor() as u64);
        }
        table
    })
}

fn table(track: Track) -> &'static [u64] {
    match track {
        Track::Standard => standard_table(),
        Track::Elite => &ELITE_XP,
    }
}

/// Cumulative experience needed to reach `level`, clamped into `1..=cap`.
pub fn xp_for_level(level: u32, track: Track) -> u64 {
    let level = level.clamp(1, track.level_cap());
    table(track)[(level - 1) as usize]
}

/// Experience still needed to go from `current_xp` to `level`; zero once reached.
pub fn xp_to_level(level: u32, current_xp: u64, track: Track) -> u64 {
    xp_for_level(level, track).saturating_sub(current_xp)
}

/// Highest level whose threshold does not exceed `xp`, never above the track's cap.
pub fn level_from_xp(xp: u64, track: Track) -> u32 {
    let cap = track.level_cap();
    let mut level = 1;
    for candidate in 2..=cap {
        if xp_for_level(candidate, track) > xp {
            break;
        }
        level = candidate;
    }
    level
}

/// Experience at the display cap on a track.
pub fn display_cap_xp(track: Track) -> u64 {
    xp_for_level(DISPLAY_CAP, track)
}
