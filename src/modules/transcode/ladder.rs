//! Adaptive-bitrate ladder derived from the source geometry.

/// One output variant of the HLS ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub bitrate: &'static str,
    pub min_rate: &'static str,
    pub max_rate: &'static str,
    pub buffer_size: &'static str,
}

impl Rendition {
    /// Constant-bitrate rendition. Odd dimensions are rounded up to the next
    /// even value since libx264 rejects odd frame sizes.
    pub const fn new(
        label: &'static str,
        width: u32,
        height: u32,
        bitrate: &'static str,
        buffer_size: &'static str,
    ) -> Self {
        Self {
            label,
            width: even_ceil(width),
            height: even_ceil(height),
            bitrate,
            min_rate: bitrate,
            max_rate: bitrate,
            buffer_size,
        }
    }
}

pub const fn even_ceil(value: u32) -> u32 {
    value + (value % 2)
}

/// Standard 16:9 renditions, ascending by height.
pub const STANDARD_RENDITIONS: [Rendition; 5] = [
    Rendition::new("240p", 426, 240, "500k", "1M"),
    Rendition::new("360p", 640, 360, "1M", "2M"),
    Rendition::new("480p", 854, 480, "2M", "4M"),
    Rendition::new("720p", 1280, 720, "3M", "6M"),
    Rendition::new("1080p", 1920, 1080, "5M", "10M"),
];

/// Index of the tallest standard rendition whose height does not exceed
/// `source_height`. A source exactly as tall as a table entry includes that
/// entry. Sources shorter than the smallest entry still get index 0.
pub fn max_rendition_index(source_height: u32) -> usize {
    STANDARD_RENDITIONS
        .iter()
        .rposition(|r| r.height <= source_height)
        .unwrap_or(0)
}

/// Ordered, non-empty ladder for a source of the given height.
pub fn plan_ladder(source_height: u32) -> Vec<Rendition> {
    STANDARD_RENDITIONS[..=max_rendition_index(source_height)].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heights(ladder: &[Rendition]) -> Vec<u32> {
        ladder.iter().map(|r| r.height).collect()
    }

    #[test]
    fn full_hd_source_gets_every_rendition() {
        let ladder = plan_ladder(1080);
        assert_eq!(heights(&ladder), vec![240, 360, 480, 720, 1080]);
    }

    #[test]
    fn tiny_source_still_gets_smallest_rendition() {
        assert_eq!(heights(&plan_ladder(100)), vec![240]);
        assert_eq!(heights(&plan_ladder(0)), vec![240]);
    }

    #[test]
    fn exact_table_height_is_inclusive() {
        assert_eq!(heights(&plan_ladder(720)), vec![240, 360, 480, 720]);
        assert_eq!(heights(&plan_ladder(719)), vec![240, 360, 480]);
        assert_eq!(heights(&plan_ladder(240)), vec![240]);
    }

    #[test]
    fn sources_above_the_table_cap_at_1080p() {
        assert_eq!(plan_ladder(2160).len(), STANDARD_RENDITIONS.len());
    }

    #[test]
    fn ladder_is_a_strictly_ascending_prefix_for_all_heights() {
        for h in (0..2400).step_by(7) {
            let ladder = plan_ladder(h);
            assert!(!ladder.is_empty());
            assert_eq!(ladder[..], STANDARD_RENDITIONS[..ladder.len()]);
            assert!(ladder.windows(2).all(|w| w[0].height < w[1].height));

            let top = ladder.last().map(|r| r.height).unwrap_or_default();
            assert!(top <= h || ladder.len() == 1);
        }
    }

    #[test]
    fn dimensions_are_even() {
        assert_eq!(even_ceil(427), 428);
        assert_eq!(even_ceil(426), 426);
        assert!(STANDARD_RENDITIONS
            .iter()
            .all(|r| r.width % 2 == 0 && r.height % 2 == 0));
    }
}
