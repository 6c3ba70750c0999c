// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Paper-size resolution: map a label size in millimetres onto a size the
// printer already knows, or synthesize a custom one.

use labelwerk_core::types::{MediaSize, PaperSelection, mm_to_hundredths_inch};
use tracing::debug;

/// Relative difference allowed on each dimension when matching a predefined
/// size.
pub const PAPER_TOLERANCE: f64 = 0.05;

fn within_tolerance(actual: u32, wanted: u32) -> bool {
    (actual as f64 - wanted as f64).abs() <= wanted as f64 * PAPER_TOLERANCE
}

/// Pick the first of `available` within [`PAPER_TOLERANCE`] of
/// `width_mm` x `height_mm` on both axes, else a [`PaperSelection::Custom`]
/// size.
pub fn resolve_paper(width_mm: u32, height_mm: u32, available: &[MediaSize]) -> PaperSelection {
    let width = mm_to_hundredths_inch(width_mm);
    let height = mm_to_hundredths_inch(height_mm);

    match available
        .iter()
        .find(|m| within_tolerance(m.width, width) && within_tolerance(m.height, height))
    {
        Some(media) => {
            debug!(name = %media.name, width, height, "Matched predefined paper");
            PaperSelection::Predefined(media.clone())
        }
        None => {
            debug!(width, height, "No predefined paper, using custom size");
            PaperSelection::Custom { width, height }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<MediaSize> {
        vec![
            MediaSize::new("A4", 827, 1169),
            MediaSize::new("4x6", 400, 600),
            MediaSize::new("4x6 alt", 395, 590),
        ]
    }

    #[test]
    fn predefined_size_within_tolerance() {
        // 100x150mm is 393x590 hundredths; 400x600 is within 5%.
        let paper = resolve_paper(100, 150, &catalog());
        assert_eq!(paper, PaperSelection::Predefined(MediaSize::new("4x6", 400, 600)));
        assert_eq!(paper.name(), "4x6");
    }

    #[test]
    fn first_match_in_catalog_order_wins() {
        let mut sizes = catalog();
        sizes.swap(1, 2);
        assert_eq!(resolve_paper(100, 150, &sizes).name(), "4x6 alt");
    }

    #[test]
    fn custom_when_nothing_fits() {
        assert_eq!(
            resolve_paper(60, 40, &catalog()),
            PaperSelection::Custom {
                width: 236,
                height: 157
            }
        );
    }

    #[test]
    fn one_axis_outside_tolerance_is_not_a_match() {
        // Width matches 4x6 exactly but the height is 20% shorter.
        let sizes = vec![MediaSize::new("4x6", 393, 472)];
        assert!(matches!(
            resolve_paper(100, 150, &sizes),
            PaperSelection::Custom { .. }
        ));
    }

    #[test]
    fn empty_catalog_is_custom() {
        assert_eq!(resolve_paper(100, 150, &[]).dimensions(), (393, 590));
    }
}
