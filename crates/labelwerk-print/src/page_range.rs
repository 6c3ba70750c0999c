// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page range strings such as "1-3,5,7-9".

use std::collections::BTreeSet;

/// Highest page number a range may name. Ranges reaching past it are cut
/// short and pages above it are skipped.
pub const MAX_PAGE_NUMBER: u32 = 10_000;

/// Parse a comma-separated page range into ascending, de-duplicated 1-based
/// page numbers.
///
/// Each token is a positive integer or an inclusive `start-end` pair.
/// Malformed, non-positive and reversed tokens are skipped, as are pages
/// above [`MAX_PAGE_NUMBER`]. An empty string
/// yields an empty list, which callers read as "all pages".
pub fn parse_page_range(spec: &str) -> Vec<u32> {
    let mut pages = BTreeSet::new();

    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once('-') {
            Some((start, end)) => {
                let (Some(start), Some(end)) = (parse_page(start), parse_page(end)) else {
                    continue;
                };
                let end = end.min(MAX_PAGE_NUMBER);
                if start <= end {
                    pages.extend(start..=end);
                }
            }
            None => {
                if let Some(page) = parse_page(token).filter(|&p| p <= MAX_PAGE_NUMBER) {
                    pages.insert(page);
                }
            }
        }
    }

    pages.into_iter().collect()
}

fn parse_page(s: &str) -> Option<u32> {
    s.trim().parse::<u32>().ok().filter(|&n| n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_singles_and_ranges() {
        assert_eq!(parse_page_range("1-3,5,7-9"), vec![1, 2, 3, 5, 7, 8, 9]);
    }

    #[test]
    fn empty_means_all_pages() {
        assert!(parse_page_range("").is_empty());
        assert!(parse_page_range(" , ").is_empty());
    }

    #[test]
    fn reversed_range_is_ignored() {
        assert!(parse_page_range("3-1").is_empty());
        assert_eq!(parse_page_range("3-1,4"), vec![4]);
    }

    #[test]
    fn malformed_and_non_positive_tokens_are_skipped() {
        assert_eq!(parse_page_range("0,abc,2,-1,1-x,4-4"), vec![2, 4]);
        assert_eq!(parse_page_range("1-2-3,6"), vec![6]);
    }

    #[test]
    fn overlaps_are_deduplicated_and_sorted() {
        assert_eq!(parse_page_range(" 5 , 2-4,3 ,1 - 2"), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn huge_ranges_stop_at_page_ceiling() {
        let pages = parse_page_range("1-4294967295");
        assert_eq!(pages.len(), MAX_PAGE_NUMBER as usize);
        assert_eq!(pages.last(), Some(&MAX_PAGE_NUMBER));

        assert_eq!(parse_page_range("3,20000,4294967295"), vec![3]);
        assert!(parse_page_range("20000-30000").is_empty());
    }
}
