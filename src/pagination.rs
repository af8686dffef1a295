//! Pagination over sequential sura read-throughs.
//!
//! A sura requested bare is delivered in fixed pages of 12 ayahs; the cursor
//! lives in [`ConversationState`] and is advanced here. Explicit ranges are
//! capped at 20 ayahs per request.

use crate::models::ConversationState;

/// Ayahs delivered per page of a sequential read-through.
pub const PAGE_SIZE: u32 = 12;

/// Maximum span honored for an explicit "from X to Y" range request. Wider
/// requests are clamped to the first `MAX_RANGE_SPAN` ayahs.
pub const MAX_RANGE_SPAN: u32 = 20;

/// Outcome of advancing the cursor on a continue request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Deliver `start..=end` of `sura`; `next` is the replacement cursor, or
    /// `None` when this page exhausts the sura.
    Page {
        sura: String,
        start: u32,
        end: u32,
        next: Option<ConversationState>,
    },
    /// The cursor was already past the last ayah: the sura is fully
    /// delivered and the cursor must be cleared.
    Completed { sura: String },
    /// A continue request arrived with no active cursor. Never guess a sura.
    Lost,
}

/// Computes one page window starting at `start` within `1..=max_ayah`.
pub fn page_window(sura: &str, start: u32, max_ayah: u32) -> Advance {
    if start > max_ayah {
        return Advance::Completed {
            sura: sura.to_string(),
        };
    }

    let end = (start + PAGE_SIZE - 1).min(max_ayah);
    let next = (end < max_ayah).then(|| ConversationState {
        sura_name: sura.to_string(),
        next_start_ayah: end + 1,
        max_ayah,
    });

    Advance::Page {
        sura: sura.to_string(),
        start,
        end,
        next,
    }
}

/// Advances an existing cursor, or reports the lost-context case.
pub fn advance(state: Option<&ConversationState>) -> Advance {
    match state {
        Some(state) => page_window(&state.sura_name, state.next_start_ayah, state.max_ayah),
        None => Advance::Lost,
    }
}

/// Clamps an explicit range request to [`MAX_RANGE_SPAN`] ayahs. Returns the
/// effective bounds and whether clamping occurred.
pub fn clamp_range(start: u32, end: u32) -> (u32, u32, bool) {
    debug_assert!(end >= start);
    let span = end - start + 1;
    if span <= MAX_RANGE_SPAN {
        (start, end, false)
    } else {
        (start, start + MAX_RANGE_SPAN - 1, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon;

    #[test]
    fn first_page_of_long_sura() {
        match page_window("bakara", 1, 286) {
            Advance::Page {
                start, end, next, ..
            } => {
                assert_eq!((start, end), (1, 12));
                let next = next.expect("long sura keeps a cursor");
                assert_eq!(next.next_start_ayah, 13);
                assert_eq!(next.max_ayah, 286);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn short_sura_is_exhausted_in_one_page() {
        match page_window("fatiha", 1, 7) {
            Advance::Page {
                start, end, next, ..
            } => {
                assert_eq!((start, end), (1, 7));
                assert!(next.is_none());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn cursor_past_end_reports_completion() {
        let state = ConversationState {
            sura_name: "fatiha".to_string(),
            next_start_ayah: 8,
            max_ayah: 7,
        };
        assert_eq!(
            advance(Some(&state)),
            Advance::Completed {
                sura: "fatiha".to_string()
            }
        );
    }

    #[test]
    fn missing_cursor_reports_lost_context() {
        assert_eq!(advance(None), Advance::Lost);
    }

    #[test]
    fn every_sura_is_covered_exactly_once_in_order() {
        for &(sura, count) in canon::SURA_VERSE_COUNTS {
            let mut delivered = Vec::new();
            let mut outcome = page_window(sura, 1, count);
            let mut pages = 0;

            loop {
                match outcome {
                    Advance::Page {
                        start, end, next, ..
                    } => {
                        delivered.extend(start..=end);
                        pages += 1;
                        assert!(pages <= 1 + count / PAGE_SIZE, "runaway pagination");
                        match next {
                            Some(state) => outcome = advance(Some(&state)),
                            None => break,
                        }
                    }
                    other => panic!("unexpected outcome for {sura}: {other:?}"),
                }
            }

            let expected: Vec<u32> = (1..=count).collect();
            assert_eq!(delivered, expected, "coverage mismatch for {sura}");
        }
    }

    #[test]
    fn wide_ranges_are_clamped() {
        assert_eq!(clamp_range(3, 5), (3, 5, false));
        assert_eq!(clamp_range(1, 20), (1, 20, false));
        assert_eq!(clamp_range(1, 40), (1, 20, true));
        assert_eq!(clamp_range(10, 31), (10, 29, true));
    }
}
