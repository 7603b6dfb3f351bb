//! Stale-response detection.

use chrono::NaiveDate;

use crate::models::Showtime;

/// Whether a fetched day is a stale/fallback response.
///
/// The source returns the closest published date's data when the requested
/// date has no showtimes yet. Storing such a response would file showtimes
/// under the wrong date, so the date is rejected instead.
///
/// An empty schedule is a legitimate result, not a fallback: publishers have
/// days with nothing playing.
pub fn is_stale_response(
    requested: NaiveDate,
    selected: Option<NaiveDate>,
    showtimes: &[Showtime],
) -> bool {
    // The page explicitly claims another date. Showtime evidence for the
    // requested date overrides the claim; without it the data is untrusted.
    if let Some(selected) = selected {
        if selected != requested && !showtimes.iter().any(|s| s.date == requested) {
            return true;
        }
    }

    if showtimes.is_empty() {
        return false;
    }

    // Every showtime belongs to some other date.
    showtimes.iter().all(|s| s.date != requested)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn showtime_on(d: &str) -> Showtime {
        Showtime {
            id: "s1".into(),
            film_id: 1,
            cinema_id: "C1".into(),
            date: date(d),
            time: "20:00".into(),
            version: "VF".into(),
            week_start: date("2026-02-18"),
        }
    }

    #[test]
    fn mismatched_selected_date_without_evidence_is_stale() {
        assert!(is_stale_response(
            date("2026-02-20"),
            Some(date("2026-02-18")),
            &[showtime_on("2026-02-18")],
        ));
    }

    #[test]
    fn showtime_evidence_overrides_selected_date() {
        assert!(!is_stale_response(
            date("2026-02-20"),
            Some(date("2026-02-18")),
            &[showtime_on("2026-02-20")],
        ));
    }

    #[test]
    fn empty_schedule_is_not_stale() {
        assert!(!is_stale_response(
            date("2026-02-20"),
            Some(date("2026-02-20")),
            &[],
        ));
        // Even with no selected-date signal at all.
        assert!(!is_stale_response(date("2026-02-20"), None, &[]));
    }

    #[test]
    fn all_showtimes_on_other_dates_is_stale() {
        assert!(is_stale_response(
            date("2026-02-20"),
            None,
            &[showtime_on("2026-02-18"), showtime_on("2026-02-19")],
        ));
    }

    #[test]
    fn any_showtime_on_requested_date_is_fresh() {
        assert!(!is_stale_response(
            date("2026-02-20"),
            None,
            &[showtime_on("2026-02-18"), showtime_on("2026-02-20")],
        ));
    }
}
