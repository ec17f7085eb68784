use chrono::NaiveDate;

use crate::model::{weekday_index, DayHours, ResolvedDay, StoreState};

/// Resolve a store's open/close interval for one concrete date.
///
/// An exact-date holiday override wins over the weekly row. A weekday
/// with no row at all is `NotConfigured`, which is distinct from an
/// explicit `Closed` — the first means "this store never set up hours",
/// the second "no slots today".
pub fn resolve_hours(state: &StoreState, date: NaiveDate) -> ResolvedDay {
    let configured = state
        .holidays
        .get(&date)
        .copied()
        .or(state.weekly[weekday_index(date)]);

    match configured {
        None => ResolvedDay::NotConfigured,
        Some(DayHours::Closed) => ResolvedDay::Closed,
        Some(DayHours::Open(window)) => ResolvedDay::Open(window),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{parse_date, Span};
    use ulid::Ulid;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn weekly_row_resolves() {
        let mut rs = StoreState::new(Ulid::new());
        // 2026-08-06 is a Thursday (index 3)
        rs.weekly[3] = Some(DayHours::Open(Span::new(540, 1080)));
        assert_eq!(
            resolve_hours(&rs, d("2026-08-06")),
            ResolvedDay::Open(Span::new(540, 1080))
        );
    }

    #[test]
    fn missing_row_is_unconfigured_not_closed() {
        let rs = StoreState::new(Ulid::new());
        assert_eq!(resolve_hours(&rs, d("2026-08-06")), ResolvedDay::NotConfigured);
    }

    #[test]
    fn explicit_closed_weekday() {
        let mut rs = StoreState::new(Ulid::new());
        rs.weekly[6] = Some(DayHours::Closed);
        // 2026-08-09 is a Sunday
        assert_eq!(resolve_hours(&rs, d("2026-08-09")), ResolvedDay::Closed);
    }

    #[test]
    fn holiday_overrides_weekly_row() {
        let mut rs = StoreState::new(Ulid::new());
        rs.weekly[3] = Some(DayHours::Open(Span::new(540, 1080)));
        rs.holidays.insert(d("2026-08-06"), DayHours::Closed);

        assert_eq!(resolve_hours(&rs, d("2026-08-06")), ResolvedDay::Closed);
        // The following Thursday is unaffected
        assert_eq!(
            resolve_hours(&rs, d("2026-08-13")),
            ResolvedDay::Open(Span::new(540, 1080))
        );
    }

    #[test]
    fn holiday_can_shorten_hours() {
        let mut rs = StoreState::new(Ulid::new());
        rs.weekly[3] = Some(DayHours::Open(Span::new(540, 1080)));
        rs.holidays
            .insert(d("2026-12-24"), DayHours::Open(Span::new(600, 840)));
        // 2026-12-24 is a Thursday
        assert_eq!(
            resolve_hours(&rs, d("2026-12-24")),
            ResolvedDay::Open(Span::new(600, 840))
        );
    }
}
