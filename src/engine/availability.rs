use crate::model::*;

// ── Slot Algorithm ────────────────────────────────────────────────

/// Candidate grid for one open window: every `granularity` step from
/// `window.start` while the full service still fits before close.
/// A duration longer than the window yields an empty grid, not an error.
pub fn slot_grid(window: Span, duration: Minutes, granularity: Minutes) -> Vec<Minutes> {
    if duration <= 0 || granularity <= 0 {
        return Vec::new();
    }
    let mut grid = Vec::new();
    let mut start = window.start;
    while start + duration <= window.end {
        grid.push(start);
        start += granularity;
    }
    grid
}

/// Drop every candidate whose `[c, c+duration)` overlaps any booked
/// interval. Half-open: a slot may start exactly when a booking ends.
pub fn drop_conflicting(candidates: &[Minutes], duration: Minutes, booked: &[Span]) -> Vec<Minutes> {
    candidates
        .iter()
        .copied()
        .filter(|&c| {
            let slot = Span::new(c, c + duration);
            !booked.iter().any(|b| slot.overlaps(b))
        })
        .collect()
}

/// Union of per-technician candidate lists: a start is available if at
/// least one technician is free. Sorted ascending, deduplicated.
pub fn union_starts(per_technician: &[Vec<Minutes>]) -> Vec<Minutes> {
    let mut all: Vec<Minutes> = per_technician.iter().flatten().copied().collect();
    all.sort_unstable();
    all.dedup();
    all
}

/// Same-day lead-time filter: keep only starts at or after `cutoff`.
pub fn apply_lead_time(candidates: Vec<Minutes>, cutoff: Minutes) -> Vec<Minutes> {
    candidates.into_iter().filter(|&c| c >= cutoff).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: Minutes = 60;

    fn window(open: Minutes, close: Minutes) -> Span {
        Span::new(open, close)
    }

    // ── slot_grid ────────────────────────────────────────

    #[test]
    fn grid_fills_open_window() {
        // 09:00–18:00, 60-minute service, 30-minute steps:
        // 09:00 .. 17:00 inclusive
        let grid = slot_grid(window(9 * H, 18 * H), 60, 30);
        assert_eq!(grid.len(), 17);
        assert_eq!(grid.first(), Some(&(9 * H)));
        assert_eq!(grid[1], 9 * H + 30);
        assert_eq!(grid.last(), Some(&(17 * H)));
    }

    #[test]
    fn grid_last_slot_fits_exactly() {
        // Every start leaves room for the full duration before close
        let grid = slot_grid(window(9 * H, 18 * H), 90, 30);
        for &start in &grid {
            assert!(start + 90 <= 18 * H);
        }
        assert_eq!(grid.last(), Some(&(16 * H + 30)));
    }

    #[test]
    fn grid_duration_longer_than_window_is_empty() {
        let grid = slot_grid(window(9 * H, 10 * H), 120, 30);
        assert!(grid.is_empty());
    }

    #[test]
    fn grid_duration_equal_to_window_single_slot() {
        let grid = slot_grid(window(9 * H, 10 * H), 60, 30);
        assert_eq!(grid, vec![9 * H]);
    }

    #[test]
    fn grid_nonstandard_granularity() {
        let grid = slot_grid(window(600, 660), 15, 15);
        assert_eq!(grid, vec![600, 615, 630, 645]);
    }

    #[test]
    fn grid_rejects_degenerate_inputs() {
        assert!(slot_grid(window(540, 1080), 0, 30).is_empty());
        assert!(slot_grid(window(540, 1080), 60, 0).is_empty());
    }

    // ── drop_conflicting ─────────────────────────────────

    #[test]
    fn booked_hour_blocks_every_overlapping_start() {
        // Booked 10:00–11:00, 60-minute service: 09:30, 10:00 and 10:30
        // all overlap; 09:00 ends exactly at 10:00 and 11:00 starts
        // exactly at the booking's end, so both survive.
        let grid = slot_grid(window(9 * H, 18 * H), 60, 30);
        let booked = vec![Span::new(10 * H, 11 * H)];
        let free = drop_conflicting(&grid, 60, &booked);

        assert!(free.contains(&(9 * H)));
        assert!(!free.contains(&(9 * H + 30)));
        assert!(!free.contains(&(10 * H)));
        assert!(!free.contains(&(10 * H + 30)));
        assert!(free.contains(&(11 * H)));
        assert_eq!(free.len(), grid.len() - 3);
    }

    #[test]
    fn touching_endpoints_do_not_conflict() {
        let candidates = vec![540, 600];
        let booked = vec![Span::new(600, 660)];
        // 30-minute service at 09:00 ends 09:30 — clear of the booking
        assert_eq!(drop_conflicting(&candidates, 30, &booked), vec![540]);
        // 60-minute service at 09:00 ends exactly at the booking start
        assert_eq!(drop_conflicting(&candidates, 60, &booked), vec![540]);
    }

    #[test]
    fn no_bookings_keeps_grid_intact() {
        let grid = slot_grid(window(9 * H, 12 * H), 30, 30);
        assert_eq!(drop_conflicting(&grid, 30, &[]), grid);
    }

    #[test]
    fn fully_booked_day_yields_nothing() {
        let grid = slot_grid(window(9 * H, 12 * H), 30, 30);
        let booked = vec![Span::new(9 * H, 12 * H)];
        assert!(drop_conflicting(&grid, 30, &booked).is_empty());
    }

    #[test]
    fn multiple_bookings_each_block_their_range() {
        let grid = slot_grid(window(9 * H, 12 * H), 30, 30);
        let booked = vec![Span::new(9 * H, 9 * H + 30), Span::new(11 * H, 11 * H + 30)];
        let free = drop_conflicting(&grid, 30, &booked);
        assert_eq!(free, vec![9 * H + 30, 10 * H, 10 * H + 30, 11 * H + 30]);
    }

    // ── union_starts ─────────────────────────────────────

    #[test]
    fn union_is_sorted_and_deduplicated() {
        let per_tech = vec![vec![600, 660, 720], vec![540, 660], vec![]];
        assert_eq!(union_starts(&per_tech), vec![540, 600, 660, 720]);
    }

    #[test]
    fn union_membership_matches_individual_lists() {
        // A start is in the union iff at least one technician has it
        let a = vec![540, 600];
        let b = vec![600, 630];
        let union = union_starts(&[a.clone(), b.clone()]);
        for &s in &union {
            assert!(a.contains(&s) || b.contains(&s));
        }
        for &s in a.iter().chain(&b) {
            assert!(union.contains(&s));
        }
    }

    #[test]
    fn union_of_nothing_is_empty() {
        assert!(union_starts(&[]).is_empty());
        assert!(union_starts(&[vec![], vec![]]).is_empty());
    }

    // ── apply_lead_time ──────────────────────────────────

    #[test]
    fn lead_time_drops_earlier_starts() {
        let starts = vec![540, 570, 600, 630];
        // now = 09:45, lead 30 → cutoff 10:15: keep 10:30 only
        assert_eq!(apply_lead_time(starts, 585 + 30), vec![630]);
    }

    #[test]
    fn lead_time_cutoff_is_inclusive() {
        let starts = vec![600, 630];
        assert_eq!(apply_lead_time(starts, 600), vec![600, 630]);
    }
}
