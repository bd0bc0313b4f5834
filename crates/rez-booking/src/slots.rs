// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Immutable snapshot of one reservable slot, in course-local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeeTimeSlot {
    pub tee_sheet_id: i64,
    pub start_time: NaiveDateTime,
    pub holes: u8,
    pub price: Decimal,
    pub course_name: String,
    pub num_available: u8,
}

/// How to break a tie between equal-earliest eligible slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Ascending numeric tee-sheet id: deterministic across concurrent runs.
    #[default]
    TeeSheetId,
    /// Whatever order the remote returned.
    FirstSeen,
}

/// Keep slots inside `[start, end)`.  A `None` bound is open.
pub fn filter_window(
    slots: &[TeeTimeSlot],
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> Vec<TeeTimeSlot> {
    slots
        .iter()
        .filter(|s| start.map_or(true, |t| s.start_time >= t))
        .filter(|s| end.map_or(true, |t| s.start_time < t))
        .cloned()
        .collect()
}

/// Select the slot auto-book should take: the earliest with room for
/// `num_players`, ties broken per `tie_break`.
pub fn pick_auto_book(
    slots: &[TeeTimeSlot],
    num_players: u8,
    tie_break: TieBreak,
) -> Option<TeeTimeSlot> {
    let mut eligible: Vec<&TeeTimeSlot> = slots
        .iter()
        .filter(|s| s.num_available >= num_players)
        .collect();
    match tie_break {
        TieBreak::TeeSheetId => {
            eligible.sort_by_key(|s| (s.start_time, s.tee_sheet_id));
        }
        TieBreak::FirstSeen => {
            // Stable sort keeps remote order within equal start times.
            eligible.sort_by_key(|s| s.start_time);
        }
    }
    eligible.first().map(|s| (*s).clone())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 12)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    fn slot(id: i64, hour: u32, min: u32, available: u8) -> TeeTimeSlot {
        TeeTimeSlot {
            tee_sheet_id: id,
            start_time: at(hour, min),
            holes: 18,
            price: "54.00".parse().unwrap(),
            course_name: "Birdsfoot".into(),
            num_available: available,
        }
    }

    // ── Window filtering ──────────────────────────────────────────────────────

    #[test]
    fn window_is_inclusive_exclusive() {
        let slots = vec![slot(1, 8, 0, 4), slot(2, 9, 0, 4), slot(3, 10, 0, 4)];
        let filtered = filter_window(&slots, Some(at(8, 0)), Some(at(10, 0)));
        let ids: Vec<i64> = filtered.iter().map(|s| s.tee_sheet_id).collect();
        assert_eq!(ids, vec![1, 2], "start inclusive, end exclusive");
    }

    #[test]
    fn open_bounds_keep_everything() {
        let slots = vec![slot(1, 7, 0, 4), slot(2, 17, 30, 4)];
        assert_eq!(filter_window(&slots, None, None).len(), 2);
    }

    #[test]
    fn start_only_cuts_earlier_slots() {
        let slots = vec![slot(1, 7, 0, 4), slot(2, 12, 0, 4)];
        let filtered = filter_window(&slots, Some(at(9, 0)), None);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].tee_sheet_id, 2);
    }

    // ── Auto-book selection ───────────────────────────────────────────────────

    #[test]
    fn picks_earliest_with_capacity() {
        let slots = vec![slot(1, 10, 0, 4), slot(2, 8, 0, 1), slot(3, 9, 0, 4)];
        let picked = pick_auto_book(&slots, 2, TieBreak::TeeSheetId).unwrap();
        assert_eq!(picked.tee_sheet_id, 3, "8:00 lacks capacity, 9:00 wins");
    }

    #[test]
    fn equal_times_break_on_tee_sheet_id() {
        let slots = vec![slot(222, 9, 0, 4), slot(111, 9, 0, 4)];
        let picked = pick_auto_book(&slots, 2, TieBreak::TeeSheetId).unwrap();
        assert_eq!(picked.tee_sheet_id, 111);
    }

    #[test]
    fn first_seen_keeps_remote_order_on_tie() {
        let slots = vec![slot(222, 9, 0, 4), slot(111, 9, 0, 4)];
        let picked = pick_auto_book(&slots, 2, TieBreak::FirstSeen).unwrap();
        assert_eq!(picked.tee_sheet_id, 222);
    }

    #[test]
    fn no_capacity_anywhere_yields_none() {
        let slots = vec![slot(1, 8, 0, 1), slot(2, 9, 0, 1)];
        assert!(pick_auto_book(&slots, 4, TieBreak::TeeSheetId).is_none());
    }

    #[test]
    fn empty_slots_yield_none() {
        assert!(pick_auto_book(&[], 1, TieBreak::TeeSheetId).is_none());
    }

    #[test]
    fn exact_capacity_is_enough() {
        let slots = vec![slot(1, 8, 0, 2)];
        assert!(pick_auto_book(&slots, 2, TieBreak::TeeSheetId).is_some());
    }
}
