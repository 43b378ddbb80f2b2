//! Survivor selection for a parsed [`RetentionPolicy`].
//!
//! `Recent(n)` keeps the last `n` entries of the oldest-first list. Calendar
//! rules walk back `n` buckets from the one containing `now`, keeping the
//! newest snapshot found in each bucket. Empty buckets are skipped, they do
//! not extend the walk, and the walk ends at the oldest snapshot's bucket.
//!
//! Bucket membership is decided on the local calendar date of each snapshot
//! in `now`'s time zone. A [`BucketIndex`] maps every occupied bucket to the
//! index of its newest snapshot and is built once per evaluation.

use crate::model::{Snapshot, SnapshotList};
use crate::policy::{CalendarKind, RetentionPolicy, RetentionRule};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, TimeZone};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// First day of the `kind` bucket containing `date`.
#[must_use]
pub fn bucket_start(kind: CalendarKind, date: NaiveDate) -> NaiveDate {
    match kind {
        CalendarKind::Day => date,
        CalendarKind::Week => date
            .checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
            .unwrap_or(date),
        CalendarKind::Month => date.with_day(1).unwrap_or(date),
        CalendarKind::Year => date.with_ordinal(1).unwrap_or(date),
    }
}

/// Start of the bucket immediately before the one starting at `start`.
///
/// Returns `None` when the calendar runs out of representable dates.
#[must_use]
pub fn previous_bucket(kind: CalendarKind, start: NaiveDate) -> Option<NaiveDate> {
    match kind {
        CalendarKind::Day => start.checked_sub_days(Days::new(1)),
        CalendarKind::Week => start.checked_sub_days(Days::new(7)),
        CalendarKind::Month => start.checked_sub_months(Months::new(1)),
        CalendarKind::Year => start.checked_sub_months(Months::new(12)),
    }
}

/// Newest snapshot per occupied calendar bucket.
#[derive(Debug, Clone, Default)]
pub struct BucketIndex {
    newest: HashMap<(CalendarKind, NaiveDate), usize>,
}

impl BucketIndex {
    /// Index `snapshots` by local calendar date in `tz`.
    ///
    /// Later list positions overwrite earlier ones, so each bucket ends up
    /// pointing at its most recently created snapshot.
    pub fn build<Tz: TimeZone>(snapshots: &[Snapshot], tz: &Tz) -> Self {
        let mut newest = HashMap::with_capacity(snapshots.len() * CalendarKind::ALL.len());
        for (idx, snapshot) in snapshots.iter().enumerate() {
            let local = snapshot.created_at.with_timezone(tz).date_naive();
            for kind in CalendarKind::ALL {
                newest.insert((kind, bucket_start(kind, local)), idx);
            }
        }
        Self { newest }
    }

    /// List index of the newest snapshot in the bucket starting at `start`.
    #[must_use]
    pub fn newest_in(&self, kind: CalendarKind, start: NaiveDate) -> Option<usize> {
        self.newest.get(&(kind, start)).copied()
    }
}

/// Why a snapshot survived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub snapshot_id: String,
    pub rule: String,
    /// Position within the rule, 1-based (1 = newest snapshot or current bucket).
    pub slot: usize,
    /// First day of the calendar bucket; absent for recent rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<NaiveDate>,
}

/// Every rule's picks, in policy order.
///
/// A snapshot picked by several rules appears once per pick.
pub fn explain_survivors<Tz: TimeZone>(
    snapshots: &SnapshotList,
    policy: &RetentionPolicy,
    now: &DateTime<Tz>,
) -> Vec<Selection> {
    let has_calendar = policy
        .rules()
        .iter()
        .any(|rule| matches!(rule, RetentionRule::Calendar(..)));
    let index = if has_calendar {
        BucketIndex::build(snapshots, &now.timezone())
    } else {
        BucketIndex::default()
    };
    let today = now.date_naive();
    let oldest = snapshots
        .first()
        .map(|snapshot| snapshot.created_at.with_timezone(&now.timezone()).date_naive());

    let mut selections = Vec::new();
    for rule in policy.rules() {
        match *rule {
            RetentionRule::Recent(count) => select_recent(snapshots, count, &mut selections),
            RetentionRule::Calendar(kind, count) => {
                let walk = CalendarWalk { kind, count, today, oldest };
                select_calendar(snapshots, &index, walk, &mut selections);
            }
        }
    }
    selections
}

/// IDs of every snapshot kept by `policy` at `now`.
pub fn compute_survivors<Tz: TimeZone>(
    snapshots: &SnapshotList,
    policy: &RetentionPolicy,
    now: &DateTime<Tz>,
) -> BTreeSet<String> {
    explain_survivors(snapshots, policy, now)
        .into_iter()
        .map(|selection| selection.snapshot_id)
        .collect()
}

fn select_recent(snapshots: &[Snapshot], count: usize, out: &mut Vec<Selection>) {
    let start = snapshots.len().saturating_sub(count);
    let rule = RetentionRule::Recent(count).to_string();
    for (slot, snapshot) in snapshots[start..].iter().rev().enumerate() {
        debug!(snapshot = %snapshot.id, %rule, slot = slot + 1, "kept as recent");
        out.push(Selection {
            snapshot_id: snapshot.id.clone(),
            rule: rule.clone(),
            slot: slot + 1,
            bucket: None,
        });
    }
}

#[derive(Debug, Clone, Copy)]
struct CalendarWalk {
    kind: CalendarKind,
    count: usize,
    today: NaiveDate,
    /// Local date of the oldest snapshot; nothing lies before its bucket.
    oldest: Option<NaiveDate>,
}

fn select_calendar(
    snapshots: &[Snapshot],
    index: &BucketIndex,
    walk: CalendarWalk,
    out: &mut Vec<Selection>,
) {
    let CalendarWalk { kind, count, today, oldest } = walk;
    let Some(floor) = oldest.map(|date| bucket_start(kind, date)) else {
        return;
    };
    let rule = RetentionRule::Calendar(kind, count).to_string();
    let mut start = Some(bucket_start(kind, today));

    for slot in 1..=count {
        let Some(bucket) = start.filter(|bucket| *bucket >= floor) else {
            break;
        };
        if let Some(idx) = index.newest_in(kind, bucket) {
            let snapshot = &snapshots[idx];
            debug!(snapshot = %snapshot.id, %rule, %bucket, slot, "kept as {}", kind.as_str());
            out.push(Selection {
                snapshot_id: snapshot.id.clone(),
                rule: rule.clone(),
                slot,
                bucket: Some(bucket),
            });
        }
        start = previous_bucket(kind, bucket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::parse_policy;
    use chrono::{FixedOffset, Utc};

    fn snap(id: &str, created: &str) -> Snapshot {
        Snapshot::parse(id, "vol-1", created).expect("valid timestamp")
    }

    fn utc(raw: &str) -> DateTime<Utc> {
        crate::model::parse_created_at(raw).expect("valid timestamp")
    }

    fn survivors(list: &SnapshotList, policy: &str, now: &str) -> Vec<String> {
        let policy = parse_policy(policy).expect("valid policy");
        compute_survivors(list, &policy, &utc(now)).into_iter().collect()
    }

    fn ten_daily() -> SnapshotList {
        SnapshotList::new(
            (1..=10)
                .map(|day| snap(&format!("s{day:02}"), &format!("2023-05-{day:02}T03:00:00Z")))
                .collect(),
        )
    }

    #[test]
    fn bucket_starts() {
        let d = NaiveDate::from_ymd_opt(2023, 3, 15).unwrap();
        assert_eq!(bucket_start(CalendarKind::Day, d), d);
        // 2023-03-15 is a Wednesday
        assert_eq!(
            bucket_start(CalendarKind::Week, d),
            NaiveDate::from_ymd_opt(2023, 3, 13).unwrap()
        );
        assert_eq!(
            bucket_start(CalendarKind::Month, d),
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap()
        );
        assert_eq!(
            bucket_start(CalendarKind::Year, d),
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
        );
    }

    #[test]
    fn sunday_belongs_to_week_starting_previous_monday() {
        let sunday = NaiveDate::from_ymd_opt(2023, 3, 19).unwrap();
        assert_eq!(
            bucket_start(CalendarKind::Week, sunday),
            NaiveDate::from_ymd_opt(2023, 3, 13).unwrap()
        );
    }

    #[test]
    fn previous_buckets_step_one_unit() {
        let jan = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(
            previous_bucket(CalendarKind::Month, jan),
            NaiveDate::from_ymd_opt(2023, 12, 1)
        );
        assert_eq!(
            previous_bucket(CalendarKind::Year, jan),
            NaiveDate::from_ymd_opt(2023, 1, 1)
        );
        assert_eq!(
            previous_bucket(CalendarKind::Day, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            previous_bucket(CalendarKind::Week, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            NaiveDate::from_ymd_opt(2023, 12, 25)
        );
    }

    #[test]
    fn recent_keeps_last_n() {
        let list = ten_daily();
        assert_eq!(survivors(&list, "3r", "2023-05-10T12:00:00Z"), ["s08", "s09", "s10"]);
    }

    #[test]
    fn recent_zero_keeps_nothing() {
        assert!(survivors(&ten_daily(), "0r", "2023-05-10T12:00:00Z").is_empty());
    }

    #[test]
    fn recent_larger_than_list_keeps_all() {
        assert_eq!(survivors(&ten_daily(), "100r", "2023-05-10T12:00:00Z").len(), 10);
    }

    #[test]
    fn month_rule_picks_newest_per_bucket() {
        let list = SnapshotList::new(vec![
            snap("jan15", "2023-01-15T00:00:00Z"),
            snap("feb10", "2023-02-10T00:00:00Z"),
            snap("feb20", "2023-02-20T00:00:00Z"),
            snap("mar01", "2023-03-01T00:00:00Z"),
        ]);
        assert_eq!(
            survivors(&list, "2m", "2023-03-15T00:00:00Z"),
            ["feb20", "mar01"]
        );
    }

    #[test]
    fn single_snapshot_is_selected_by_day_rule() {
        let list = SnapshotList::new(vec![snap("only", "2023-06-01T08:00:00Z")]);
        assert_eq!(survivors(&list, "1d", "2023-06-01T20:00:00Z"), ["only"]);
    }

    #[test]
    fn oldest_snapshot_is_eligible_for_calendar_rules() {
        let list = SnapshotList::new(vec![
            snap("old", "2022-06-01T00:00:00Z"),
            snap("new", "2023-06-01T00:00:00Z"),
        ]);
        assert_eq!(survivors(&list, "2y", "2023-07-01T00:00:00Z"), ["new", "old"]);
    }

    #[test]
    fn empty_buckets_do_not_extend_the_walk() {
        let list = SnapshotList::new(vec![
            snap("d1", "2023-05-01T10:00:00Z"),
            snap("d5", "2023-05-05T10:00:00Z"),
        ]);
        // Three day buckets: 05-07, 05-06, 05-05. 05-01 is out of reach.
        assert_eq!(survivors(&list, "3d", "2023-05-07T10:00:00Z"), ["d5"]);
    }

    #[test]
    fn future_snapshots_are_outside_every_bucket() {
        let list = SnapshotList::new(vec![snap("future", "2023-05-08T10:00:00Z")]);
        assert!(survivors(&list, "5d", "2023-05-07T10:00:00Z").is_empty());
    }

    #[test]
    fn bucket_end_is_exclusive() {
        let list = SnapshotList::new(vec![
            snap("last-second", "2023-05-06T23:59:59Z"),
            snap("midnight", "2023-05-07T00:00:00Z"),
        ]);
        assert_eq!(survivors(&list, "1d", "2023-05-07T12:00:00Z"), ["midnight"]);
        assert_eq!(
            survivors(&list, "2d", "2023-05-07T12:00:00Z"),
            ["last-second", "midnight"]
        );
    }

    #[test]
    fn week_rule_uses_monday_boundaries() {
        let list = SnapshotList::new(vec![
            snap("sun", "2023-03-12T22:00:00Z"),
            snap("mon", "2023-03-13T01:00:00Z"),
            snap("wed", "2023-03-15T01:00:00Z"),
        ]);
        assert_eq!(survivors(&list, "1w", "2023-03-16T00:00:00Z"), ["wed"]);
        assert_eq!(survivors(&list, "2w", "2023-03-16T00:00:00Z"), ["sun", "wed"]);
    }

    #[test]
    fn year_rule_crosses_year_boundary() {
        let list = SnapshotList::new(vec![
            snap("y21", "2021-12-31T23:00:00Z"),
            snap("y22a", "2022-03-01T00:00:00Z"),
            snap("y22b", "2022-12-31T23:59:59Z"),
        ]);
        assert_eq!(survivors(&list, "3y", "2023-01-01T00:00:01Z"), ["y21", "y22b"]);
    }

    #[test]
    fn buckets_follow_now_time_zone() {
        // 23:30 UTC on May 6th is May 7th in UTC+02:00.
        let list = SnapshotList::new(vec![snap("late", "2023-05-06T23:30:00Z")]);
        let policy = parse_policy("1d").unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let now_local = plus_two.with_ymd_and_hms(2023, 5, 7, 12, 0, 0).unwrap();
        let now_utc = utc("2023-05-07T12:00:00Z");

        assert_eq!(compute_survivors(&list, &policy, &now_local).len(), 1);
        assert!(compute_survivors(&list, &policy, &now_utc).is_empty());
    }

    #[test]
    fn identical_timestamps_prefer_later_position() {
        let list = SnapshotList::new(vec![
            snap("first", "2023-05-07T10:00:00Z"),
            snap("second", "2023-05-07T10:00:00Z"),
        ]);
        assert_eq!(survivors(&list, "1d", "2023-05-07T12:00:00Z"), ["second"]);
    }

    #[test]
    fn rules_union_and_deduplicate() {
        let list = ten_daily();
        let combined = survivors(&list, "2r1d", "2023-05-10T12:00:00Z");
        assert_eq!(combined, ["s09", "s10"]);
    }

    #[test]
    fn empty_list_keeps_nothing() {
        let kept = survivors(&SnapshotList::default(), "3r2d1w1m1y", "2023-05-10T12:00:00Z");
        assert!(kept.is_empty());
    }

    #[test]
    fn huge_calendar_count_stops_at_oldest_bucket() {
        let list = ten_daily();
        let now = "2023-05-10T12:00:00Z";
        let max = usize::MAX;
        for letter in ['d', 'w', 'm', 'y'] {
            let bounded = survivors(&list, &format!("1000{letter}"), now);
            let huge = survivors(&list, &format!("{max}{letter}"), now);
            assert_eq!(huge, bounded, "{max}{letter}");
        }
        assert_eq!(survivors(&list, &format!("{max}d"), now).len(), 10);
    }

    #[test]
    fn calendar_walk_ignores_buckets_before_oldest_snapshot() {
        let policy = parse_policy("5000d").expect("valid policy");
        let explained = explain_survivors(&ten_daily(), &policy, &utc("2023-05-10T12:00:00Z"));
        let last_slot = explained.iter().map(|selection| selection.slot).max();
        assert_eq!(last_slot, Some(10));
    }

    #[test]
    fn explain_records_rule_slot_and_bucket() {
        let list = SnapshotList::new(vec![
            snap("feb", "2023-02-20T00:00:00Z"),
            snap("mar", "2023-03-01T00:00:00Z"),
        ]);
        let policy = parse_policy("1r2m").unwrap();
        let picks = explain_survivors(&list, &policy, &utc("2023-03-15T00:00:00Z"));

        assert_eq!(picks.len(), 3);
        assert_eq!(picks[0].rule, "1r");
        assert_eq!(picks[0].snapshot_id, "mar");
        assert_eq!(picks[0].bucket, None);
        assert_eq!(picks[1].rule, "2m");
        assert_eq!(picks[1].slot, 1);
        assert_eq!(picks[1].bucket, NaiveDate::from_ymd_opt(2023, 3, 1));
        assert_eq!(picks[2].snapshot_id, "feb");
        assert_eq!(picks[2].slot, 2);
    }
}
