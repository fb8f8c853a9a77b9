//! Live / upcoming / ended buckets for display.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Reverse;

use crate::record::{ConferenceRecord, StoredConference};
use crate::status::ConferenceStatus;

/// A record paired with the status it shows at the classification instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub record: ConferenceRecord,
    pub status: ConferenceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConferenceCatalog {
    /// Soonest to finish first.
    pub live: Vec<CatalogEntry>,
    /// Soonest to start first.
    pub upcoming: Vec<CatalogEntry>,
    /// Most recently finished first.
    pub ended: Vec<CatalogEntry>,
    /// Records that could not be read and are left out of every bucket.
    pub malformed: usize,
}

impl ConferenceCatalog {
    /// Classifies `entries` as of `now`.
    ///
    /// Each record lands in the bucket of the status reconciliation would
    /// persist, so a catalog built between ticks matches the next write.
    pub fn classify<I>(entries: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = StoredConference>,
    {
        let mut catalog = Self::default();

        for entry in entries {
            let StoredConference::Valid(record) = entry else {
                catalog.malformed += 1;
                continue;
            };
            let status = record.reconcile(now);
            let bucket = match status {
                ConferenceStatus::Live => &mut catalog.live,
                ConferenceStatus::Upcoming => &mut catalog.upcoming,
                ConferenceStatus::Ended => &mut catalog.ended,
            };
            bucket.push(CatalogEntry { record, status });
        }

        // Records without a boundary sort last within their bucket.
        catalog
            .live
            .sort_by_key(|e| (e.record.end_time.is_none(), e.record.end_time));
        catalog
            .upcoming
            .sort_by_key(|e| (e.record.start_time.is_none(), e.record.start_time));
        catalog
            .ended
            .sort_by_key(|e| (e.record.end_time.is_none(), Reverse(e.record.end_time)));

        catalog
    }

    pub fn bucket(&self, status: ConferenceStatus) -> &[CatalogEntry] {
        match status {
            ConferenceStatus::Live => &self.live,
            ConferenceStatus::Upcoming => &self.upcoming,
            ConferenceStatus::Ended => &self.ended,
        }
    }

    pub fn len(&self) -> usize {
        self.live.len() + self.upcoming.len() + self.ended.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MalformedRecord;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 15, 0, 0).unwrap()
    }

    fn window(id: &str, start_offset_h: i64, end_offset_h: i64) -> StoredConference {
        ConferenceRecord::new(id)
            .with_window(
                now() + Duration::hours(start_offset_h),
                now() + Duration::hours(end_offset_h),
            )
            .into()
    }

    fn ids(entries: &[CatalogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.record.id.as_str()).collect()
    }

    #[test]
    fn buckets_follow_resolved_status() {
        let catalog = ConferenceCatalog::classify(
            vec![
                window("past", -5, -3),
                window("now", -1, 1),
                window("later", 2, 3),
            ],
            now(),
        );

        assert_eq!(ids(&catalog.live), ["now"]);
        assert_eq!(ids(&catalog.upcoming), ["later"]);
        assert_eq!(ids(&catalog.ended), ["past"]);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn stale_stored_status_does_not_leak_into_buckets() {
        let stale: StoredConference = ConferenceRecord::new("stale")
            .with_window(now() - Duration::hours(4), now() - Duration::hours(2))
            .with_status(Some(ConferenceStatus::Live))
            .into();

        let catalog = ConferenceCatalog::classify(vec![stale], now());
        assert!(catalog.live.is_empty());
        assert_eq!(catalog.ended[0].status, ConferenceStatus::Ended);
    }

    #[test]
    fn organizer_overrides_and_exempt_records_keep_their_status() {
        let early: StoredConference = ConferenceRecord::new("early")
            .with_window(now() + Duration::hours(1), now() + Duration::hours(2))
            .with_status(Some(ConferenceStatus::Live))
            .into();
        let manual: StoredConference = ConferenceRecord::new("manual")
            .with_status(Some(ConferenceStatus::Ended))
            .into();

        let catalog = ConferenceCatalog::classify(vec![early, manual], now());
        assert_eq!(ids(catalog.bucket(ConferenceStatus::Live)), ["early"]);
        assert_eq!(ids(catalog.bucket(ConferenceStatus::Ended)), ["manual"]);
    }

    #[test]
    fn orders_each_bucket_for_display() {
        let catalog = ConferenceCatalog::classify(
            vec![
                window("ends-late", -1, 5),
                window("ends-soon", -2, 1),
                window("starts-late", 10, 11),
                window("starts-soon", 1, 2),
                window("ended-long-ago", -10, -9),
                window("just-ended", -3, -1),
            ],
            now(),
        );

        assert_eq!(ids(&catalog.live), ["ends-soon", "ends-late"]);
        assert_eq!(ids(&catalog.upcoming), ["starts-soon", "starts-late"]);
        assert_eq!(ids(&catalog.ended), ["just-ended", "ended-long-ago"]);
    }

    #[test]
    fn malformed_records_are_counted_not_listed() {
        let broken = StoredConference::Malformed(MalformedRecord::new(
            "broken".into(),
            "startTime: unparseable",
        ));
        let catalog = ConferenceCatalog::classify(vec![broken, window("ok", 1, 2)], now());
        assert_eq!(catalog.malformed, 1);
        assert_eq!(catalog.len(), 1);
    }
}
