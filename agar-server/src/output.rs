//! Plain-text rendering for the operator commands.

use agar_core::{
    CatalogEntry, ConferenceCatalog, ConferenceRecord, ConferenceStatus, ReconcileReport,
    Remaining,
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write;

pub fn render_report(report: &ReconcileReport) -> String {
    let mut out = format!(
        "scanned {} conferences: {} updated, {} unchanged, {} exempt, {} malformed, {} failed, \
         {} conflicted",
        report.scanned,
        report.updated,
        report.unchanged,
        report.exempt,
        report.malformed,
        report.failed,
        report.conflicts
    );
    for transition in &report.transitions {
        let from = transition
            .from
            .map_or("(unset)", ConferenceStatus::as_str);
        let _ = write!(out, "\n  {}: {} -> {}", transition.id, from, transition.to);
    }
    out
}

pub fn render_catalog(catalog: &ConferenceCatalog, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    for status in [
        ConferenceStatus::Live,
        ConferenceStatus::Upcoming,
        ConferenceStatus::Ended,
    ] {
        let bucket = catalog.bucket(status);
        let _ = writeln!(out, "{} ({})", heading(status), bucket.len());
        for entry in bucket {
            let _ = writeln!(out, "  {}", catalog_line(entry, now));
        }
    }
    if catalog.malformed > 0 {
        let _ = writeln!(out, "{} unreadable record(s) skipped", catalog.malformed);
    }
    out.trim_end().to_string()
}

pub fn render_inspection(record: &ConferenceRecord, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "id:         {}", record.id);
    if let Some(title) = &record.title {
        let _ = writeln!(out, "title:      {title}");
    }
    let _ = writeln!(out, "start:      {}", instant(record.start_time));
    let _ = writeln!(out, "end:        {}", instant(record.end_time));
    let _ = writeln!(
        out,
        "stored:     {}",
        record.status.map_or("(unset)", ConferenceStatus::as_str)
    );
    let _ = writeln!(out, "resolved:   {}", record.resolve(now));
    let _ = write!(out, "effective:  {}", record.reconcile(now));
    if !record.is_time_managed() {
        out.push_str(" (status managed by hand)");
    }
    out
}

fn heading(status: ConferenceStatus) -> &'static str {
    match status {
        ConferenceStatus::Live => "Live",
        ConferenceStatus::Upcoming => "Upcoming",
        ConferenceStatus::Ended => "Ended",
    }
}

fn catalog_line(entry: &CatalogEntry, now: DateTime<Utc>) -> String {
    let record = &entry.record;
    let name = match &record.title {
        Some(title) => format!("{} ({title})", record.id),
        None => record.id.to_string(),
    };
    let when = match (entry.status, record.start_time, record.end_time) {
        (ConferenceStatus::Live, _, Some(end)) => format!("ends in {}", Remaining::until(end, now)),
        (ConferenceStatus::Upcoming, Some(start), _) => {
            format!("starts in {}", Remaining::until(start, now))
        }
        (ConferenceStatus::Ended, _, Some(end)) => format!("ended {}", instant(Some(end))),
        _ => "no schedule".to_string(),
    };
    format!("{name}  {when}")
}

fn instant(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(
        || "-".to_string(),
        |at| at.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use agar_core::{StatusTransition, StoredConference};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn report_lists_transitions() {
        let report = ReconcileReport {
            scanned: 3,
            updated: 2,
            unchanged: 1,
            transitions: vec![
                StatusTransition {
                    id: "1".into(),
                    from: Some(ConferenceStatus::Upcoming),
                    to: ConferenceStatus::Live,
                },
                StatusTransition {
                    id: "3".into(),
                    from: None,
                    to: ConferenceStatus::Ended,
                },
            ],
            ..ReconcileReport::default()
        };

        assert_eq!(
            render_report(&report),
            "scanned 3 conferences: 2 updated, 1 unchanged, 0 exempt, 0 malformed, 0 failed, \
             0 conflicted\n  1: upcoming -> live\n  3: (unset) -> ended"
        );
    }

    #[test]
    fn catalog_shows_countdowns_per_bucket() {
        let entries: Vec<StoredConference> = vec![
            ConferenceRecord::new("talk")
                .with_title("Gut Microbiome")
                .with_window(now() - Duration::minutes(10), now() + Duration::minutes(90))
                .into(),
            ConferenceRecord::new("poster")
                .with_window(now() + Duration::hours(26), now() + Duration::hours(27))
                .into(),
        ];
        let catalog = ConferenceCatalog::classify(entries, now());

        assert_eq!(
            render_catalog(&catalog, now()),
            "Live (1)\n  talk (Gut Microbiome)  ends in 01:30:00\n\
             Upcoming (1)\n  poster  starts in 26:00:00\n\
             Ended (0)"
        );
    }

    #[test]
    fn inspection_flags_hand_managed_records() {
        let record = ConferenceRecord::new("manual").with_status(Some(ConferenceStatus::Live));
        let text = render_inspection(&record, now());
        assert!(text.contains("start:      -"));
        assert!(text.contains("stored:     live"));
        assert!(text.ends_with("effective:  live (status managed by hand)"));
    }

    #[test]
    fn inspection_shows_stale_status_next_to_resolution() {
        let record = ConferenceRecord::new("stale")
            .with_window(now() - Duration::hours(3), now() - Duration::hours(1))
            .with_status(Some(ConferenceStatus::Live));
        let text = render_inspection(&record, now());
        assert!(text.contains("stored:     live"));
        assert!(text.contains("resolved:   ended"));
        assert!(text.contains("end:        2025-07-01T11:00:00Z"));
    }
}
