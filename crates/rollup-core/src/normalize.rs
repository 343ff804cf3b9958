//! Event normalizer: raw `go test -json` events to one [`TestRecord`] per
//! test identifier.
//!
//! Only `pass`, `fail`, `skip` and `output` events survive. Output lines that
//! carry a `--- META: <json>` marker are reclassified as metadata events; their
//! text still lands in the merged output.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use rollup_error::{Result, RollupError};
use rollup_types::{EventTime, Metadata, Outcome, TestRecord, display_path, merge_disjoint};
use serde::Deserialize;
use tracing::debug;

static META_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".* --- META: (.*)").expect("static regex"));

/// One raw event as emitted by `go test -json` (or `gotestsum --jsonfile`).
///
/// Unrecognized fields (`Package`, `Elapsed`, ...) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "Test", default)]
    pub test: Option<String>,
    #[serde(rename = "Action", default)]
    pub action: String,
    #[serde(rename = "Output", default)]
    pub output: Option<String>,
    #[serde(rename = "Time", default)]
    pub time: Option<EventTime>,
}

/// Surviving event after classification.
#[derive(Debug)]
enum TestEvent {
    Terminal {
        outcome: Outcome,
        time: Option<EventTime>,
    },
    Output(String),
    Metadata {
        text: String,
        payload: Metadata,
    },
}

/// Decode an event stream: a JSON array, or JSON lines with blank lines
/// skipped.
pub fn parse_events(raw: &str) -> Result<Vec<RawEvent>> {
    if raw.trim_start().starts_with('[') {
        return serde_json::from_str(raw).map_err(|source| RollupError::EventParse {
            line: 1,
            payload: truncate_payload(raw),
            source,
        });
    }

    let mut events = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(line).map_err(|source| RollupError::EventParse {
            line: index + 1,
            payload: truncate_payload(line),
            source,
        })?;
        events.push(event);
    }
    Ok(events)
}

fn truncate_payload(raw: &str) -> String {
    const MAX_PAYLOAD_CHARS: usize = 200;
    if raw.chars().count() <= MAX_PAYLOAD_CHARS {
        return raw.to_owned();
    }
    let mut clipped: String = raw.chars().take(MAX_PAYLOAD_CHARS).collect();
    clipped.push('…');
    clipped
}

/// Parse the metadata marker in one output line, if any.
///
/// A marker whose payload is not a JSON object fails the whole batch.
pub fn extract_metadata(test: &str, text: &str) -> Result<Option<Metadata>> {
    let Some(captures) = META_MARKER.captures(text) else {
        return Ok(None);
    };
    let payload = captures.get(1).map_or("", |m| m.as_str());
    let metadata = serde_json::from_str(payload).map_err(|source| RollupError::MetadataParse {
        test: test.to_owned(),
        payload: payload.to_owned(),
        source,
    })?;
    Ok(Some(metadata))
}

fn classify(test: &str, event: RawEvent) -> Result<Option<TestEvent>> {
    if let Some(outcome) = Outcome::from_action(&event.action) {
        return Ok(Some(TestEvent::Terminal {
            outcome,
            time: event.time,
        }));
    }
    if event.action != "output" {
        return Ok(None);
    }

    let text = event.output.unwrap_or_default();
    match extract_metadata(test, &text)? {
        Some(payload) => Ok(Some(TestEvent::Metadata { text, payload })),
        None => Ok(Some(TestEvent::Output(text))),
    }
}

/// Fold raw events into one record per test identifier.
///
/// Output is concatenated in input order, metadata payloads are merged with
/// duplicate keys rejected, and the first terminal event decides outcome and
/// time. Any error aborts the whole batch.
pub fn normalize<I>(events: I) -> Result<BTreeMap<String, TestRecord>>
where
    I: IntoIterator<Item = RawEvent>,
{
    let mut grouped: BTreeMap<String, Vec<TestEvent>> = BTreeMap::new();
    let mut seen = 0_usize;
    for mut event in events {
        seen += 1;
        let Some(test) = event.test.take() else {
            continue;
        };
        if let Some(classified) = classify(&test, event)? {
            grouped.entry(test).or_default().push(classified);
        }
    }

    let mut records = BTreeMap::new();
    for (test, events) in grouped {
        let record = fold_test(&test, events)?;
        records.insert(test, record);
    }

    debug!(
        events = seen,
        tests = records.len(),
        "normalized test events"
    );
    Ok(records)
}

fn fold_test(test: &str, events: Vec<TestEvent>) -> Result<TestRecord> {
    let mut record = TestRecord {
        path: display_path(test),
        ..TestRecord::default()
    };
    let mut resolved = false;

    for event in events {
        match event {
            TestEvent::Terminal { outcome, time } => {
                if !resolved {
                    record.outcome = outcome;
                    record.time = time;
                    resolved = true;
                }
            }
            TestEvent::Output(text) => record.output.push_str(&text),
            TestEvent::Metadata { text, payload } => {
                record.output.push_str(&text);
                merge_disjoint(test, &mut record.meta, payload)?;
            }
        }
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(test: &str, action: &str, output: Option<&str>) -> RawEvent {
        RawEvent {
            test: Some(test.to_owned()),
            action: action.to_owned(),
            output: output.map(str::to_owned),
            time: None,
        }
    }

    #[test]
    fn events_without_test_are_dropped() {
        let events = vec![
            RawEvent {
                action: "output".to_owned(),
                output: Some("PASS\n".to_owned()),
                ..RawEvent::default()
            },
            event("TestA", "pass", None),
        ];
        let records = normalize(events).expect("normalize");
        assert_eq!(records.len(), 1);
        assert_eq!(records["TestA"].outcome, Outcome::Pass);
    }

    #[test]
    fn first_terminal_action_wins() {
        let mut first = event("TestA", "fail", None);
        first.time = Some(EventTime::Stamp("t1".to_owned()));
        let mut second = event("TestA", "pass", None);
        second.time = Some(EventTime::Stamp("t2".to_owned()));

        let records = normalize(vec![first, second]).expect("normalize");
        assert_eq!(records["TestA"].outcome, Outcome::Fail);
        assert_eq!(records["TestA"].time, Some(EventTime::Stamp("t1".to_owned())));
    }

    #[test]
    fn output_only_test_is_unknown() {
        let records =
            normalize(vec![event("TestA", "output", Some("=== RUN   TestA\n"))]).expect("normalize");
        assert_eq!(records["TestA"].outcome, Outcome::Unknown);
        assert_eq!(records["TestA"].time, None);
    }

    #[test]
    fn non_kept_actions_are_ignored() {
        let records = normalize(vec![
            event("TestA", "run", None),
            event("TestA", "pause", None),
            event("TestA", "skip", None),
        ])
        .expect("normalize");
        assert_eq!(records["TestA"].outcome, Outcome::Skip);
        assert!(records["TestA"].output.is_empty());
    }

    #[test]
    fn output_is_concatenated_in_order_with_markers() {
        let records = normalize(vec![
            event("TestA/sub_one", "output", Some("first\n")),
            event(
                "TestA/sub_one",
                "output",
                Some("    sugar.go:12: --- META: {\"group\": \"Path\"}\n"),
            ),
            event("TestA/sub_one", "output", Some("last\n")),
            event("TestA/sub_one", "pass", None),
        ])
        .expect("normalize");

        let record = &records["TestA/sub_one"];
        assert_eq!(
            record.output,
            "first\n    sugar.go:12: --- META: {\"group\": \"Path\"}\nlast\n"
        );
        assert_eq!(record.meta["group"].as_str(), Some("Path"));
        assert_eq!(record.path, vec!["TestA", "sub one"]);
    }

    #[test]
    fn duplicate_metadata_key_fails_batch() {
        let err = normalize(vec![
            event("TestA", "output", Some("x --- META: {\"ipip\": \"0288\"}\n")),
            event("TestA", "output", Some("x --- META: {\"ipip\": \"0328\"}\n")),
        ])
        .expect_err("duplicate key");
        assert!(matches!(
            err,
            RollupError::DuplicateMetadataKey { ref test, ref key } if test == "TestA" && key == "ipip"
        ));
    }

    #[test]
    fn same_key_on_different_tests_is_fine() {
        let records = normalize(vec![
            event("TestA", "output", Some("x --- META: {\"ipip\": \"0288\"}\n")),
            event("TestB", "output", Some("x --- META: {\"ipip\": \"0328\"}\n")),
        ])
        .expect("normalize");
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn malformed_marker_fails_with_payload() {
        let err = normalize(vec![event(
            "TestA",
            "output",
            Some("x --- META: {not json}\n"),
        )])
        .expect_err("malformed marker");
        match err {
            RollupError::MetadataParse { test, payload, .. } => {
                assert_eq!(test, "TestA");
                assert_eq!(payload, "{not json}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn marker_requires_leading_space() {
        assert!(extract_metadata("T", "--- META: {}").expect("parse").is_none());
        assert!(extract_metadata("T", " --- META: {}").expect("parse").is_some());
    }

    #[test]
    fn parse_events_accepts_lines_and_arrays() {
        let lines = "{\"Test\":\"TestA\",\"Action\":\"pass\"}\n\n{\"Action\":\"output\",\"Output\":\"ok\\n\"}\n";
        let parsed = parse_events(lines).expect("lines");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].test.as_deref(), Some("TestA"));
        assert_eq!(parsed[1].test, None);

        let array = r#"[{"Test":"TestA","Action":"fail","Time":"2023-01-01T00:00:00Z"}]"#;
        let parsed = parse_events(array).expect("array");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].action, "fail");
    }

    #[test]
    fn parse_events_reports_line_number() {
        let err = parse_events("{\"Test\":\"A\",\"Action\":\"pass\"}\nnot json\n")
            .expect_err("bad line");
        assert!(matches!(err, RollupError::EventParse { line: 2, .. }));
    }
}
