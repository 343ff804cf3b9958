//! End-to-end: raw events → records → aggregate → comparison matrix.

use rollup_core::matrix::{MatrixOptions, MatrixSource, project};
use rollup_core::{aggregate, normalize, parse_events};
use rollup_error::RollupError;
use rollup_types::{Outcome, RunInput};

fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

const KUBO_EVENTS: &str = r#"
{"Action":"start","Package":"github.com/ipfs/gateway-conformance/tests"}
{"Action":"run","Test":"TestMetadata"}
{"Action":"output","Test":"TestMetadata","Output":"    metadata.go:9: --- META: {\"version\":\"v0.21.0\",\"job_url\":\"https://ci.example/runs/7\"}\n"}
{"Action":"pass","Test":"TestMetadata","Time":"2023-06-01T10:00:00Z"}
{"Action":"run","Test":"TestGatewayCar"}
{"Action":"output","Test":"TestGatewayCar","Output":"    sugar.go:40: --- META: {\"group\":\"CAR\",\"specs\":[\"specs.ipfs.tech/http-gateways/trustless-gateway/\"]}\n"}
{"Action":"run","Test":"TestGatewayCar/GET_car_with_format"}
{"Action":"output","Test":"TestGatewayCar/GET_car_with_format","Output":"=== RUN   TestGatewayCar/GET_car_with_format\n"}
{"Action":"pass","Test":"TestGatewayCar/GET_car_with_format"}
{"Action":"run","Test":"TestGatewayCar/GET_car_with_accept"}
{"Action":"fail","Test":"TestGatewayCar/GET_car_with_accept"}
{"Action":"fail","Test":"TestGatewayCar"}
{"Action":"run","Test":"TestPlainCodec"}
{"Action":"skip","Test":"TestPlainCodec"}
{"Action":"fail","Package":"github.com/ipfs/gateway-conformance/tests"}
"#;

#[test]
fn events_fold_into_records() {
    init_test_tracing();
    let records = normalize(parse_events(KUBO_EVENTS).expect("parse")).expect("normalize");

    assert_eq!(
        records.keys().map(String::as_str).collect::<Vec<_>>(),
        vec![
            "TestGatewayCar",
            "TestGatewayCar/GET_car_with_accept",
            "TestGatewayCar/GET_car_with_format",
            "TestMetadata",
            "TestPlainCodec",
        ]
    );
    assert_eq!(records["TestGatewayCar"].outcome, Outcome::Fail);
    assert_eq!(records["TestGatewayCar"].meta["group"].as_str(), Some("CAR"));
    assert_eq!(
        records["TestGatewayCar/GET_car_with_format"].path,
        vec!["TestGatewayCar", "GET car with format"]
    );
}

#[test]
fn records_aggregate_and_render() {
    init_test_tracing();
    let records = normalize(parse_events(KUBO_EVENTS).expect("parse")).expect("normalize");
    let run = RunInput::from_records(records);
    assert_eq!(run.info().version.as_deref(), Some("v0.21.0"));

    let groups = aggregate(&run.tests, 1).expect("aggregate");
    let car = &groups["TestGatewayCar"];
    assert_eq!((car.counts.pass, car.counts.fail, car.counts.total), (1, 1, 2));
    assert_eq!(car.meta["group"].as_str(), Some("CAR"));
    assert_eq!(groups["TestPlainCodec"].counts.skip, 1);

    let source = MatrixSource::from_aggregate("kubo", &run, 1).expect("source");
    let matrix = project(&[source], &MatrixOptions::default()).expect("project");
    let expected = [
        "| gateway | kubo |",
        "| ------: | :--- |",
        "| version | [v0.21.0](https://ci.example/runs/7) |",
        "| **CAR** |  |",
        "| [GatewayCar](https://specs.ipfs.tech/http-gateways/trustless-gateway/) | :red_circle: (1 / 2) |",
        "| **Other** |  |",
        "| PlainCodec | :yellow_circle: (skipped) |",
    ]
    .join("\n");
    assert_eq!(matrix.to_markdown(), expected);
}

#[test]
fn duplicate_metadata_aborts_the_batch() {
    let events = r#"
{"Action":"output","Test":"TestA","Output":"x --- META: {\"ipip\":\"0288\"}\n"}
{"Action":"output","Test":"TestA","Output":"x --- META: {\"ipip\":\"0328\"}\n"}
{"Action":"pass","Test":"TestB"}
"#;
    let err = normalize(parse_events(events).expect("parse")).expect_err("duplicate key");
    assert!(matches!(err, RollupError::DuplicateMetadataKey { .. }));
}

#[test]
fn matrix_group_order_is_input_independent() {
    let build = |order: &[(&str, Option<&str>)]| {
        let mut raw = serde_json::Map::new();
        for (name, group) in order {
            let mut record = serde_json::json!({"outcome": "pass"});
            if let Some(group) = group {
                record["meta"] = serde_json::json!({"group": group});
            }
            raw.insert((*name).to_owned(), record);
        }
        let run = RunInput::from_json_str("gen", &serde_json::Value::Object(raw).to_string())
            .expect("decode");
        let source = MatrixSource::from_aggregate("impl", &run, 1).expect("source");
        project(&[source], &MatrixOptions::default())
            .expect("project")
            .rows
            .iter()
            .map(|row| row[0].clone())
            .collect::<Vec<_>>()
    };

    let forward = build(&[("TestU", None), ("TestB", Some("B")), ("TestA", Some("A"))]);
    let backward = build(&[("TestA", Some("A")), ("TestB", Some("B")), ("TestU", None)]);
    assert_eq!(forward, backward);
    assert_eq!(
        forward,
        vec!["version", "**A**", "A", "**B**", "B", "**Other**", "U"]
    );
}
