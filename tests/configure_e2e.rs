use std::io::Write;
use std::sync::Arc;

use serde_json::{json, Value};

use systemsp::{
    ChannelSink, ConfigError, DescriptorError, PluginConfig, Policy, Registry, SystemStatusNotifier,
};

fn datapoint(label: &str, pivot_id: &str, pivot_type: &str, subtypes: &[&str]) -> Value {
    json!({
        "label": label,
        "pivot_id": pivot_id,
        "pivot_type": pivot_type,
        "pivot_subtypes": subtypes,
        "protocols": [{ "name": "IEC104", "typeid": "M_ME_NC_1", "address": "3271612" }]
    })
}

fn exchanged(datapoints: Value) -> Value {
    json!({ "exchanged_data": { "datapoints": datapoints } })
}

fn assert_every_bucket_empty(registry: &Registry) {
    assert_eq!(registry.policies(), &Policy::ALL);
    for policy in Policy::ALL {
        assert_eq!(registry.len(policy), 0, "no {policy} data should be stored");
    }
}

#[test]
fn every_fatal_document_leaves_empty_buckets() {
    let documents = [
        r#"{"exchanged_data": {"eee"}}"#.to_string(),
        "42".to_string(),
        json!({ "configureErrorExchanged_data": { "datapoints": [datapoint("TS-1", "id", "SpsTyp", &["prt.inf"])] } })
            .to_string(),
        json!({ "exchanged_data": [42] }).to_string(),
        json!({ "exchanged_data": { "configureErrorDatapoint": [datapoint("TS-1", "id", "SpsTyp", &["prt.inf"])] } })
            .to_string(),
    ];

    let notifier = SystemStatusNotifier::new();
    for raw in documents {
        notifier
            .set_json_config(&exchanged(json!([datapoint("TS-0", "id-0", "SpsTyp", &["prt.inf"])])).to_string())
            .unwrap();
        assert!(!notifier.registry().is_empty());

        let err = notifier.set_json_config(&raw).unwrap_err();
        assert!(err.is_config(), "{raw} should be fatal, got {err}");
        assert_every_bucket_empty(&notifier.registry());
    }
}

#[test]
fn descriptor_problems_store_nothing() {
    let mut no_subtypes = datapoint("TS-1", "id", "SpsTyp", &[]);
    no_subtypes.as_object_mut().unwrap().remove("pivot_subtypes");
    let mut no_label = datapoint("TS-1", "id", "SpsTyp", &["prt.inf"]);
    no_label.as_object_mut().unwrap().remove("label");

    let cases = [
        json!([42]),
        json!([datapoint("TS-1", "id", "invalid", &["prt.inf"])]),
        json!([datapoint("TS-1", "id", "MvTyp", &["prt.inf"])]),
        json!([{ "label": "TS-1", "pivot_type": "SpsTyp", "pivot_subtypes": ["prt.inf"] }]),
        json!([no_label]),
        json!([no_subtypes]),
        json!([datapoint("TS-1", "id", "SpsTyp", &["test"])]),
        json!([datapoint("TS-1", "id", "SpsTyp", &["acces"])]),
    ];

    for datapoints in cases {
        let mut registry = Registry::new();
        registry.import(&exchanged(datapoints.clone()).to_string()).unwrap();
        assert_every_bucket_empty(&registry);
        assert!(registry.is_empty(), "for {datapoints}");
    }
}

#[test]
fn valid_points_are_stored_per_policy() {
    for pivot_type in ["SpsTyp", "DpsTyp"] {
        let mut cyclic = datapoint("TS-1", "M_2367_3_15_4", pivot_type, &["acces"]);
        cyclic["ts_syst_cycle"] = json!(30);
        let event = datapoint("TS-2", "M_2367_3_15_5", pivot_type, &["prt.inf"]);

        let registry = Registry::import_or_empty(&exchanged(json!([cyclic, event])).to_string());
        assert_eq!(registry.len(Policy::Periodic), 1);
        assert_eq!(registry.len(Policy::Event), 1);
        assert!(registry.has_entry("acces", "M_2367_3_15_4"));
        assert!(registry.has_entry("prt.inf", "M_2367_3_15_5"));
        assert!(!registry.has_entry("invalid_type", "M_2367_3_15_4"));
        assert_eq!(registry.periodic()[0].period_secs, 30);
        assert_eq!(registry.event()[0].pivot_type.as_str(), pivot_type);
    }
}

#[test]
fn partial_import_reports_skips() {
    let mut missing_cycle = datapoint("TS-1", "id-1", "SpsTyp", &["acces", "prt.inf", "prt.inf"]);
    missing_cycle["ts_syst_cycle"] = json!("thirty");
    let mut good = datapoint("TS-2", "id-2", "DpsTyp", &[]);
    good["pivot_subtypes"] = json!(["prt.inf", "transient", 42]);

    let mut registry = Registry::new();
    let report = registry
        .import(&exchanged(json!([missing_cycle, 42, good])).to_string())
        .unwrap();

    assert_eq!(report.entries, 2);
    assert_eq!(report.skipped.len(), 2);
    assert!(matches!(report.skipped[0], DescriptorError::MissingCycle { .. }));
    assert_eq!(report.skipped[1], DescriptorError::NotAnObject);
    assert_eq!(registry.len(Policy::Event), 2);
    assert!(!registry.event()[0].transient);
    assert!(registry.event()[1].transient);
}

#[test]
fn category_file_drives_the_notifier() {
    let category = json!({
        "plugin": { "value": "systemsp" },
        "enable": { "value": "True" },
        "exchanged_data": { "value": exchanged(json!([datapoint("TS-1", "id-1", "SpsTyp", &["prt.inf"])])) }
    });
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{category}").unwrap();

    let notifier = SystemStatusNotifier::new();
    let (sink, stream) = ChannelSink::new();
    notifier.register_sink(Arc::new(sink));

    let config = PluginConfig::from_file(file.path()).unwrap();
    let report = notifier.reconfigure(&config).unwrap().unwrap();
    assert_eq!(report.entries, 1);
    assert!(notifier.is_enabled());
    assert!(notifier.registry().has_entry("prt.inf", "id-1"));

    assert!(notifier.notify(r#"{"asset": "prt.inf", "reason": "connected"}"#));
    assert_eq!(stream.drain().len(), 1);
}

#[test]
fn missing_category_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = PluginConfig::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
