mod common;
use common::*;

use solarstats::register::{Combine, RegisterDecoder, RegisterMap, ScaleTable};

use std::collections::BTreeMap;

/// Running rescale as the values were first logged: ((previous * scale) + raw) / scale.
fn legacy_decode(map: &RegisterMap, scales: &ScaleTable, data: &[u8]) -> BTreeMap<String, f64> {
    let mut r = BTreeMap::new();

    for (i, word) in data.chunks_exact(2).enumerate() {
        let name = match map.name(map.base() + i as u16) {
            Some(name) => name,
            None => continue,
        };
        let raw = f64::from(u16::from_be_bytes([word[0], word[1]]));
        let scale = scales.get(name).unwrap();

        let value = match r.get(name) {
            Some(previous) => ((previous * scale) + raw) / scale,
            None => raw / scale,
        };
        r.insert(name.to_string(), value);
    }

    r
}

fn decode(decoder: &RegisterDecoder, data: &[u8]) -> BTreeMap<String, f64> {
    decoder.decode(data).into_iter().collect()
}

#[test]
fn decodes_captured_payload() {
    let values = decode(&RegisterDecoder::blackline(), &Factory::blackline_data_payload());

    assert_eq!(values.len(), 19);
    assert_eq!(values["VoltsPV1"], 245.6);
    assert_eq!(values["VoltsPV2"], 0.0);
    assert_eq!(values["CurrentPV1"], 5.2);
    assert_eq!(values["VoltsAC1"], 233.1);
    assert_eq!(values["CurrentAC1"], 5.1);
    assert_eq!(values["FrequencyAC"], 50.01);
    assert_eq!(values["PowerAC"], 1185.2);
    assert_eq!(values["EnergyToday"], 7.3);
    assert_eq!(values["EnergyTotal"], 2793.5);
    assert_eq!(values["MinToday"], 412.0);
    assert_eq!(values["HrsTotal"], 8245.0);
    assert_eq!(values["Temperature"], 41.2);
    assert_eq!(values["Status1"], 0.0);
    assert_eq!(values["Status2"], 1.0);

    // reserved registers stay out of the reading
    assert!(!values.contains_key("blank"));
    assert!(!values.contains_key("unknown"));
}

#[test]
fn results_in_register_order() {
    let names: Vec<String> = RegisterDecoder::blackline()
        .decode(&Factory::blackline_data_payload())
        .into_iter()
        .map(|(name, _)| name)
        .collect();

    assert_eq!(names[0], "VoltsPV1");
    assert_eq!(names[11], "PowerAC");
    assert_eq!(names[18], "Status2");
}

#[test]
fn matches_legacy_arithmetic() {
    let map = RegisterMap::blackline();
    let scales = ScaleTable::blackline();
    let decoder = RegisterDecoder::blackline();

    let mut payloads = vec![Factory::blackline_data_payload()];
    // high halves set on every double register
    let mut busy = Factory::blackline_data_payload();
    for register in [0x15u16, 0x18, 0x1A, 0x1C] {
        let offset = usize::from(register - 0x0A) * 2;
        busy[offset] = 0x00;
        busy[offset + 1] = 0x01;
    }
    payloads.push(busy);
    payloads.push(vec![0xFF; 62]);

    for payload in payloads {
        let legacy = legacy_decode(&map, &scales, &payload);
        let decoded = decode(&decoder, &payload);

        assert_eq!(legacy.len(), decoded.len());
        for (name, value) in &legacy {
            assert!(
                (decoded[name] - value).abs() < 1e-9,
                "{}: {} != {}",
                name,
                decoded[name],
                value
            );
        }
    }
}

#[test]
fn double_register_halves() {
    let map = RegisterMap::new(0x15, vec![(0x15, "PowerAC"), (0x16, "PowerAC")]);
    let decoder = RegisterDecoder::new(map, ScaleTable::blackline(), Combine::Sum).unwrap();

    assert_eq!(decode(&decoder, &hex("00 02 00 00"))["PowerAC"], 0.2);
    assert_eq!(decode(&decoder, &hex("00 01 86 A0"))["PowerAC"], 3446.5);

    let wide = decoder.with_combine(Combine::Wide);
    assert_eq!(decode(&wide, &hex("00 02 00 00"))["PowerAC"], 13107.2);
    assert_eq!(decode(&wide, &hex("00 01 86 A0"))["PowerAC"], 10000.0);
}

#[test]
fn short_payload_decodes_what_is_there() {
    let values = decode(&RegisterDecoder::blackline(), &hex("09 98 00 00 00"));
    assert_eq!(values.len(), 2);
    assert_eq!(values["VoltsPV1"], 245.6);
}

#[test]
fn register_file_matches_builtin_table() {
    let file = concat!(env!("CARGO_MANIFEST_DIR"), "/registers/blackline3000.json");
    let decoder = RegisterDecoder::from_file(file).unwrap();
    assert_eq!(decoder, RegisterDecoder::blackline());
}

#[test]
fn register_file_without_scale_is_rejected() {
    let json = r#"{
        "base_register": 10,
        "registers": [{ "number": 10, "name": "VoltsPV1" }, { "number": 11, "name": "Extra" }],
        "scale_factors": { "VoltsPV1": 10 }
    }"#;
    assert!(RegisterDecoder::from_json(json).is_err());
}

#[test]
fn register_file_wide_combine() {
    let json = r#"{
        "base_register": 21,
        "combine": "wide",
        "registers": [{ "number": 21, "name": "PowerAC" }, { "number": 22, "name": "PowerAC" }],
        "scale_factors": { "PowerAC": 10 }
    }"#;
    let decoder = RegisterDecoder::from_json(json).unwrap();
    assert_eq!(decode(&decoder, &hex("00 01 86 A0"))["PowerAC"], 10000.0);
}

#[test]
fn missing_register_file() {
    assert!(RegisterDecoder::from_file("/nonexistent/registers.json").is_err());
}
