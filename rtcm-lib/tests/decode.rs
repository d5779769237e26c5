mod common;

use std::fs;

use common::fixture_path;
use rtcm::{
    encoder::PayloadBuilder,
    helpers::{cell2prn, parse_msm, sat2prn, tow2utc},
    DecodeOptions, Decoder, MsmLabel, Value,
};
use test_case::test_case;

fn msg_1077(options: DecodeOptions) -> rtcm::Message {
    let dat = fs::read(fixture_path("1077.bin")).unwrap();
    Decoder::default().with_options(options).parse(&dat).unwrap()
}

fn assert_close(got: Option<&Value>, expected: f64) {
    let got = got.and_then(Value::as_f64).expect("expected a numeric value");
    assert!(
        (got - expected).abs() < 1e-12,
        "expected {expected}, got {got}"
    );
}

#[test]
fn test_msm7_header() {
    let msg = msg_1077(DecodeOptions::default());

    assert_eq!(msg.identity(), "1077");
    assert!(msg.is_msm());
    assert_eq!(msg.len(), 202);
    assert_eq!(msg.get("DF003"), Some(&Value::Uint(0)));
    assert_eq!(msg.get("DF004"), Some(&Value::Uint(204_137_001)));
    assert_eq!(msg.get("DF393"), Some(&Value::Uint(1)));
    assert_eq!(msg.get("DF394"), Some(&Value::Uint(0x0a8e_b004_0000_0000)));
    assert_eq!(msg.get("DF395"), Some(&Value::Uint(0x4001_0000)));
    assert_eq!(msg.get("DF396"), Some(&Value::Uint(0xf_efeb)));
    assert_eq!(msg.get("NSat"), Some(&Value::Uint(10)));
    assert_eq!(msg.get("NSig"), Some(&Value::Uint(2)));
    assert_eq!(msg.get("NCell"), Some(&Value::Uint(17)));

    let names: Vec<&str> = msg.iter().map(|(name, _)| name).take(16).collect();
    assert_eq!(
        names,
        [
            "DF002", "DF003", "DF004", "DF393", "DF409", "DF001_7", "DF411", "DF412", "DF417",
            "DF418", "DF394", "NSat", "DF395", "NSig", "DF396", "NCell"
        ]
    );
}

#[test]
fn test_msm7_satellite_data() {
    let msg = msg_1077(DecodeOptions::default());

    let prns: Vec<&str> = (1..=10)
        .map(|i| msg.get(&format!("PRN_{i:02}")).unwrap().as_str().unwrap())
        .collect();
    assert_eq!(
        prns,
        ["005", "007", "009", "013", "014", "015", "017", "019", "020", "030"]
    );
    let ranges: Vec<u64> = (1..=10)
        .map(|i| msg.get(&format!("DF397_{i:02}")).unwrap().as_u64().unwrap())
        .collect();
    assert_eq!(ranges, [75, 75, 81, 72, 67, 80, 75, 82, 75, 71]);
    assert_eq!(msg.get("ExtSatInfo_01"), Some(&Value::Uint(0)));
    assert_eq!(msg.get("DF398_01"), Some(&Value::Float(0.005_859_375)));
    assert_eq!(msg.get("DF398_02"), Some(&Value::Float(0.534_179_687_5)));
    assert_eq!(msg.get("DF399_01"), Some(&Value::Int(-178)));
    assert_eq!(msg.get("DF399_10"), Some(&Value::Int(-181)));
    assert!(!msg.contains("PRN_11"));
}

#[test]
fn test_msm7_cell_data() {
    let msg = msg_1077(DecodeOptions::default());

    let cells: Vec<(&str, &str)> = (1..=17)
        .map(|i| {
            (
                msg.get(&format!("CELLPRN_{i:02}")).unwrap().as_str().unwrap(),
                msg.get(&format!("CELLSIG_{i:02}")).unwrap().as_str().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        cells,
        [
            ("005", "1C"),
            ("005", "2L"),
            ("007", "1C"),
            ("007", "2L"),
            ("009", "1C"),
            ("009", "2L"),
            ("013", "1C"),
            ("014", "1C"),
            ("014", "2L"),
            ("015", "1C"),
            ("015", "2L"),
            ("017", "1C"),
            ("017", "2L"),
            ("019", "1C"),
            ("020", "1C"),
            ("030", "1C"),
            ("030", "2L"),
        ]
    );

    assert_close(msg.get("DF405_01"), 0.000_143_090_263_009_071_35);
    assert_close(msg.get("DF405_17"), -0.000_308_655_202_388_763_43);
    assert_close(msg.get("DF406_05"), -0.000_484_393_443_912_267_7);
    assert_eq!(msg.get("DF407_17"), Some(&Value::Uint(341)));
    assert_eq!(msg.get("DF420_03"), Some(&Value::Uint(0)));
    assert_eq!(msg.get("DF408_01"), Some(&Value::Float(45.0)));
    assert_eq!(msg.get("DF408_17"), Some(&Value::Float(41.0)));
    assert_close(msg.get("DF404_01"), -0.9231);
    assert_close(msg.get("DF404_17"), -0.2174);
    assert!(!msg.contains("DF405_18"));
}

#[test]
fn test_msm7_band_labels_without_scaling() {
    let options = DecodeOptions::builder()
        .scaling(false)
        .msm_label(MsmLabel::Band)
        .build();
    let msg = msg_1077(options);

    assert_eq!(msg.get("CELLSIG_01"), Some(&Value::Str("L1".to_string())));
    assert_eq!(msg.get("CELLSIG_02"), Some(&Value::Str("L2".to_string())));
    assert_eq!(msg.get("DF408_17"), Some(&Value::Uint(656)));
    assert_eq!(msg.get("DF404_01"), Some(&Value::Int(-9231)));
}

#[test]
fn test_msm_helpers() {
    let msg = msg_1077(DecodeOptions::default());

    let sats = sat2prn(&msg, MsmLabel::Rinex).unwrap();
    assert_eq!(sats.len(), 10);
    assert_eq!(sats[&4], "013");

    let cells = cell2prn(&msg, MsmLabel::Band).unwrap();
    assert_eq!(cells.len(), 17);
    assert_eq!(cells[&9], ("014".to_string(), "L2".to_string()));

    let (meta, sats, cells) = parse_msm(&msg).unwrap();
    assert_eq!(meta.identity, "1077");
    assert_eq!(meta.gnss, "GPS");
    assert_eq!(meta.station, 0);
    assert_eq!(meta.epoch, Some(Value::Uint(204_137_001)));
    assert_eq!((meta.sats, meta.cells), (10, 17));

    assert_eq!(sats.len(), 10);
    let names: Vec<&str> = sats[0].keys().map(String::as_str).collect();
    assert_eq!(names, ["DF397", "DF398", "DF399", "ExtSatInfo", "PRN"]);
    assert_eq!(sats[9]["PRN"], Value::Str("030".to_string()));

    assert_eq!(cells.len(), 17);
    assert_eq!(cells[0].len(), 8);
    assert_eq!(cells[16]["CELLPRN"], Value::Str("030".to_string()));
    assert_eq!(cells[16]["DF407"], Value::Uint(341));

    let epoch = u32::try_from(meta.epoch.unwrap().as_u64().unwrap()).unwrap();
    assert_eq!(tow2utc(epoch).to_string(), "08:41:59.001");
}

#[test]
fn test_serialize_round_trip() {
    let dat = fs::read(fixture_path("1077.bin")).unwrap();
    let msg = Decoder::default().parse(&dat).unwrap();
    assert_eq!(msg.serialize().unwrap(), dat);
}

/// MSM7 payload for the given 1-based satellite and signal mask bits. Every satellite
/// and cell carries the same data.
fn msm7_payload(
    number: i64,
    epoch: &[(&str, i64)],
    sats: &[u8],
    sigs: &[u8],
    cells: &[bool],
    sat_info: &str,
) -> Vec<u8> {
    let mut builder = PayloadBuilder::default();
    builder
        .field("DF002", number)
        .unwrap()
        .field("DF003", 42)
        .unwrap();
    for (name, value) in epoch {
        builder.field(name, *value).unwrap();
    }
    for name in ["DF393", "DF409", "DF001_7", "DF411", "DF412", "DF417", "DF418"] {
        builder.field(name, 0).unwrap();
    }
    let sat_mask = sats.iter().fold(0u64, |m, bit| m | 1 << (64 - bit));
    let sig_mask = sigs.iter().fold(0u64, |m, bit| m | 1 << (32 - bit));
    let cell_mask = cells.iter().fold(0u64, |m, &c| m << 1 | u64::from(c));
    builder
        .bits("DF394", 64, sat_mask)
        .unwrap()
        .bits("DF395", 32, sig_mask)
        .unwrap()
        .bits("DF396", cells.len(), cell_mask)
        .unwrap();

    for (name, value) in [("DF397", 70), (sat_info, 5), ("DF398", 512), ("DF399", -100)] {
        for _ in sats {
            builder.field(name, value).unwrap();
        }
    }
    let ncell = cells.iter().filter(|&&c| c).count();
    for (name, value) in [
        ("DF405", 100),
        ("DF406", -200),
        ("DF407", 300),
        ("DF420", 0),
        ("DF408", 40),
        ("DF404", 5000),
    ] {
        for _ in 0..ncell {
            builder.field(name, value).unwrap();
        }
    }
    builder.finish()
}

#[test_case(
    1087, "GLONASS", &[("DF416", 2), ("DF034", 1000)], &[3], &[2], &[true], "DF419",
    &["003"], &[("003", "1C")];
    "glonass"
)]
#[test_case(
    1097, "GALILEO", &[("DF248", 2000)], &[5, 11], &[2, 22], &[true, false, true, true],
    "ExtSatInfo", &["005", "011"], &[("005", "1C"), ("011", "1C"), ("011", "5I")];
    "galileo"
)]
#[test_case(
    1127, "BEIDOU", &[("DF427", 3000)], &[19], &[2, 32], &[true, true], "ExtSatInfo",
    &["019"], &[("019", "2I"), ("019", "1X")];
    "beidou"
)]
#[allow(clippy::too_many_arguments)]
fn test_msm7_constellations(
    number: i64,
    gnss: &str,
    epoch: &[(&str, i64)],
    sats: &[u8],
    sigs: &[u8],
    cells: &[bool],
    sat_info: &str,
    prns: &[&str],
    cell_labels: &[(&str, &str)],
) {
    let payload = msm7_payload(number, epoch, sats, sigs, cells, sat_info);
    let msg = Decoder::default().decode(&payload).unwrap();

    assert_eq!(msg.identity(), number.to_string());
    assert!(msg.is_msm());
    assert_eq!(msg.get("NSat"), Some(&Value::Uint(prns.len() as u64)));
    assert_eq!(msg.get("NCell"), Some(&Value::Uint(cell_labels.len() as u64)));

    for (i, prn) in prns.iter().enumerate() {
        let n = i + 1;
        assert_eq!(msg.get(&format!("PRN_{n:02}")).and_then(Value::as_str), Some(*prn));
        assert_eq!(msg.get(&format!("{sat_info}_{n:02}")), Some(&Value::Uint(5)));
        assert_eq!(msg.get(&format!("DF398_{n:02}")), Some(&Value::Float(0.5)));
        assert_eq!(msg.get(&format!("DF399_{n:02}")), Some(&Value::Int(-100)));
    }
    for (i, (prn, sig)) in cell_labels.iter().enumerate() {
        let n = i + 1;
        assert_eq!(msg.get(&format!("CELLPRN_{n:02}")).and_then(Value::as_str), Some(*prn));
        assert_eq!(msg.get(&format!("CELLSIG_{n:02}")).and_then(Value::as_str), Some(*sig));
        assert_eq!(msg.get(&format!("DF407_{n:02}")), Some(&Value::Uint(300)));
        assert_eq!(msg.get(&format!("DF408_{n:02}")), Some(&Value::Float(2.5)));
        assert_close(msg.get(&format!("DF405_{n:02}")), 1.862_645_149_230_957e-7);
        assert_close(msg.get(&format!("DF404_{n:02}")), 0.5);
    }
    assert!(!msg.contains(&format!("CELLPRN_{:02}", cell_labels.len() + 1)));

    let (meta, _, _) = parse_msm(&msg).unwrap();
    assert_eq!(meta.gnss, gnss);
    assert_eq!(meta.station, 42);
    let (_, epoch_value) = epoch[epoch.len() - 1];
    assert_eq!(meta.epoch, Some(Value::Uint(epoch_value as u64)));
}

#[test]
fn test_ssr_orbit_correction() {
    let mut builder = PayloadBuilder::default();
    for (name, value) in [
        ("DF002", 4076),
        ("IDF001", 0),
        ("IDF002", 21),
        ("IDF003", 1000),
        ("IDF004", 2),
        ("IDF005", 0),
        ("IDF007", 1),
        ("IDF008", 3),
        ("IDF009", 4),
        ("IDF006", 0),
        ("IDF010", 1),
        ("IDF011", 12),
        ("IDF012", 34),
        ("IDF013", 25),
        ("IDF014", -10),
        ("IDF015", 5),
        ("IDF016", 3),
        ("IDF017", -5),
        ("IDF018", 8),
    ] {
        builder.field(name, value).unwrap();
    }

    let msg = Decoder::default().decode(&builder.finish()).unwrap();
    assert_eq!(msg.identity(), "4076_021");
    assert!(!msg.is_unknown());

    let names: Vec<&str> = msg
        .iter()
        .map(|(name, _)| name)
        .skip_while(|name| *name != "IDF010")
        .collect();
    assert_eq!(
        names,
        [
            "IDF010",
            "IDF011_01",
            "IDF012_01",
            "IDF013_01",
            "IDF014_01",
            "IDF015_01",
            "IDF016_01",
            "IDF017_01",
            "IDF018_01"
        ]
    );
    assert_eq!(msg.get("IDF011_01"), Some(&Value::Uint(12)));
    assert_close(msg.get("IDF013_01"), 2.5);
    assert_close(msg.get("IDF014_01"), -4.0);
    assert_close(msg.get("IDF015_01"), 2.0);
    assert_close(msg.get("IDF016_01"), 0.003);
    assert_close(msg.get("IDF017_01"), -0.02);
    assert_close(msg.get("IDF018_01"), 0.032);
}
