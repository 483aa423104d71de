use approx::assert_relative_eq;
use std::time::Duration;
use tripsync_core::gps;
use tripsync_core::sync::{with_defaults, DefaultOverrides};
use tripsync_core::session::SeriesDocument;
use tripsync_core::{
    AxisPolicy, FilterConfig, GeoTrace, MemoryOverrideStore, SessionOptions, SledOverrideStore, SyncOverrideStore,
    TimeSeries, TripDocument, TripSession,
};
use tripsync_env::TripId;

fn aggressive_trip() -> TripDocument {
    TripDocument::from_json_str(
        r#"{
            "id": "D1|20151111125233-24km-D1-AGGRESSIVE-MOTORWAY",
            "offsetSeconds": 14.0,
            "series": [
                { "key": "accel_y", "t": [0, 0.1, 0.2, 0.3, 0.4, 0.5], "v": [0.0, 0.2, -0.1, 0.4, null, 0.1],
                  "policy": { "type": "symmetricAroundZero" }, "filter": { "kind": "kalman" } }
            ],
            "gps": { "t": [0, 1, 2], "lat": [40, 40.00001, 40.00002], "lon": [-3, -3, -3] },
            "eventRows": [[0, 1], [1, 1], [2, 0]]
        }"#,
    )
    .expect("valid trip document")
}

#[test]
fn gps_kalman_zero_noise_reproduces_input() {
    let raw = GeoTrace::new(vec![0.0, 1.0, 2.0], vec![40.0, 40.00001, 40.00002], vec![-3.0, -3.0, -3.0]);
    let out = gps::fuse(&raw, &FilterConfig::kalman(0.0, 0.0));
    for i in 0..3 {
        assert_relative_eq!(out.lat[i], raw.lat[i], epsilon = 1e-6);
        assert_relative_eq!(out.lon[i], raw.lon[i], epsilon = 1e-6);
    }
}

#[test]
fn builtin_default_override_applies_until_user_sets_one() {
    let store = with_defaults(MemoryOverrideStore::new(), DefaultOverrides::builtin());
    let mut session = TripSession::load_with_store(aggressive_trip(), &store, SessionOptions::default());
    assert_eq!(session.effective_offset(), 0.0);
    assert_eq!(session.events()[0].t, 0.0);

    session.set_override(&store, Some(3.0)).unwrap();
    assert_eq!(session.effective_offset(), 3.0);
    assert_eq!(session.events()[0].t, 3.0);
}

#[test]
fn sled_override_survives_reopen() {
    let dir = std::env::temp_dir().join(format!("tripsync-overrides-{}", std::process::id()));
    let id = TripId::new("D3|20151126110502-50km-D3-NORMAL-MOTORWAY").unwrap();
    {
        let store = SledOverrideStore::open(&dir).unwrap();
        store.set(&id, Some(12.5)).unwrap();
    }
    {
        let store = SledOverrideStore::open(&dir).unwrap();
        assert_eq!(store.get(&id), Some(12.5));
    }
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn reload_resets_axis_state_and_filter_change_rederives() {
    let mut session = TripSession::load(aggressive_trip(), Some(0.0), SessionOptions::default());
    let first = session.evaluate(0.25);
    assert_eq!(first.series.len(), 1);
    let kalman_point = first.series[0].point.v;

    session.set_filter("accel_y", FilterConfig::default());
    assert!(session.cursor().axis_window("accel_y").unwrap().min.is_none());
    let raw_point = session.evaluate(0.25).series[0].point.v;
    // raw: halfway between -0.1 and 0.4
    assert_relative_eq!(raw_point, 0.15, epsilon = 1e-12);
    assert!((kalman_point - raw_point).abs() > 1e-9);

    session.reload(Some(0.0));
    assert!(session.cursor().axis_window("accel_y").unwrap().min.is_none());
}

#[test]
fn realtime_ticks_coalesce_to_latest_video_time() {
    let mut session = TripSession::load(aggressive_trip(), Some(0.0), SessionOptions::default());
    let mut frames = Vec::new();
    for ms in 0..100u64 {
        let video_time = ms as f64 / 1000.0;
        if let Some(frame) = session.tick(Duration::from_millis(ms), video_time) {
            frames.push(frame);
        }
    }
    // admitted at 0, 34, 68
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[1].video_time, 0.034);
}

#[test]
fn unsorted_provider_series_are_sorted_on_load() {
    let doc = TripDocument::from_json_str(
        r#"{
            "id": "D2|20151120160904-16km-D2-NORMAL-MOTORWAY",
            "series": [ { "key": "speed", "t": [0, 1, 5, 2, 3, 4], "v": [0, 10, 0, 100, 0, 0] } ],
            "gps": {
                "t": [0, 1, 2], "lat": [40, 40.00001, 40.00002], "lon": [-3, -3, -3],
                "speedLimit": { "t": [10, 0], "v": [90, 50] }
            }
        }"#,
    )
    .unwrap();
    assert_eq!(doc.series[0].data.t, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);

    let mut session = TripSession::load(doc, Some(0.0), SessionOptions::default());
    let frame = session.evaluate(2.5);
    // halfway between 100 at t=2 and 0 at t=3
    assert_relative_eq!(frame.series[0].point.v, 50.0, epsilon = 1e-12);
    assert_eq!(session.speed_limit(), Some(&[50.0, 50.0, 50.0][..]));
}

#[test]
fn series_built_in_code_are_sorted_on_load() {
    let mut doc = TripDocument::new(TripId::new("SIM|20240101000000-unsorted").unwrap(), 0.0);
    doc.series.push(SeriesDocument {
        key: "speed".to_string(),
        data: TimeSeries {
            t: vec![0.0, 1.0, 5.0, 2.0, f64::NAN, 3.0, 4.0],
            v: vec![0.0, 10.0, 0.0, 100.0, 7.0, 0.0, 0.0],
        },
        policy: AxisPolicy::default(),
        filter: FilterConfig::default(),
    });
    let mut session = TripSession::load(doc, None, SessionOptions::default());
    assert_eq!(session.document().series[0].data.t, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_relative_eq!(session.evaluate(2.5).series[0].point.v, 50.0, epsilon = 1e-12);
}

#[test]
fn short_gps_columns_load_with_resampling() {
    let doc = TripDocument::from_json_str(
        r#"{
            "id": "D4|20151204152848-25km-D4-NORMAL-SECONDARY",
            "gps": {
                "t": [0, 1, 2, 3], "lat": [40, 40.0001], "lon": [-3, -3],
                "filter": { "resample10Hz": true }
            }
        }"#,
    )
    .unwrap();
    assert_eq!(doc.gps.as_ref().unwrap().trace.t, vec![0.0, 1.0]);

    let session = TripSession::load(doc, Some(0.0), SessionOptions::default());
    assert_eq!(session.gps().len(), 11);
    assert_relative_eq!(session.gps().lat[10], 40.0001, epsilon = 1e-9);
}

#[test]
fn raw_speed_follows_raw_timeline_when_resampled() {
    let doc = TripDocument::from_json_str(
        r#"{
            "id": "D5|20151209151242-25km-D5-NORMAL-SECONDARY",
            "gps": {
                "t": [0, 1, 2], "lat": [40, 40.00001, 40.00002], "lon": [-3, -3, -3],
                "speedKmh": [10, 20, 30],
                "filter": { "kind": "none", "resample10Hz": true }
            }
        }"#,
    )
    .unwrap();
    let mut session = TripSession::load(doc, Some(0.0), SessionOptions::default());
    assert_eq!(session.gps().len(), 21);
    assert!(session.gps().speed_kmh.is_none());

    assert_eq!(session.evaluate(1.0).gps.unwrap().speed_kmh, Some(20.0));
    let later = session.evaluate(1.9).gps.unwrap().speed_kmh.unwrap();
    assert_relative_eq!(later, 29.0, epsilon = 1e-9);
}

#[test]
fn out_of_range_filter_windows_are_clamped_on_load() {
    let doc = TripDocument::from_json_str(
        r#"{
            "id": "D6|20151217162714-26km-D6-NORMAL-SECONDARY",
            "series": [
                { "key": "a", "t": [0, 1, 2], "v": [1, 2, 3], "filter": { "kind": "ma", "maWindow": 8.5 } },
                { "key": "b", "t": [0, 1, 2], "v": [1, 2, 3], "filter": { "kind": "ma", "maWindow": 1e6 } }
            ],
            "gps": {
                "t": [0, 1, 2], "lat": [40, 40.00001, 40.00002], "lon": [-3, -3, -3],
                "filter": { "kind": "ma", "maWindow": -3 }
            }
        }"#,
    )
    .unwrap();
    assert_eq!(doc.series[0].filter.ma_window, 9);
    assert_eq!(doc.series[1].filter.ma_window, 301);
    assert_eq!(doc.gps.as_ref().unwrap().filter.ma_window, 1);

    let mut session = TripSession::load(doc, Some(0.0), SessionOptions::default());
    // a window of 1 leaves the track untouched
    assert_eq!(session.gps().lat, vec![40.0, 40.00001, 40.00002]);
    assert_eq!(session.evaluate(1.0).series.len(), 2);
}
