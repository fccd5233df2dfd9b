//! Client settings and annotation lifecycle integration tests

mod common;

use common::fixtures::{events, flaky_client, mirrored_client, recording_client};
use rstest::rstest;
use serde_json::Value;
use wwt_core::{AttrValue, Attrs, HtmlSettings, InMemoryCatalog, Quantity, SkyCoord, Unit, WwtError};

// === Settings round trip ===

#[rstest]
#[case(
    "constellation_figure_color",
    AttrValue::from("red"),
    "constellationFigureColor",
    Value::from("#ff0000")
)]
#[case(
    "grid_color",
    AttrValue::from([0.0, 0.0, 1.0]),
    "equatorialGridColor",
    Value::from("#0000ff")
)]
#[case("ecliptic", AttrValue::Bool(true), "showEcliptic", Value::Bool(true))]
#[case("galactic_mode", AttrValue::Bool(true), "galacticMode", Value::Bool(true))]
#[case(
    "location_altitude",
    AttrValue::from(Quantity::new(1.5, Unit::parse("km").unwrap())),
    "locationAltitude",
    Value::from(1500.0)
)]
#[case(
    "location_longitude",
    AttrValue::from(Quantity::deg(12.5)),
    "locationLng",
    Value::from(12.5)
)]
fn test_setting_round_trip(
    #[case] name: &str,
    #[case] value: AttrValue,
    #[case] remote: &str,
    #[case] expected: Value,
) {
    let (mut client, recorder) = recording_client();
    client.set(name, value).unwrap();

    let message = &recorder.messages()[0];
    assert_eq!(message.event, "setting_set");
    assert_eq!(message.get_str("setting"), Some(remote));
    assert_eq!(message.get("value"), Some(&expected));

    let doc = client.serialize(HtmlSettings::default());
    assert_eq!(doc.wwt_settings.get(remote), Some(&expected));
}

#[test]
fn test_equal_value_fires_again() {
    let (mut client, recorder) = recording_client();
    client.set("grid", true).unwrap();
    client.set("grid", true).unwrap();
    assert_eq!(recorder.events("setting_set").len(), 2);
}

// === Annotations ===

#[test]
fn test_annotation_lifecycle() {
    let (mut client, recorder) = recording_client();
    let circle = client.add_circle(Some(SkyCoord::new(83.8, -5.4)), &Attrs::new()).unwrap();
    let polygon = client
        .add_polygon(
            &[SkyCoord::new(1.0, 1.0), SkyCoord::new(2.0, 1.0), SkyCoord::new(2.0, 2.0)],
            &Attrs::new().with("fill", true),
        )
        .unwrap();
    let line = client
        .add_line(&[SkyCoord::new(0.0, 0.0), SkyCoord::new(5.0, 5.0)], &Attrs::new())
        .unwrap();

    let doc = client.serialize(HtmlSettings::default());
    let ids: Vec<&str> = doc.annotations.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![circle.as_str(), polygon.as_str(), line.as_str()]);

    client.remove_annotation(&polygon).unwrap();
    let removal = recorder.events("remove_annotation");
    assert_eq!(removal.len(), 1);
    assert_eq!(removal[0].id(), Some(polygon.as_str()));

    let doc = client.serialize(HtmlSettings::default());
    assert_eq!(doc.annotations.len(), 2);
    assert!(doc.annotations.iter().all(|a| a.id != polygon.as_str()));

    let sent = recorder.messages().len();
    assert!(matches!(
        client.annotation_mut(&polygon),
        Err(WwtError::StaleEntity { .. })
    ));
    assert!(matches!(
        client.remove_annotation(&polygon),
        Err(WwtError::StaleEntity { .. })
    ));
    assert_eq!(recorder.messages().len(), sent);
}

#[test]
fn test_points_sent_in_order() {
    let (mut client, recorder) = recording_client();
    let points = [SkyCoord::new(10.0, 0.0), SkyCoord::new(11.0, 0.0), SkyCoord::new(12.0, 1.0)];
    let id = client.add_line(&points, &Attrs::new()).unwrap();

    let sent: Vec<f64> = recorder
        .events("line_add_point")
        .iter()
        .map(|m| m.get("ra").and_then(Value::as_f64).unwrap())
        .collect();
    assert_eq!(sent, vec![10.0, 11.0, 12.0]);
    assert_eq!(client.annotation(&id).unwrap().points(), &points);
}

#[test]
fn test_failed_send_keeps_previous_setting() {
    let (mut client, flaky, recorder) = flaky_client(true);
    flaky.fail_after(0);
    assert!(matches!(client.set("grid", true), Err(WwtError::Transport(_))));
    assert_eq!(client.get("grid"), Some(&AttrValue::Bool(false)));
    assert!(recorder.messages().is_empty());

    client.set("grid", true).unwrap();
    assert_eq!(client.get("grid"), Some(&AttrValue::Bool(true)));
}

#[test]
fn test_failed_color_send_keeps_previous_opacity() {
    let (mut client, flaky, _) = flaky_client(true);
    let id = client.add_polygon(&[], &Attrs::new()).unwrap();
    let before = client.annotation(&id).unwrap();
    let fill_before = before.get("fill_color").cloned();
    let opacity_before = before.get("opacity").cloned();

    flaky.fail_after(1);
    let result = client
        .annotation_mut(&id)
        .unwrap()
        .set("fill_color", [1.0, 0.0, 0.0, 0.25]);
    assert!(result.is_err());

    let polygon = client.annotation(&id).unwrap();
    assert_eq!(polygon.get("fill_color").cloned(), fill_before);
    assert_eq!(polygon.get("opacity").cloned(), opacity_before);
}

#[test]
fn test_color_tuple_sets_opacity() {
    let (mut client, recorder) = recording_client();
    let id = client.add_polygon(&[], &Attrs::new()).unwrap();
    recorder.clear();

    client
        .annotation_mut(&id)
        .unwrap()
        .set("fill_color", [1.0, 0.0, 0.0, 0.25])
        .unwrap();

    let polygon = client.annotation(&id).unwrap();
    assert_eq!(polygon.get("fill_color"), Some(&AttrValue::from("#ff0000")));
    assert_eq!(polygon.get("opacity"), Some(&AttrValue::Float(0.25)));
    let settings: Vec<String> = recorder
        .messages()
        .iter()
        .filter_map(|m| m.get_str("setting").map(str::to_string))
        .collect();
    assert_eq!(settings, vec!["opacity", "fillColor"]);
}

#[rstest]
#[case(AttrValue::from(vec![1.0, 0.0]))]
#[case(AttrValue::from(vec![1.0, 0.0, 0.0, 0.5, 0.5]))]
#[case(AttrValue::Bool(true))]
fn test_bad_colors_rejected(#[case] value: AttrValue) {
    let (mut client, recorder) = recording_client();
    let id = client.add_polygon(&[], &Attrs::new()).unwrap();
    recorder.clear();

    let err = client
        .annotation_mut(&id)
        .unwrap()
        .set("line_color", value)
        .unwrap_err();
    assert_eq!(err.to_string(), "color must be a string or a tuple of 3 or 4 floats");
    assert!(recorder.messages().is_empty());
}

#[test]
fn test_unknown_keyword_rejected_before_create() {
    let (mut client, recorder) = recording_client();
    let err = client
        .add_line(&[], &Attrs::new().with("fill", true))
        .unwrap_err();
    match err {
        WwtError::KeyMismatch { entity, keys } => {
            assert_eq!(entity, "Line");
            assert_eq!(keys, vec!["fill".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(recorder.messages().is_empty());
}

#[test]
fn test_sky_relative_radius() {
    let (mut client, recorder) = recording_client();
    let radius = Quantity::new(2.0, Unit::parse("arcmin").unwrap());
    let id = client
        .add_circle(None, &Attrs::new().with("radius", radius))
        .unwrap();

    let circle = client.annotation(&id).unwrap();
    assert_eq!(circle.sky_relative(), Some(true));
    let settings: Vec<(String, Value)> = recorder
        .events("annotation_set")
        .iter()
        .map(|m| (m.get_str("setting").unwrap().to_string(), m.get("value").unwrap().clone()))
        .collect();
    assert_eq!(settings[0].0, "radius");
    assert!((settings[0].1.as_f64().unwrap() - 2.0 / 60.0).abs() < 1e-12);
    assert_eq!(settings[1], ("skyRelative".to_string(), Value::Bool(true)));

    let err = client
        .annotation_mut(&id)
        .unwrap()
        .set("radius", Quantity::new(1.0, Unit::parse("kg").unwrap()))
        .unwrap_err();
    assert_eq!(err.to_string(), "radius must be in pixel or angle equivalent units");
}

#[test]
fn test_clear_annotations_makes_everything_stale() {
    let (mut client, recorder) = recording_client();
    let circle = client.add_circle(None, &Attrs::new()).unwrap();
    let fov = client.add_fov("hst_acs_wfc", None, 10.0, &Attrs::new()).unwrap();
    recorder.clear();

    client.clear_annotations().unwrap();
    assert_eq!(events(&recorder), vec!["clear_annotations"]);
    assert!(client.annotation(&circle).is_err());
    assert!(client.fov(&fov).is_err());
    assert!(client.serialize(HtmlSettings::default()).annotations.is_empty());
}

// === Imagery ===

#[test]
fn test_image_collection_extends_available_imagery() {
    let (mut client, recorder) = recording_client();
    let catalog = InMemoryCatalog::new().with_document(
        "https://example.org/crab.wtml",
        concat!(
            r#"<Folder><ImageSet Name="Crab Nebula">"#,
            r#"<ThumbnailUrl>crab.jpg</ThumbnailUrl></ImageSet></Folder>"#,
        ),
    );

    assert!(client.set_foreground("Crab Nebula").is_err());
    assert_eq!(client.load_image_collection("https://example.org/crab.wtml", &catalog).unwrap(), 1);
    client.set_foreground("Crab Nebula").unwrap();

    assert_eq!(events(&recorder), vec!["load_image_collection", "set_foreground_by_name"]);
    let doc = client.serialize(HtmlSettings::default());
    assert_eq!(doc.foreground_settings.foreground, "Crab Nebula");
    assert!(client.load_image_collection("https://example.org/none.wtml", &catalog).is_err());
}

// === Mirror agreement ===

#[test]
fn test_live_state_agrees_with_document() {
    let (mut client, mirror) = mirrored_client();
    client.set("constellation_figures", true).unwrap();
    client.set("constellation_figure_color", "green").unwrap();
    client.set_foreground_opacity(35.0).unwrap();
    client.center_on_coordinates(SkyCoord::from_hours(5.5, -5.0), Some(3.0), false).unwrap();
    let circle = client
        .add_circle(None, &Attrs::new().with("radius", Quantity::deg(0.2)).with("label", "Orion"))
        .unwrap();
    let centers = [SkyCoord::new(80.0, -4.0), SkyCoord::new(81.0, -4.5)];
    client.add_circle_collection(&centers, &Attrs::new()).unwrap();
    client.add_fov("spitzer_irac", None, 30.0, &Attrs::new()).unwrap();
    client.annotation_mut(&circle).unwrap().set_center(SkyCoord::new(84.0, -6.0)).unwrap();
    client.set_view("universe").unwrap();
    client.solar_system_mut().track_object("earth").unwrap();
    client.solar_system_mut().set("scale", 20).unwrap();

    let doc = client.serialize(HtmlSettings::titled("Orion"));
    assert_eq!(mirror.disagreements(&doc), Vec::<String>::new());
    assert_eq!(mirror.annotation_ids().len(), doc.annotations.len());
}

#[test]
fn test_failed_fov_rebuild_keeps_old_panels() {
    let (mut client, flaky, recorder) = flaky_client(true);
    recorder.clear();
    let id = client.add_fov("tess", None, 0.0, &Attrs::new()).unwrap();
    let per_panel = recorder.messages().len() / 4;
    let panels = client.fov(&id).unwrap().panels().to_vec();

    for successes in [0, per_panel + 1] {
        flaky.fail_after(successes);
        assert!(client.fov_set_rotation(&id, 30.0).is_err());

        let fov = client.fov(&id).unwrap();
        assert_eq!(fov.panels(), panels.as_slice());
        assert_eq!(fov.rotation(), 0.0);
        assert_eq!(client.annotations().len(), 4);
        for panel in &panels {
            assert!(client.annotation(panel).is_ok());
        }
    }

    client.fov_set_rotation(&id, 30.0).unwrap();
    assert_eq!(client.fov(&id).unwrap().rotation(), 30.0);
    assert_eq!(client.annotations().len(), 4);
    assert!(client.annotation(&panels[0]).is_err());
}
