//! State document integration tests: live/serialized agreement, replay and export

mod common;

use common::fixtures::{gradient_image, mirrored_client, recording_client, star_table};
use std::fs;
use wwt_core::{
    save_html_bundle, Attrs, BundleOptions, EngineMirror, HtmlSettings, Quantity, SkyCoord,
    StateDocument, WwtClient,
};

/// A view touching every part of the document
fn build_scene(client: &mut WwtClient) {
    client.set("ecliptic", true).unwrap();
    client.set("ecliptic_color", [0.0, 1.0, 0.0]).unwrap();
    client.set("location_latitude", Quantity::deg(19.82)).unwrap();
    client.set_background("Planck CMB").unwrap();
    client.set_foreground("Hydrogen Alpha Full Sky Map").unwrap();
    client.set_foreground_opacity(60.0).unwrap();
    client
        .center_on_coordinates(SkyCoord::new(83.82, -5.39), Some(2.0), true)
        .unwrap();

    let table = client
        .layers_mut()
        .add_table_layer(star_table(5), "Sky", &Attrs::new().with("size_att", "flux"))
        .unwrap();
    client
        .layers_mut()
        .table_mut(&table)
        .unwrap()
        .set("color", "orange")
        .unwrap();
    let image = client
        .layers_mut()
        .add_image_layer(gradient_image().into(), &Attrs::new().with("stretch", "sqrt"))
        .unwrap();
    client.layers_mut().image_mut(&image).unwrap().set("opacity", 0.4).unwrap();

    let circle = client
        .add_circle(None, &Attrs::new().with("radius", Quantity::deg(0.1)).with("fill", true))
        .unwrap();
    client
        .add_line(
            &[SkyCoord::new(83.0, -5.0), SkyCoord::new(84.0, -6.0)],
            &Attrs::new().with("color", "yellow"),
        )
        .unwrap();
    let fov = client
        .add_fov("jwst_nircam", None, 45.0, &Attrs::new().with("line_color", "cyan"))
        .unwrap();
    client.fov_set_rotation(&fov, 90.0).unwrap();
    client.remove_annotation(&circle).unwrap();
}

#[test]
fn test_serialized_state_agrees_with_engine() {
    let (mut client, mirror) = mirrored_client();
    build_scene(&mut client);

    let doc = client.serialize(HtmlSettings::titled("Orion"));
    assert_eq!(mirror.disagreements(&doc), Vec::<String>::new());
    assert!(mirror.unknown_events().is_empty());
    assert_eq!(mirror.layer_ids().len(), 2);
    assert_eq!(doc.foreground_settings.background, "Planck CMB");
    assert_eq!(doc.view_settings.mode, "sky");
}

#[test]
fn test_document_replays_onto_fresh_engine() {
    let (mut client, _) = mirrored_client();
    build_scene(&mut client);
    let doc = client.serialize(HtmlSettings::default());

    let fresh = EngineMirror::new();
    fresh.replay(&doc.to_messages());
    assert_eq!(fresh.disagreements(&doc), Vec::<String>::new());
    assert_eq!(
        fresh.annotation_ids(),
        doc.annotations.iter().map(|a| a.id.clone()).collect::<Vec<_>>()
    );
}

#[test]
fn test_planet_and_3d_views_replay() {
    let (mut client, mirror) = mirrored_client();
    client.set_view("mars").unwrap();
    let doc = client.serialize(HtmlSettings::default());
    assert_eq!(doc.view_settings.mode, "planet");
    assert_eq!(doc.view_settings.body.as_deref(), Some("mars"));
    assert!(mirror.agrees_with(&doc));

    client.set_view("solar system").unwrap();
    client.solar_system_mut().set("orbits", true).unwrap();
    client.solar_system_mut().track_object("jupiter").unwrap();
    let doc = client.serialize(HtmlSettings::default());
    assert!(doc.view_settings.tracked_object_id.is_some());
    assert!(mirror.agrees_with(&doc));

    let fresh = EngineMirror::new();
    fresh.replay(&doc.to_messages());
    assert!(fresh.agrees_with(&doc));
}

#[test]
fn test_document_json_round_trip() {
    let (mut client, _) = recording_client();
    build_scene(&mut client);
    let doc = client.serialize(HtmlSettings::titled("Round trip").with_max_size(640, 480));

    let json = doc.to_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["html_settings"]["title"], "Round trip");
    assert_eq!(parsed["wwt_settings"]["showEcliptic"], true);
    assert_eq!(parsed["wwt_settings"]["eclipticColor"], "#00ff00");

    let restored = StateDocument::from_json(&json).unwrap();
    assert_eq!(restored.html_settings, doc.html_settings);
    assert_eq!(restored.view_settings.mode, doc.view_settings.mode);
    let ids = |d: &StateDocument| d.annotations.iter().map(|a| a.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&restored), ids(&doc));

    // Floats may differ in the last bit after parsing
    let engine = EngineMirror::new();
    engine.replay(&restored.to_messages());
    assert_eq!(engine.disagreements(&doc), Vec::<String>::new());
}

#[cfg(feature = "fits")]
#[test]
fn test_html_bundle_writes_every_file() {
    let (mut client, _) = recording_client();
    build_scene(&mut client);
    let dir = tempfile::tempdir().unwrap();

    let options = BundleOptions::new().with_title("Orion");
    let result = save_html_bundle(&client, dir.path(), &options).unwrap();

    assert_eq!(result.figure_path, dir.path().join("wwt_figure.json"));
    assert!(result.index_path.exists());
    assert_eq!(result.data_files.len(), 2);
    for (layer, path) in client.layers().iter().zip(&result.data_files) {
        assert_eq!(path, &dir.path().join("layer_data").join(layer.data_file_name()));
        assert!(fs::metadata(path).unwrap().len() > 0);
    }

    let figure = fs::read_to_string(&result.figure_path).unwrap();
    let doc = StateDocument::from_json(&figure).unwrap();
    assert_eq!(doc.layers.len(), 2);
    for entry in &doc.layers {
        assert!(dir.path().join(entry.data_file.as_deref().unwrap()).exists());
    }

    let index = fs::read_to_string(&result.index_path).unwrap();
    assert!(index.contains("<title>Orion</title>"));

    let csv = fs::read_to_string(&result.data_files[0]).unwrap();
    assert!(csv.starts_with("flux,ra,dec,dist"));
    let image = wwt_io::fits::read_image(&result.data_files[1]).unwrap();
    assert_eq!(image.data, gradient_image().data);
}
