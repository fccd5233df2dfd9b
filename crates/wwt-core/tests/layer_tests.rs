//! Table and image layer integration tests

mod common;

use common::fixtures::{gradient_image, recording_client, star_table};
use proptest::prelude::*;
use rstest::rstest;
use serde_json::Value;
use wwt_core::{AttrValue, Attrs, Dimension, ImageSource, Unit, WwtError};

// === Units ===

proptest! {
    #[test]
    fn prop_custom_kilometer_canonicalizes(symbol in "[a-z_]{3,10}", writes in 1usize..4) {
        let (mut client, recorder) = recording_client();
        let id = client
            .layers_mut()
            .add_table_layer(star_table(3), "Sky", &Attrs::new())
            .unwrap();
        recorder.clear();

        let unit = Unit::custom(symbol, Dimension::Length, 1000.0);
        for _ in 0..writes {
            client.layers_mut().table_mut(&id).unwrap().set("alt_unit", unit.clone()).unwrap();
            let stored = client.layers().table(&id).unwrap().model().get_unit("alt_unit").cloned();
            prop_assert_eq!(stored.as_ref().map(Unit::symbol), Some("km"));
        }

        let sent = recorder.events("table_layer_set");
        prop_assert_eq!(sent.len(), writes);
        for message in &sent {
            prop_assert_eq!(message.get_str("setting"), Some("altUnit"));
            prop_assert_eq!(message.get_str("value"), Some("kilometers"));
        }
    }
}

#[rstest]
#[case(AttrValue::from("kilogram"))]
#[case(AttrValue::from(Unit::parse("kg").unwrap()))]
#[case(AttrValue::from(Unit::parse("cm").unwrap()))]
fn test_alt_unit_outside_choice_rejected(#[case] unit: AttrValue) {
    let (mut client, recorder) = recording_client();
    let id = client
        .layers_mut()
        .add_table_layer(star_table(2), "Sky", &Attrs::new())
        .unwrap();
    recorder.clear();

    let err = client
        .layers_mut()
        .table_mut(&id)
        .unwrap()
        .set("alt_unit", unit)
        .unwrap_err();
    assert_eq!(err.to_string(), "alt_unit should be one of AU/Mpc/ft/inch/km/lyr/m/mi/pc");
    assert!(recorder.messages().is_empty());
}

// === Column mapping ===

#[rstest]
#[case(&["flux", "dec", "ra"], Some("ra"), Some("dec"))]
#[case(&["flux", "lng2", "lat2", "lng1", "lat1"], None, None)]
fn test_detected_columns_on_layer(
    #[case] names: &[&str],
    #[case] lon: Option<&str>,
    #[case] lat: Option<&str>,
) {
    let mut table = wwt_io::Table::new();
    for name in names {
        table = table
            .with_column(*name, None, wwt_io::DataColumn::Float64(vec![1.0, 2.0]))
            .unwrap();
    }
    let (mut client, _) = recording_client();
    let id = client
        .layers_mut()
        .add_table_layer(table, "Sky", &Attrs::new())
        .unwrap();

    let layer = client.layers().table(&id).unwrap();
    match (lon, lat) {
        (Some(lon), Some(lat)) => {
            assert_eq!(layer.get("lon_att"), Some(&AttrValue::from(lon)));
            assert_eq!(layer.get("lat_att"), Some(&AttrValue::from(lat)));
        }
        _ => {
            // Without a detected pair the first two columns are used
            assert_eq!(layer.get("lon_att"), Some(&AttrValue::from(names[0])));
            assert_eq!(layer.get("lat_att"), Some(&AttrValue::from(names[1])));
        }
    }
}

#[test]
fn test_unknown_frame_rejected() {
    let (mut client, recorder) = recording_client();
    let err = client
        .layers_mut()
        .add_table_layer(star_table(2), "Vulcan", &Attrs::new())
        .unwrap_err();
    assert!(matches!(err, WwtError::Validation { .. }));
    assert!(recorder.messages().is_empty());
}

// === Manager ===

#[test]
fn test_manager_indexing_after_removal() {
    let (mut client, recorder) = recording_client();
    let layers = client.layers_mut();
    let a = layers.add_table_layer(star_table(2), "Sky", &Attrs::new()).unwrap();
    let b = layers.add_table_layer(star_table(3), "Earth", &Attrs::new()).unwrap();
    let c = layers
        .add_image_layer(ImageSource::from(gradient_image()), &Attrs::new())
        .unwrap();

    layers.remove_layer(&b).unwrap();
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[0].id(), &a);
    assert_eq!(layers[1].id(), &c);
    assert_eq!(layers.position(&c), Some(1));

    let removed = recorder.events("table_layer_remove");
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id(), Some(b.as_str()));

    assert!(matches!(layers.table_mut(&b), Err(WwtError::StaleEntity { .. })));
    assert!(matches!(layers.remove_layer(&b), Err(WwtError::StaleEntity { .. })));
}

#[test]
fn test_layers_serialize_in_order() {
    let (mut client, _) = recording_client();
    let table = client
        .layers_mut()
        .add_table_layer(star_table(4), "sky", &Attrs::new().with("cmap_att", "flux"))
        .unwrap();
    let image = client
        .layers_mut()
        .add_image_layer(gradient_image().into(), &Attrs::new().with("cmap", "viridis"))
        .unwrap();

    let entries = client.layers().serialize();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, table.as_str());
    assert_eq!(entries[0].layer_type, "table");
    assert_eq!(entries[0].frame, "Sky");
    assert_eq!(entries[0].data_file.as_deref(), Some(format!("layer_data/{}.csv", table).as_str()));
    assert_eq!(entries[1].layer_type, "image");
    assert_eq!(entries[1].stretch_info.as_ref().map(|s| s.cmap.as_str()), Some("viridis"));
}

// === Image layers ===

#[test]
fn test_image_layer_through_client() {
    let (mut client, recorder) = recording_client();
    let id = client
        .layers_mut()
        .add_image_layer(gradient_image().into(), &Attrs::new().with("stretch", "log"))
        .unwrap();

    let create = &recorder.events("image_layer_create")[0];
    assert_eq!(create.id(), Some(id.as_str()));
    let stretch = &recorder.events("image_layer_stretch")[0];
    assert_eq!(stretch.get("stretch"), Some(&Value::from(1)));

    let layer = client.layers_mut().image_mut(&id).unwrap();
    layer.set("vmin", 10.0).unwrap();
    layer.set("vmax", 20.0).unwrap();
    let info = layer.stretch_info();
    assert_eq!((info.vmin, info.vmax), (10.0, 20.0));
    assert_eq!(info.stretch, "log");
    assert_eq!(layer.to_string(), "<ImageLayer 16x8 pixels>");

    let err = layer.set("cmap", "sparkly").unwrap_err();
    assert!(err.to_string().starts_with("cmap should be one of "));
}

#[test]
fn test_image_update_data_through_client() {
    let (mut client, recorder) = recording_client();
    let id = client
        .layers_mut()
        .add_image_layer(gradient_image().into(), &Attrs::new().with("stretch", "sqrt"))
        .unwrap();
    recorder.clear();

    let brighter = gradient_image().data.mapv(|v| v * 10.0 + 1000.0);
    let layer = client.layers_mut().image_mut(&id).unwrap();
    layer.update_data(brighter).unwrap();

    let info = layer.stretch_info();
    assert!(info.vmin >= 1000.0);
    assert!(info.vmax > 2000.0);
    assert_eq!(info.stretch, "sqrt");
    assert_eq!(layer.image().wcs, gradient_image().wcs);

    let update = &recorder.events("image_layer_update")[0];
    assert_eq!(update.id(), Some(id.as_str()));
    let stretch = &recorder.events("image_layer_stretch")[0];
    assert_eq!(stretch.get("vmin"), Some(&Value::from(info.vmin)));
}
