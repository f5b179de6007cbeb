//
// Concrete end-to-end scenarios, plus the cross-module invariants
// (idempotent encode, validation soundness on truncated input) that don't
// fit naturally as a unit test beside a single module.
//

use tagval::{Context, Encoder, SharedKeys, Value};

#[test]
fn empty_dict_round_trips_to_the_documented_bytes() {
    let mut enc = Encoder::new();
    enc.begin_dict(0).unwrap();
    enc.end_dict().unwrap();
    let data = enc.finish().unwrap();
    assert_eq!(data, vec![0x70, 0x00]);

    let root = Value::from_data(&data).expect("valid document");
    let dict = root.as_dict().expect("dict");
    assert_eq!(dict.count(), 0);
}

#[test]
fn small_int_encodes_to_the_documented_bytes() {
    let mut enc = Encoder::new();
    enc.write_int(2017).unwrap();
    let data = enc.finish().unwrap();
    // ShortInt header byte: tag 0, high nibble of 2017 (0x7E1) -> 0x07; low byte 0xE1.
    assert_eq!(&data[..2], &[0x07, 0xE1]);

    let root = Value::from_data(&data).unwrap();
    assert_eq!(root.as_int(), 2017);
}

#[test]
fn duplicate_strings_are_interned_to_a_single_payload() {
    let mut enc = Encoder::new();
    enc.begin_array(0).unwrap();
    enc.write_string("hello").unwrap();
    enc.write_string("hello").unwrap();
    enc.end_array().unwrap();
    let data = enc.finish().unwrap();

    let root = Value::from_data(&data).unwrap();
    let arr = root.as_array().unwrap();
    let a = arr.get(0).unwrap();
    let b = arr.get(1).unwrap();
    assert_eq!(a.position(), b.position());
    // Exactly one occurrence of the string payload bytes in the whole buffer.
    let needle = b"hello";
    let occurrences = data.windows(needle.len()).filter(|w| *w == needle).count();
    assert_eq!(occurrences, 1);
}

#[test]
fn dict_iteration_yields_ascending_key_order() {
    let mut enc = Encoder::new();
    enc.begin_dict(0).unwrap();
    for (k, v) in [("z", 1), ("a", 2), ("m", 3)] {
        enc.write_key(k).unwrap();
        enc.write_int(v).unwrap();
    }
    enc.end_dict().unwrap();
    let data = enc.finish().unwrap();

    let root = Value::from_data(&data).unwrap();
    let dict = root.as_dict().unwrap();
    let pairs: Vec<(String, i64)> = dict.iter().map(|(k, v)| (k.as_str().to_string(), v.as_int())).collect();
    assert_eq!(pairs, vec![("a".to_string(), 2), ("m".to_string(), 3), ("z".to_string(), 1)]);
}

#[test]
fn parent_inherited_dict_overlay_produces_a_small_delta() {
    let mut base_enc = Encoder::new();
    base_enc.begin_dict(0).unwrap();
    base_enc.write_key("name").unwrap();
    base_enc.write_string("totoro").unwrap();
    base_enc.write_key("size").unwrap();
    base_enc.write_string("XXXL").unwrap();
    base_enc.end_dict().unwrap();
    let base = base_enc.finish().unwrap();

    let base_root = Value::from_data(&base).unwrap();
    let mut overlay = tagval::MutableDict::from_source(base_root.as_dict().unwrap());
    overlay.set_string("name", "catbus");
    overlay.remove("size");

    let mut enc = Encoder::with_base(&base);
    overlay.encode_into(&mut enc).unwrap();
    let delta = enc.finish().unwrap();
    assert!(delta.len() <= 32, "delta should stay small: {} bytes", delta.len());

    let ctx = Context::new(None, Some(&base));
    let new_root = Value::from_data_in(&delta, ctx).unwrap();
    let new_dict = new_root.as_dict().unwrap();
    let pairs: Vec<(String, String)> =
        new_dict.iter().map(|(k, v)| (k.as_str().to_string(), v.as_string().unwrap().to_string())).collect();
    assert_eq!(pairs, vec![("name".to_string(), "catbus".to_string())]);
}

#[test]
fn long_array_uses_the_varint_count_extension_and_preserves_order() {
    let mut enc = Encoder::new();
    enc.begin_array(0).unwrap();
    for i in 0..2050i64 {
        enc.write_int(i).unwrap();
    }
    enc.end_array().unwrap();
    let data = enc.finish().unwrap();

    let root = Value::from_data(&data).unwrap();
    let arr = root.as_array().unwrap();
    assert_eq!(arr.count(), 2050);
    assert_eq!(arr.get(2049).unwrap().as_int(), 2049);
    assert_eq!(arr.get(0).unwrap().as_int(), 0);
}

#[test]
fn idempotent_encode_reproduces_equal_content_at_equal_or_smaller_size() {
    let mut enc = Encoder::new();
    enc.begin_dict(0).unwrap();
    enc.write_key("items").unwrap();
    enc.begin_array(0).unwrap();
    for i in 0..5 {
        enc.write_int(i).unwrap();
    }
    enc.end_array().unwrap();
    enc.write_key("name").unwrap();
    enc.write_string("totoro").unwrap();
    enc.end_dict().unwrap();
    let original = enc.finish().unwrap();

    let root = Value::from_data(&original).unwrap();
    let mut re_enc = Encoder::new();
    re_enc.write_value(root).unwrap();
    let rebuilt = re_enc.finish().unwrap();
    assert!(rebuilt.len() <= original.len());

    let rebuilt_root = Value::from_data(&rebuilt).unwrap();
    assert_eq!(rebuilt_root, root);
}

#[test]
fn truncated_buffer_is_rejected_without_panicking() {
    let mut enc = Encoder::new();
    enc.begin_dict(0).unwrap();
    enc.write_key("items").unwrap();
    enc.begin_array(0).unwrap();
    for i in 0..50 {
        enc.write_int(i).unwrap();
    }
    enc.end_array().unwrap();
    enc.end_dict().unwrap();
    let data = enc.finish().unwrap();

    for cut in 1..data.len() {
        let _ = Value::from_data(&data[..cut]);
    }
}

#[test]
fn shared_keys_round_trip_through_dict_lookup() {
    let keys = std::sync::Arc::new(SharedKeys::new());
    let mut enc = Encoder::new();
    enc.set_shared_keys(keys.clone());
    enc.begin_dict(0).unwrap();
    enc.write_key("name").unwrap();
    enc.write_string("Bix").unwrap();
    enc.write_key("age").unwrap();
    enc.write_int(3).unwrap();
    enc.end_dict().unwrap();
    let data = enc.finish().unwrap();

    let ctx = Context::new(Some(&keys), None);
    let root = Value::from_data_in(&data, ctx).unwrap();
    let dict = root.as_dict().unwrap();
    assert_eq!(dict.get("name").unwrap().as_string(), Some("Bix"));
    assert_eq!(dict.get("age").unwrap().as_int(), 3);
    assert_eq!(dict.get_int(0).unwrap().as_string(), Some("Bix"));
}
