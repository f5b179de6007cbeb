//
// Scalar and structural round-trip invariants, checked against a
// generated sample rather than a handful of fixed cases.
//

use proptest::prelude::*;
use tagval::{Encoder, Value};

proptest! {
    #[test]
    fn integers_round_trip_exactly(n in any::<i64>()) {
        let mut enc = Encoder::new();
        enc.write_int(n).unwrap();
        let data = enc.finish().unwrap();
        let root = Value::from_data(&data).unwrap();
        prop_assert_eq!(root.as_int(), n);
    }

    #[test]
    fn doubles_round_trip_bit_exact(d in any::<f64>().prop_filter("finite only", |d| d.is_finite())) {
        let mut enc = Encoder::new();
        enc.write_double(d).unwrap();
        let data = enc.finish().unwrap();
        let root = Value::from_data(&data).unwrap();
        prop_assert_eq!(root.as_double().to_bits(), d.to_bits());
    }

    #[test]
    fn strings_round_trip_exactly(s in "\\PC{0,64}") {
        let mut enc = Encoder::new();
        enc.write_string(&s).unwrap();
        let data = enc.finish().unwrap();
        let root = Value::from_data(&data).unwrap();
        prop_assert_eq!(root.as_string(), Some(s.as_str()));
    }

    #[test]
    fn binary_data_round_trips_exactly(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut enc = Encoder::new();
        enc.write_data(&bytes).unwrap();
        let data = enc.finish().unwrap();
        let root = Value::from_data(&data).unwrap();
        prop_assert_eq!(root.as_data(), Some(bytes.as_slice()));
    }

    #[test]
    fn arrays_of_small_ints_preserve_order(values in prop::collection::vec(-2048i64..2048, 0..32)) {
        let mut enc = Encoder::new();
        enc.begin_array(values.len() as u32).unwrap();
        for &v in &values {
            enc.write_int(v).unwrap();
        }
        enc.end_array().unwrap();
        let data = enc.finish().unwrap();

        let root = Value::from_data(&data).unwrap();
        let arr = root.as_array().unwrap();
        let decoded: Vec<i64> = arr.iter().map(|v| v.as_int()).collect();
        prop_assert_eq!(decoded, values);
    }

    #[test]
    fn dict_keys_always_come_back_ascending(
        keys in prop::collection::hash_set("[a-z]{1,12}", 1..16)
    ) {
        let mut enc = Encoder::new();
        let mut sorted: Vec<String> = keys.into_iter().collect();
        enc.begin_dict(sorted.len() as u32).unwrap();
        for (i, k) in sorted.iter().enumerate() {
            enc.write_key(k).unwrap();
            enc.write_int(i as i64).unwrap();
        }
        enc.end_dict().unwrap();
        let data = enc.finish().unwrap();

        let root = Value::from_data(&data).unwrap();
        let dict = root.as_dict().unwrap();
        let observed: Vec<String> = dict.iter().map(|(k, _)| k.as_str().to_string()).collect();
        sorted.sort();
        prop_assert_eq!(observed, sorted);
    }
}
