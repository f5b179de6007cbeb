//
// json.rs
//
// The bridge between TVF and `serde_json::Value`: `Encoder::write_json_value` drives the same
// begin/write/end calls a hand-written JSON tokenizer consumer would, and `Value::to_json` is
// its inverse.
//

use crate::error::{Error, Result};
use crate::value::Value;
use crate::writer::Encoder;
use serde_json::{Map, Number, Value as Json};

impl<'b> Encoder<'b> {
    /// Recursively writes a `serde_json::Value` tree.
    pub fn write_json_value(&mut self, v: &Json) -> Result<()> {
        match v {
            Json::Null => self.write_null(),
            Json::Bool(b) => self.write_bool(*b),
            Json::Number(n) => self.write_json_number(n),
            Json::String(s) => self.write_string(s),
            Json::Array(items) => {
                self.begin_array(items.len() as u32)?;
                for item in items {
                    self.write_json_value(item)?;
                }
                self.end_array()
            }
            Json::Object(map) => {
                self.begin_dict(map.len() as u32)?;
                for (key, value) in map {
                    self.write_key(key)?;
                    self.write_json_value(value)?;
                }
                self.end_dict()
            }
        }
    }

    fn write_json_number(&mut self, n: &Number) -> Result<()> {
        if let Some(i) = n.as_i64() {
            self.write_int(i)
        } else if let Some(u) = n.as_u64() {
            self.write_uint(u)
        } else if let Some(f) = n.as_f64() {
            self.write_double(f)
        } else {
            Err(Error::JsonError(format!("number '{}' is not representable", n)))
        }
    }
}

impl<'a> Value<'a> {
    /// Converts this value (recursively) to a `serde_json::Value`. `undefined` has no
    /// JSON representation and maps to `null`, matching `get_type` reporting it as null.
    /// Non-finite doubles (NaN/Infinity) have no JSON representation either and map to `0`,
    /// matching `as_int`'s "non-numeric values return 0" policy.
    pub fn to_json(&self) -> Json {
        use crate::value::ValueType;
        match self.get_type() {
            ValueType::Null => Json::Null,
            ValueType::Boolean => Json::Bool(self.as_bool()),
            ValueType::Number if self.is_float_tagged() => match Number::from_f64(self.as_double()) {
                Some(n) => Json::Number(n),
                None => Json::Number(Number::from(0)),
            },
            ValueType::Number if self.is_unsigned() => Json::Number(Number::from(self.as_unsigned())),
            ValueType::Number => Json::Number(Number::from(self.as_int())),
            ValueType::String => Json::String(self.as_string().unwrap_or_default().to_string()),
            ValueType::Data => {
                // No JSON type for raw bytes, so data round-trips through JSON as an array of
                // byte values rather than a base64 string.
                let bytes = self.as_data().unwrap_or_default();
                Json::Array(bytes.iter().map(|&b| Json::Number(Number::from(b))).collect())
            }
            ValueType::Array => {
                let array = self.as_array().expect("tag checked above");
                Json::Array(array.iter().map(|v| v.to_json()).collect())
            }
            ValueType::Dict => {
                let dict = self.as_dict().expect("tag checked above");
                let mut map = Map::new();
                for (key, value) in dict.iter() {
                    map.insert(key.as_str().to_string(), value.to_json());
                }
                Json::Object(map)
            }
        }
    }

    fn is_float_tagged(&self) -> bool {
        self.tag() == crate::value::TAG_FLOAT
    }
}
