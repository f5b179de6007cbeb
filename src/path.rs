//
// path.rs
//
// A compiled sequence of dict-key / array-index components, evaluated against a Value.
// Three entry points are provided: compile-then-evaluate ([`Path::new`] +
// [`Path::eval`]), one-shot evaluation from a specifier string, and RFC-6901 JSON-Pointer
// evaluation.
//

use crate::error::{Error, Result};
use crate::value::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Component {
    Key(String),
    Index(i64),
}

/// A compiled path specifier, reusable across many root Values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    components: Vec<Component>,
}

impl Path {
    /// Parses a specifier with the grammar `( '$' )? ( '.' key | '[' integer ']' | key )*`.
    /// A backslash escapes any of `.`, `[`, `\` within a bare or dotted key.
    pub fn new(specifier: &str) -> Result<Self> {
        let mut chars = specifier.chars().peekable();
        if chars.peek() == Some(&'$') {
            chars.next();
        }
        let mut components = Vec::new();
        let mut first = true;
        while chars.peek().is_some() {
            match chars.peek() {
                Some('.') => {
                    chars.next();
                    components.push(Component::Key(parse_key(&mut chars)?));
                }
                Some('[') => {
                    chars.next();
                    let mut digits = String::new();
                    for c in chars.by_ref() {
                        if c == ']' {
                            break;
                        }
                        digits.push(c);
                    }
                    let index: i64 = digits
                        .parse()
                        .map_err(|_| Error::PathSyntaxError(format!("invalid array index '{}'", digits)))?;
                    components.push(Component::Index(index));
                }
                Some(_) if first => {
                    components.push(Component::Key(parse_key(&mut chars)?));
                }
                Some(c) => {
                    return Err(Error::PathSyntaxError(format!("unexpected character '{}' in path", c)));
                }
                None => break,
            }
            first = false;
        }
        Ok(Path { components })
    }

    /// Applies this path's components to `root`, returning `None` on any miss or type
    /// mismatch along the way.
    pub fn eval<'a>(&self, root: Value<'a>) -> Option<Value<'a>> {
        let mut current = root;
        for component in &self.components {
            current = apply(current, component)?;
        }
        Some(current)
    }

    /// One-shot evaluation without compiling first.
    pub fn eval_str<'a>(specifier: &str, root: Value<'a>) -> Result<Option<Value<'a>>> {
        Ok(Self::new(specifier)?.eval(root))
    }

    /// Evaluates an RFC-6901 JSON-Pointer string (`/seg/seg...`, `~0` -> `~`, `~1` -> `/`).
    pub fn eval_json_pointer<'a>(pointer: &str, root: Value<'a>) -> Result<Option<Value<'a>>> {
        if pointer.is_empty() {
            return Ok(Some(root));
        }
        if !pointer.starts_with('/') {
            return Err(Error::PathSyntaxError("JSON pointer must start with '/'".into()));
        }
        let mut current = root;
        for raw in pointer[1..].split('/') {
            let unescaped = raw.replace("~1", "/").replace("~0", "~");
            let component = if let Ok(index) = unescaped.parse::<i64>() {
                Component::Index(index)
            } else {
                Component::Key(unescaped)
            };
            match apply(current, &component) {
                Some(v) => current = v,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

fn parse_key(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<String> {
    let mut key = String::new();
    while let Some(&c) = chars.peek() {
        match c {
            '.' | '[' => break,
            '\\' => {
                chars.next();
                match chars.next() {
                    Some(escaped) => key.push(escaped),
                    None => return Err(Error::PathSyntaxError("trailing backslash in path".into())),
                }
            }
            _ => {
                key.push(c);
                chars.next();
            }
        }
    }
    if key.is_empty() {
        return Err(Error::PathSyntaxError("empty key component in path".into()));
    }
    Ok(key)
}

fn apply<'a>(value: Value<'a>, component: &Component) -> Option<Value<'a>> {
    match component {
        Component::Key(key) => value.as_dict()?.get(key),
        Component::Index(index) => {
            let array = value.as_array()?;
            let resolved = if *index < 0 {
                let len = array.count() as i64;
                let i = len + index;
                if i < 0 {
                    return None;
                }
                i as u32
            } else {
                *index as u32
            };
            array.get(resolved)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::Encoder;

    fn sample_doc() -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.begin_dict(1).unwrap();
        enc.write_key("items").unwrap();
        enc.begin_array(3).unwrap();
        enc.begin_dict(1).unwrap();
        enc.write_key("name").unwrap();
        enc.write_string("first").unwrap();
        enc.end_dict().unwrap();
        enc.write_int(2).unwrap();
        enc.write_int(3).unwrap();
        enc.end_array().unwrap();
        enc.end_dict().unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn dotted_and_bracket_components_navigate_nested_structure() {
        let data = sample_doc();
        let root = Value::from_data(&data).unwrap();
        let path = Path::new("$.items[0].name").unwrap();
        assert_eq!(path.eval(root).unwrap().as_string(), Some("first"));
    }

    #[test]
    fn negative_index_counts_from_the_end() {
        let data = sample_doc();
        let root = Value::from_data(&data).unwrap();
        let path = Path::new("$.items[-1]").unwrap();
        assert_eq!(path.eval(root).unwrap().as_int(), 3);
    }

    #[test]
    fn missing_component_returns_none_not_an_error() {
        let data = sample_doc();
        let root = Value::from_data(&data).unwrap();
        let path = Path::new("$.nonexistent.deep").unwrap();
        assert!(path.eval(root).is_none());
    }

    #[test]
    fn json_pointer_syntax_navigates_the_same_structure() {
        let data = sample_doc();
        let root = Value::from_data(&data).unwrap();
        let found = Path::eval_json_pointer("/items/0/name", root).unwrap();
        assert_eq!(found.unwrap().as_string(), Some("first"));
    }

    #[test]
    fn json_pointer_escapes_tilde_and_slash() {
        let mut enc = Encoder::new();
        enc.begin_dict(1).unwrap();
        enc.write_key("a/b~c").unwrap();
        enc.write_int(7).unwrap();
        enc.end_dict().unwrap();
        let data = enc.finish().unwrap();
        let root = Value::from_data(&data).unwrap();
        let found = Path::eval_json_pointer("/a~1b~0c", root).unwrap();
        assert_eq!(found.unwrap().as_int(), 7);
    }
}
