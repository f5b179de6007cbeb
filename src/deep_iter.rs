//
// deep_iter.rs
//
// Breadth-first-within-container, depth-first-overall traversal of a Value tree: the root is
// visited first, then each container's direct children before descending into any of them.
//

use crate::array::ArrayIterator;
use crate::dict::DictIterator;
use crate::value::Value;
use std::collections::VecDeque;

#[derive(Clone, Debug)]
enum PathComponent {
    Key(String),
    Index(u32),
}

impl PathComponent {
    fn append_js(&self, out: &mut String) {
        match self {
            PathComponent::Key(k) => {
                out.push('.');
                out.push_str(k);
            }
            PathComponent::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
        }
    }

    fn append_pointer(&self, out: &mut String) {
        out.push('/');
        match self {
            PathComponent::Key(k) => out.push_str(&k.replace('~', "~0").replace('/', "~1")),
            PathComponent::Index(i) => out.push_str(&i.to_string()),
        }
    }
}

enum ContainerCursor<'a> {
    Array(ArrayIterator<'a>, u32),
    Dict(DictIterator<'a>),
}

/// One visited node: its path from the root and the value itself.
pub struct DeepIteratorItem<'a> {
    path: Vec<PathComponent>,
    pub value: Value<'a>,
}

impl<'a> DeepIteratorItem<'a> {
    /// A JavaScript-like path string, e.g. `.foo[3].bar`.
    pub fn path_string(&self) -> String {
        let mut out = String::new();
        for c in &self.path {
            c.append_js(&mut out);
        }
        out
    }

    /// An RFC-6901 JSON-Pointer string, e.g. `/foo/3/bar`.
    pub fn json_pointer(&self) -> String {
        let mut out = String::new();
        for c in &self.path {
            c.append_pointer(&mut out);
        }
        out
    }
}

/// Walks a Value tree breadth-first within each container and depth-first overall: the root is
/// yielded first, then the direct children of the first container encountered, then
/// that child's own children, and so on. Call [`DeepIterator::skip_children`] right after a
/// visit to prune the subtree just yielded.
pub struct DeepIterator<'a> {
    // Deferred (path-prefix, container) pairs not yet expanded, in visitation order.
    pending: VecDeque<(Vec<PathComponent>, Value<'a>)>,
    current: Option<(Vec<PathComponent>, ContainerCursor<'a>)>,
    root: Option<Value<'a>>,
    just_visited_was_container: bool,
}

impl<'a> DeepIterator<'a> {
    pub fn new(root: Value<'a>) -> Self {
        DeepIterator { pending: VecDeque::new(), current: None, root: Some(root), just_visited_was_container: false }
    }

    /// Prunes the subtree of the node most recently returned by `next()`. Has no effect if
    /// that node was a scalar (there is nothing queued for it to prune).
    pub fn skip_children(&mut self) {
        if self.just_visited_was_container {
            self.pending.pop_back();
            self.just_visited_was_container = false;
        }
    }

    fn enqueue_if_container(&mut self, path: Vec<PathComponent>, value: Value<'a>) -> bool {
        if value.as_array().is_some() || value.as_dict().is_some() {
            self.pending.push_back((path, value));
            true
        } else {
            false
        }
    }

    fn advance_to_next_container(&mut self) -> bool {
        while let Some((path, value)) = self.pending.pop_front() {
            if let Some(array) = value.as_array() {
                self.current = Some((path, ContainerCursor::Array(array.iter(), 0)));
                return true;
            }
            if let Some(dict) = value.as_dict() {
                self.current = Some((path, ContainerCursor::Dict(dict.iter())));
                return true;
            }
        }
        false
    }
}

impl<'a> Iterator for DeepIterator<'a> {
    type Item = DeepIteratorItem<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(root) = self.root.take() {
            self.just_visited_was_container = self.enqueue_if_container(Vec::new(), root);
            return Some(DeepIteratorItem { path: Vec::new(), value: root });
        }

        loop {
            if self.current.is_none() && !self.advance_to_next_container() {
                return None;
            }
            let (prefix, cursor) = self.current.as_mut().unwrap();
            match cursor {
                ContainerCursor::Array(it, index) => match it.next() {
                    Some(value) => {
                        let mut path = prefix.clone();
                        path.push(PathComponent::Index(*index));
                        *index += 1;
                        self.just_visited_was_container = self.enqueue_if_container(path.clone(), value);
                        return Some(DeepIteratorItem { path, value });
                    }
                    None => {
                        self.current = None;
                        continue;
                    }
                },
                ContainerCursor::Dict(it) => match it.next() {
                    Some((key, value)) => {
                        let mut path = prefix.clone();
                        path.push(PathComponent::Key(key.as_str().to_string()));
                        self.just_visited_was_container = self.enqueue_if_container(path.clone(), value);
                        return Some(DeepIteratorItem { path, value });
                    }
                    None => {
                        self.current = None;
                        continue;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::Encoder;

    fn sample_doc() -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.begin_dict(2).unwrap();
        enc.write_key("a").unwrap();
        enc.write_int(1).unwrap();
        enc.write_key("b").unwrap();
        enc.begin_array(2).unwrap();
        enc.write_int(10).unwrap();
        enc.write_int(20).unwrap();
        enc.end_array().unwrap();
        enc.end_dict().unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn visits_root_then_children_breadth_first_within_each_container() {
        let data = sample_doc();
        let root = Value::from_data(&data).unwrap();
        let paths: Vec<String> = DeepIterator::new(root).map(|item| item.path_string()).collect();
        assert_eq!(paths, vec!["".to_string(), ".a".to_string(), ".b".to_string(), ".b[0]".to_string(), ".b[1]".to_string()]);
    }

    #[test]
    fn json_pointer_form_matches_rfc6901() {
        let data = sample_doc();
        let root = Value::from_data(&data).unwrap();
        let mut iter = DeepIterator::new(root);
        iter.next(); // root
        iter.next(); // .a
        let b = iter.next().unwrap();
        assert_eq!(b.json_pointer(), "/b");
    }

    #[test]
    fn skip_children_prunes_the_subtree() {
        let data = sample_doc();
        let root = Value::from_data(&data).unwrap();
        let mut iter = DeepIterator::new(root);
        iter.next(); // root
        iter.next(); // .a
        iter.next(); // .b
        iter.skip_children();
        let remaining: Vec<String> = iter.map(|item| item.path_string()).collect();
        assert!(remaining.is_empty());
    }
}
