//! Flat key-value storage with tree-shape verification.
//!
//! Properties are stored as a flat `key → string` map so lookups stay cheap,
//! while a parallel tree records each node's shape (value, map, or array) and
//! refuses writes that would change a shape once it is established. Empty
//! containers are recorded through the sentinel values `"{}"` and `"[]"`:
//! they live in the flat map (so `data()` reconstructs shape losslessly) but
//! are not visible through `get`, which only answers for plain values. A
//! container that has no children yet is typeless — it may still become a
//! value, a map, or an array on the next write.

use std::collections::BTreeMap;

use crate::error::ConfError;

/// Flat-map value recording an empty map node.
pub(crate) const EMPTY_MAP: &str = "{}";
/// Flat-map value recording an empty array node.
pub(crate) const EMPTY_LIST: &str = "[]";

#[derive(Clone, Debug)]
enum Node {
    Leaf,
    Map(BTreeMap<String, Node>),
    List(Vec<Node>),
}

impl Node {
    fn kind(&self) -> &'static str {
        match self {
            Node::Leaf => "a value",
            Node::Map(_) => "a map",
            Node::List(_) => "an array",
        }
    }

    fn is_empty_container(&self) -> bool {
        match self {
            Node::Leaf => false,
            Node::Map(children) => children.is_empty(),
            Node::List(items) => items.is_empty(),
        }
    }
}

#[derive(Clone, Copy)]
enum Target {
    Leaf,
    EmptyMap,
    EmptyList,
}

#[derive(Clone, Debug, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Split a dotted/indexed key into segments: `a.b[0].c` →
/// `[Key(a), Key(b), Index(0), Key(c)]`. The first segment must be a map key.
fn parse_path(key: &str) -> Result<Vec<Segment>, ConfError> {
    let invalid = || ConfError::InvalidKey {
        key: key.to_string(),
    };
    let mut segs = Vec::new();
    let mut rest = key;
    loop {
        if let Some(tail) = rest.strip_prefix('[') {
            let end = tail.find(']').ok_or_else(invalid)?;
            let index: usize = tail[..end].parse().map_err(|_| invalid())?;
            if segs.is_empty() {
                return Err(invalid());
            }
            segs.push(Segment::Index(index));
            rest = &tail[end + 1..];
        } else {
            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            if end == 0 || rest[..end].contains(']') {
                return Err(invalid());
            }
            segs.push(Segment::Key(rest[..end].to_string()));
            rest = &rest[end..];
        }
        if rest.is_empty() {
            return Ok(segs);
        }
        if let Some(tail) = rest.strip_prefix('.') {
            if tail.is_empty() || tail.starts_with('[') {
                return Err(invalid());
            }
            rest = tail;
        }
    }
}

fn shape_conflict(key: &str, kind: &'static str, want: &str) -> ConfError {
    ConfError::ShapeConflict {
        key: key.to_string(),
        kind,
        want: want.to_string(),
    }
}

/// Shape a vacant node needs: the next segment decides for intermediate
/// nodes, the write target decides for the final one.
fn vacant_node(rest: &[Segment], target: Target) -> Node {
    match rest.first() {
        Some(Segment::Key(_)) => Node::Map(BTreeMap::new()),
        Some(Segment::Index(_)) => Node::List(Vec::new()),
        None => match target {
            Target::Leaf => Node::Leaf,
            Target::EmptyMap => Node::Map(BTreeMap::new()),
            Target::EmptyList => Node::List(Vec::new()),
        },
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Store {
    root: Node,
    data: BTreeMap<String, String>,
}

impl Default for Store {
    fn default() -> Self {
        Store {
            root: Node::Map(BTreeMap::new()),
            data: BTreeMap::new(),
        }
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `key = val` under the shape-stability invariant. The sentinel
    /// values `"{}"` and `"[]"` install empty containers instead of leaves.
    pub fn set(&mut self, key: &str, val: &str) -> Result<(), ConfError> {
        if key.is_empty() {
            return Err(ConfError::KeyEmpty);
        }
        let segs = parse_path(key)?;
        let target = match val {
            EMPTY_MAP => Target::EmptyMap,
            EMPTY_LIST => Target::EmptyList,
            _ => Target::Leaf,
        };
        set_node(&mut self.root, "", &segs, key, val, target, &mut self.data)
    }

    /// The value at `key`, if the node there is a plain value.
    pub fn get(&self, key: &str) -> Option<&str> {
        let val = self.data.get(key)?;
        if val == EMPTY_MAP || val == EMPTY_LIST {
            return None;
        }
        Some(val)
    }

    /// Whether any node exists at `key`, whatever its shape.
    pub fn has(&self, key: &str) -> bool {
        !key.is_empty() && self.find(key).is_some()
    }

    /// All flat-map keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    /// The flat map, including the empty-container sentinels.
    pub fn data(&self) -> BTreeMap<String, String> {
        self.data.clone()
    }

    /// Immediate child names of the node at `key`. An empty `key` addresses
    /// the root. A missing node has no children; a plain value is an error.
    pub fn sub_keys(&self, key: &str) -> Result<Vec<String>, ConfError> {
        let node = if key.is_empty() {
            Some(&self.root)
        } else {
            self.find(key)
        };
        match node {
            None => Ok(Vec::new()),
            Some(Node::Map(children)) => Ok(children.keys().cloned().collect()),
            Some(Node::List(items)) => Ok((0..items.len()).map(|i| i.to_string()).collect()),
            Some(Node::Leaf) => Err(ConfError::NotContainer {
                key: key.to_string(),
            }),
        }
    }

    fn find(&self, key: &str) -> Option<&Node> {
        let segs = parse_path(key).ok()?;
        let mut node = &self.root;
        for seg in &segs {
            node = match (node, seg) {
                (Node::Map(children), Segment::Key(k)) => children.get(k)?,
                (Node::List(items), Segment::Index(i)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(node)
    }
}

/// Descend from `node` (the node addressed by `prefix`) through `segs`,
/// creating or reshaping nodes as permitted, then install the target.
fn set_node(
    node: &mut Node,
    prefix: &str,
    segs: &[Segment],
    full: &str,
    val: &str,
    target: Target,
    data: &mut BTreeMap<String, String>,
) -> Result<(), ConfError> {
    let Some((seg, rest)) = segs.split_first() else {
        return install(node, full, val, target, data);
    };
    match seg {
        Segment::Key(k) => {
            if !matches!(node, Node::Map(_)) {
                if !node.is_empty_container() {
                    return Err(shape_conflict(prefix, node.kind(), full));
                }
                data.remove(prefix);
                *node = Node::Map(BTreeMap::new());
            }
            let Node::Map(children) = node else {
                unreachable!()
            };
            if children.is_empty() {
                data.remove(prefix);
            }
            let child_prefix = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            let child = children
                .entry(k.clone())
                .or_insert_with(|| vacant_node(rest, target));
            set_node(child, &child_prefix, rest, full, val, target, data)
        }
        Segment::Index(i) => {
            if !matches!(node, Node::List(_)) {
                if !node.is_empty_container() {
                    return Err(shape_conflict(prefix, node.kind(), full));
                }
                data.remove(prefix);
                *node = Node::List(Vec::new());
            }
            let Node::List(items) = node else {
                unreachable!()
            };
            if *i > items.len() {
                return Err(ConfError::IndexOutOfRange {
                    key: full.to_string(),
                });
            }
            if items.is_empty() {
                data.remove(prefix);
            }
            if *i == items.len() {
                items.push(vacant_node(rest, target));
            }
            let child_prefix = format!("{prefix}[{i}]");
            set_node(&mut items[*i], &child_prefix, rest, full, val, target, data)
        }
    }
}

fn install(
    node: &mut Node,
    full: &str,
    val: &str,
    target: Target,
    data: &mut BTreeMap<String, String>,
) -> Result<(), ConfError> {
    let empty = node.is_empty_container();
    match target {
        Target::Leaf => {
            if !matches!(node, Node::Leaf) && !empty {
                return Err(shape_conflict(full, node.kind(), full));
            }
            *node = Node::Leaf;
            data.insert(full.to_string(), val.to_string());
            Ok(())
        }
        Target::EmptyMap => {
            if matches!(node, Node::Map(_)) {
                if empty {
                    data.insert(full.to_string(), EMPTY_MAP.to_string());
                }
                Ok(())
            } else if empty {
                *node = Node::Map(BTreeMap::new());
                data.insert(full.to_string(), EMPTY_MAP.to_string());
                Ok(())
            } else {
                Err(shape_conflict(full, node.kind(), full))
            }
        }
        Target::EmptyList => {
            if matches!(node, Node::List(_)) {
                if empty {
                    data.insert(full.to_string(), EMPTY_LIST.to_string());
                }
                Ok(())
            } else if empty {
                *node = Node::List(Vec::new());
                data.insert(full.to_string(), EMPTY_LIST.to_string());
                Ok(())
            } else {
                Err(shape_conflict(full, node.kind(), full))
            }
        }
    }
}
