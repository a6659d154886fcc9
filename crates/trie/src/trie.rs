use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use doug_rlp::constants::RLP_NULL;
use ethereum_types::H256;

use crate::{
    db::{InMemoryTrieDB, TrieDB},
    error::TrieError,
    nibbles::Nibbles,
    node::{Node, NodeRef},
};

/// Root hash of a trie holding no key/value pairs: `Keccak256(RLP(""))`.
pub fn empty_root() -> H256 {
    static EMPTY: OnceLock<H256> = OnceLock::new();
    *EMPTY.get_or_init(|| H256::from(doug_crypto::keccak256(&[RLP_NULL])))
}

/// A Merkle-Patricia trie over an opaque key/value space.
///
/// Mutations accumulate in an in-memory write cache until [`Trie::sync`]
/// flushes them to the backing [`TrieDB`]; [`Trie::undo`] discards them
/// instead, rolling the trie back to its last synced root. This mirrors
/// the cache/commit split the state layer needs to journal a block's
/// worth of writes and roll them back on an invalid transaction.
pub struct Trie {
    db: Arc<dyn TrieDB>,
    cache: HashMap<H256, Vec<u8>>,
    root: NodeRef,
    synced_root: NodeRef,
}

impl Trie {
    pub fn new(db: Arc<dyn TrieDB>) -> Self {
        Self { db, cache: HashMap::new(), root: NodeRef::Empty, synced_root: NodeRef::Empty }
    }

    /// Opens a trie at a previously computed root. `root == empty_root()`
    /// is treated the same as a freshly created, empty trie.
    pub fn open(db: Arc<dyn TrieDB>, root: H256) -> Self {
        let root_ref = if root == empty_root() { NodeRef::Empty } else { NodeRef::Hash(root) };
        Self { db, cache: HashMap::new(), root: root_ref, synced_root: root_ref }
    }

    pub fn root_hash(&self) -> H256 {
        match self.root {
            NodeRef::Empty => empty_root(),
            NodeRef::Hash(h) => h,
        }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        self.get_at(self.root, &Nibbles::from_bytes(key))
    }

    pub fn update(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), TrieError> {
        let path = Nibbles::from_bytes(key);
        self.root = self.insert_at(self.root, path, value)?;
        Ok(())
    }

    pub fn delete(&mut self, key: &[u8]) -> Result<(), TrieError> {
        let path = Nibbles::from_bytes(key);
        self.root = self.delete_at(self.root, &path)?;
        Ok(())
    }

    /// Independent working copy: the write cache is deep-cloned, the
    /// backing store is shared. Used to try a transaction's effects
    /// without committing them to the trie the rest of the block sees.
    pub fn copy(&self) -> Self {
        Self { db: self.db.clone(), cache: self.cache.clone(), root: self.root, synced_root: self.synced_root }
    }

    /// Discards everything written since the last `sync`.
    pub fn undo(&mut self) {
        self.cache.clear();
        self.root = self.synced_root;
    }

    /// Flushes the write cache to the backing store.
    pub fn sync(&mut self) -> Result<(), TrieError> {
        let nodes: Vec<(H256, Vec<u8>)> = self.cache.drain().collect();
        self.db.put_batch(nodes)?;
        self.synced_root = self.root;
        Ok(())
    }

    /// Rebuilds a fresh trie from every key/value pair currently reachable
    /// from the root and checks that it hashes to the same root. Used to
    /// quarantine delete-path bugs: a single bad collapse after many
    /// updates can desynchronize the root from its conceptual contents
    /// without tripping any single operation's own invariants.
    pub fn rebuild_and_verify(&self) -> Result<bool, TrieError> {
        let entries = self.collect_entries()?;
        let scratch_db: Arc<dyn TrieDB> = Arc::new(InMemoryTrieDB::new());
        let mut scratch = Trie::new(scratch_db);
        for (key, value) in entries {
            scratch.update(&key, value)?;
        }
        Ok(scratch.root_hash() == self.root_hash())
    }

    /// Every key/value pair reachable from the root, in no particular
    /// order. Keys must be whole bytes (even nibble count), which holds
    /// for every key this trie was ever `update`d with.
    pub fn collect_entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, TrieError> {
        let mut out = Vec::new();
        self.walk_collect(self.root, Nibbles::from_raw(Vec::new()), &mut out)?;
        Ok(out)
    }

    fn get_node(&self, node_ref: NodeRef) -> Result<Option<Node>, TrieError> {
        let hash = match node_ref {
            NodeRef::Empty => return Ok(None),
            NodeRef::Hash(h) => h,
        };
        let bytes = match self.cache.get(&hash) {
            Some(bytes) => bytes.clone(),
            None => match self.db.get(hash)? {
                Some(bytes) => bytes,
                None => return Err(TrieError::NodeNotFound(hash)),
            },
        };
        Ok(Some(Node::decode_raw(&bytes)?))
    }

    fn store_node(&mut self, node: Node) -> NodeRef {
        let bytes = node.encode_raw();
        let hash = H256::from(doug_crypto::keccak256(&bytes));
        self.cache.insert(hash, bytes);
        NodeRef::Hash(hash)
    }

    fn get_at(&self, node_ref: NodeRef, path: &Nibbles) -> Result<Option<Vec<u8>>, TrieError> {
        match self.get_node(node_ref)? {
            None => Ok(None),
            Some(Node::Leaf { path: node_path, value }) => {
                if &node_path == path { Ok(Some(value)) } else { Ok(None) }
            }
            Some(Node::Extension { path: node_path, child }) => {
                if path.len() >= node_path.len() && path.take(node_path.len()) == node_path {
                    self.get_at(child, &path.skip(node_path.len()))
                } else {
                    Ok(None)
                }
            }
            Some(Node::Branch { children, value }) => {
                if path.is_empty() {
                    if value.is_empty() { Ok(None) } else { Ok(Some(value)) }
                } else {
                    let nibble = path.at(0) as usize;
                    self.get_at(children[nibble], &path.skip(1))
                }
            }
        }
    }

    fn insert_at(&mut self, node_ref: NodeRef, path: Nibbles, value: Vec<u8>) -> Result<NodeRef, TrieError> {
        match self.get_node(node_ref)? {
            None => Ok(self.store_node(Node::Leaf { path, value })),
            Some(Node::Leaf { path: node_path, value: node_value }) => {
                if node_path == path {
                    Ok(self.store_node(Node::Leaf { path, value }))
                } else {
                    Ok(self.branch_for_two_leaves(node_path, node_value, path, value))
                }
            }
            Some(Node::Extension { path: node_path, child }) => {
                let common = path.common_prefix_len(&node_path);
                if common == node_path.len() {
                    let new_child = self.insert_at(child, path.skip(common), value)?;
                    Ok(self.store_node(Node::Extension { path: node_path, child: new_child }))
                } else {
                    Ok(self.split_extension(common, node_path, child, path, value))
                }
            }
            Some(Node::Branch { mut children, mut value: branch_value }) => {
                if path.is_empty() {
                    branch_value = value;
                } else {
                    let nibble = path.at(0) as usize;
                    children[nibble] = self.insert_at(children[nibble], path.skip(1), value)?;
                }
                Ok(self.store_node(Node::Branch { children, value: branch_value }))
            }
        }
    }

    /// Splits two leaves with diverging paths into a branch (wrapped in
    /// an extension if they share a non-empty prefix).
    fn branch_for_two_leaves(&mut self, p1: Nibbles, v1: Vec<u8>, p2: Nibbles, v2: Vec<u8>) -> NodeRef {
        let common = p1.common_prefix_len(&p2);
        let mut children = [NodeRef::Empty; 16];
        let mut branch_value = Vec::new();

        let rest1 = p1.skip(common);
        if rest1.is_empty() {
            branch_value = v1;
        } else {
            let nibble = rest1.at(0) as usize;
            children[nibble] = self.store_node(Node::Leaf { path: rest1.skip(1), value: v1 });
        }

        let rest2 = p2.skip(common);
        if rest2.is_empty() {
            branch_value = v2;
        } else {
            let nibble = rest2.at(0) as usize;
            children[nibble] = self.store_node(Node::Leaf { path: rest2.skip(1), value: v2 });
        }

        let branch_ref = self.store_node(Node::Branch { children, value: branch_value });
        if common > 0 {
            self.store_node(Node::Extension { path: p1.take(common), child: branch_ref })
        } else {
            branch_ref
        }
    }

    /// Splits an extension node whose path only partially matches the
    /// inserted key into a branch at the point of divergence.
    fn split_extension(
        &mut self,
        common: usize,
        node_path: Nibbles,
        child: NodeRef,
        path: Nibbles,
        value: Vec<u8>,
    ) -> NodeRef {
        let mut children = [NodeRef::Empty; 16];

        let existing_nibble = node_path.at(common) as usize;
        let existing_rest = node_path.skip(common + 1);
        children[existing_nibble] = if existing_rest.is_empty() {
            child
        } else {
            self.store_node(Node::Extension { path: existing_rest, child })
        };

        let new_rest = path.skip(common);
        let mut branch_value = Vec::new();
        if new_rest.is_empty() {
            branch_value = value;
        } else {
            let new_nibble = new_rest.at(0) as usize;
            children[new_nibble] = self.store_node(Node::Leaf { path: new_rest.skip(1), value });
        }

        let branch_ref = self.store_node(Node::Branch { children, value: branch_value });
        if common > 0 {
            self.store_node(Node::Extension { path: path.take(common), child: branch_ref })
        } else {
            branch_ref
        }
    }

    fn delete_at(&mut self, node_ref: NodeRef, path: &Nibbles) -> Result<NodeRef, TrieError> {
        match self.get_node(node_ref)? {
            None => Ok(NodeRef::Empty),
            Some(Node::Leaf { path: node_path, .. }) => {
                if &node_path == path { Ok(NodeRef::Empty) } else { Ok(node_ref) }
            }
            Some(Node::Extension { path: node_path, child }) => {
                if path.len() >= node_path.len() && path.take(node_path.len()) == node_path {
                    let new_child = self.delete_at(child, &path.skip(node_path.len()))?;
                    self.collapse_extension(node_path, new_child)
                } else {
                    Ok(node_ref)
                }
            }
            Some(Node::Branch { mut children, mut value }) => {
                if path.is_empty() {
                    value = Vec::new();
                } else {
                    let nibble = path.at(0) as usize;
                    children[nibble] = self.delete_at(children[nibble], &path.skip(1))?;
                }
                self.collapse_branch(children, value)
            }
        }
    }

    fn collapse_extension(&mut self, prefix: Nibbles, child: NodeRef) -> Result<NodeRef, TrieError> {
        if child.is_empty() {
            return Ok(NodeRef::Empty);
        }
        let child_node = self.get_node(child)?.ok_or(TrieError::CorruptNode)?;
        Ok(match child_node {
            Node::Leaf { path, value } => self.store_node(Node::Leaf { path: prefix.extend(&path), value }),
            Node::Extension { path, child: grandchild } => {
                self.store_node(Node::Extension { path: prefix.extend(&path), child: grandchild })
            }
            Node::Branch { .. } => self.store_node(Node::Extension { path: prefix, child }),
        })
    }

    fn collapse_branch(&mut self, children: [NodeRef; 16], value: Vec<u8>) -> Result<NodeRef, TrieError> {
        let present: Vec<usize> = children
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_empty())
            .map(|(i, _)| i)
            .collect();

        match (present.len(), value.is_empty()) {
            (0, true) => Ok(NodeRef::Empty),
            (0, false) => Ok(self.store_node(Node::Leaf { path: Nibbles::from_raw(Vec::new()), value })),
            (1, true) => {
                let nibble = present[0];
                let child = children[nibble];
                let child_node = self.get_node(child)?.ok_or(TrieError::CorruptNode)?;
                Ok(match child_node {
                    Node::Leaf { path, value } => {
                        self.store_node(Node::Leaf { path: Nibbles::from_raw(vec![nibble as u8]).extend(&path), value })
                    }
                    Node::Extension { path, child: grandchild } => self.store_node(Node::Extension {
                        path: Nibbles::from_raw(vec![nibble as u8]).extend(&path),
                        child: grandchild,
                    }),
                    Node::Branch { .. } => {
                        self.store_node(Node::Extension { path: Nibbles::from_raw(vec![nibble as u8]), child })
                    }
                })
            }
            _ => Ok(self.store_node(Node::Branch { children, value })),
        }
    }

    fn walk_collect(
        &self,
        node_ref: NodeRef,
        path: Nibbles,
        out: &mut Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<(), TrieError> {
        match self.get_node(node_ref)? {
            None => Ok(()),
            Some(Node::Leaf { path: node_path, value }) => {
                out.push((nibbles_to_bytes(&path.extend(&node_path)), value));
                Ok(())
            }
            Some(Node::Extension { path: node_path, child }) => {
                self.walk_collect(child, path.extend(&node_path), out)
            }
            Some(Node::Branch { children, value }) => {
                if !value.is_empty() {
                    out.push((nibbles_to_bytes(&path), value));
                }
                for (nibble, child) in children.into_iter().enumerate() {
                    if !child.is_empty() {
                        self.walk_collect(child, path.extend(&Nibbles::from_raw(vec![nibble as u8])), out)?;
                    }
                }
                Ok(())
            }
        }
    }
}

fn nibbles_to_bytes(nibbles: &Nibbles) -> Vec<u8> {
    let slice = nibbles.as_slice();
    debug_assert_eq!(slice.len() % 2, 0, "a trie key must be a whole number of bytes");
    slice.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect()
}
