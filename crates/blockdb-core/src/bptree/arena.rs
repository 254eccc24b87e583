use super::{Node, NodeId};

/// Owns every node of a tree. Parent, child, sibling and overflow links are
/// plain `NodeId`s into this arena.
#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    live: usize,
}

impl NodeArena {
    pub fn new() -> Self {
        NodeArena {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        self.live += 1;
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    /// Removes the node and hands it back. Releasing a free slot is a bug in the caller.
    pub fn release(&mut self, id: NodeId) -> Node {
        let node = self
            .slots
            .get_mut(id.0)
            .and_then(Option::take)
            .unwrap_or_else(|| panic!("release of dangling {}", id));
        self.free.push(id.0);
        self.live -= 1;
        node
    }

    pub fn get(&self, id: NodeId) -> &Node {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("dangling reference to {}", id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("dangling reference to {}", id))
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        matches!(self.slots.get(id.0), Some(Some(_)))
    }

    pub fn live(&self) -> usize {
        self.live
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_release() {
        let mut arena = NodeArena::new();
        let a = arena.alloc(Node::new_leaf(3));
        let b = arena.alloc(Node::new_interior(3));
        assert_eq!(arena.live(), 2);
        assert!(arena.get(b).as_interior().is_some());

        arena.release(a);
        assert!(!arena.is_live(a));
        assert_eq!(arena.live(), 1);

        // Freed slots are reused.
        let c = arena.alloc(Node::new_leaf(3));
        assert_eq!(c, a);
        assert_eq!(arena.capacity(), 2);
    }

    #[test]
    #[should_panic(expected = "dangling")]
    fn test_get_after_release_panics() {
        let mut arena = NodeArena::new();
        let a = arena.alloc(Node::new_leaf(3));
        arena.release(a);
        arena.get(a);
    }
}
