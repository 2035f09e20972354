//! Instruction list backed by an index arena.
//!
//! Nodes live in a `Vec` and link to their neighbours by index. Removing an
//! instruction unlinks it in constant time and leaves a tombstone behind, so
//! an [`InstId`] held across a removal of some other node stays valid.

use super::QInst;

/// Stable handle to an instruction in an [`InstList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(u32);

impl InstId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct Node {
    inst: QInst,
    prev: Option<InstId>,
    next: Option<InstId>,
    live: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InstList {
    nodes: Vec<Node>,
    head: Option<InstId>,
    tail: Option<InstId>,
    len: usize,
}

impl InstList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push_back(&mut self, inst: QInst) -> InstId {
        let id = InstId(self.nodes.len() as u32);
        self.nodes.push(Node {
            inst,
            prev: self.tail,
            next: None,
            live: true,
        });
        match self.tail {
            Some(tail) => self.nodes[tail.index()].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
        id
    }

    /// Unlink `id` and return its instruction. Returns `None` if it was
    /// already removed.
    pub fn remove(&mut self, id: InstId) -> Option<QInst> {
        let node = self.nodes.get(id.index())?;
        if !node.live {
            return None;
        }
        let (prev, next) = (node.prev, node.next);

        match prev {
            Some(p) => self.nodes[p.index()].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n.index()].prev = prev,
            None => self.tail = prev,
        }

        let node = &mut self.nodes[id.index()];
        node.live = false;
        node.prev = None;
        node.next = None;
        self.len -= 1;
        Some(node.inst)
    }

    pub fn get(&self, id: InstId) -> Option<&QInst> {
        self.nodes
            .get(id.index())
            .filter(|n| n.live)
            .map(|n| &n.inst)
    }

    pub fn get_mut(&mut self, id: InstId) -> Option<&mut QInst> {
        self.nodes
            .get_mut(id.index())
            .filter(|n| n.live)
            .map(|n| &mut n.inst)
    }

    pub fn first(&self) -> Option<InstId> {
        self.head
    }

    pub fn last(&self) -> Option<InstId> {
        self.tail
    }

    pub fn next(&self, id: InstId) -> Option<InstId> {
        self.nodes.get(id.index()).and_then(|n| n.next)
    }

    pub fn prev(&self, id: InstId) -> Option<InstId> {
        self.nodes.get(id.index()).and_then(|n| n.prev)
    }

    /// Instructions in program order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cur: self.head,
        }
    }
}

pub struct Iter<'a> {
    list: &'a InstList,
    cur: Option<InstId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a QInst;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        let node = &self.list.nodes[id.index()];
        self.cur = node.next;
        Some(&node.inst)
    }
}

impl<'a> IntoIterator for &'a InstList {
    type Item = &'a QInst;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<QInst> for InstList {
    fn from_iter<I: IntoIterator<Item = QInst>>(iter: I) -> Self {
        let mut list = InstList::new();
        for inst in iter {
            list.push_back(inst);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qir::{QOp, QReg};

    fn mov(dst: u32, src: u32) -> QInst {
        QInst::new(QOp::Mov, QReg::temp(dst), &[QReg::temp(src)])
    }

    #[test]
    fn test_unlink_middle_and_ends() {
        let mut list = InstList::new();
        let a = list.push_back(mov(1, 0));
        let b = list.push_back(mov(2, 1));
        let c = list.push_back(mov(3, 2));
        assert_eq!(list.len(), 3);

        assert!(list.remove(b).is_some());
        assert_eq!(list.next(a), Some(c));
        assert_eq!(list.prev(c), Some(a));
        assert!(list.remove(b).is_none());
        assert!(list.get(b).is_none());

        list.remove(a);
        assert_eq!(list.first(), Some(c));
        list.remove(c);
        assert!(list.is_empty());
        assert_eq!(list.first(), None);
        assert_eq!(list.last(), None);
    }

    #[test]
    fn test_iter_skips_removed() {
        let mut list: InstList = (1..5).map(|i| mov(i, i - 1)).collect();
        let second = list.next(list.first().unwrap()).unwrap();
        list.remove(second);
        let dsts: Vec<u32> = list.iter().map(|i| i.dst.index).collect();
        assert_eq!(dsts, vec![1, 3, 4]);
    }
}
