use std::{marker::PhantomData, ptr::NonNull};

/// Optional non-null pointer to `T`.
pub(crate) type Link<T> = Option<NonNull<T>>;

/// A node of the block list. Nodes are never heap allocated by the list
/// itself, they are written straight into the mapped memory the allocator
/// manages, so the node header is part of every block's overhead.
pub(crate) struct Node<T> {
    /// Pointer to the next node of the list.
    pub next: Link<Self>,
    /// Pointer to the previous node of the list.
    pub prev: Link<Self>,
    /// Element of the node.
    pub data: T,
}

/// Doubly linked list whose nodes live at caller supplied addresses.
///
/// Because we are the memory allocator, none of these methods may allocate.
/// Every operation that creates a node receives the exact address where the
/// node has to be written, which the caller carves out of a mapped region.
pub(crate) struct List<T> {
    head: Link<Node<T>>,
    tail: Link<Node<T>>,
    len: usize,
    marker: PhantomData<T>,
}

/// Iterator over the node pointers of a [`List`].
///
/// Yields [`NonNull`] pointers instead of references because most consumers
/// (fit strategies, the coalescing engine) need to mutate or relink the node
/// they picked.
pub(crate) struct Nodes<T> {
    current: Link<Node<T>>,
    marker: PhantomData<*const T>,
}

impl<T> List<T> {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn first(&self) -> Link<Node<T>> {
        self.head
    }

    #[inline]
    pub fn last(&self) -> Link<Node<T>> {
        self.tail
    }

    /// Writes a new tail node at `addr` and links it in.
    ///
    /// **SAFETY**: caller must guarantee that `addr` points to writable
    /// memory with room and alignment for a `Node<T>`.
    pub unsafe fn append(&mut self, data: T, addr: NonNull<u8>) -> NonNull<Node<T>> {
        let node = addr.cast::<Node<T>>();

        unsafe {
            node.as_ptr().write(Node {
                next: None,
                prev: self.tail,
                data,
            });

            if let Some(mut tail) = self.tail {
                tail.as_mut().next = Some(node);
            } else {
                self.head = Some(node);
            }
        }

        self.tail = Some(node);
        self.len += 1;

        node
    }

    /// Writes a new node at `addr` and links it in as the successor of
    /// `node`. Used when a block is split: the remainder has to sit right
    /// after the carved head, not at the tail of the list.
    ///
    /// **SAFETY**: same contract as [`List::append`], and `node` must belong
    /// to this list.
    pub unsafe fn insert_after(
        &mut self,
        mut node: NonNull<Node<T>>,
        data: T,
        addr: NonNull<u8>,
    ) -> NonNull<Node<T>> {
        let new = addr.cast::<Node<T>>();

        unsafe {
            new.as_ptr().write(Node {
                next: node.as_ref().next,
                prev: Some(node),
                data,
            });

            if let Some(mut next) = node.as_ref().next {
                next.as_mut().prev = Some(new);
            } else {
                self.tail = Some(new);
            }

            node.as_mut().next = Some(new);
        }

        self.len += 1;

        new
    }

    /// Unlinks `node` from the list, fixing head and tail as needed. The
    /// node's memory is not touched, the caller decides whether it gets
    /// absorbed into a neighbor or handed back to the kernel.
    ///
    /// **SAFETY**: `node` must belong to this list.
    pub unsafe fn remove(&mut self, node: NonNull<Node<T>>) {
        unsafe {
            let prev = node.as_ref().prev;
            let next = node.as_ref().next;

            match prev {
                Some(mut prev) => prev.as_mut().next = next,
                None => self.head = next,
            }

            match next {
                Some(mut next) => next.as_mut().prev = prev,
                None => self.tail = prev,
            }
        }

        self.len -= 1;
    }

    pub fn nodes(&self) -> Nodes<T> {
        Nodes {
            current: self.head,
            marker: PhantomData,
        }
    }
}

impl<T> Iterator for Nodes<T> {
    type Item = NonNull<Node<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;

        unsafe {
            self.current = node.as_ref().next;
        }

        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backing storage for one node. `u64` slots keep the address aligned
    /// for any node type used in these tests.
    fn slot(storage: &mut Vec<Box<[u64; 8]>>) -> NonNull<u8> {
        let mut slot = Box::new([0u64; 8]);
        let addr = NonNull::new(slot.as_mut_ptr().cast::<u8>()).unwrap();
        storage.push(slot);
        addr
    }

    fn collect(list: &List<u64>) -> Vec<u64> {
        list.nodes()
            .map(|node| unsafe { node.as_ref().data })
            .collect()
    }

    #[test]
    fn new_list_is_empty() {
        let list: List<u64> = List::new();

        assert_eq!(list.len(), 0);
        assert!(list.is_empty());
        assert!(list.first().is_none());
        assert!(list.last().is_none());
    }

    #[test]
    fn append_keeps_insertion_order() {
        let mut storage = Vec::new();
        let mut list = List::new();

        unsafe {
            for value in 0..4 {
                list.append(value, slot(&mut storage));
            }
        }

        assert_eq!(list.len(), 4);
        assert_eq!(collect(&list), vec![0, 1, 2, 3]);
    }

    #[test]
    fn insert_after_links_successor() {
        let mut storage = Vec::new();
        let mut list = List::new();

        unsafe {
            let first = list.append(0, slot(&mut storage));
            list.append(2, slot(&mut storage));
            list.insert_after(first, 1, slot(&mut storage));
        }

        assert_eq!(collect(&list), vec![0, 1, 2]);
    }

    #[test]
    fn insert_after_tail_updates_tail() {
        let mut storage = Vec::new();
        let mut list = List::new();

        unsafe {
            let first = list.append(0, slot(&mut storage));
            let new = list.insert_after(first, 1, slot(&mut storage));

            assert_eq!(list.last(), Some(new));
            assert_eq!(new.as_ref().prev, Some(first));
        }

        assert_eq!(collect(&list), vec![0, 1]);
    }

    #[test]
    fn remove_every_shape() {
        let mut storage = Vec::new();
        let mut list = List::new();

        unsafe {
            let a = list.append(0, slot(&mut storage));
            let b = list.append(1, slot(&mut storage));
            let c = list.append(2, slot(&mut storage));

            list.remove(b);
            assert_eq!(collect(&list), vec![0, 2]);

            list.remove(a);
            assert_eq!(collect(&list), vec![2]);
            assert_eq!(list.first(), Some(c));
            assert_eq!(list.last(), Some(c));

            list.remove(c);
        }

        assert!(list.is_empty());
        assert!(list.first().is_none());
        assert!(list.last().is_none());
    }
}
