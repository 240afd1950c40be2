use std::{ops::Deref, rc::Rc};

/// A page of memory that has been mapped from the target.
///
/// The page is a view into a reference-counted backing buffer, so cloning
/// it and slicing large backings (such as a memory-mapped dump file) never
/// copies the content.
#[derive(Clone)]
pub struct MappedPage {
    backing: Rc<dyn AsRef<[u8]>>,
    start: usize,
    len: usize,
}

impl MappedPage {
    /// Creates a new mapped page owning its content.
    pub fn new(content: Vec<u8>) -> Self {
        let len = content.len();

        Self {
            backing: Rc::new(content),
            start: 0,
            len,
        }
    }

    /// Creates a view of `len` bytes at `offset` into a shared backing.
    ///
    /// Returns `None` if the range is not fully inside the backing.
    pub fn from_shared(backing: Rc<dyn AsRef<[u8]>>, offset: usize, len: usize) -> Option<Self> {
        let end = offset.checked_add(len)?;
        if end > (*backing).as_ref().len() {
            return None;
        }

        Some(Self {
            backing,
            start: offset,
            len,
        })
    }
}

impl Deref for MappedPage {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &(*self.backing).as_ref()[self.start..self.start + self.len]
    }
}

impl AsRef<[u8]> for MappedPage {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl std::fmt::Debug for MappedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MappedPage")
            .field("start", &self.start)
            .field("len", &self.len)
            .finish()
    }
}
