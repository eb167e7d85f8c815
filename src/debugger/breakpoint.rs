/// Breakpoints by program counter, kept sorted.
#[derive(Debug, Default)]
pub struct Breakpoints(Vec<usize>);

impl Breakpoints {
    pub fn contains(&self, pc: usize) -> bool {
        self.0.binary_search(&pc).is_ok()
    }

    /// Returns `false` if a breakpoint already exists at `pc`.
    pub fn insert(&mut self, pc: usize) -> bool {
        match self.0.binary_search(&pc) {
            Ok(_) => false,
            Err(index) => {
                self.0.insert(index, pc);
                true
            }
        }
    }

    /// Returns whether a breakpoint existed at `pc`.
    pub fn remove(&mut self, pc: usize) -> bool {
        match self.0.binary_search(&pc) {
            Ok(index) => {
                self.0.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }
}
