use rand::Rng;
use rand::seq::SliceRandom;

/// Serves the rows of a split as fixed-size minibatches over an index
/// permutation. With `shuffle` on, the permutation is drawn at construction
/// and redrawn at every epoch end.
#[derive(Debug, Clone)]
pub struct MinibatchProvider {
    order: Vec<usize>,
    batch_size: usize,
    shuffle: bool,
}

impl MinibatchProvider {
    /// # Panics
    /// Panics if `batch_size` is zero.
    pub fn new<R: Rng + ?Sized>(rows: usize, batch_size: usize, shuffle: bool, rng: &mut R) -> Self {
        assert!(batch_size > 0, "batch_size must be at least 1");
        let mut order: Vec<usize> = (0..rows).collect();
        if shuffle {
            order.shuffle(rng);
        }
        Self {
            order,
            batch_size,
            shuffle,
        }
    }

    /// Number of minibatches per epoch, `ceil(rows / batch_size)`.
    pub fn len(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn rows(&self) -> usize {
        self.order.len()
    }

    /// Row indices of minibatch `index`. Every batch is full except possibly
    /// the last.
    ///
    /// # Panics
    /// Panics if `index >= self.len()`.
    pub fn batch(&self, index: usize) -> &[usize] {
        let start = index * self.batch_size;
        let end = (start + self.batch_size).min(self.order.len());
        &self.order[start..end]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> + '_ {
        self.order.chunks(self.batch_size)
    }

    pub fn on_epoch_end<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.shuffle {
            self.order.shuffle(rng);
        }
    }
}
