// ============================================================
// Layer 4 — Endless Batch Stream
// ============================================================
// The trainer counts steps, not epochs. It needs one batch per
// step for as long as training runs, regardless of how small
// the dataset is.
//
// BatchStream wraps a factory that produces a fresh iterator
// (one shuffled pass over the dataset). When the current pass
// is exhausted the factory is called again and fetching
// continues from the new pass.
//
// Partial batches at the end of a pass are skipped, so every
// returned batch has exactly `batch_size` rows. A pass that
// yields no full batch at all is an error rather than an
// infinite loop.

use anyhow::{bail, Result};

/// Anything that knows how many samples it holds.
pub trait SizedBatch {
    fn batch_len(&self) -> usize;
}

pub struct BatchStream<F, I> {
    make_iter:  F,
    current:    Option<I>,
    batch_size: usize,
    passes:     usize,
}

impl<F, I, T> BatchStream<F, I>
where
    F: FnMut() -> I,
    I: Iterator<Item = T>,
    T: SizedBatch,
{
    pub fn new(make_iter: F, batch_size: usize) -> Self {
        Self {
            make_iter,
            current: None,
            batch_size,
            passes: 0,
        }
    }

    /// Number of passes started so far
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Fetch the next full batch, starting a new pass when needed.
    pub fn next_batch(&mut self) -> Result<T> {
        let mut refilled = false;
        loop {
            if let Some(iter) = self.current.as_mut() {
                for batch in iter.by_ref() {
                    if batch.batch_len() == self.batch_size {
                        return Ok(batch);
                    }
                    tracing::debug!(
                        "Dropping partial batch of {} (batch size {})",
                        batch.batch_len(),
                        self.batch_size
                    );
                }
            }

            if refilled {
                bail!(
                    "data pass produced no full batch of {} samples",
                    self.batch_size
                );
            }

            self.current = Some((self.make_iter)());
            self.passes += 1;
            refilled = true;
            tracing::debug!("Starting data pass {}", self.passes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Fake(usize, usize);

    impl SizedBatch for Fake {
        fn batch_len(&self) -> usize {
            self.1
        }
    }

    #[test]
    fn test_refills_on_exhaustion() {
        let mut stream = BatchStream::new(|| vec![Fake(0, 2), Fake(1, 2)].into_iter(), 2);

        let ids: Vec<usize> = (0..5).map(|_| stream.next_batch().unwrap().0).collect();
        assert_eq!(ids, vec![0, 1, 0, 1, 0]);
        assert_eq!(stream.passes(), 3);
    }

    #[test]
    fn test_skips_partial_batches() {
        let mut stream =
            BatchStream::new(|| vec![Fake(0, 2), Fake(1, 1)].into_iter(), 2);

        assert_eq!(stream.next_batch().unwrap(), Fake(0, 2));
        // the trailing partial batch is dropped and a new pass starts
        assert_eq!(stream.next_batch().unwrap(), Fake(0, 2));
    }

    #[test]
    fn test_errors_when_no_full_batch() {
        let mut stream = BatchStream::new(|| vec![Fake(0, 1)].into_iter(), 2);
        assert!(stream.next_batch().is_err());
    }

    #[test]
    fn test_errors_on_empty_pass() {
        let mut stream = BatchStream::new(|| Vec::<Fake>::new().into_iter(), 2);
        assert!(stream.next_batch().is_err());
    }
}
