//! Thinning out a sequence of outputs, for streaming generation results less often than they're
//! produced.
use std::num::NonZeroUsize;

/// Iterator adapter that yields every `interval`-th item, starting with the first.
///
/// The last item is always yielded, even if it falls between intervals, so a consumer of the
/// throttled sequence still sees the final state.
#[derive(Clone, Debug)]
pub struct Throttle<I: Iterator> {
    inner: I,
    interval: NonZeroUsize,

    /// Index of the next item `inner` will produce
    index: usize,

    /// The most recent item that was skipped, if nothing has been yielded since
    skipped: Option<I::Item>,
}

impl<I: Iterator> Throttle<I> {
    pub fn new(inner: I, interval: NonZeroUsize) -> Self {
        Self {
            inner,
            interval,
            index: 0,
            skipped: None,
        }
    }
}

impl<I: Iterator> Iterator for Throttle<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        for item in self.inner.by_ref() {
            let index = self.index;
            self.index += 1;

            if index % self.interval.get() == 0 {
                self.skipped = None;
                return Some(item);
            }
            self.skipped = Some(item);
        }

        self.skipped.take()
    }
}

pub trait ThrottleExt: Iterator + Sized {
    /// See [`Throttle`]
    fn throttle(self, interval: NonZeroUsize) -> Throttle<Self> {
        Throttle::new(self, interval)
    }
}

impl<I: Iterator> ThrottleExt for I {}
