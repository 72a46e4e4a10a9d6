//! Ordered argument buffer.

use std::collections::VecDeque;

use super::StagedArgument;

/// FIFO of staged arguments with front insertion.
#[derive(Clone, Debug, Default)]
pub struct ArgumentQueue {
    args: VecDeque<StagedArgument>,
}

impl ArgumentQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an argument after everything staged so far.
    pub fn push_back(&mut self, arg: StagedArgument) {
        self.args.push_back(arg);
    }

    /// Stage an argument ahead of everything staged so far.
    pub fn push_front(&mut self, arg: StagedArgument) {
        self.args.push_front(arg);
    }

    /// Take every staged argument in order, leaving the queue empty.
    pub fn take(&mut self) -> Vec<StagedArgument> {
        self.args.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.args.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StagedArgument> {
        self.args.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ints(args: &[StagedArgument]) -> Vec<i64> {
        args.iter()
            .map(|arg| match arg {
                StagedArgument::Int(value) => *value,
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = ArgumentQueue::new();
        for value in 1..=4 {
            queue.push_back(StagedArgument::Int(value));
        }
        assert_eq!(ints(&queue.take()), vec![1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_front_insertion_leads() {
        let mut queue = ArgumentQueue::new();
        queue.push_back(StagedArgument::Int(2));
        queue.push_back(StagedArgument::Int(3));
        queue.push_front(StagedArgument::Int(1));
        queue.push_front(StagedArgument::Int(0));
        assert_eq!(ints(&queue.take()), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_clear() {
        let mut queue = ArgumentQueue::new();
        queue.push_back(StagedArgument::Nil);
        queue.clear();
        assert_eq!(queue.len(), 0);
        assert!(queue.take().is_empty());
    }

    proptest! {
        #[test]
        fn prop_take_preserves_staging_order(
            staged in proptest::collection::vec((any::<i64>(), any::<bool>()), 0..32)
        ) {
            let mut queue = ArgumentQueue::new();
            let mut expected = std::collections::VecDeque::new();
            for (value, front) in &staged {
                if *front {
                    queue.push_front(StagedArgument::Int(*value));
                    expected.push_front(*value);
                } else {
                    queue.push_back(StagedArgument::Int(*value));
                    expected.push_back(*value);
                }
            }
            prop_assert_eq!(ints(&queue.take()), expected.into_iter().collect::<Vec<_>>());
            prop_assert!(queue.is_empty());
        }
    }
}
