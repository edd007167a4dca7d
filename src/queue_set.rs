use rand::seq::SliceRandom;

/// A strategy for deciding which queues should be checked first by a group
/// of workers. The set is consulted every time the next job is about to be
/// fetched, so it is fine to return a different order on every call.
pub trait QueueSet: Send {
    /// Returns the queue names sorted by the desired priority for this
    /// poll. The returned slice may be reused by the next call.
    fn get_queues(&mut self) -> &[String];

    /// Returns the queue names in the order they were configured, ignoring
    /// the strategy of the set. Used for logging.
    fn names(&self) -> &[String];
}

/// Always returns the queues in the configured order.
#[derive(Clone, Debug)]
pub struct OrderedQueueSet {
    names: Vec<String>,
}

impl OrderedQueueSet {
    pub fn new<I, S>(queues: I) -> OrderedQueueSet
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        OrderedQueueSet {
            names: queues.into_iter().map(Into::into).collect(),
        }
    }
}

impl QueueSet for OrderedQueueSet {
    fn get_queues(&mut self) -> &[String] {
        &self.names
    }

    fn names(&self) -> &[String] {
        &self.names
    }
}

/// Returns the queues in random order, with the likelihood of each queue
/// coming first based on their relative weights.
#[derive(Clone, Debug, Default)]
pub struct RandomQueueSet {
    names: Vec<String>,
    list: Vec<String>,
    random: Vec<String>,
}

impl RandomQueueSet {
    pub fn new() -> RandomQueueSet {
        RandomQueueSet::default()
    }

    /// Adds a queue with the given relative weight.
    ///
    /// ```
    /// use kogeri::RandomQueueSet;
    ///
    /// let mut qs = RandomQueueSet::new();
    /// qs.add("low_priority", 1);
    /// qs.add("high_priority", 3);
    /// ```
    ///
    /// The "low_priority" queue has a 25% chance of being checked first:
    /// 1 / (1 + 3). The "high_priority" queue has a 75% chance: 3 / (1 + 3).
    pub fn add(&mut self, queue: impl Into<String>, weight: usize) -> &mut RandomQueueSet {
        let queue = queue.into();
        for _ in 0..weight {
            self.list.push(queue.clone());
        }
        self.names.push(queue);
        self
    }
}

impl QueueSet for RandomQueueSet {
    fn get_queues(&mut self) -> &[String] {
        // Shuffling the weight-expanded list makes the chance of a queue
        // landing in the first slot proportional to its weight; the scan
        // then keeps the first appearance of each name.
        self.list.shuffle(&mut rand::thread_rng());

        self.random.clear();
        for q in &self.list {
            if !self.random.contains(q) {
                self.random.push(q.clone());
            }
        }

        &self.random
    }

    fn names(&self) -> &[String] {
        &self.names
    }
}
