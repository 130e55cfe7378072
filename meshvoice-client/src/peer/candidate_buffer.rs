use meshvoice_core::IceCandidate;
use std::collections::VecDeque;

/// What to do with a remote candidate right now.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    /// A remote description is in place; apply the candidate immediately.
    Apply(IceCandidate),
    /// Held until the remote description is applied.
    Queued,
}

#[derive(Debug, PartialEq, Eq)]
pub struct QueueFull {
    pub limit: usize,
}

/// Remote candidates that arrived before the remote description.
///
/// The buffer owns the "remote description applied" flag: it starts closed,
/// queues candidates in arrival order, and opens for good on [`flush`].
///
/// [`flush`]: CandidateBuffer::flush
#[derive(Debug)]
pub struct CandidateBuffer {
    queue: VecDeque<IceCandidate>,
    limit: usize,
    ready: bool,
}

impl CandidateBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            limit,
            ready: false,
        }
    }

    /// True once a remote description has been applied.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Appends to the queue regardless of readiness.
    pub fn enqueue(&mut self, candidate: IceCandidate) -> Result<(), QueueFull> {
        if self.queue.len() >= self.limit {
            return Err(QueueFull { limit: self.limit });
        }
        self.queue.push_back(candidate);
        Ok(())
    }

    /// Hands the candidate back for immediate application when ready,
    /// otherwise queues it.
    pub fn admit(&mut self, candidate: IceCandidate) -> Result<Admission, QueueFull> {
        if self.ready {
            return Ok(Admission::Apply(candidate));
        }
        self.enqueue(candidate)?;
        Ok(Admission::Queued)
    }

    /// Marks the remote description as applied and yields every queued
    /// candidate in arrival order. Later calls yield nothing.
    pub fn flush(&mut self) -> Vec<IceCandidate> {
        self.ready = true;
        self.queue.drain(..).collect()
    }
}
