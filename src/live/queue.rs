//! Bounded FIFO of requests awaiting dispatch.
//!
//! Admission control lives here: once the queue holds `max` requests, new
//! work is refused without touching the queued entries. Dispatch gating
//! (one request in flight at a time) is the actor's job.

use std::collections::VecDeque;

use super::types::QueuedRequest;

pub(crate) struct RequestQueue {
    items: VecDeque<QueuedRequest>,
    max: usize,
}

impl RequestQueue {
    pub fn new(max: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Append a request, or hand it back untouched when the queue is full.
    pub fn push(&mut self, request: QueuedRequest) -> Result<(), QueuedRequest> {
        if self.items.len() >= self.max {
            return Err(request);
        }
        self.items.push_back(request);
        Ok(())
    }

    /// Take the next request in enqueue order.
    pub fn pop(&mut self) -> Option<QueuedRequest> {
        self.items.pop_front()
    }

    /// Remove every queued request, preserving enqueue order.
    pub fn drain(&mut self) -> Vec<QueuedRequest> {
        self.items.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;
    use crate::live::types::RequestPayload;

    fn text_request(text: &str) -> QueuedRequest {
        let (reply, _rx) = oneshot::channel();
        QueuedRequest {
            payload: RequestPayload::Text(text.to_string()),
            reply,
        }
    }

    fn payload_text(request: &QueuedRequest) -> &str {
        match &request.payload {
            RequestPayload::Text(text) => text,
            RequestPayload::Image { .. } => panic!("expected text payload"),
        }
    }

    #[test]
    fn pops_in_enqueue_order() {
        let mut queue = RequestQueue::new(5);
        queue.push(text_request("first")).ok().unwrap();
        queue.push(text_request("second")).ok().unwrap();
        queue.push(text_request("third")).ok().unwrap();

        assert_eq!(payload_text(&queue.pop().unwrap()), "first");
        assert_eq!(payload_text(&queue.pop().unwrap()), "second");
        assert_eq!(payload_text(&queue.pop().unwrap()), "third");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn push_beyond_bound_returns_request_and_keeps_queue() {
        let mut queue = RequestQueue::new(2);
        queue.push(text_request("first")).ok().unwrap();
        queue.push(text_request("second")).ok().unwrap();

        let rejected = queue.push(text_request("third")).unwrap_err();
        assert_eq!(payload_text(&rejected), "third");
        assert_eq!(queue.len(), 2);
        assert_eq!(payload_text(&queue.pop().unwrap()), "first");
        assert_eq!(payload_text(&queue.pop().unwrap()), "second");
    }

    #[test]
    fn drain_empties_in_order() {
        let mut queue = RequestQueue::new(5);
        queue.push(text_request("a")).ok().unwrap();
        queue.push(text_request("b")).ok().unwrap();

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(payload_text(&drained[0]), "a");
        assert_eq!(payload_text(&drained[1]), "b");
        assert_eq!(queue.len(), 0);
    }
}
