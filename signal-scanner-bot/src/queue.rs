//! Bounded FIFO between the microblog stream and the messaging channel.

use tokio::sync::{
    Mutex,
    mpsc::{self, Receiver, Sender, error::TryRecvError},
};

/// Multi-producer, single-consumer bounded queue.
///
/// `put` waits while the queue is full instead of dropping. The receiving half lives
/// in the queue itself, so the queue never closes while it is alive.
#[derive(Debug)]
pub struct DeliveryQueue<T> {
    tx: Sender<T>,
    rx: Mutex<Receiver<T>>,
    capacity: usize,
}

impl<T: Send> DeliveryQueue<T> {
    /// Create a queue holding at most `capacity` items (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            capacity,
        }
    }

    /// Enqueue, waiting for room if the queue is full
    pub async fn put(&self, item: T) {
        // Cannot fail: the receiver is owned by self
        let _ = self.tx.send(item).await;
    }

    /// Dequeue, waiting for an item if the queue is empty
    pub async fn get(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Dequeue without waiting
    pub async fn try_get(&self) -> Option<T> {
        match self.rx.lock().await.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    #[tokio::test]
    async fn test_fifo() {
        let queue = DeliveryQueue::new(10);
        queue.put(1).await;
        queue.put(2).await;
        queue.put(3).await;
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.get().await, Some(1));
        assert_eq!(queue.try_get().await, Some(2));
        assert_eq!(queue.try_get().await, Some(3));
        assert_eq!(queue.try_get().await, None);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_put_waits_when_full() {
        let queue = Arc::new(DeliveryQueue::new(1));
        queue.put("a").await;

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.put("b").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!producer.is_finished());

        assert_eq!(queue.get().await, Some("a"));
        producer.await.unwrap();
        assert_eq!(queue.get().await, Some("b"));
    }
}
