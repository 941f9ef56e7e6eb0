use std::{fmt, future::Future};

use futures_util::{Stream, StreamExt};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream};

/// An asynchronous source of messages drained by an [`Expecter`](crate::Expecter).
///
/// `recv` resolves to the next message, or to `None` once no more messages
/// will ever arrive. The expecter awaits it alongside its cancellation
/// signal, so implementations must be cancel-safe: dropping a pending `recv`
/// future must not lose a message.
///
/// Implemented for Tokio's `mpsc` and `broadcast` receivers, the
/// `tokio-stream` receiver wrappers, and any [`Stream`] through
/// [`StreamSource`].
pub trait Source<T>: Send + 'static {
    fn recv(&mut self) -> impl Future<Output = Option<T>> + Send;
}

impl<T: Send + 'static> Source<T> for mpsc::Receiver<T> {
    fn recv(&mut self) -> impl Future<Output = Option<T>> + Send {
        mpsc::Receiver::recv(self)
    }
}

impl<T: Send + 'static> Source<T> for mpsc::UnboundedReceiver<T> {
    fn recv(&mut self) -> impl Future<Output = Option<T>> + Send {
        mpsc::UnboundedReceiver::recv(self)
    }
}

/// Lagged messages are skipped with a warning; the expecter only sees what
/// the receiver still holds.
impl<T: Clone + Send + 'static> Source<T> for broadcast::Receiver<T> {
    fn recv(&mut self) -> impl Future<Output = Option<T>> + Send {
        async move {
            loop {
                match broadcast::Receiver::recv(self).await {
                    Ok(message) => return Some(message),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "broadcast source lagged, messages were lost");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        }
    }
}

impl<T: Send + 'static> Source<T> for ReceiverStream<T> {
    fn recv(&mut self) -> impl Future<Output = Option<T>> + Send {
        self.next()
    }
}

impl<T: Send + 'static> Source<T> for UnboundedReceiverStream<T> {
    fn recv(&mut self) -> impl Future<Output = Option<T>> + Send {
        self.next()
    }
}

/// Adapts any [`Stream`] into a [`Source`].
///
/// ```ignore
/// let source = StreamSource::new(futures_util::stream::iter(["hello", "world"]));
/// let expecter = Expecter::new(source).expect([all_of([eq("hello"), eq("world")])?]);
/// ```
pub struct StreamSource<S> {
    stream: S,
}

impl<S> StreamSource<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> fmt::Debug for StreamSource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource").finish_non_exhaustive()
    }
}

impl<S> Source<S::Item> for StreamSource<S>
where
    S: Stream + Unpin + Send + 'static,
    S::Item: Send,
{
    fn recv(&mut self) -> impl Future<Output = Option<S::Item>> + Send {
        self.stream.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mpsc_receiver_yields_then_closes() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.send(1).await.unwrap();
        drop(tx);

        assert_eq!(Source::recv(&mut rx).await, Some(1));
        assert_eq!(Source::recv(&mut rx).await, None);
    }

    #[tokio::test]
    async fn unbounded_receiver_yields_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send("a").unwrap();
        tx.send("b").unwrap();
        drop(tx);

        assert_eq!(Source::recv(&mut rx).await, Some("a"));
        assert_eq!(Source::recv(&mut rx).await, Some("b"));
        assert_eq!(Source::recv(&mut rx).await, None);
    }

    #[tokio::test]
    async fn broadcast_receiver_skips_lagged_messages() {
        let (tx, mut rx) = broadcast::channel(2);
        for i in 0..4 {
            tx.send(i).unwrap();
        }
        drop(tx);

        // Capacity 2: messages 0 and 1 were overwritten.
        assert_eq!(Source::recv(&mut rx).await, Some(2));
        assert_eq!(Source::recv(&mut rx).await, Some(3));
        assert_eq!(Source::recv(&mut rx).await, None);
    }

    #[tokio::test]
    async fn receiver_stream_delegates_to_inner_channel() {
        let (tx, rx) = mpsc::channel(1);
        let mut source = ReceiverStream::new(rx);
        tx.send("x").await.unwrap();
        drop(tx);

        assert_eq!(Source::recv(&mut source).await, Some("x"));
        assert_eq!(Source::recv(&mut source).await, None);
    }

    #[tokio::test]
    async fn stream_source_drains_any_stream() {
        let mut source = StreamSource::new(futures_util::stream::iter(vec![1, 2]));
        assert_eq!(source.recv().await, Some(1));
        assert_eq!(source.recv().await, Some(2));
        assert_eq!(source.recv().await, None);
    }
}
