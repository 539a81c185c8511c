//! Stream Integration
//!
//! Runs every element of a stream through a queue. Each element is submitted as soon as
//! it is pulled from upstream, so elements with distinct keys run in parallel while the
//! queue keeps same-key elements in order.
//!
//! Results are yielded in completion order. [`MapThroughQueue::ordered`] switches to
//! submission order for callers that need it.

use futures::future::BoxFuture;
use futures::stream::{BoxStream, FuturesOrdered, FuturesUnordered, SelectAll};
use futures::{FutureExt, Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::QueueError;
use crate::execution::Execution;
use crate::queue::AsyncQueue;
use crate::run_config::RunConfig;

type KeyFn<T, K> = dyn Fn(&T) -> Option<K> + Send + Sync;
type ActionFn<T, R> = dyn Fn(T) -> BoxFuture<'static, Result<R, anyhow::Error>> + Send + Sync;
type RecoverFn<R> = dyn Fn(QueueError) -> BoxStream<'static, Result<R, QueueError>> + Send + Sync;

/// Submissions whose results have not been yielded yet
enum InFlight<R> {
    Completion(FuturesUnordered<Execution<R>>),
    Submission(FuturesOrdered<Execution<R>>),
}

impl<R> InFlight<R> {
    fn push(&mut self, execution: Execution<R>) {
        match self {
            InFlight::Completion(set) => set.push(execution),
            InFlight::Submission(set) => set.push_back(execution),
        }
    }

    fn poll_next(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<R, QueueError>>> {
        match self {
            InFlight::Completion(set) => set.poll_next_unpin(cx),
            InFlight::Submission(set) => set.poll_next_unpin(cx),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            InFlight::Completion(set) => set.is_empty(),
            InFlight::Submission(set) => set.is_empty(),
        }
    }

    /// Drop every pending execution, cancelling the invocations behind them.
    fn cancel_all(&mut self) {
        *self = match self {
            InFlight::Completion(_) => InFlight::Completion(FuturesUnordered::new()),
            InFlight::Submission(_) => InFlight::Submission(FuturesOrdered::new()),
        };
    }
}

/// Stream returned by [`StreamQueueExt::map_through_queue`]
pub struct MapThroughQueue<S, Q, K, R>
where
    S: Stream,
{
    upstream: Option<Pin<Box<S>>>,
    queue: Q,
    key_fn: Box<KeyFn<S::Item, K>>,
    action: Arc<ActionFn<S::Item, R>>,
    config: RunConfig,
    recover: Option<Box<RecoverFn<R>>>,
    in_flight: InFlight<R>,
    recovering: SelectAll<BoxStream<'static, Result<R, QueueError>>>,
    submitted: u64,
    terminated: bool,
}

// No field is structurally pinned: upstream is boxed, everything else is moved freely.
impl<S, Q, K, R> Unpin for MapThroughQueue<S, Q, K, R> where S: Stream {}

impl<S, Q, K, R> MapThroughQueue<S, Q, K, R>
where
    S: Stream,
    S::Item: Send + 'static,
    Q: AsyncQueue<K>,
    R: Send + 'static,
{
    fn new<A, Fut, E>(upstream: S, queue: Q, action: A) -> Self
    where
        A: Fn(S::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let action: Arc<ActionFn<S::Item, R>> = Arc::new(move |element| {
            action(element)
                .map(|r| r.map_err(Into::<anyhow::Error>::into))
                .boxed()
        });
        Self {
            upstream: Some(Box::pin(upstream)),
            queue,
            key_fn: Box::new(|_| None),
            action,
            config: RunConfig::default(),
            recover: None,
            in_flight: InFlight::Completion(FuturesUnordered::new()),
            recovering: SelectAll::new(),
            submitted: 0,
            terminated: false,
        }
    }

    /// Derive the queue key of each element. Without it every element is unkeyed.
    pub fn key_by<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&S::Item) -> Option<K> + Send + Sync + 'static,
    {
        self.key_fn = Box::new(key_fn);
        self
    }

    /// Run configuration passed with every submission.
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace failed elements with the output of `recover` instead of terminating.
    ///
    /// `recover` sees action failures and panics only. Cancellation and a missing
    /// runtime are never recovered: they always terminate the stream. An `Err` yielded by
    /// the recovery stream terminates the stream too.
    pub fn recover<F, RS>(mut self, recover: F) -> Self
    where
        F: Fn(QueueError) -> RS + Send + Sync + 'static,
        RS: Stream<Item = Result<R, QueueError>> + Send + 'static,
    {
        self.recover = Some(Box::new(move |err| recover(err).boxed()));
        self
    }

    /// Yield results in submission order instead of completion order.
    ///
    /// Must be called before the stream is first polled.
    pub fn ordered(mut self) -> Self {
        self.in_flight = InFlight::Submission(FuturesOrdered::new());
        self
    }

    /// Drive the stream to completion on `runtime`, discarding successful outputs.
    ///
    /// The returned handle resolves with the first unrecovered error, if any. Aborting it
    /// drops the stream and cancels every in-flight invocation.
    pub fn launch(self, runtime: &Handle) -> JoinHandle<Result<(), QueueError>>
    where
        Self: Send + 'static,
    {
        runtime.spawn(async move {
            let mut stream = self;
            while let Some(item) = stream.next().await {
                item?;
            }
            debug!(submitted = stream.submitted, "Queued stream drained");
            Ok(())
        })
    }

    fn submit(&mut self, element: S::Item) {
        let key = (self.key_fn)(&element);
        let action = Arc::clone(&self.action);
        let execution = self
            .queue
            .execute(key, self.config.clone(), move || (*action)(element));
        self.in_flight.push(execution);
        self.submitted += 1;
    }

    /// Submit everything upstream has ready right now.
    fn pull_upstream(&mut self, cx: &mut Context<'_>) {
        loop {
            let Some(upstream) = self.upstream.as_mut() else {
                return;
            };
            match upstream.as_mut().poll_next(cx) {
                Poll::Ready(Some(element)) => self.submit(element),
                Poll::Ready(None) => {
                    trace!(submitted = self.submitted, "Upstream exhausted");
                    self.upstream = None;
                }
                Poll::Pending => return,
            }
        }
    }

    fn terminate(&mut self) {
        self.terminated = true;
        self.upstream = None;
        self.in_flight.cancel_all();
        self.recovering = SelectAll::new();
    }
}

impl<S, Q, K, R> Stream for MapThroughQueue<S, Q, K, R>
where
    S: Stream,
    S::Item: Send + 'static,
    Q: AsyncQueue<K>,
    R: Send + 'static,
{
    type Item = Result<R, QueueError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }

        this.pull_upstream(cx);

        loop {
            if !this.recovering.is_empty() {
                if let Poll::Ready(Some(item)) = this.recovering.poll_next_unpin(cx) {
                    if item.is_err() {
                        this.terminate();
                    }
                    return Poll::Ready(Some(item));
                }
            }

            match this.in_flight.poll_next(cx) {
                Poll::Ready(Some(Ok(output))) => return Poll::Ready(Some(Ok(output))),
                Poll::Ready(Some(Err(err))) => {
                    let Some(recover) = this.recover.as_ref().filter(|_| err.is_failure())
                    else {
                        this.terminate();
                        return Poll::Ready(Some(Err(err)));
                    };
                    trace!(error = %err, "Recovering failed element");
                    let replacement = recover(err);
                    this.recovering.push(replacement);
                }
                Poll::Ready(None) | Poll::Pending => break,
            }
        }

        if this.upstream.is_none() && this.in_flight.is_empty() && this.recovering.is_empty() {
            this.terminated = true;
            return Poll::Ready(None);
        }
        Poll::Pending
    }
}

/// Queue-backed combinators for any [`Stream`]
pub trait StreamQueueExt: Stream + Sized {
    /// Apply `action` to every element through `queue`.
    ///
    /// Yields each element's result as its invocation completes. Without
    /// [`MapThroughQueue::recover`] the first error is yielded and ends the stream.
    fn map_through_queue<Q, K, R, E, A, Fut>(
        self,
        queue: Q,
        action: A,
    ) -> MapThroughQueue<Self, Q, K, R>
    where
        Self::Item: Send + 'static,
        Q: AsyncQueue<K>,
        R: Send + 'static,
        A: Fn(Self::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        MapThroughQueue::new(self, queue, action)
    }
}

impl<S> StreamQueueExt for S where S: Stream {}
