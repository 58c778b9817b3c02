//! Aggregate future over per-chunk apply handles.
//!
//! Resolves only once every chunk handle has resolved. The first error in
//! submission order wins; otherwise the result is the last chunk's index
//! and response, which is where the rebuilt command's response lands.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{join_all, JoinAll};

use raft_chunking_core::{Applied, ApplyError};

use crate::error::SubmitError;

/// Output of an [`AggregateFuture`].
///
/// `Ok(None)` means nothing was submitted (a zero-length command). On error
/// the last chunk's own result is not included; use
/// [`AggregateFuture::outcome`] to get both.
pub type AggregateResult<R> = Result<Option<Applied<R>>, SubmitError>;

/// Everything a finished submission reports, including the last chunk's
/// result when an earlier chunk failed.
#[derive(Debug)]
pub struct AggregateOutcome<R> {
    /// First failure in submission order, if any.
    pub error: Option<SubmitError>,
    /// Result of the last chunk's handle. `None` if nothing was submitted.
    pub last: Option<Result<Applied<R>, ApplyError>>,
}

impl<R> AggregateOutcome<R> {
    /// Collapse into what awaiting the [`AggregateFuture`] directly yields.
    pub fn into_result(self) -> AggregateResult<R> {
        match (self.error, self.last) {
            (Some(err), _) => Err(err),
            (None, Some(Ok(applied))) => Ok(Some(applied)),
            // `outcome` never leaves a failed last chunk without an error;
            // only a hand-built value can get here.
            (None, Some(Err(source))) => Err(SubmitError::Apply {
                sequence: 0,
                source,
            }),
            (None, None) => Ok(None),
        }
    }
}

/// Handle for a chunked submission.
///
/// Dropping it does not retract anything: chunks already handed to the
/// engine stay in the log and sit inert in replicas' pending tables until a
/// term change clears them.
#[must_use = "futures do nothing unless polled"]
pub struct AggregateFuture<H: Future> {
    state: State<H>,
    chunks: usize,
}

enum State<H: Future> {
    Failed(SubmitError),
    Empty,
    Waiting(Pin<Box<JoinAll<H>>>),
    Done,
}

impl<H: Future> AggregateFuture<H> {
    /// A future that is already failed. Nothing was submitted.
    pub fn failed(err: SubmitError) -> Self {
        Self {
            state: State::Failed(err),
            chunks: 0,
        }
    }

    /// A future for a command that produced no chunks.
    pub fn empty() -> Self {
        Self {
            state: State::Empty,
            chunks: 0,
        }
    }

    /// Wrap handles for chunks already submitted, in submission order.
    pub fn from_handles(handles: Vec<H>) -> Self {
        if handles.is_empty() {
            return Self::empty();
        }
        let chunks = handles.len();
        Self {
            state: State::Waiting(Box::pin(join_all(handles))),
            chunks,
        }
    }

    /// Number of chunks submitted.
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Wait for every chunk and report both the first error and the last
    /// chunk's result.
    pub async fn outcome<R>(self) -> AggregateOutcome<R>
    where
        H: Future<Output = Result<Applied<R>, ApplyError>>,
    {
        match self.state {
            State::Failed(err) => AggregateOutcome {
                error: Some(err),
                last: None,
            },
            State::Empty | State::Done => AggregateOutcome {
                error: None,
                last: None,
            },
            State::Waiting(joined) => {
                let results = joined.await;
                let error = results.iter().enumerate().find_map(|(sequence, result)| {
                    result.as_ref().err().map(|source| SubmitError::Apply {
                        sequence: sequence as u32,
                        source: source.clone(),
                    })
                });
                AggregateOutcome {
                    error,
                    last: results.into_iter().last(),
                }
            }
        }
    }
}

impl<H, R> Future for AggregateFuture<H>
where
    H: Future<Output = Result<Applied<R>, ApplyError>>,
{
    type Output = AggregateResult<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match std::mem::replace(&mut this.state, State::Done) {
            State::Failed(err) => Poll::Ready(Err(err)),
            State::Empty => Poll::Ready(Ok(None)),
            State::Waiting(mut joined) => match joined.as_mut().poll(cx) {
                Poll::Pending => {
                    this.state = State::Waiting(joined);
                    Poll::Pending
                }
                Poll::Ready(results) => Poll::Ready(first_error_or_last(results)),
            },
            State::Done => panic!("AggregateFuture polled after completion"),
        }
    }
}

fn first_error_or_last<R>(results: Vec<Result<Applied<R>, ApplyError>>) -> AggregateResult<R> {
    let mut last = None;
    for (sequence, result) in results.into_iter().enumerate() {
        match result {
            Ok(applied) => last = Some(applied),
            Err(source) => {
                return Err(SubmitError::Apply {
                    sequence: sequence as u32,
                    source,
                })
            }
        }
    }
    Ok(last)
}
