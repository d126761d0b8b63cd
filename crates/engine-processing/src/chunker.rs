use futures::{Stream, StreamExt, stream};
use model::records::batch::Batch;
use std::num::NonZeroUsize;

/// Groups a lazy stream into batches of exactly `size` items; only the last
/// batch may be shorter. At most one partial batch is held at a time and an
/// empty source produces no batch.
pub fn chunked<S>(source: S, size: NonZeroUsize) -> impl Stream<Item = Batch<S::Item>>
where
    S: Stream,
{
    let size = size.get();
    stream::unfold(Some((Box::pin(source), 0u64)), move |state| async move {
        let (mut source, index) = state?;

        let mut rows = Vec::with_capacity(size);
        while rows.len() < size {
            match source.next().await {
                Some(item) => rows.push(item),
                None => break,
            }
        }

        if rows.is_empty() {
            return None;
        }
        let next = (rows.len() == size).then_some((source, index + 1));
        Some((Batch::new(index, rows), next))
    })
}

/// Like [`chunked`] for fallible sources. The first error is forwarded in
/// place of the batch being filled and ends the stream; the partial batch is
/// dropped.
pub fn try_chunked<S, T, E>(
    source: S,
    size: NonZeroUsize,
) -> impl Stream<Item = Result<Batch<T>, E>>
where
    S: Stream<Item = Result<T, E>>,
{
    let size = size.get();
    stream::unfold(Some((Box::pin(source), 0u64)), move |state| async move {
        let (mut source, index) = state?;

        let mut rows = Vec::with_capacity(size);
        while rows.len() < size {
            match source.next().await {
                Some(Ok(item)) => rows.push(item),
                Some(Err(err)) => return Some((Err(err), None)),
                None => break,
            }
        }

        if rows.is_empty() {
            return None;
        }
        let next = (rows.len() == size).then_some((source, index + 1));
        Some((Ok(Batch::new(index, rows)), next))
    })
}
