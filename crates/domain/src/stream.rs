use std::pin::Pin;

use crate::search::{SearchError, SearchResponse};

/// A boxed async stream.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// The result stream of one search invocation.
///
/// Yields zero or more responses.  A clean end of the stream is the
/// success terminal; a yielded `Err` is always the last item.
pub type SearchStream = BoxStream<'static, Result<SearchResponse, SearchError>>;
