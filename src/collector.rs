//! Turns a stream of fragments into an assistant turn.

use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::observability::{EMPTY_RESPONSES, STREAM_FRAGMENTS, STREAM_MALFORMED};
use crate::render::Renderer;
use crate::types::{Fragment, Turn};

/// Accumulates the text of one streamed reply while forwarding it to the renderer.
///
/// Each fragment's text is printed as soon as it arrives.  Fragments without text are counted
/// and dropped; malformed fragments are logged and skipped.  Any other stream error ends
/// collection.
#[derive(Debug, Default)]
pub struct StreamCollector {
    reply: String,
    fragments: usize,
    with_text: usize,
    malformed: usize,
}

impl StreamCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains `stream` and returns the accumulated reply as an assistant turn.
    ///
    /// A stream that yields no text at all ends in [`Error::EmptyResponse`].
    ///
    /// ```
    /// # use futures::stream;
    /// # use palaver::{Fragment, StreamCollector};
    /// # use palaver::chat::EventStreamRenderer;
    /// # tokio_test::block_on(async {
    /// let fragments = stream::iter(vec![Ok(Fragment::text("He")), Ok(Fragment::text("llo"))]);
    /// let mut renderer = EventStreamRenderer::new(Vec::new());
    /// let turn = StreamCollector::new()
    ///     .collect(fragments, &mut renderer)
    ///     .await
    ///     .unwrap();
    /// assert_eq!(turn.content(), "Hello");
    /// # });
    /// ```
    pub async fn collect<S>(&mut self, mut stream: S, renderer: &mut dyn Renderer) -> Result<Turn>
    where
        S: Stream<Item = Result<Fragment>> + Unpin,
    {
        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) => self.accept(&fragment, renderer),
                Err(err) if err.is_malformed_fragment() => {
                    self.malformed += 1;
                    STREAM_MALFORMED.click();
                    warn!("skipping malformed fragment: {err}");
                    if let Error::MalformedFragment { payload, .. } = &err {
                        debug!(payload = %payload, "malformed fragment payload");
                    }
                }
                Err(err) => return Err(err),
            }
        }
        self.finish()
    }

    fn accept(&mut self, fragment: &Fragment, renderer: &mut dyn Renderer) {
        self.fragments += 1;
        STREAM_FRAGMENTS.click();
        if let Some(text) = fragment.content_text() {
            self.with_text += 1;
            self.reply.push_str(text);
            renderer.print_text(text);
        }
    }

    fn finish(&mut self) -> Result<Turn> {
        if self.reply.is_empty() {
            EMPTY_RESPONSES.click();
            let message = if self.malformed > 0 && self.fragments == 0 {
                format!(
                    "all {} fragments of the response were malformed",
                    self.malformed
                )
            } else {
                "the model returned no content".to_string()
            };
            return Err(Error::empty_response(message));
        }
        debug!(
            fragments = self.fragments,
            with_text = self.with_text,
            malformed = self.malformed,
            chars = self.reply.chars().count(),
            "collected reply"
        );
        Ok(Turn::assistant(std::mem::take(&mut self.reply)))
    }

    /// The text accumulated so far.
    pub fn text(&self) -> &str {
        &self.reply
    }

    /// Number of well-formed fragments seen, with or without text.
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Number of malformed fragments skipped.
    pub fn malformed_count(&self) -> usize {
        self.malformed
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::stream;

    use super::*;
    use crate::progress::{NullProgress, ProgressSink};
    use crate::types::Role;

    #[derive(Default)]
    struct Chunks(Vec<String>);

    impl Renderer for Chunks {
        fn progress_sink(&self) -> Box<dyn ProgressSink> {
            Box::new(NullProgress)
        }
        fn clear_progress(&mut self) {}
        fn begin_answer(&mut self) {}
        fn print_text(&mut self, text: &str) {
            self.0.push(text.to_string());
        }
        fn finish_response(&mut self, _: Duration, _: &crate::transcript::Transcript) {}
        fn print_error(&mut self, _: &str) {}
        fn print_info(&mut self, _: &str) {}
    }

    async fn run(items: Vec<Result<Fragment>>) -> (Result<Turn>, StreamCollector, Vec<String>) {
        let mut collector = StreamCollector::new();
        let mut renderer = Chunks::default();
        let result = collector
            .collect(stream::iter(items), &mut renderer)
            .await;
        (result, collector, renderer.0)
    }

    #[tokio::test]
    async fn concatenates_text_in_order() {
        let (result, _, printed) = run(vec![
            Ok(Fragment::text("He")),
            Ok(Fragment::text("llo")),
        ])
        .await;
        let turn = result.unwrap();
        assert_eq!(turn.role(), Role::Assistant);
        assert_eq!(turn.content(), "Hello");
        assert_eq!(printed, vec!["He", "llo"]);
    }

    #[tokio::test]
    async fn fragments_without_text_are_ignored() {
        let (result, collector, printed) = run(vec![
            Ok(Fragment::empty()),
            Ok(Fragment::text("a")),
            Ok(Fragment::text("")),
            Ok(Fragment::text("b")),
            Ok(Fragment::empty()),
        ])
        .await;
        assert_eq!(result.unwrap().content(), "ab");
        assert_eq!(printed, vec!["a", "b"]);
        assert_eq!(collector.fragment_count(), 5);
    }

    #[tokio::test]
    async fn no_text_is_empty_response() {
        let (result, _, printed) = run(vec![Ok(Fragment::empty()), Ok(Fragment::text(""))]).await;
        assert!(result.unwrap_err().is_empty_response());
        assert!(printed.is_empty());

        let (result, _, _) = run(vec![]).await;
        assert!(result.unwrap_err().is_empty_response());
    }

    #[tokio::test]
    async fn malformed_fragments_are_skipped() {
        let (result, collector, _) = run(vec![
            Ok(Fragment::text("x")),
            Err(Error::malformed_fragment("bad", "{")),
            Ok(Fragment::text("y")),
        ])
        .await;
        assert_eq!(result.unwrap().content(), "xy");
        assert_eq!(collector.malformed_count(), 1);
    }

    #[tokio::test]
    async fn all_malformed_degrades_to_empty_response() {
        let (result, collector, _) = run(vec![
            Err(Error::malformed_fragment("bad", "{")),
            Err(Error::malformed_fragment("bad", "[")),
        ])
        .await;
        let err = result.unwrap_err();
        assert!(err.is_empty_response());
        assert!(err.to_string().contains("malformed"));
        assert_eq!(collector.malformed_count(), 2);
    }

    #[tokio::test]
    async fn other_errors_end_collection() {
        let (result, collector, printed) = run(vec![
            Ok(Fragment::text("partial")),
            Err(Error::streaming("connection reset", None)),
            Ok(Fragment::text("never")),
        ])
        .await;
        assert!(matches!(result, Err(Error::Streaming { .. })));
        assert_eq!(collector.text(), "partial");
        assert_eq!(printed, vec!["partial"]);
    }

    #[tokio::test]
    async fn invalid_utf8_event_does_not_lose_the_reply() {
        let body = stream::iter(vec![
            Ok(bytes::Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
            )),
            Ok(bytes::Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"\xff\xfe\"}}]}\n\n",
            )),
            Ok(bytes::Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\" more\"}}]}\n\n",
            )),
        ]);
        let mut collector = StreamCollector::new();
        let mut renderer = Chunks::default();
        let fragments = Box::pin(crate::sse::process_sse(body, None));
        let turn = collector.collect(fragments, &mut renderer).await.unwrap();
        assert_eq!(turn.content(), "ok more");
        assert_eq!(collector.malformed_count(), 1);
    }
}
