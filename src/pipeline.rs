//! Turning engine output into a [`Completion`].
//!
//! [`accumulate`] is a plain fold over the token stream; the `on_token`
//! hook lets a front-end render fragments as they arrive without the fold
//! knowing anything about display. Only the folded string is ever cached.

use futures_util::StreamExt;
use tracing::warn;

use crate::{MimirError, Result};
use crate::types::{Completion, EngineResponse, EventStream, GenerationEvent};

/// Fold a token stream into the final answer.
///
/// Stops at [`GenerationEvent::Done`] or at the end of the stream, calling
/// `on_token` for each fragment along the way. The first error aborts the
/// fold and is returned.
pub async fn accumulate<F>(mut events: EventStream, mut on_token: F) -> Result<String>
where
    F: FnMut(&str),
{
    let mut text = String::new();
    while let Some(event) = events.next().await {
        match event? {
            GenerationEvent::Token(token) => {
                on_token(&token);
                text.push_str(&token);
            }
            GenerationEvent::Done => break,
        }
    }
    Ok(text)
}

/// Drive an engine response to completion.
///
/// Errors become a [`Completion::failure`] carrying the error text, so
/// the caller always has something to show. A blank answer counts as
/// [`MimirError::EmptyResponse`]. A complete response is passed to
/// `on_token` in one piece.
pub async fn complete<F>(response: Result<EngineResponse>, mut on_token: F) -> Completion
where
    F: FnMut(&str),
{
    let result = match response {
        Ok(EngineResponse::Complete { text, sources }) => {
            on_token(&text);
            Ok((text, sources))
        }
        Ok(EngineResponse::Stream { events, sources }) => accumulate(events, on_token)
            .await
            .map(|text| (text, sources)),
        Err(e) => Err(e),
    }
    .and_then(|(text, sources)| {
        if text.trim().is_empty() {
            Err(MimirError::EmptyResponse)
        } else {
            Ok((text, sources))
        }
    });

    match result {
        Ok((text, sources)) => Completion::success(text, &sources),
        Err(e) => {
            warn!(error = %e, "generation failed");
            Completion::failure(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompletionKind, SourceReference};

    fn stream(events: Vec<Result<GenerationEvent>>) -> EventStream {
        Box::pin(futures_util::stream::iter(events))
    }

    #[tokio::test]
    async fn accumulate_concatenates_until_done() {
        let mut seen = Vec::new();
        let text = accumulate(
            stream(vec![
                Ok(GenerationEvent::Token("Hel".into())),
                Ok(GenerationEvent::Token("lo".into())),
                Ok(GenerationEvent::Done),
                Ok(GenerationEvent::Token("ignored".into())),
            ]),
            |t| seen.push(t.to_string()),
        )
        .await
        .unwrap();
        assert_eq!(text, "Hello");
        assert_eq!(seen, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn accumulate_without_done_marker() {
        let text = accumulate(stream(vec![Ok(GenerationEvent::Token("x".into()))]), |_| {})
            .await
            .unwrap();
        assert_eq!(text, "x");
    }

    #[tokio::test]
    async fn mid_stream_error_is_failure() {
        let completion = complete(
            Ok(EngineResponse::Stream {
                events: stream(vec![
                    Ok(GenerationEvent::Token("partial".into())),
                    Err(MimirError::Stream("connection reset".into())),
                ]),
                sources: vec![SourceReference::new("a", "b")],
            }),
            |_| {},
        )
        .await;
        assert_eq!(completion.kind, CompletionKind::Failure);
        assert!(completion.response.contains("connection reset"));
        assert!(!completion.response.contains("partial"));
        assert!(completion.sources.is_none());
    }

    #[tokio::test]
    async fn complete_response_formats_sources() {
        let completion = complete(
            Ok(EngineResponse::Complete {
                text: "answer".into(),
                sources: vec![SourceReference::new("doc.txt", "passage")],
            }),
            |_| {},
        )
        .await;
        assert!(completion.is_success());
        assert_eq!(completion.response, "answer");
        assert_eq!(
            completion.sources.as_deref(),
            Some("📄 **doc.txt**\n> passage")
        );
    }

    #[tokio::test]
    async fn blank_stream_is_empty_response() {
        let completion = complete(
            Ok(EngineResponse::Stream {
                events: stream(vec![
                    Ok(GenerationEvent::Token("  \n".into())),
                    Ok(GenerationEvent::Done),
                ]),
                sources: Vec::new(),
            }),
            |_| {},
        )
        .await;
        assert_eq!(completion.kind, CompletionKind::Failure);
        assert!(completion.response.contains("empty response"));
    }

    #[tokio::test]
    async fn engine_error_is_failure() {
        let completion = complete(Err(MimirError::EmptyResponse), |_| {}).await;
        assert_eq!(completion.kind, CompletionKind::Failure);
    }
}
