//! Decoding of the line-delimited filtered stream

use crate::{Error, messages::StreamEvent};
use futures_util::{StreamExt, TryStreamExt, stream::BoxStream};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

/// A stream of events from the filtered stream endpoint.
///
/// The stream ends after the first transport error, which is yielded as the last item.
/// Callers are expected to reconnect.
pub type TweetStream = BoxStream<'static, Result<StreamEvent, Error>>;

/// Turn a streaming http response into a stream of decoded events
pub(crate) fn decode_response(response: reqwest::Response) -> TweetStream {
    let bytes = response
        .bytes_stream()
        .map_err(std::io::Error::other)
        .boxed();
    decode_lines(StreamReader::new(bytes))
}

/// Decode newline-delimited json events from any async reader.
///
/// Blank lines are keep-alives and are skipped. A line that fails to parse is
/// yielded as an error but does not end the stream.
pub fn decode_lines<R>(reader: R) -> TweetStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let lines = BufReader::new(reader).lines();
    futures_util::stream::unfold(Some(lines), next_event).boxed()
}

async fn next_event<R>(
    state: Option<Lines<BufReader<R>>>,
) -> Option<(Result<StreamEvent, Error>, Option<Lines<BufReader<R>>>)>
where
    R: AsyncRead + Unpin,
{
    let mut lines = state?;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    debug!("stream keep-alive");
                    continue;
                }
                let result = serde_json::from_str::<StreamEvent>(line).map_err(|err| {
                    warn!("Could not decode stream line: {err}: {line}");
                    Error::from(err)
                });
                return Some((result, Some(lines)));
            }
            Ok(None) => {
                debug!("stream closed by server");
                return None;
            }
            Err(err) => return Some((Err(Error::Io(err)), None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_decode_lines_skips_keep_alives() {
        let body = b"\r\n{\"data\":{\"id\":\"1\",\"text\":\"a\"}}\r\n\r\n\r\n{\"data\":{\"id\":\"2\",\"text\":\"b\"}}\r\n";
        let events: Vec<_> = decode_lines(&body[..]).collect().await;
        assert_eq!(events.len(), 2);
        let ids: Vec<String> = events
            .into_iter()
            .map(|e| e.unwrap().data.unwrap().id)
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_decode_lines_bad_json_does_not_end_stream() {
        let body = b"not json\n{\"data\":{\"id\":\"3\",\"text\":\"c\"}}\n";
        let events: Vec<_> = decode_lines(&body[..]).collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Err(Error::Json(_))));
        assert!(events[1].is_ok());
    }
}
