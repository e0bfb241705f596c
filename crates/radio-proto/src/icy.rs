//! ICY (Shoutcast/Icecast) in-band metadata.
//!
//! With `Icy-MetaData: 1` the server interleaves a metadata block after every
//! `icy-metaint` audio bytes:
//!
//! ```text
//! [ metaint audio bytes ][ L ][ L*16 bytes "StreamTitle='...';" NUL padded ] ...
//! ```
//!
//! The audio is skipped here; playback belongs to the external player.

use std::io;
use std::pin::Pin;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;

/// Largest metadata interval accepted from a server.
pub const MAX_METAINT: usize = 256_000;

/// A title split into artist/song on the first `" - "`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackTitle {
    pub raw: String,
    pub artist: String,
    pub song: String,
}

impl TrackTitle {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.split_once(" - ") {
            Some((artist, song)) => Self {
                raw: raw.to_string(),
                artist: artist.trim().to_string(),
                song: song.trim().to_string(),
            },
            None => Self {
                raw: raw.to_string(),
                artist: String::new(),
                song: raw.to_string(),
            },
        }
    }
}

/// Extract the `StreamTitle` value from a raw metadata block.
pub fn parse_stream_title(meta: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(meta)
        .trim_matches(char::from(0))
        .trim()
        .to_string();
    if text.is_empty() {
        return None;
    }

    for (open, close) in [("StreamTitle='", "';"), ("StreamTitle=\"", "\";")] {
        if let Some(start) = text.find(open) {
            let rest = &text[start + open.len()..];
            // Prefer the terminator so titles like "Guns N' Roses" survive;
            // fall back to the last quote for servers that omit the ';'.
            let quote = &close[..1];
            let end = rest.find(close).or_else(|| rest.rfind(quote))?;
            let title = rest[..end].trim();
            return (!title.is_empty()).then(|| title.to_string());
        }
    }

    None
}

/// Announced bitrate from `icy-br`; lists like `"128,64"` report the minimum.
pub fn announced_kbps(raw: &str) -> Option<u32> {
    raw.split(',')
        .filter_map(|part| {
            let digits: String = part
                .trim()
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse::<u32>().ok()
        })
        .min()
}

/// Response headers relevant to in-band metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IcyHeaders {
    pub metaint: Option<usize>,
    pub bitrate: Option<String>,
}

impl IcyHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        Self {
            metaint: text("icy-metaint")
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| (1..=MAX_METAINT).contains(n)),
            bitrate: text("icy-br"),
        }
    }
}

pub type BodyReader = Pin<Box<dyn AsyncRead + Send>>;

/// One open HTTP connection to a station, positioned at an interval boundary.
pub struct IcyConnection {
    pub headers: IcyHeaders,
    reader: BodyReader,
    scratch: Vec<u8>,
}

impl IcyConnection {
    /// Issue the GET with the metadata opt-in header.
    pub async fn open(client: &Client, url: &str) -> anyhow::Result<Self> {
        let resp = client
            .get(url)
            .header("Icy-MetaData", HeaderValue::from_static("1"))
            .send()
            .await?
            .error_for_status()?;

        let headers = IcyHeaders::from_headers(resp.headers());
        let byte_stream = resp
            .bytes_stream()
            .map(|result| result.map_err(|e| io::Error::new(io::ErrorKind::Other, e)));
        Ok(Self::from_reader(headers, Box::pin(StreamReader::new(byte_stream))))
    }

    pub fn from_reader(headers: IcyHeaders, reader: BodyReader) -> Self {
        Self {
            headers,
            reader,
            scratch: Vec::new(),
        }
    }

    /// Consume one audio interval plus its metadata block.
    ///
    /// Returns the `StreamTitle` carried by the block, or `None` when the
    /// block is empty or has no title.
    pub async fn next_title(&mut self) -> io::Result<Option<String>> {
        let metaint = self.headers.metaint.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "stream has no icy-metaint")
        })?;
        read_metadata_block(&mut self.reader, metaint, &mut self.scratch).await
    }
}

/// Read exactly `metaint` audio bytes (discarded), one length byte `L`, then
/// `L * 16` metadata bytes.
pub async fn read_metadata_block<R>(
    reader: &mut R,
    metaint: usize,
    scratch: &mut Vec<u8>,
) -> io::Result<Option<String>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    scratch.resize(metaint, 0);
    reader.read_exact(&mut scratch[..metaint]).await?;

    let meta_len = reader.read_u8().await? as usize * 16;
    if meta_len == 0 {
        return Ok(None);
    }

    scratch.resize(meta_len, 0);
    reader.read_exact(&mut scratch[..meta_len]).await?;
    Ok(parse_stream_title(&scratch[..meta_len]))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build `interval` audio bytes followed by a padded metadata block.
    fn block(interval: usize, meta: &str) -> Vec<u8> {
        let mut out = vec![0xAAu8; interval];
        let blocks = meta.len().div_ceil(16);
        out.push(blocks as u8);
        let mut payload = meta.as_bytes().to_vec();
        payload.resize(blocks * 16, 0);
        out.extend(payload);
        out
    }

    #[tokio::test]
    async fn test_artist_song_block() {
        let data = block(10, "StreamTitle='Artist - Song';");
        let mut reader: &[u8] = &data;
        let mut scratch = Vec::new();

        let raw = read_metadata_block(&mut reader, 10, &mut scratch)
            .await
            .unwrap()
            .unwrap();
        let title = TrackTitle::parse(&raw);
        assert_eq!(title.artist, "Artist");
        assert_eq!(title.song, "Song");
        assert!(reader.is_empty());
    }

    #[tokio::test]
    async fn test_title_without_separator() {
        let data = block(10, "StreamTitle='JustATitle';");
        let mut reader: &[u8] = &data;
        let raw = read_metadata_block(&mut reader, 10, &mut Vec::new())
            .await
            .unwrap()
            .unwrap();
        let title = TrackTitle::parse(&raw);
        assert_eq!(title.artist, "");
        assert_eq!(title.song, "JustATitle");
    }

    #[tokio::test]
    async fn test_exact_sixteen_byte_block() {
        let meta = "StreamTitle='A';";
        assert_eq!(meta.len(), 16);
        let data = block(4, meta);
        assert_eq!(data[4], 1);
        let mut reader: &[u8] = &data;
        let raw = read_metadata_block(&mut reader, 4, &mut Vec::new()).await.unwrap();
        assert_eq!(raw.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_zero_length_block_then_titled_block() {
        let mut data = vec![0u8; 8];
        data.push(0);
        data.extend(block(8, "StreamTitle='Next - One';"));
        let mut conn = IcyConnection::from_reader(
            IcyHeaders {
                metaint: Some(8),
                bitrate: None,
            },
            Box::pin(std::io::Cursor::new(data)),
        );

        assert_eq!(conn.next_title().await.unwrap(), None);
        assert_eq!(conn.next_title().await.unwrap().as_deref(), Some("Next - One"));
        // Stream exhausted mid-interval.
        assert!(conn.next_title().await.is_err());
    }

    #[tokio::test]
    async fn test_truncated_stream_is_error() {
        let data = vec![0u8; 5];
        let mut reader: &[u8] = &data;
        let err = read_metadata_block(&mut reader, 10, &mut Vec::new()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_missing_metaint() {
        let mut conn = IcyConnection::from_reader(IcyHeaders::default(), Box::pin(&b""[..]));
        let err = conn.next_title().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_parse_stream_title_variants() {
        assert_eq!(
            parse_stream_title(b"StreamTitle='Guns N' Roses - Patience';StreamUrl='';\0\0").as_deref(),
            Some("Guns N' Roses - Patience")
        );
        assert_eq!(
            parse_stream_title(b"StreamTitle=\"Double - Quoted\";").as_deref(),
            Some("Double - Quoted")
        );
        assert_eq!(parse_stream_title(b"StreamTitle='';"), None);
        assert_eq!(parse_stream_title(b"StreamUrl='http://x';"), None);
        assert_eq!(parse_stream_title(b"\0\0\0\0"), None);
    }

    #[test]
    fn test_split_only_on_first_separator() {
        let t = TrackTitle::parse("  A - B - C ");
        assert_eq!(t.raw, "A - B - C");
        assert_eq!(t.artist, "A");
        assert_eq!(t.song, "B - C");
    }

    #[test]
    fn test_announced_kbps() {
        assert_eq!(announced_kbps("128"), Some(128));
        assert_eq!(announced_kbps("128,64"), Some(64));
        assert_eq!(announced_kbps(" 320 kbps"), Some(320));
        assert_eq!(announced_kbps("n/a"), None);
    }

    #[test]
    fn test_headers() {
        let mut h = HeaderMap::new();
        h.insert("icy-metaint", HeaderValue::from_static("16000"));
        h.insert("icy-br", HeaderValue::from_static("128"));
        let icy = IcyHeaders::from_headers(&h);
        assert_eq!(icy.metaint, Some(16000));
        assert_eq!(icy.bitrate.as_deref(), Some("128"));

        let mut bad = HeaderMap::new();
        bad.insert("icy-metaint", HeaderValue::from_static("0"));
        assert_eq!(IcyHeaders::from_headers(&bad).metaint, None);
    }
}
