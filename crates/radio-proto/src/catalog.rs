//! Station catalog loaded from an M3U / extended-M3U playlist.
//!
//! Recognised lines:
//!
//! ```text
//! #EXTM3U                                   header, ignored
//! #EXTINF:-1 group-title="Jazz",Radio Swiss Jazz
//! #EXTGRP:Jazz                              group of the pending station
//! https://stream.srg-ssr.ch/m/rsj/mp3_128   station URL
//! ```
//!
//! Anything else starting with `#` is a comment.  A bare line becomes a
//! station only when it parses as a URL with both a scheme and a host.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use reqwest::Url;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("cannot read playlist {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Station {
    pub name: String,
    pub url: String,
    pub group: Option<String>,
    /// `key="value"` pairs from the `#EXTINF` line, e.g. `tvg-logo`.
    pub attributes: BTreeMap<String, String>,
}

/// Immutable list of stations.  Everything else refers to stations by index.
#[derive(Debug, Clone, Default)]
pub struct StationCatalog {
    stations: Vec<Station>,
}

impl StationCatalog {
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let bytes = std::fs::read(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let content = decode_text(bytes);
        Ok(Self::new(parse_m3u(&content)))
    }

    pub fn get(&self, idx: usize) -> Option<&Station> {
        self.stations.get(idx)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }
}

/// UTF-8 with a Latin-1 fallback for legacy playlists.
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }
}

/// Pending `#EXTINF` data waiting for its URL line.
#[derive(Debug, Default)]
struct PendingEntry {
    name: Option<String>,
    group: Option<String>,
    attributes: BTreeMap<String, String>,
}

pub fn parse_m3u(content: &str) -> Vec<Station> {
    let mut stations = Vec::new();
    let mut pending = PendingEntry::default();

    for line in content.lines() {
        let line = line.trim().trim_start_matches('\u{feff}');
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            if pending.name.is_some() {
                debug!("catalog: #EXTINF without URL discarded: {:?}", pending.name);
            }
            pending = parse_extinf(rest);
            continue;
        }

        if let Some(group) = line.strip_prefix("#EXTGRP:") {
            let group = group.trim();
            if !group.is_empty() {
                pending.group = Some(group.to_string());
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        if !is_valid_station_url(line) {
            warn!("catalog: skipping invalid URL line {:?}", line);
            continue;
        }

        let entry = std::mem::take(&mut pending);
        let name = entry
            .name
            .unwrap_or_else(|| format!("Station {}", stations.len() + 1));
        stations.push(Station {
            name,
            url: line.to_string(),
            group: entry.group,
            attributes: entry.attributes,
        });
    }

    stations
}

/// Parse everything after `#EXTINF:`, shaped `<duration> key="value" ...,<title>`.
fn parse_extinf(rest: &str) -> PendingEntry {
    let Some(comma) = title_separator(rest) else {
        return PendingEntry {
            name: Some("Unknown Station".to_string()),
            ..PendingEntry::default()
        };
    };

    let head = &rest[..comma];
    let title = rest[comma + 1..].trim();

    let attributes: BTreeMap<String, String> = attribute_regex()
        .captures_iter(head)
        .map(|c| (c[1].to_ascii_lowercase(), c[2].to_string()))
        .collect();
    let group = attributes
        .get("group-title")
        .filter(|g| !g.is_empty())
        .cloned();

    PendingEntry {
        name: Some(if title.is_empty() {
            "Unknown Station".to_string()
        } else {
            title.to_string()
        }),
        group,
        attributes,
    }
}

/// Byte offset of the first comma outside double quotes.
fn title_separator(s: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

fn attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([A-Za-z0-9_-]+)="([^"]*)""#).expect("static regex"))
}

/// A station URL needs both a scheme and a host.
pub fn is_valid_station_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(url) => !url.scheme().is_empty() && url.host_str().map_or(false, |h| !h.is_empty()),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extended_playlist() {
        let content = "#EXTM3U\n\
            #EXTINF:-1 tvg-logo=\"http://x/logo.png\" group-title=\"Jazz\",Radio Swiss Jazz\n\
            https://stream.srg-ssr.ch/m/rsj/mp3_128\n\
            #EXTINF:0,Radio Paradise\n\
            #EXTGRP:Eclectic\n\
            http://stream.radioparadise.com/mp3-192\n";
        let stations = parse_m3u(content);
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].name, "Radio Swiss Jazz");
        assert_eq!(stations[0].group.as_deref(), Some("Jazz"));
        assert_eq!(
            stations[0].attributes.get("tvg-logo").map(String::as_str),
            Some("http://x/logo.png")
        );
        assert_eq!(stations[1].name, "Radio Paradise");
        assert_eq!(stations[1].group.as_deref(), Some("Eclectic"));
    }

    #[test]
    fn test_positional_names() {
        let content = "http://a.example/stream\n#EXTINF:-1,Named\nhttp://b.example/\nhttp://c.example/live\n";
        let stations = parse_m3u(content);
        let names: Vec<&str> = stations.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Station 1", "Named", "Station 3"]);
    }

    #[test]
    fn test_invalid_urls_never_produce_stations() {
        let content = "#EXTINF:-1,Broken\nnot a url\nfile-without-scheme.mp3\nhttp://\nhttps://ok.example/s\n";
        let stations = parse_m3u(content);
        assert_eq!(stations.len(), 1);
        // The pending title survives the invalid lines and lands on the next valid URL.
        assert_eq!(stations[0].name, "Broken");
        for s in &stations {
            assert!(is_valid_station_url(&s.url));
        }
    }

    #[test]
    fn test_dangling_extinf_is_discarded() {
        let content = "#EXTINF:-1,First\n#EXTINF:-1,Second\nhttp://x.example/\n#EXTINF:-1,Orphan\n";
        let stations = parse_m3u(content);
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].name, "Second");
    }

    #[test]
    fn test_comma_inside_quoted_attribute() {
        let content = "#EXTINF:-1 tvg-name=\"Rock, Pop\",Hits FM\nhttp://hits.example/\n";
        let stations = parse_m3u(content);
        assert_eq!(stations[0].name, "Hits FM");
        assert_eq!(
            stations[0].attributes.get("tvg-name").map(String::as_str),
            Some("Rock, Pop")
        );
    }

    #[test]
    fn test_malformed_extinf_named_unknown() {
        let stations = parse_m3u("#EXTINF:-1 no comma here\nhttp://x.example/\n");
        assert_eq!(stations[0].name, "Unknown Station");
    }

    #[test]
    fn test_load_latin1_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radios.m3u");
        let mut bytes = b"#EXTINF:-1,Radio Fran".to_vec();
        bytes.push(0xE7); // 'ç' in Latin-1
        bytes.extend_from_slice(b"aise\nhttp://fr.example/live\n");
        std::fs::write(&path, bytes).unwrap();

        let catalog = StationCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(0).unwrap().name, "Radio Française");
    }

    #[test]
    fn test_load_missing_file() {
        let err = StationCatalog::load(Path::new("/definitely/not/here.m3u")).unwrap_err();
        assert!(err.to_string().contains("not/here.m3u"));
    }
}
