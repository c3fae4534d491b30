use url::Url;

use crate::apod::Record;

const EMBED_MARKER: &str = "youtube.com/embed/";
const WATCH_MARKER: &str = "youtube.com/watch";
const SHORT_MARKER: &str = "youtu.be/";

pub const WATCH_URL_BASE: &str = "https://www.youtube.com/watch?v=";
pub const THUMBNAIL_HOST: &str = "https://img.youtube.com/vi";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Image,
    VideoWithThumbnail,
    VideoNoThumbnail,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    Image {
        display_url: Option<String>,
    },
    Video(VideoLinks),
    Unsupported {
        media_type: String,
    },
}

impl Media {
    pub fn variant(&self) -> Variant {
        match self {
            Media::Image { .. } => Variant::Image,
            Media::Video(links) if links.thumbnail_url.is_some() => Variant::VideoWithThumbnail,
            Media::Video(_) => Variant::VideoNoThumbnail,
            Media::Unsupported { .. } => Variant::Unsupported,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoLinks {
    pub watch_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkShape {
    Embed,
    Watch,
    Short,
}

impl LinkShape {
    fn detect(url: &str) -> Option<Self> {
        if url.contains(EMBED_MARKER) {
            Some(LinkShape::Embed)
        } else if url.contains(WATCH_MARKER) {
            Some(LinkShape::Watch)
        } else if url.contains(SHORT_MARKER) {
            Some(LinkShape::Short)
        } else {
            None
        }
    }

    fn identifier(self, url: &str) -> Option<String> {
        let raw = match self {
            LinkShape::Embed => {
                let (_, rest) = url.split_once(EMBED_MARKER)?;
                rest.split(['?', '#', '/']).next()?.to_string()
            }
            LinkShape::Watch => {
                let parsed = Url::parse(url).ok()?;
                let (_, value) = parsed.query_pairs().find(|(key, _)| key == "v")?;
                value.into_owned()
            }
            LinkShape::Short => {
                let parsed = Url::parse(url).ok()?;
                parsed.path_segments()?.next()?.to_string()
            }
        };
        valid_identifier(&raw).then_some(raw)
    }
}

fn valid_identifier(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

pub fn watch_url_for(id: &str) -> String {
    format!("{WATCH_URL_BASE}{id}")
}

pub fn thumbnail_url_for(id: &str) -> String {
    format!("{THUMBNAIL_HOST}/{id}/hqdefault.jpg")
}

pub fn resolve(record: &Record) -> Media {
    match record.media_type.as_str() {
        "image" => Media::Image {
            display_url: record.hdurl().or(record.url()).map(str::to_string),
        },
        "video" => Media::Video(resolve_video(record.url(), record.thumbnail_url())),
        other => Media::Unsupported {
            media_type: other.to_string(),
        },
    }
}

/// Never fails: any URL shape it cannot read falls back to the inputs as given,
/// and a supplied thumbnail always wins over a derived one.
pub fn resolve_video(url: Option<&str>, thumbnail_url: Option<&str>) -> VideoLinks {
    let fallback = VideoLinks {
        watch_url: url.map(str::to_string),
        thumbnail_url: thumbnail_url.map(str::to_string),
    };
    let Some(url) = url else {
        return fallback;
    };
    let Some(shape) = LinkShape::detect(url) else {
        return fallback;
    };
    let Some(id) = shape.identifier(url) else {
        tracing::debug!(url, ?shape, "could not extract video identifier");
        return fallback;
    };

    // A watch link is already canonical; its query (t=, list=) stays intact.
    let watch_url = match shape {
        LinkShape::Watch => url.to_string(),
        LinkShape::Embed | LinkShape::Short => watch_url_for(&id),
    };
    VideoLinks {
        watch_url: Some(watch_url),
        thumbnail_url: fallback
            .thumbnail_url
            .or_else(|| Some(thumbnail_url_for(&id))),
    }
}

pub fn unsupported_message(media_type: &str) -> String {
    if media_type.trim().is_empty() {
        "Unsupported media type: (none)".to_string()
    } else {
        format!("Unsupported media type: {media_type}")
    }
}
