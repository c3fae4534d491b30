use std::sync::Arc;

use crate::apod::{self, FeedError, Record};

pub trait FeedService: Send + Sync {
    fn load_feed(&self, source_url: &str) -> Result<Vec<Record>, FeedError>;
}

pub struct ApodFeedService {
    client: Arc<apod::Client>,
}

impl ApodFeedService {
    pub fn new(client: Arc<apod::Client>) -> Self {
        Self { client }
    }
}

impl FeedService for ApodFeedService {
    fn load_feed(&self, source_url: &str) -> Result<Vec<Record>, FeedError> {
        self.client.load(source_url)
    }
}

/// Canned feed for `--offline`, one record per display variant.
#[derive(Default)]
pub struct MockFeedService;

impl FeedService for MockFeedService {
    fn load_feed(&self, _source_url: &str) -> Result<Vec<Record>, FeedError> {
        Ok(mock_records())
    }
}

fn mock_records() -> Vec<Record> {
    vec![
        Record {
            title: Some("The Crab Nebula".into()),
            date: Some("2024-01-01".into()),
            media_type: "image".into(),
            url: Some("https://apod.nasa.gov/apod/image/2401/crab_1024.jpg".into()),
            hdurl: Some("https://apod.nasa.gov/apod/image/2401/crab_4096.jpg".into()),
            explanation: Some(
                "The Crab Nebula is cataloged as M1, the first object on Charles Messier's \
                 famous list of things which are not comets."
                    .into(),
            ),
            ..Record::default()
        },
        Record {
            title: Some("A Total Solar Eclipse".into()),
            date: Some("2024-01-02".into()),
            media_type: "video".into(),
            url: Some("https://www.youtube.com/embed/abc123?rel=0".into()),
            explanation: Some("Totality, as seen from the path of the Moon's shadow.".into()),
            ..Record::default()
        },
        Record {
            title: Some("Perseids over the Desert".into()),
            date: Some("2024-01-03".into()),
            media_type: "video".into(),
            url: Some("https://vimeo.com/123456".into()),
            explanation: Some("A time-lapse of the Perseid meteor shower.".into()),
            ..Record::default()
        },
        Record {
            title: Some("Interactive Sky Map".into()),
            date: Some("2024-01-04".into()),
            media_type: "other".into(),
            explanation: Some("This entry links to an interactive page.".into()),
            ..Record::default()
        },
    ]
}
