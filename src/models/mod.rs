mod article;
mod discovery;
mod news_source;

pub use article::{ArticleLink, Candidate, ContentDocument};
pub use discovery::{
    name_key, ConfidenceLevel, DiscoveryFilter, DiscoveryStatus, DiscoveryUpdate, NewDiscovery,
    TechnologyDiscovery,
};
pub use news_source::{NewNewsSource, NewsSource, SourceUpdate};
