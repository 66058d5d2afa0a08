mod crawler;

pub use crawler::ArticleCrawler;
