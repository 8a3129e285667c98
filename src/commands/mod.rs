pub mod invocation;
pub mod scrape;
