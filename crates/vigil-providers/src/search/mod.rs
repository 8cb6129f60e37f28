pub mod duckduckgo;
pub mod tavily;

pub use duckduckgo::DuckDuckGoSearchProvider;
pub use tavily::TavilySearchProvider;
