pub mod accounting;
pub mod fanout;
pub mod pipeline;
pub mod relevance;
pub mod simple;
pub mod websearch;

pub use accounting::{HttpAccountant, NoopAccountant, TokenAccountant};
pub use fanout::{FanOutDispatcher, FanOutSlot};
pub use pipeline::RouterCore;
pub use relevance::RelevancePlanner;
pub use simple::enhance_once;
pub use websearch::{ReqwestWebSearch, SearchResult, WebSearchClient};
