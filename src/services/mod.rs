pub mod accounts;
pub mod aggregator;
pub mod catalog;
pub mod comments;
pub mod feed;
pub mod home;
pub mod ledger;
pub mod matrix_cache;
pub mod outbound;
pub mod reader;
pub mod recommendation;
pub mod similarity;
