//! Judge adapters, one module per site
//!
//! Each module exposes `NAME`, `DEFAULT_BASE_URL`, pure parsers over the
//! site's markup, and a `create` constructor registered in
//! [`crate::scraping::registry`].

pub mod atcoder;
pub mod codechef;
pub mod codeforces;
pub mod cses;

pub use atcoder::AtCoder;
pub use codechef::CodeChef;
pub use codeforces::Codeforces;
pub use cses::Cses;
