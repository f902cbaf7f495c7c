//! Wire protocol codecs: HTTP/1.1 and HTTP/2.

pub mod h1;
pub mod h2;
