//! 共通の抽象化レイヤー（HTTP型、Cookieヘッダー、ユーティリティ）

pub mod header;
pub mod http;
pub mod utils;

pub use header::{parse_cookie_header, CookieAttributes, CookieDecoder, CookieEncoder, SameSite, SetCookie};
pub use http::{Method, Request, Response};
pub use utils::{decode_component, decode_cookie_value, encode_component};
