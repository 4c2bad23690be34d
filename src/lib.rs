//! SessionBridge: 署名付きCookieとセッションストレージ
//!
//! サーバレス・HTTPハンドラ向けに、Cookieの署名/検証とセッションの保存先
//! （メモリ・ファイル・KVストア・Cookie自体）を同じインターフェースで提供するライブラリ

pub mod codec;
pub mod common;
pub mod config;
pub mod cookie;
pub mod crypto;
pub mod error;
pub mod session;

pub use common::*;
pub use config::{Backend, SessionConfig};
pub use cookie::{Cookie, CookieOptions, CookieParseOptions, CookieSerializeOptions};
pub use crypto::{HmacSigner, Signer};
pub use error::*;
pub use session::*;
