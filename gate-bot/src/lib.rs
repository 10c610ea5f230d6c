//! Discordのコマンド・イベントディスパッチフレームワーク
//!
//! スラッシュコマンド、コンテキストメニュー、テキストコマンド、
//! ボタン、セレクトメニューを共通のパイプライン（前処理フック → インヒビター →
//! 管理者判定 → スコープ → 権限 → クールダウン → 実行）で処理する。

pub mod api;
pub mod clock;
pub mod command;
pub mod commands;
pub mod config;
pub mod cooldown;
pub mod dispatcher;
pub mod framework;
pub mod handler;
pub mod inhibitor;
pub mod manager;
pub mod permission;
pub mod permission_cache;
pub mod platform;
pub mod registry;
pub mod responder;
pub mod signal;
