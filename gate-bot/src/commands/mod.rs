//! 組み込みコマンド
//!
//! ボットに同梱するコマンドとコンポーネントハンドラーを登録する。

pub mod avatar;
pub mod color;
pub mod confirm;
pub mod panel;
pub mod ping;
pub mod quote;
pub mod say;
pub mod status;

use crate::framework::FrameworkBuilder;
use crate::handler::SerenityEvent;

/// 全ての組み込みコマンドを登録
pub fn register(builder: FrameworkBuilder<SerenityEvent>) -> FrameworkBuilder<SerenityEvent> {
    builder
        .command(ping::Ping::new())
        .command(avatar::Avatar::new())
        .command(quote::Quote::new())
        .command(say::Say::new())
        .command(status::Status::new())
        .command(panel::Panel::new())
        .button(confirm::Confirm)
        .select_menu(color::ColorSelect)
}
