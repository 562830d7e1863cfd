//! Plain-text rendering of an app's observable state.

use secretchat_app::{App, Connectivity, Delivery, MessageView};
use secretchat_core::{Environment, RevealStatus};

/// Header line: active users and connectivity. Nothing derived from the room
/// key is shown.
pub fn status_line<E: Environment>(app: &App<E>) -> String {
    if app.room_key().is_none() {
        return format!("{} is not in a room (/join <secret>)", app.username());
    }

    let mut line = format!("in room | online: {}", app.active_users().join(", "));
    if let Connectivity::Degraded { reason } = app.connectivity() {
        line.push_str(" | degraded: ");
        line.push_str(reason);
    }
    line
}

/// One numbered message row. Numbers start at 1 and are what `/reveal`
/// takes.
pub fn message_row(number: usize, view: &MessageView) -> String {
    let badge = match view.reveal.status {
        RevealStatus::Hidden => "[hidden]".to_string(),
        RevealStatus::Revealing => format!("[decrypting {}%]", view.reveal.percent()),
        RevealStatus::Revealed => "[revealed]".to_string(),
        RevealStatus::Failed => "[failed]".to_string(),
    };
    let mut row =
        format!("#{number:<3} {:<12} {badge} {}", view.sender, view.reveal.rendered_text);
    if view.delivery == Delivery::LocalOnly {
        row.push_str(" (not delivered)");
    }
    row
}

/// Full screen: status, messages, then the notice line if any.
pub fn frame<E: Environment>(app: &App<E>) -> String {
    let mut lines = vec![status_line(app)];
    lines.extend(app.messages().iter().enumerate().map(|(n, view)| message_row(n + 1, view)));
    if let Some(notice) = app.notice() {
        lines.push(format!("! {notice}"));
    }
    lines.join("\n")
}
