//! Scripted driver: plays one simulated user from a fixed list of steps.

use std::{collections::VecDeque, convert::Infallible, time::Duration};

use secretchat_app::{App, Driver, UserCommand};
use secretchat_core::{Environment, MessageId, RevealStatus};
use tracing::{debug, info};

use crate::render;

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Issue a command
    Command(UserCommand),
    /// Reveal every message still hidden at this point
    RevealAll,
    /// Do nothing for a while
    Wait(Duration),
}

/// Timing of a scripted user.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Delay before joining
    pub join_delay: Duration,
    /// Gap between sends
    pub send_gap: Duration,
    /// Time allowed for reveals to finish before leaving
    pub reveal_wait: Duration,
}

/// Script for `user`: join, send `messages` lines, reveal everything, wait,
/// and quit.
pub fn build_script(user: &str, secret: &str, messages: usize, pacing: Pacing) -> Vec<Step> {
    let mut steps =
        vec![Step::Wait(pacing.join_delay), Step::Command(UserCommand::Join(secret.into()))];
    for n in 1..=messages {
        steps.push(Step::Wait(pacing.send_gap));
        steps.push(Step::Command(UserCommand::Send(format!("{user} reporting in, note {n}"))));
    }
    steps.extend([
        Step::Wait(pacing.send_gap),
        Step::RevealAll,
        Step::Wait(pacing.reveal_wait),
        Step::Command(UserCommand::Quit),
    ]);
    steps
}

/// Driver that replays a script and logs what it would have drawn.
pub struct ScriptDriver {
    user: String,
    steps: VecDeque<Step>,
    /// Reveal commands waiting to be issued
    queued: VecDeque<UserCommand>,
    hidden: Vec<MessageId>,
    shown: usize,
    /// Last settled frame written at info level
    settled: String,
}

impl ScriptDriver {
    /// Driver for `user` playing `steps`.
    pub fn new(user: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            user: user.into(),
            steps: steps.into(),
            queued: VecDeque::new(),
            hidden: Vec::new(),
            shown: 0,
            settled: String::new(),
        }
    }
}

impl Driver for ScriptDriver {
    type Error = Infallible;

    async fn next_command(&mut self) -> Result<Option<UserCommand>, Self::Error> {
        loop {
            if let Some(command) = self.queued.pop_front() {
                return Ok(Some(command));
            }
            match self.steps.pop_front() {
                None => return Ok(None),
                Some(Step::Command(command)) => return Ok(Some(command)),
                Some(Step::RevealAll) => {
                    self.queued.extend(self.hidden.drain(..).map(UserCommand::Reveal));
                },
                Some(Step::Wait(duration)) => tokio::time::sleep(duration).await,
            }
        }
    }

    fn render<E: Environment>(&mut self, app: &App<E>) -> Result<(), Self::Error> {
        let views = app.messages();
        self.hidden = views
            .iter()
            .filter(|view| view.reveal.status == RevealStatus::Hidden)
            .map(|view| view.id.clone())
            .collect();

        if views.len() != self.shown {
            self.shown = views.len();
            info!(user = %self.user, messages = views.len(), "{}", render::status_line(app));
        }

        let frame = render::frame(app);
        let animating = views.iter().any(|view| view.reveal.status == RevealStatus::Revealing);
        if !animating && !views.is_empty() && frame != self.settled {
            info!(user = %self.user, "\n{frame}");
            self.settled = frame;
        } else {
            debug!(user = %self.user, "\n{frame}");
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.steps.clear();
        self.queued.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pacing() -> Pacing {
        Pacing {
            join_delay: Duration::from_millis(10),
            send_gap: Duration::from_millis(20),
            reveal_wait: Duration::from_secs(7),
        }
    }

    #[test]
    fn script_joins_sends_reveals_and_quits() {
        let steps = build_script("alice", "orchid", 2, pacing());

        assert_eq!(steps[1], Step::Command(UserCommand::Join("orchid".into())));
        let sends = steps
            .iter()
            .filter(|step| matches!(step, Step::Command(UserCommand::Send(_))))
            .count();
        assert_eq!(sends, 2);
        assert_eq!(steps.last(), Some(&Step::Command(UserCommand::Quit)));
        assert!(steps.contains(&Step::RevealAll));
    }

    #[tokio::test]
    async fn reveal_all_expands_to_hidden_messages() {
        let mut driver = ScriptDriver::new("alice", vec![Step::RevealAll]);
        driver.hidden = vec![MessageId::new("a"), MessageId::new("b")];

        let first = driver.next_command().await.unwrap();
        let second = driver.next_command().await.unwrap();

        assert_eq!(first, Some(UserCommand::Reveal(MessageId::new("a"))));
        assert_eq!(second, Some(UserCommand::Reveal(MessageId::new("b"))));
        assert_eq!(driver.next_command().await.unwrap(), None);
    }
}
