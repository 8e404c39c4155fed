use std::path::Path;

use anyhow::{anyhow, bail, Result};
use chrono::Local;
use clap::{Parser, ValueEnum};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{
    report::load_summary,
    session::{
        driver::{SessionCommand, SessionDriver, SessionEvent, DEFAULT_TICK_FREQUENCY},
        scheduler::{FirePolicy, ReminderKind},
        shutdown::detect_shutdown,
        SessionContext, SessionSnapshot,
    },
    settings::{Settings, SETTINGS_FILE_NAME},
    storage::history_store::FileHistoryStore,
    utils::{
        clock::DefaultClock,
        time::{format_countdown, format_minutes},
    },
};

use super::history::{history_store, render_report};

const INSTRUCTIONS: &str = "How to use:

1. Set your preferred intervals with 'set <look-away minutes> <break minutes>'
2. Type 'start' to begin a session

When the 20-20-20 reminder appears:
- Look at something 20 feet away
- Maintain this for 20 seconds

When the break reminder appears:
- Take a 5-minute break
- Stretch or walk around

Commands: start, pause, status, reset short|long, set <short> <long>, history, help, quit
";

#[derive(Debug, Parser)]
pub struct RunCommand {
    #[arg(
        long,
        help = "Look-away interval in minutes. Overrides settings for this run",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    short: Option<u64>,
    #[arg(
        long,
        help = "Break interval in minutes. Overrides settings for this run",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    long: Option<u64>,
    #[arg(
        long = "continue-on-reminder",
        help = "Keep the session running when a reminder fires instead of pausing it"
    )]
    continue_on_reminder: bool,
    #[arg(long, help = "Wait for 'start' instead of starting a session right away")]
    paused: bool,
}

impl RunCommand {
    fn apply(&self, settings: Settings) -> Settings {
        Settings {
            short_interval_minutes: self.short.unwrap_or(settings.short_interval_minutes),
            long_interval_minutes: self.long.unwrap_or(settings.long_interval_minutes),
            fire_policy: if self.continue_on_reminder {
                FirePolicy::Continue
            } else {
                settings.fire_policy
            },
            ..settings
        }
    }
}

/// What a line typed at the prompt asks for.
#[derive(Debug)]
enum PromptCommand {
    Session(SessionCommand),
    Status,
    History,
    Help,
    Quit,
    Empty,
}

/// Runs a session in the current terminal. Stops once the user quits, stdin closes or ctrl-c is
/// pressed. A running session is always written to history before returning.
pub async fn process_run_command(command: RunCommand, app_dir: &Path) -> Result<()> {
    let settings = command.apply(Settings::load(&app_dir.join(SETTINGS_FILE_NAME)).await?);
    let scheduler = settings.scheduler()?;

    let shutdown = CancellationToken::new();
    let (command_sender, command_receiver) = mpsc::channel::<SessionCommand>(16);
    let (event_sender, event_receiver) = mpsc::channel::<SessionEvent>(64);

    let context = SessionContext::new(scheduler, history_store(app_dir)?, settings.retention_days);
    let driver = SessionDriver::new(
        context,
        command_receiver,
        event_sender,
        shutdown.clone(),
        DEFAULT_TICK_FREQUENCY,
        Box::new(DefaultClock),
    );

    print!("{INSTRUCTIONS}");
    if !command.paused {
        command_sender.send(SessionCommand::Start).await?;
    }

    let prompt = Prompt {
        commands: command_sender,
        history: history_store(app_dir)?,
        summary_days: settings.summary_days,
        shutdown: shutdown.clone(),
    };

    let (_, driver_result, prompt_result, _) = tokio::join!(
        detect_shutdown(shutdown.clone()),
        driver.run(),
        prompt.run(spawn_stdin_reader()),
        print_events(event_receiver, settings.fire_policy),
    );

    if let Err(e) = &prompt_result {
        error!("Prompt stopped with an error {e:?}");
    }
    driver_result?;
    prompt_result
}

/// Stdin is read on a plain thread. A blocking read inside the runtime would keep it alive after
/// the session is done.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (sender, receiver) = mpsc::channel(8);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else {
                break;
            };
            if sender.blocking_send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

struct Prompt {
    commands: mpsc::Sender<SessionCommand>,
    history: FileHistoryStore,
    summary_days: u32,
    shutdown: CancellationToken,
}

impl Prompt {
    async fn run(self, mut lines: mpsc::Receiver<String>) -> Result<()> {
        loop {
            let line = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                line = lines.recv() => line,
            };
            // Closed stdin means there is nobody left to talk to.
            let Some(line) = line else {
                debug!("Stdin closed");
                break;
            };

            match parse_prompt(&line) {
                Ok(PromptCommand::Quit) => break,
                Ok(PromptCommand::Empty) => {}
                Ok(PromptCommand::Help) => print!("{INSTRUCTIONS}"),
                Ok(PromptCommand::Session(command)) => self.send(command).await?,
                Ok(PromptCommand::Status) => {
                    let (sender, receiver) = oneshot::channel();
                    self.send(SessionCommand::Snapshot(sender)).await?;
                    println!("{}", describe_snapshot(&receiver.await?));
                }
                Ok(PromptCommand::History) => {
                    let today = Local::now().date_naive();
                    match load_summary(&self.history, self.summary_days, today).await {
                        Ok(summary) => print!("{}", render_report(&summary)),
                        Err(e) => println!("Couldn't read history: {e:#}"),
                    }
                }
                Err(e) => println!("{e}"),
            }
        }

        // Dropping the command sender lets the driver finish as well.
        self.shutdown.cancel();
        Ok(())
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("Session driver is no longer running"))
    }
}

fn parse_prompt(line: &str) -> Result<PromptCommand> {
    let words = line.split_whitespace().collect::<Vec<_>>();
    let command = match words.as_slice() {
        [] => PromptCommand::Empty,
        ["start"] => PromptCommand::Session(SessionCommand::Start),
        ["pause" | "stop"] => PromptCommand::Session(SessionCommand::Stop),
        ["status"] => PromptCommand::Status,
        ["history"] => PromptCommand::History,
        ["help" | "?"] => PromptCommand::Help,
        ["quit" | "exit"] => PromptCommand::Quit,
        ["reset", which] => {
            let Ok(kind) = ReminderKind::from_str(which, true) else {
                bail!("Unknown timer {which:?}, use short or long");
            };
            PromptCommand::Session(SessionCommand::Reset(kind))
        }
        ["set", short, long] => {
            let (Ok(short), Ok(long)) = (short.parse::<u64>(), long.parse::<u64>()) else {
                bail!("Please enter valid numbers");
            };
            if short == 0 || long == 0 {
                bail!("Please enter valid numbers");
            }
            PromptCommand::Session(SessionCommand::Configure {
                short_interval: short.saturating_mul(60),
                long_interval: long.saturating_mul(60),
            })
        }
        _ => bail!("Unknown command {:?}, type 'help' for the list of commands", line.trim()),
    };
    Ok(command)
}

async fn print_events(mut events: mpsc::Receiver<SessionEvent>, policy: FirePolicy) {
    while let Some(event) = events.recv().await {
        if let Some(text) = describe_event(&event, policy) {
            println!("{text}");
        }
    }
}

/// Text shown for a session event. Per second ticks are not printed.
fn describe_event(event: &SessionEvent, policy: FirePolicy) -> Option<String> {
    let text = match event {
        SessionEvent::Started { at, countdowns } => {
            format!("Session started at {}. {countdowns}", at.format("%H:%M:%S"))
        }
        SessionEvent::Tick(_) => return None,
        SessionEvent::ReminderDue(kind) => {
            let mut text = format!("\x07{}", reminder_text(*kind));
            if policy == FirePolicy::PauseSession {
                text += "\nSession paused, type 'start' when you are back.";
            }
            text
        }
        SessionEvent::CountdownsChanged(countdowns) => format!("Timers reset: {countdowns}"),
        SessionEvent::Stopped { record: Some(record) } => format!(
            "Session stopped, recorded {} for {}",
            format_minutes(record.minutes),
            record.date
        ),
        SessionEvent::Stopped { record: None } => "Session stopped".to_string(),
        SessionEvent::Rejected(reason) => format!("Can't do that: {reason}"),
        SessionEvent::PersistenceFailed(reason) => format!("Warning: {reason}"),
    };
    Some(text)
}

fn reminder_text(kind: ReminderKind) -> &'static str {
    match kind {
        ReminderKind::LookAway => {
            "20-20-20 Rule Reminder\n\
             Time to follow the 20-20-20 rule:\n\
             Look at something 20 feet away for 20 seconds!"
        }
        ReminderKind::Break => {
            "Break Reminder\n\
             Time for a 5-minute break!\n\
             Suggestions:\n\
             - Stretch your body\n\
             - Walk around\n\
             - Hydrate yourself"
        }
    }
}

fn describe_snapshot(snapshot: &SessionSnapshot) -> String {
    let state = if snapshot.session.active {
        format!(
            "Session running for {}",
            format_countdown(snapshot.session.elapsed_seconds)
        )
    } else {
        "No session running".to_string()
    };
    format!("{state}. {}", snapshot.countdowns)
}
