//! Interactive shell hosting the guard
//!
//! Every input line counts as a key press. While locked only `setup`,
//! `unlock`, `status`, `help` and `quit` do anything useful.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use applock_core::{ActivityKind, IdleMonitor, LockGuard, LockState, Visibility};
use tokio::io::{AsyncBufReadExt, BufReader};
use zeroize::Zeroizing;

const HELP: &str = "\
Commands:
  setup <username> <pin>    Set (or reset) the 5-digit PIN
  unlock <username> <pin>   Unlock with username and PIN
  lock                      Lock now
  status                    Show lock state and idle budget
  timeout <minutes>         Set the idle budget (minimum 1)
  hide | show               Simulate the window losing/regaining focus
  help                      Show this help
  quit                      Exit";

/// Parsed shell input
pub enum Command {
    Setup {
        username: String,
        pin: Zeroizing<String>,
    },
    Unlock {
        username: String,
        pin: Zeroizing<String>,
    },
    Lock,
    Status,
    Timeout(u64),
    Hide,
    Show,
    Help,
    Quit,
}

/// Input that isn't a valid command
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// Parse one line; blank lines yield `None`
pub fn parse_command(line: &str) -> Result<Option<Command>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("setup", [username, pin]) => Command::Setup {
            username: username.to_string(),
            pin: Zeroizing::new(pin.to_string()),
        },
        ("setup", _) => return Err(ParseError::Usage("setup <username> <pin>")),
        ("unlock", [username, pin]) => Command::Unlock {
            username: username.to_string(),
            pin: Zeroizing::new(pin.to_string()),
        },
        ("unlock", _) => return Err(ParseError::Usage("unlock <username> <pin>")),
        ("lock", []) => Command::Lock,
        ("status", []) => Command::Status,
        ("timeout", [minutes]) => match minutes.parse() {
            Ok(m) => Command::Timeout(m),
            Err(_) => return Err(ParseError::Usage("timeout <minutes>")),
        },
        ("timeout", _) => return Err(ParseError::Usage("timeout <minutes>")),
        ("hide", []) => Command::Hide,
        ("show", []) => Command::Show,
        ("help", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        (other, _) => return Err(ParseError::Unknown(other.to_string())),
    };

    Ok(Some(command))
}

/// Result of executing a command
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Continue(String),
    Quit,
}

/// Host shell around a mounted guard
pub struct Shell {
    guard: Arc<LockGuard>,
}

impl Shell {
    pub fn new(guard: Arc<LockGuard>) -> Self {
        Self { guard }
    }

    pub fn prompt(&self) -> &'static str {
        let state = self.guard.state();
        if state.needs_setup {
            "setup> "
        } else if state.is_locked {
            "locked> "
        } else {
            "applock> "
        }
    }

    pub async fn execute(&self, command: Command) -> Outcome {
        let message = match command {
            Command::Setup { username, pin } => match self.guard.setup(&username, &pin).await {
                Ok(()) => "PIN saved. Unlocked.".to_string(),
                Err(e) => e.to_string(),
            },
            Command::Unlock { username, pin } => match self.guard.unlock(&username, &pin).await {
                Ok(()) => "Unlocked.".to_string(),
                Err(e) => e.to_string(),
            },
            Command::Lock => {
                self.guard.lock();
                "Locked.".to_string()
            }
            Command::Status => self.status(),
            Command::Timeout(minutes) => {
                if self.guard.is_locked() {
                    "Unlock first to change the idle budget".to_string()
                } else {
                    self.guard.update_lock_after_minutes(minutes);
                    format!("Idle lock after {}", format_duration(self.guard.lock_after()))
                }
            }
            Command::Hide => {
                self.guard.handle_visibility(Visibility::Hidden);
                "Hidden.".to_string()
            }
            Command::Show => {
                self.guard.handle_visibility(Visibility::Visible);
                describe(&self.guard.state())
            }
            Command::Help => HELP.to_string(),
            Command::Quit => return Outcome::Quit,
        };
        Outcome::Continue(message)
    }

    fn status(&self) -> String {
        let mut out = describe(&self.guard.state());
        out.push_str(&format!(
            "\nIdle budget: {}",
            format_duration(self.guard.lock_after())
        ));
        if let Some(remaining) = self.guard.time_until_lock() {
            out.push_str(&format!("\nLocks in: {}", format_duration(remaining)));
        }
        out
    }

    /// Read commands from stdin until `quit` or EOF
    pub async fn run(self) -> Result<()> {
        let monitor = IdleMonitor::spawn(self.guard.clone());
        let sink = monitor.sink();
        let mut state_rx = self.guard.subscribe();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut warn_ticker = tokio::time::interval(self.guard.config().check_interval);
        let mut warned = false;

        println!("{}", describe(&self.guard.state()));
        print_prompt(self.prompt())?;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    sink.activity(ActivityKind::KeyPress);
                    warned = false;

                    match parse_command(&line) {
                        Ok(Some(command)) => match self.execute(command).await {
                            Outcome::Continue(message) => println!("{}", message),
                            Outcome::Quit => break,
                        },
                        Ok(None) => {}
                        Err(e) => println!("{}", e),
                    }
                    // The command already reported its own transition
                    state_rx.borrow_and_update();
                    print_prompt(self.prompt())?;
                }
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = state_rx.borrow_and_update().clone();
                    if state.is_locked && !state.needs_setup {
                        println!("\n{}", describe(&state));
                        print_prompt(self.prompt())?;
                    }
                }
                _ = warn_ticker.tick() => {
                    if !warned && self.guard.should_warn() {
                        if let Some(remaining) = self.guard.time_until_lock() {
                            println!(
                                "\nLocking in {} unless there is activity",
                                format_duration(remaining)
                            );
                            print_prompt(self.prompt())?;
                            warned = true;
                        }
                    }
                }
            }
        }

        monitor.shutdown().await;
        tracing::debug!("Shell exited");
        Ok(())
    }
}

fn print_prompt(prompt: &str) -> Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{}", prompt)?;
    stdout.flush()?;
    Ok(())
}

/// One-line summary of a lock state
pub fn describe(state: &LockState) -> String {
    if state.needs_setup {
        "No PIN set. Run 'setup <username> <pin>'.".to_string()
    } else if state.is_locked {
        "Locked. Run 'unlock <username> <pin>'.".to_string()
    } else {
        match &state.username {
            Some(name) => format!("Unlocked as {}.", name),
            None => "Unlocked.".to_string(),
        }
    }
}

/// Format as MM:SS
pub fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use applock_core::{GuardBackends, GuardConfig, PrincipalId};
    use rstest::rstest;
    use std::time::Duration;

    async fn mounted_shell() -> Shell {
        let guard = Arc::new(LockGuard::new(
            Some(PrincipalId::from("collector-7")),
            GuardBackends::in_memory(),
            GuardConfig::default(),
        ));
        guard.mount().await.unwrap();
        Shell::new(guard)
    }

    fn message(outcome: Outcome) -> String {
        match outcome {
            Outcome::Continue(message) => message,
            Outcome::Quit => panic!("unexpected quit"),
        }
    }

    async fn run_line(shell: &Shell, line: &str) -> String {
        let command = parse_command(line).unwrap().unwrap();
        message(shell.execute(command).await)
    }

    #[test]
    fn test_parse_setup() {
        match parse_command("setup colA 13579").unwrap() {
            Some(Command::Setup { username, pin }) => {
                assert_eq!(username, "colA");
                assert_eq!(pin.as_str(), "13579");
            }
            _ => panic!("expected setup"),
        }
    }

    #[rstest]
    #[case("setup colA", ParseError::Usage("setup <username> <pin>"))]
    #[case("unlock", ParseError::Usage("unlock <username> <pin>"))]
    #[case("timeout soon", ParseError::Usage("timeout <minutes>"))]
    #[case("dance", ParseError::Unknown("dance".to_string()))]
    fn test_parse_errors(#[case] line: &str, #[case] expected: ParseError) {
        assert_eq!(parse_command(line).err(), Some(expected));
    }

    #[test]
    fn test_parse_blank_and_quit() {
        assert!(parse_command("   ").unwrap().is_none());
        assert!(matches!(parse_command("EXIT").unwrap(), Some(Command::Quit)));
    }

    #[tokio::test]
    async fn test_setup_lock_unlock_flow() {
        let shell = mounted_shell().await;
        assert_eq!(shell.prompt(), "setup> ");

        assert_eq!(run_line(&shell, "setup colA 1234").await, "PIN must be exactly 5 digits");
        assert_eq!(run_line(&shell, "setup colA 13579").await, "PIN saved. Unlocked.");
        assert_eq!(shell.prompt(), "applock> ");

        assert_eq!(run_line(&shell, "lock").await, "Locked.");
        assert_eq!(shell.prompt(), "locked> ");

        assert_eq!(
            run_line(&shell, "setup colA 24680").await,
            "Unlock first to change the PIN"
        );
        assert_eq!(
            run_line(&shell, "unlock colA 24680").await,
            "Invalid username or PIN"
        );
        assert_eq!(run_line(&shell, "unlock colA 13579").await, "Unlocked.");
    }

    #[tokio::test]
    async fn test_timeout_command() {
        let shell = mounted_shell().await;
        assert_eq!(
            run_line(&shell, "timeout 3").await,
            "Unlock first to change the idle budget"
        );

        run_line(&shell, "setup colA 13579").await;
        assert_eq!(run_line(&shell, "timeout 0").await, "Idle lock after 01:00");
        assert_eq!(run_line(&shell, "timeout 10").await, "Idle lock after 10:00");
    }

    #[tokio::test]
    async fn test_status_and_quit() {
        let shell = mounted_shell().await;
        run_line(&shell, "setup colA 13579").await;

        let status = run_line(&shell, "status").await;
        assert!(status.starts_with("Unlocked as colA."));
        assert!(status.contains("Idle budget: 05:00"));

        let quit = shell.execute(Command::Quit).await;
        assert_eq!(quit, Outcome::Quit);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(125)), "02:05");
        assert_eq!(format_duration(Duration::ZERO), "00:00");
    }
}
