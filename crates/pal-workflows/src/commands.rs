//! `!`-prefixed chat commands and the static posts they answer with.

use chrono::NaiveDateTime;
use pal_core::types::Post;

pub const COMMAND_PREFIX: char = '!';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Remind,
    Status,
    Jobs,
    Diagnose,
    Help,
    Welcome,
}

impl BotCommand {
    /// Parse the first word of a message. Anything else is not a command.
    pub fn parse(content: &str) -> Option<Self> {
        let word = content.split_whitespace().next()?;
        let name = word.strip_prefix(COMMAND_PREFIX)?;
        match name {
            "remind" => Some(Self::Remind),
            "status" => Some(Self::Status),
            "jobs" => Some(Self::Jobs),
            "diagnose" => Some(Self::Diagnose),
            "help" => Some(Self::Help),
            "welcome" => Some(Self::Welcome),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Remind => "remind",
            Self::Status => "status",
            Self::Jobs => "jobs",
            Self::Diagnose => "diagnose",
            Self::Help => "help",
            Self::Welcome => "welcome",
        }
    }

    /// Plain-text acknowledgement sent after the command ran.
    pub fn ack(self) -> Option<&'static str> {
        match self {
            Self::Remind => Some("Manual reminder sent!"),
            Self::Status => Some("Manual status check initiated!"),
            Self::Jobs => Some("Manual job application tracker initiated!"),
            Self::Welcome => Some("Welcome message sent!"),
            Self::Diagnose | Self::Help => None,
        }
    }
}

pub fn help_post() -> Post {
    Post::new("ProductivityPal Help", "Here are the available commands:")
        .color(0x3498db)
        .field("!remind", "Trigger a manual reminder")
        .field("!status", "Trigger a manual status check")
        .field("!jobs", "Trigger the job application tracker")
        .field("!help", "Show this help message")
        .field("!diagnose", "Check bot health and diagnose issues")
        .field("!welcome", "Resend the welcome message")
}

pub fn welcome_post(now: NaiveDateTime) -> Post {
    Post::new(
        "👋 Hello There!",
        "I'm your Productivity Assistant Bot! Nice to meet you!",
    )
    .color(0x1abc9c)
    .timestamp(now)
    .field(
        "What I Can Do",
        "I'll help you stay productive with reminders, status checks, and job application tracking.",
    )
    .field("Getting Started", "Type `!help` to see all available commands.")
    .footer("I'm here to help you succeed!")
}
