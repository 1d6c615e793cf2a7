use colored::*;
use std::io::{self, Write};

use crate::core::{HandleType, Message, StreamSource};
use crate::runtime::sinks::ReportSink;

/// Console handles terminal input and the banner with colored formatting
pub struct Console {
    user_color: Color,
}

impl Console {
    pub fn new() -> Self {
        Self {
            user_color: Color::Cyan,
        }
    }

    /// Read a line of user input
    pub fn read_input(&self) -> io::Result<String> {
        print!("{} ", ">".color(self.user_color).bold());
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }

    pub fn print_banner(&self, agents: &[String]) {
        println!("{}", "=".repeat(60).bright_blue());
        println!("{}", "  wiseagent - multi-agent runtime".bright_blue().bold());
        println!("{}", "=".repeat(60).bright_blue());
        println!();
        println!("Agents: {}", agents.join(", ").bold());
        println!("Type `name: message` to address an agent (`all: ...` for everyone).");
        println!("Type 'exit' or 'quit' to end the session.");
        println!();
    }

    pub fn print_error(&self, error: &str) {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

/// Report sink printing every message to stdout
///
/// Plain messages are printed and passed on to later sinks. Streaming
/// messages are printed live; with `claim_streams` (the default) the sink
/// also claims them.
pub struct ConsoleSink {
    claim_streams: bool,
    show_lifecycle: bool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            claim_streams: true,
            show_lifecycle: true,
        }
    }

    /// Leave streaming messages to a later sink
    pub fn without_stream_claim(mut self) -> Self {
        self.claim_streams = false;
        self
    }

    /// Hide sleep/wake-up notices
    pub fn quiet(mut self) -> Self {
        self.show_lifecycle = false;
        self
    }

    /// Render one non-streaming message; `None` if it is not shown
    pub fn format_message(&self, message: &Message) -> Option<String> {
        let from = message.send_from.as_str();
        let line = match message.handle_type {
            HandleType::Communication => format!(
                "{} {} {}: {}",
                from.green().bold(),
                "→".bright_black(),
                message.send_to.cyan().bold(),
                message.content
            ),
            HandleType::Thought => format!(
                "{} {}",
                format!("[{}] thinking:", from).yellow(),
                message.content.bright_black()
            ),
            HandleType::BaseActionMessage => format!(
                "{} {}",
                format!("[{}] {}:", from, message.cause_by).magenta(),
                message.content
            ),
            HandleType::FileUpload => format!(
                "{} {} {}",
                format!("[{}] file", from).blue().bold(),
                message.file_name().unwrap_or("unnamed").bold(),
                format!("({} bytes)", message.content.len()).bright_black()
            ),
            HandleType::Sleep | HandleType::Wakeup => {
                if !self.show_lifecycle {
                    return None;
                }
                message.content.bright_black().italic().to_string()
            }
            _ => format!(
                "{} {}",
                format!("[{}] {}:", from, message.handle_type).bright_black(),
                message.content
            ),
        };
        Some(line)
    }

    fn stream_header(message: &Message) -> String {
        match message.file_name() {
            Some(name) => format!(
                "{} {}",
                format!("[{}] writing", message.send_from).blue().bold(),
                name.bold()
            ),
            None => format!("{}", format!("[{}]", message.send_from).green().bold()),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ReportSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn handle_message(&self, message: &Message) -> bool {
        if let Some(line) = self.format_message(message) {
            println!("{}", line);
        }
        false
    }

    async fn handle_stream_message(&self, message: &Message, stream: StreamSource) -> bool {
        if !self.claim_streams {
            return false;
        }
        println!("{}", Self::stream_header(message));
        stream
            .drain(|delta| {
                print!("{}", delta);
                let _ = io::stdout().flush();
            })
            .await;
        println!();
        true
    }
}
