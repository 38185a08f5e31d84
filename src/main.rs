//! SmartChat CLI
//!
//! A help-desk chat box for the terminal, backed by a remote answer service.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::{Parser, ValueEnum};
use smartchat::backend::{self, spawn_query, AnswerService, FeedbackReporter};
use smartchat::chat::{ChatWidget, ConsoleSink, PendingQuestion, Submission};
use smartchat::protocol::{AnswerResponse, FeedbackReport};
use smartchat::tui::{apply, help_lines, parse_command, App, ChatScreen, CommandOutcome, ParsedCommand};
use smartchat::{BackendKind, SmartChatConfig};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// SmartChat - help-desk chat box
#[derive(Parser, Debug)]
#[command(name = "smartchat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/smartchat/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the answer service
    #[arg(long)]
    service_url: Option<String>,

    /// Which back-end answers questions
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// `menu` field sent with every question
    #[arg(long)]
    menu: Option<String>,

    /// Give up on a question after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Where to post finished feedback
    #[arg(long)]
    feedback_url: Option<String>,

    /// Verbose output: debug-level logs
    #[arg(short, long)]
    verbose: bool,

    /// Disable TUI and use plain text mode
    #[arg(long)]
    no_tui: bool,

    /// Write logs to this file (the TUI logs nowhere otherwise)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Http,
    Legacy,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Http => BackendKind::Http,
            BackendArg::Legacy => BackendKind::Legacy,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_file.as_deref(), cli.no_tui)?;

    let config = resolve_config(&cli)?;
    let service = backend::from_config(&config)?;
    let reporter = FeedbackReporter::from_config(&config)?;
    info!(backend = service.name(), url = %config.query_url(), "Starting SmartChat");

    if cli.no_tui {
        run_plain_mode(&config, service, reporter).await
    } else {
        run_tui_mode(&config, service, reporter).await
    }
}

fn init_logging(verbose: bool, log_file: Option<&Path>, plain: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else if plain {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(io::stderr)
            .init();
    }
    // The TUI owns the screen, so without a log file logs are dropped.
    Ok(())
}

/// Config file first, then command-line overrides
fn resolve_config(cli: &Cli) -> anyhow::Result<SmartChatConfig> {
    let mut config = SmartChatConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.service_url {
        config = config.with_service_url(url.clone());
    }
    if let Some(backend) = cli.backend {
        config = config.with_backend(backend.into());
    }
    if let Some(menu) = &cli.menu {
        config = config.with_menu(menu.clone());
    }
    if let Some(secs) = cli.timeout {
        config = config.with_request_timeout(Some(secs));
    }
    if let Some(url) = &cli.feedback_url {
        config = config.with_feedback_url(Some(url.clone()));
    }
    Ok(config)
}

async fn run_tui_mode(
    config: &SmartChatConfig,
    service: Arc<dyn AnswerService>,
    reporter: Option<FeedbackReporter>,
) -> anyhow::Result<()> {
    let screen = ChatScreen::new(service, reporter, &config.menu);
    let mut app = App::new(screen, config.web_root.clone())?;

    // Run TUI (this blocks until quit)
    app.run().await?;
    Ok(())
}

async fn run_plain_mode(
    config: &SmartChatConfig,
    service: Arc<dyn AnswerService>,
    reporter: Option<FeedbackReporter>,
) -> anyhow::Result<()> {
    let (answer_tx, mut answer_rx) = mpsc::unbounded_channel();
    let mut session = PlainSession::new(io::stdout(), service, reporter, &config.menu, answer_tx);

    // Spawn blocking thread to read from stdin
    let (line_tx, mut line_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    eprintln!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            line = line_rx.recv() => match line {
                Some(line) => {
                    if !session.handle_line(&line) {
                        break;
                    }
                }
                None => {
                    // Input closed; let an outstanding question finish first
                    if session.is_waiting() {
                        if let Some(outcome) = answer_rx.recv().await {
                            session.settle(outcome);
                        }
                    }
                    break;
                }
            },
            Some(outcome) = answer_rx.recv() => session.settle(outcome),
        }
    }

    Ok(())
}

/// Line-oriented chat session: typed lines are questions or `/commands`
struct PlainSession<W: Write> {
    widget: ChatWidget<ConsoleSink<W>>,
    service: Arc<dyn AnswerService>,
    reporter: Option<FeedbackReporter>,
    in_flight: Option<PendingQuestion>,
    answer_tx: mpsc::UnboundedSender<smartchat::Result<AnswerResponse>>,
}

impl<W: Write> PlainSession<W> {
    fn new(
        out: W,
        service: Arc<dyn AnswerService>,
        reporter: Option<FeedbackReporter>,
        menu_label: &str,
        answer_tx: mpsc::UnboundedSender<smartchat::Result<AnswerResponse>>,
    ) -> Self {
        let mut widget = ChatWidget::new(ConsoleSink::new(out)).with_menu_label(menu_label);
        widget.greet();
        let keys: Vec<&str> = widget.router().entries().iter().map(|e| e.key).collect();
        widget
            .sink_mut()
            .notice(&format!("快捷選單：{}（輸入 /menu <選項>，/help 查看指令）", keys.join("、")));

        Self {
            widget,
            service,
            reporter,
            in_flight: None,
            answer_tx,
        }
    }

    fn is_waiting(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Handle one input line. Returns `false` when the user quits.
    fn handle_line(&mut self, line: &str) -> bool {
        let (cmd, args) = match parse_command(line) {
            None => {
                self.ask(line);
                return true;
            }
            Some(ParsedCommand::Unknown(name)) => {
                self.notice(&format!("未知的指令 /{name}，輸入 /help 查看說明"));
                return true;
            }
            Some(ParsedCommand::Command(cmd, args)) => (cmd, args),
        };

        match apply(&mut self.widget, cmd, &args) {
            CommandOutcome::Done => {}
            CommandOutcome::Report(report) => self.send_report(report),
            CommandOutcome::ShowMenu => {
                let entries = self.widget.router().entries();
                for entry in entries {
                    self.notice(&format!("  /menu {}", entry.key));
                }
            }
            CommandOutcome::ShowHelp => {
                for line in help_lines() {
                    self.notice(&line);
                }
            }
            CommandOutcome::Quit => return false,
            CommandOutcome::Refused(why) => self.notice(why),
        }
        true
    }

    fn ask(&mut self, text: &str) {
        match self.widget.submit_text(text) {
            Submission::Pending(pending) => {
                spawn_query(
                    Arc::clone(&self.service),
                    pending.request().clone(),
                    self.answer_tx.clone(),
                );
                self.in_flight = Some(pending);
            }
            Submission::Blocked => self.notice("查詢中，請稍候"),
            Submission::Shortcut { .. } | Submission::Ignored => {}
        }
    }

    fn settle(&mut self, outcome: smartchat::Result<AnswerResponse>) {
        match self.in_flight.take() {
            Some(pending) => {
                self.widget.settle(pending, outcome);
            }
            None => warn!("Answer arrived with no question outstanding"),
        }
    }

    fn send_report(&self, report: FeedbackReport) {
        if let Some(reporter) = &self.reporter {
            reporter.report(report);
        }
    }

    fn notice(&mut self, text: &str) {
        self.widget.sink_mut().notice(text);
    }
}
