//! Terminal front end.
//!
//! Chat requests run on spawned tasks and report back over a channel, so
//! input stays live while a reply is pending (only `/reset`, `/docs` and
//! the read-only commands are useful then).

use anyhow::Result;
use ragchat::api::{ChatBackend, ChatResult};
use ragchat::chat::WELCOME_MESSAGE;
use ragchat::render::transcript_html;
use ragchat::{
    ChatController, ChatMessage, DocumentRecord, FileStore, PendingTurn, Role, TurnOutcome,
    WebhookClient, WebhookReply,
};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const HELP: &str = "\
Commands:
  /docs          list documents known to the assistant
  /ask <n>       ask about document <n> from the last /docs listing
  /history       show the conversation so far
  /export <path> write the conversation as an HTML page
  /reset         start a new conversation
  /quit          exit
Anything else is sent to the assistant.";

const RESET_PROMPT: &str =
    "Are you sure you want to reset the chat? This will clear your conversation history. [y/N]";

type Reply = (PendingTurn, ChatResult<WebhookReply>);

enum Flow {
    Continue,
    Quit,
}

pub struct Repl {
    controller: ChatController<WebhookClient, FileStore>,
    replies: mpsc::UnboundedSender<Reply>,
    inbox: Option<mpsc::UnboundedReceiver<Reply>>,
    documents: Vec<DocumentRecord>,
    confirming_reset: bool,
}

impl Repl {
    pub fn new(controller: ChatController<WebhookClient, FileStore>) -> Self {
        let (replies, inbox) = mpsc::unbounded_channel();
        Self {
            controller,
            replies,
            inbox: Some(inbox),
            documents: Vec::new(),
            confirming_reset: false,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let Some(mut inbox) = self.inbox.take() else {
            return Ok(());
        };
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        if self.controller.session().history().is_empty() {
            print_turn(&ChatMessage::system(WELCOME_MESSAGE));
        } else {
            self.print_history();
        }
        prompt();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if let Flow::Quit = self.handle_line(&line).await? {
                        break;
                    }
                }
                Some((pending, result)) = inbox.recv() => {
                    match self.controller.finish_turn(pending, result) {
                        Ok(outcome) => show_outcome(&outcome),
                        Err(err) => {
                            tracing::error!(error = %err, "failed to save the reply");
                            print_turn(&ChatMessage::system(format!(
                                "The reply could not be saved to history: {err}"
                            )));
                        }
                    }
                }
            }
            prompt();
        }

        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let line = line.trim();

        if self.confirming_reset {
            self.confirming_reset = false;
            if matches!(line.to_ascii_lowercase().as_str(), "y" | "yes") {
                self.documents.clear();
                match self.controller.reset() {
                    Ok(()) => print_turn(&ChatMessage::system(WELCOME_MESSAGE)),
                    Err(err) => {
                        tracing::error!(error = %err, "failed to reset the session");
                        print_turn(&ChatMessage::system(format!(
                            "The chat could not be reset: {err}"
                        )));
                    }
                }
            }
            return Ok(Flow::Continue);
        }

        let (command, argument) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "/quit" | "/exit" => return Ok(Flow::Quit),
            "/help" => println!("{HELP}"),
            "/history" => self.print_history(),
            "/reset" => {
                println!("{RESET_PROMPT}");
                self.confirming_reset = true;
            }
            "/docs" => self.show_documents().await,
            "/ask" => self.ask_about_document(argument)?,
            "/export" => self.export(argument),
            _ => self.start_turn(line)?,
        }

        Ok(Flow::Continue)
    }

    fn start_turn(&mut self, text: &str) -> Result<()> {
        if self.controller.is_busy() {
            println!("(still waiting for the previous reply)");
            return Ok(());
        }

        let pending = match self.controller.begin_turn(text) {
            Ok(Some(pending)) => pending,
            Ok(None) => return Ok(()),
            Err(err) => {
                tracing::error!(error = %err, "failed to save the message");
                print_turn(&ChatMessage::system(format!(
                    "Your message could not be saved to history: {err}"
                )));
                return Ok(());
            }
        };

        let backend = self.controller.backend().clone();
        let replies = self.replies.clone();
        tokio::spawn(async move {
            let result = backend
                .send_message(pending.input(), pending.session_id())
                .await;
            // The receiver only goes away when the REPL exits.
            let _ = replies.send((pending, result));
        });
        println!("(assistant is typing...)");
        Ok(())
    }

    async fn show_documents(&mut self) {
        println!("Loading documents...");
        match self.controller.list_documents().await {
            Ok(documents) if documents.is_empty() => {
                println!("No documents found. Upload documents to the system first to see them here.");
                self.documents.clear();
            }
            Ok(documents) => {
                for (index, doc) in documents.iter().enumerate() {
                    let link = if doc.has_link() { doc.url.as_str() } else { "" };
                    println!(
                        "{:>3}. [{}] {} (ID: {}) {}",
                        index + 1,
                        doc.kind().label(),
                        doc.title,
                        doc.id,
                        link
                    );
                }
                self.documents = documents;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to list documents");
                println!(
                    "Error loading documents. There was a problem connecting to the service. Please try again later."
                );
            }
        }
    }

    fn ask_about_document(&mut self, argument: &str) -> Result<()> {
        let selected = argument
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| self.documents.get(index));
        match selected {
            Some(doc) => {
                let question = format!("Tell me about the document \"{}\"", doc.title);
                print_turn(&ChatMessage::user(question.as_str()));
                self.start_turn(&question)
            }
            None => {
                println!("Pick a document number from the last /docs listing.");
                Ok(())
            }
        }
    }

    fn export(&self, path: &str) {
        if path.is_empty() {
            println!("Usage: /export <path>");
            return;
        }
        let page = transcript_html(self.controller.session().history());
        match std::fs::write(path, page) {
            Ok(()) => println!("Conversation written to {path}"),
            Err(err) => println!("Could not write {path}: {err}"),
        }
    }

    fn print_history(&self) {
        for turn in self.controller.session().history().iter() {
            print_turn(turn);
        }
    }
}

fn show_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Reply(text) => print_turn(&ChatMessage::assistant(text.as_str())),
        TurnOutcome::Superseded => {}
        other => {
            if let Some(notice) = other.notice() {
                print_turn(&ChatMessage::system(notice));
            }
        }
    }
}

fn print_turn(turn: &ChatMessage) {
    match turn.role {
        Role::System => println!("* {}", turn.content),
        role => println!("{role}> {}", turn.content),
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}
