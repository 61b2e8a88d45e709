//! End-to-end scenarios for the chat session, driven through the public API with a scripted
//! transport and a recording renderer.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream;

use palaver::chat::{ChatConfig, ChatSession, Flow, Renderer, handle_input};
use palaver::{Error, Fragment, ProgressSink, Reply, Result, Role, Transcript, Transport, Turn};

#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<Vec<Fragment>>>>,
    calls: Mutex<usize>,
}

impl ScriptedTransport {
    fn new(replies: Vec<Result<Vec<Fragment>>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(0),
        }
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn send(&self, _turns: &[Turn], _streaming: bool) -> Result<Reply> {
        *self.calls.lock().unwrap() += 1;
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected request");
        let fragments = reply?;
        Ok(Reply::Stream(Box::pin(stream::iter(
            fragments.into_iter().map(Ok),
        ))))
    }
}

#[derive(Clone, Default)]
struct Lines {
    lines: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl Lines {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    fn reset(&self) {
        self.lines.lock().unwrap().clear();
        self.errors.lock().unwrap().clear();
    }
}

struct Quiet;

impl ProgressSink for Quiet {
    fn show_elapsed(&mut self, _: Duration) -> io::Result<()> {
        Ok(())
    }
}

impl Renderer for Lines {
    fn progress_sink(&self) -> Box<dyn ProgressSink> {
        Box::new(Quiet)
    }
    fn clear_progress(&mut self) {}
    fn begin_answer(&mut self) {}
    fn print_text(&mut self, _: &str) {}
    fn finish_response(&mut self, _: Duration, _: &Transcript) {}
    fn print_error(&mut self, error: &str) {
        self.errors.lock().unwrap().push(error.to_string());
    }
    fn print_info(&mut self, info: &str) {
        self.lines.lock().unwrap().push(info.to_string());
    }
}

fn session(replies: Vec<Result<Vec<Fragment>>>) -> ChatSession<ScriptedTransport> {
    let config = ChatConfig::new("key", "https://api.example.com/v1", "scripted")
        .with_system_prompt("You are a helpful assistant.");
    ChatSession::new(ScriptedTransport::new(replies), config)
}

fn hello() -> Result<Vec<Fragment>> {
    Ok(vec![Fragment::text("He"), Fragment::text("llo")])
}

#[tokio::test]
async fn hi_gets_hello() {
    let mut session = session(vec![hello()]);
    let mut renderer = Lines::default();

    let flow = handle_input(&mut session, "hi", &mut renderer).await;
    assert_eq!(flow, Flow::Continue);
    assert_eq!(
        session.transcript().turns(),
        &[
            Turn::system("You are a helpful assistant."),
            Turn::user("hi"),
            Turn::assistant("Hello"),
        ]
    );
    let elapsed = session.stats().last_elapsed.unwrap();
    assert!(elapsed >= Duration::ZERO);
    assert!(renderer.errors().is_empty());
}

#[tokio::test]
async fn clear_then_history_shows_nothing() {
    let mut session = session(vec![hello(), hello()]);
    let mut renderer = Lines::default();
    handle_input(&mut session, "hi", &mut renderer).await;
    handle_input(&mut session, "hi again", &mut renderer).await;
    assert_eq!(session.transcript().len(), 5);

    handle_input(&mut session, "clear", &mut renderer).await;
    assert_eq!(
        session.transcript().turns(),
        &[Turn::system("You are a helpful assistant.")]
    );

    renderer.reset();
    let flow = handle_input(&mut session, "history", &mut renderer).await;
    assert_eq!(flow, Flow::Continue);
    assert!(renderer.lines().is_empty());
}

#[tokio::test]
async fn history_lists_visible_turns_in_order() {
    let mut session = session(vec![hello()]);
    let mut renderer = Lines::default();
    handle_input(&mut session, "hi", &mut renderer).await;

    renderer.reset();
    handle_input(&mut session, "  HISTORY ", &mut renderer).await;
    assert_eq!(renderer.lines(), vec!["user: hi", "assistant: Hello"]);
}

#[tokio::test]
async fn authentication_failure_is_reported_and_loop_resumes() {
    let mut session = session(vec![
        Err(Error::authentication("Incorrect API key provided")),
        hello(),
    ]);
    let mut renderer = Lines::default();

    let flow = handle_input(&mut session, "hi", &mut renderer).await;
    assert_eq!(flow, Flow::Continue);
    let errors = renderer.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_lowercase().contains("authentication"));
    assert_eq!(
        session.transcript().turns(),
        &[Turn::system("You are a helpful assistant."), Turn::user("hi")]
    );

    handle_input(&mut session, "hi", &mut renderer).await;
    assert_eq!(
        session
            .transcript()
            .last_if(Role::Assistant)
            .map(Turn::content),
        Some("Hello")
    );
}

#[tokio::test]
async fn blank_input_does_nothing() {
    let mut session = session(vec![]);
    let mut renderer = Lines::default();

    let flow = handle_input(&mut session, "   ", &mut renderer).await;
    assert_eq!(flow, Flow::Continue);
    assert!(session.transcript().is_initial());
    assert_eq!(session.stats().cycles, 0);
}

#[tokio::test]
async fn empty_stream_commits_no_assistant_turn() {
    let mut session = session(vec![Ok(vec![Fragment::empty(), Fragment::text("")])]);
    let mut renderer = Lines::default();

    handle_input(&mut session, "hi", &mut renderer).await;
    assert!(session.transcript().last_if(Role::Assistant).is_none());
    assert_eq!(renderer.errors().len(), 1);
    assert!(renderer.errors()[0].contains("Empty response"));
}

#[tokio::test]
async fn quit_and_exit_end_the_session() {
    for word in ["quit", "EXIT", " Quit "] {
        let mut session = session(vec![]);
        let mut renderer = Lines::default();
        let flow = handle_input(&mut session, word, &mut renderer).await;
        assert_eq!(flow, Flow::Exit);
        assert_eq!(renderer.lines(), vec!["Goodbye!"]);
        assert!(session.transcript().is_initial());
    }
}
