use quill_core::{
    AssistantEngine, AssistantSettings, ConversationAssembler, EditorHandle, Notifier, Position,
    QuillError, QuillResult, Range, Rect,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Single-line in-memory document, ASCII only so char == byte columns.
struct MockEditor {
    line: String,
    selection: Option<Range>,
    revision: u64,
}

impl MockEditor {
    fn new(line: &str, from: u32, to: u32) -> Self {
        Self {
            line: line.to_string(),
            selection: Some(Range {
                from: Position { line: 0, ch: from },
                to: Position { line: 0, ch: to },
            }),
            revision: 1,
        }
    }
}

impl EditorHandle for MockEditor {
    fn selection(&self) -> Option<String> {
        let range = self.selection?;
        Some(self.line[range.from.ch as usize..range.to.ch as usize].to_string())
    }

    fn selection_range(&self) -> Option<Range> {
        self.selection
    }

    fn cursor(&self) -> Position {
        Position { line: 0, ch: 0 }
    }

    fn line_text(&self, line: u32) -> Option<String> {
        (line == 0).then(|| self.line.clone())
    }

    fn replace_range(&mut self, range: Range, text: &str) -> QuillResult<()> {
        self.line
            .replace_range(range.from.ch as usize..range.to.ch as usize, text);
        self.revision += 1;
        Ok(())
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn selection_geometry(&self) -> Option<Rect> {
        None
    }
}

struct CountingNotifier {
    count: AtomicUsize,
}

impl CountingNotifier {
    fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
        }
    }
}

impl Notifier for CountingNotifier {
    fn notify(&self, _message: &str) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Serve a fixed sequence of responses, one connection each.
async fn spawn_server(responses: Vec<(&'static str, &'static str, String)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local test server");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        for (status_line, content_type, body) in responses {
            let (mut socket, _) = listener.accept().await.expect("accept connection");
            let mut buf = [0u8; 8192];
            let _ = socket.read(&mut buf).await.expect("read request");

            let response = format!(
                "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len(),
            );
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
        }
    });

    format!("http://{}", addr)
}

fn sse_body(fragments: &[&str]) -> String {
    let mut body = String::new();
    for fragment in fragments {
        body.push_str(&format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{fragment}\"}}}}]}}\n\n"
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn settings_for(base_url: String) -> AssistantSettings {
    AssistantSettings {
        base_url,
        api_key: "sk-test".to_string(),
        ..AssistantSettings::default()
    }
}

#[tokio::test]
async fn template_invocation_streams_reveals_and_applies_on_accept() {
    let base_url = spawn_server(vec![(
        "HTTP/1.1 200 OK",
        "text/event-stream",
        sse_body(&["better ", "words"]),
    )])
    .await;

    let mut editor = MockEditor::new("keep old words here", 5, 14);
    let notifier = CountingNotifier::new();
    let engine = AssistantEngine::new(settings_for(base_url));

    let session_id = engine
        .invoke_template("improve", &editor, &notifier)
        .await
        .expect("invocation succeeds");

    // Reveal pacing is decoupled from network timing; drive it to the end.
    let mut awaiting = false;
    for _ in 0..100 {
        let (_, done) = engine.tick(&session_id).expect("live session");
        if done {
            awaiting = true;
            break;
        }
    }
    assert!(awaiting, "reveal should finish within the tick budget");

    let applied = engine
        .accept(&session_id, &mut editor, &notifier)
        .expect("accept succeeds");
    assert!(applied);
    assert_eq!(editor.line, "keep better words here");
    assert_eq!(engine.sessions().active_count(), 0);
    assert_eq!(notifier.count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn server_error_closes_the_session_and_notifies() {
    let base_url = spawn_server(vec![(
        "HTTP/1.1 500 Internal Server Error",
        "application/json",
        r#"{"error":{"message":"overloaded"}}"#.to_string(),
    )])
    .await;

    let editor = MockEditor::new("keep old words here", 5, 14);
    let notifier = CountingNotifier::new();
    let engine = AssistantEngine::new(settings_for(base_url));

    let err = engine
        .invoke_template("improve", &editor, &notifier)
        .await
        .expect_err("must fail");
    assert!(matches!(err, QuillError::Protocol { status: Some(500), .. }));
    assert_eq!(engine.sessions().active_count(), 0);
    assert_eq!(notifier.count.load(Ordering::SeqCst), 1);
    assert_eq!(editor.line, "keep old words here");
}

#[tokio::test]
async fn unknown_template_fails_before_any_session_is_created() {
    let editor = MockEditor::new("keep old words here", 5, 14);
    let notifier = CountingNotifier::new();
    let engine = AssistantEngine::new(settings_for("http://127.0.0.1:9".to_string()));

    let err = engine
        .invoke_template("nonexistent", &editor, &notifier)
        .await
        .expect_err("must fail");
    assert!(matches!(err, QuillError::NotFound(_)));
    assert_eq!(engine.sessions().active_count(), 0);
}

#[tokio::test]
async fn chat_turn_at_threshold_triggers_a_summarization_request() {
    // First connection answers the chat turn, second the summarization.
    let base_url = spawn_server(vec![
        (
            "HTTP/1.1 200 OK",
            "text/event-stream",
            sse_body(&["fifth ", "answer"]),
        ),
        (
            "HTTP/1.1 200 OK",
            "application/json",
            r#"{"choices":[{"message":{"content":"rolling summary"},"finish_reason":"stop"}]}"#
                .to_string(),
        ),
    ])
    .await;

    let engine = AssistantEngine::new(settings_for(base_url));
    let mut assembler = ConversationAssembler::new();
    for i in 0..4 {
        assembler.push_user(format!("question {i}"));
        assembler.push_assistant(format!("answer {i}"));
    }

    let mut deltas: Vec<String> = Vec::new();
    let mut sink = |delta: &str| deltas.push(delta.to_string());
    let reply = engine
        .send_chat_turn(&mut assembler, "question 4", None, &mut sink)
        .await
        .expect("chat turn succeeds");

    assert_eq!(reply, "fifth answer");
    assert_eq!(deltas, vec!["fifth ", "answer"]);
    assert_eq!(assembler.completed_pairs(), 5);
    assert_eq!(assembler.summary(), Some("rolling summary"));

    // The next outbound list is bounded: system (with summary) + new turn.
    let messages = assembler.build_messages("sys", "question 5".to_string());
    assert_eq!(messages.len(), 2);
}
