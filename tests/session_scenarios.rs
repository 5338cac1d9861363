use std::sync::Arc;
use std::time::Duration;

use component_forge::session::{self, SessionStream};
use component_forge::{
    is_cancelled, GenerationProvider, PreviewAdapter, Prompt, SessionStatus, StreamReassembler,
    WireEvent, WireFrameDecoder,
};
use generation_provider_mock::{MockProvider, MockStep};

fn start(provider: MockProvider, prompt: &str) -> (Arc<MockProvider>, SessionStream) {
    let provider = Arc::new(provider);
    let prompt = Prompt::new(prompt).expect("valid prompt");
    let stream = session::stream(Arc::clone(&provider) as Arc<dyn GenerationProvider>, prompt);
    (provider, stream)
}

/// Pushes every event through the wire codec before the reassembler sees it.
async fn pump(stream: &mut SessionStream, reassembler: &mut StreamReassembler) -> Vec<String> {
    let mut decoder = WireFrameDecoder::new();
    let mut snapshots = Vec::new();
    while let Some(event) = stream.events.recv().await {
        let frame = event.encode_frame().expect("encode");
        for decoded in decoder.feed(frame.as_bytes()) {
            if reassembler.consume(decoded) {
                snapshots.push(reassembler.displayed().to_string());
            }
        }
    }
    snapshots
}

#[tokio::test]
async fn counter_prompt_completes_with_single_default_export() {
    let (_provider, mut stream) = start(
        MockProvider::new(vec![
            "import React".to_string(),
            ", { useState } from 'react';\n\nfunction Counter() {\n".to_string(),
            "  const [n, setN] = useState(0);\n  return <button onClick={() => setN(n + 1)}>{n}</button>;\n}\n"
                .to_string(),
        ]),
        "Create a counter",
    );
    let mut reassembler = StreamReassembler::new();
    reassembler.begin();

    let snapshots = pump(&mut stream, &mut reassembler).await;
    let outcome = stream.outcome.await.expect("session joins");

    assert_eq!(snapshots.first().map(String::as_str), Some("import React"));
    assert_eq!(reassembler.status(), SessionStatus::Completed);
    let final_text = reassembler.displayed();
    assert!(final_text.starts_with("import React"));
    assert_eq!(final_text.matches("export default").count(), 1);
    assert!(final_text.ends_with("export default Counter;"));
    assert_eq!(outcome.final_text.as_deref(), Some(final_text));
}

#[tokio::test]
async fn fault_after_three_fragments_keeps_them_displayed() {
    let (_provider, mut stream) = start(
        MockProvider::scripted(vec![
            MockStep::Fragment("import React from 'react';\n".to_string()),
            MockStep::Fragment("function Card() {\n".to_string()),
            MockStep::Fragment("  return <div />;\n".to_string()),
            MockStep::Fault("Generation failed: connection reset".to_string()),
        ]),
        "a card",
    );
    let mut reassembler = StreamReassembler::new();
    reassembler.begin();

    pump(&mut stream, &mut reassembler).await;

    assert_eq!(reassembler.status(), SessionStatus::Failed);
    assert_eq!(reassembler.error(), Some("Generation failed: connection reset"));
    assert_eq!(
        reassembler.displayed(),
        "import React from 'react';\nfunction Card() {\n  return <div />;\n"
    );
    assert!(!reassembler.consume(WireEvent::fragment("late")));
}

#[tokio::test]
async fn client_cancel_mid_stream_freezes_display_and_releases_provider() {
    let (provider, mut stream) = start(
        MockProvider::scripted(vec![
            MockStep::Fragment("const Panel = () => (".to_string()),
            MockStep::WaitForCancel,
        ]),
        "a panel",
    );
    let mut reassembler = StreamReassembler::new();
    let token = reassembler.begin();

    let first = stream.events.recv().await.expect("first fragment");
    reassembler.consume(first);
    reassembler.cancel();
    assert!(is_cancelled(&token));

    // The transport honours the token by dropping its end of the stream.
    drop(stream.events);
    let outcome = stream.outcome.await.expect("session joins");

    assert_eq!(outcome.status, SessionStatus::Cancelled);
    assert_eq!(reassembler.status(), SessionStatus::Cancelled);
    assert!(!reassembler.consume(WireEvent::complete("ignored")));
    assert_eq!(reassembler.displayed(), "const Panel = () => (");
    assert_eq!(provider.released_streams(), 1);
}

#[tokio::test]
async fn preview_tracks_partial_text_and_settles_on_final_text() {
    let (_provider, mut stream) = start(
        MockProvider::new(vec![
            "```tsx\n".to_string(),
            "const Badge = () => {\n".to_string(),
            "  return <span>new</span>;\n".to_string(),
            "};\n```".to_string(),
        ])
        .with_fragment_delay(Duration::from_millis(1)),
        "a badge",
    );
    let mut reassembler = StreamReassembler::new();
    reassembler.begin();
    let mut preview = PreviewAdapter::new();
    let mut updates = 0;

    while let Some(event) = stream.events.recv().await {
        reassembler.consume(event);
        if reassembler.status() == SessionStatus::Completed {
            preview.update_final(reassembler.displayed());
            continue;
        }
        if preview.update(reassembler.displayed()) {
            updates += 1;
        }
        assert!(component_forge::preview::delimiters_balanced(preview.files().app()));
    }

    assert_eq!(reassembler.status(), SessionStatus::Completed);
    assert_eq!(
        preview.files().app(),
        "const Badge = () => {\n  return <span>new</span>;\n};\n\nexport default Badge;"
    );
    assert!(updates >= 1);
}

#[tokio::test]
async fn final_text_with_jsx_apostrophes_reaches_the_preview() {
    let (_provider, mut stream) = start(
        MockProvider::new(vec![
            "Sure! import React, { useState } from 'react';\n".to_string(),
            "export default function Note() {\n".to_string(),
            "  const [open] = useState(true);\n".to_string(),
            "  return <div>{open && <p>Don't forget to save</p>}</div>;\n}".to_string(),
        ]),
        "a reminder note",
    );
    let mut reassembler = StreamReassembler::new();
    reassembler.begin();
    let mut preview = PreviewAdapter::new();

    while let Some(event) = stream.events.recv().await {
        reassembler.consume(event);
        if reassembler.status() == SessionStatus::Completed {
            preview.update_final(reassembler.displayed());
        } else {
            preview.update(reassembler.displayed());
        }
    }

    let expected = "import React, { useState } from 'react';\nexport default function Note() {\n  const [open] = useState(true);\n  return <div>{open && <p>Don't forget to save</p>}</div>;\n}";
    assert_eq!(reassembler.status(), SessionStatus::Completed);
    assert_eq!(reassembler.displayed(), expected);
    assert_eq!(preview.files().app(), expected);
}
