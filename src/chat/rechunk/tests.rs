use super::*;

fn content(text: &str) -> Fragment {
    Fragment::Content {
        text: text.to_string(),
        references: Vec::new(),
    }
}

fn chunk_contents(frames: &[Frame]) -> Vec<&str> {
    frames
        .iter()
        .filter(|f| f.kind == FrameKind::Chunk)
        .filter_map(|f| f.content.as_deref())
        .collect()
}

#[test]
fn buffers_until_word_count_reached() {
    let fragments = vec![
        content("one "),
        content("two "),
        content("three "),
        content("four "),
        content("five "),
        content("six"),
    ];
    let frames: Vec<Frame> = Rechunker::new(fragments.into_iter()).collect();

    // Five buffered words flush together; the sixth flushes as remainder.
    assert_eq!(chunk_contents(&frames), vec!["one two three four five ", "six"]);
    assert_eq!(frames.last().unwrap().kind, FrameKind::Done);
}

#[test]
fn punctuation_forces_flush() {
    let fragments = vec![content("Hi"), content("."), content(" More")];
    let frames: Vec<Frame> = Rechunker::new(fragments.into_iter()).collect();

    assert_eq!(chunk_contents(&frames), vec!["Hi.", " More"]);
}

#[test]
fn rechunking_is_lossless() {
    let deltas = vec!["The", " quick", " brown fox.", " Jumps", " over", "!", " the lazy dog"];
    let fragments: Vec<Fragment> = deltas.iter().map(|d| content(d)).collect();

    let mut rechunker = Rechunker::new(fragments.into_iter());
    let frames: Vec<Frame> = (&mut rechunker).collect();

    let reassembled: String = chunk_contents(&frames).concat();
    let original: String = deltas.concat();
    assert_eq!(reassembled, original);
    assert_eq!(rechunker.into_answer(), original);
}

#[test]
fn buffer_flushes_before_references_frame() {
    let fragments = vec![
        content("tail without punctuation"),
        Fragment::References {
            text: "\n\nReferences:\n[1] https://example.com/a.pdf\n".to_string(),
            references: vec!["https://example.com/a.pdf".to_string()],
        },
    ];
    let frames: Vec<Frame> = Rechunker::new(fragments.into_iter()).collect();

    let kinds: Vec<FrameKind> = frames.iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        vec![FrameKind::Chunk, FrameKind::References, FrameKind::Done]
    );
    assert_eq!(
        frames[1].references,
        Some(vec!["https://example.com/a.pdf".to_string()])
    );
}

#[test]
fn error_is_preceded_by_flush_and_followed_by_done() {
    let fragments = vec![
        content("partial answer"),
        Fragment::Error {
            message: "An error occurred while processing your request: boom".to_string(),
        },
    ];
    let frames: Vec<Frame> = Rechunker::new(fragments.into_iter()).collect();

    let kinds: Vec<FrameKind> = frames.iter().map(|f| f.kind).collect();
    assert_eq!(kinds, vec![FrameKind::Chunk, FrameKind::Error, FrameKind::Done]);
}

#[test]
fn done_is_emitted_exactly_once() {
    for fragments in [
        Vec::new(),
        vec![content("hello.")],
        vec![Fragment::Error {
            message: "boom".to_string(),
        }],
    ] {
        let frames: Vec<Frame> = Rechunker::new(fragments.into_iter()).collect();
        let done_count = frames.iter().filter(|f| f.kind == FrameKind::Done).count();
        assert_eq!(done_count, 1);
        assert_eq!(frames.last().unwrap().kind, FrameKind::Done);
    }
}

#[test]
fn answer_excludes_citation_block() {
    let fragments = vec![
        content("Answer [1]."),
        Fragment::References {
            text: "\n\nReferences:\n[1] https://example.com/a.pdf\n".to_string(),
            references: vec!["https://example.com/a.pdf".to_string()],
        },
    ];
    let mut rechunker = Rechunker::new(fragments.into_iter());
    let _frames: Vec<Frame> = (&mut rechunker).collect();

    assert_eq!(rechunker.into_answer(), "Answer [1].");
}

#[test]
fn chunk_frames_carry_current_references() {
    let fragments = vec![Fragment::Content {
        text: "Answer.".to_string(),
        references: vec!["https://example.com/a.pdf".to_string()],
    }];
    let frames: Vec<Frame> = Rechunker::new(fragments.into_iter()).collect();

    assert_eq!(
        frames[0].references,
        Some(vec!["https://example.com/a.pdf".to_string()])
    );
}

#[test]
fn sse_encoding_omits_absent_fields() {
    let sse = Frame::done().to_sse().unwrap();

    assert!(sse.starts_with("data: {"));
    assert!(sse.ends_with("\n\n"));
    assert!(sse.contains(r#""type":"done""#));
    assert!(!sse.contains("content"));
    assert!(!sse.contains("references"));
    assert!(!sse.contains("session_id"));
}

#[test]
fn info_frame_carries_session_id() {
    let frame = Frame::info(
        "Message received, generating response...".to_string(),
        "session-1".to_string(),
    );
    let sse = frame.to_sse().unwrap();

    assert!(sse.contains(r#""type":"info""#));
    assert!(sse.contains(r#""session_id":"session-1""#));
}
