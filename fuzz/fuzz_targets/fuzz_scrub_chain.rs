//! Fuzz target for scrubbing arbitrary exception chains.
//!
//! Every message carries a `\u{1}` sentinel and no letters, so neither the
//! default allow-list nor any type name can disclose it. The sentinel must
//! never reach the sink or the re-raised exception.

#![no_main]

use arbitrary::Arbitrary;
use cmu_scrub::{
    Exception, ExceptionType, Harness, ScrubPolicy, SharedBuffer, Sink, ARITHMETIC_ERROR,
    EXCEPTION, KEY_ERROR, OS_ERROR, VALUE_ERROR,
};
use libfuzzer_sys::fuzz_target;

static KINDS: [&ExceptionType; 5] = [
    &EXCEPTION,
    &VALUE_ERROR,
    &KEY_ERROR,
    &ARITHMETIC_ERROR,
    &OS_ERROR,
];

#[derive(Arbitrary, Debug)]
struct Link {
    kind: u8,
    message: String,
    explicit: bool,
    extra_args: u8,
}

#[derive(Arbitrary, Debug)]
struct Input {
    links: Vec<Link>,
    timestamp: bool,
}

fn secret(message: &str) -> String {
    let masked: String = message
        .chars()
        .map(|c| if c.is_alphabetic() { '#' } else { c })
        .collect();
    format!("\u{1}{}", masked)
}

fuzz_target!(|input: Input| {
    let mut chain: Option<Exception> = None;
    for link in input.links.iter().take(16) {
        let kind = KINDS[link.kind as usize % KINDS.len()];
        let mut err = Exception::with_message(kind, secret(&link.message));
        for i in 0..(link.extra_args % 3) {
            err = err.arg(secret(&i.to_string()));
        }
        chain = Some(match chain.take() {
            Some(inner) if link.explicit => err.caused_by(inner),
            Some(inner) => err.during(inner),
            None => err,
        });
    }

    let Some(thrown) = chain else {
        return;
    };
    let kind = thrown.kind();

    let buffer = SharedBuffer::new();
    let harness = Harness::new(
        ScrubPolicy::new()
            .with_disabled(false)
            .with_timestamp(input.timestamp)
            .with_sink(Sink::Buffer(buffer.clone())),
    );

    let raised = harness
        .call(|| Err::<(), _>(thrown))
        .err()
        .and_then(|e| e.into_exception());
    let raised = match raised {
        Some(raised) => raised,
        None => panic!("harness did not raise an exception"),
    };

    assert!(raised.is(kind));
    assert!(!raised.message().contains('\u{1}'));
    assert!(!buffer.contents().contains('\u{1}'));
});
