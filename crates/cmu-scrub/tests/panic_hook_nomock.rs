//! Panic hook behaviour.
//!
//! The hook is process-wide, so everything runs in one test.

use cmu_scrub::{
    install_panic_hook, Exception, Harness, ScrubPolicy, SharedBuffer, Sink, PANIC_ERROR,
};

fn buffered_harness(buffer: &SharedBuffer) -> Harness {
    Harness::new(
        ScrubPolicy::new()
            .with_disabled(false)
            .with_sink(Sink::Buffer(buffer.clone())),
    )
}

#[test]
fn test_panic_hook_scrubs_payloads() {
    let hook_buffer = SharedBuffer::new();
    install_panic_hook(buffered_harness(&hook_buffer));

    // Outside any harness the hook prints the scrubbed trace itself.
    let caught = std::panic::catch_unwind(|| panic!("token sk-live-8812 rejected"));
    assert!(caught.is_err());
    let out = hook_buffer.contents();
    assert!(out.contains("SystemLog: PanicError: **Exception message scrubbed**"));
    assert!(out.contains("panic_hook_nomock.rs"));
    assert!(!out.contains("sk-live-8812"));

    // Inside an active harness only the harness prints, with the panic location.
    hook_buffer.clear();
    let call_buffer = SharedBuffer::new();
    let err = buffered_harness(&call_buffer)
        .call(|| -> Result<(), Exception> {
            let accounts: Vec<&str> = Vec::new();
            accounts.first().expect("account 4111-1111 missing");
            Ok(())
        })
        .unwrap_err();
    assert!(err.is_instance(&PANIC_ERROR));
    assert!(hook_buffer.is_empty());
    let out = call_buffer.contents();
    assert_eq!(out.matches("PanicError:").count(), 1);
    assert!(out.contains("panic_hook_nomock.rs"));
    assert!(!out.contains("4111"));

    let _ = std::panic::take_hook();
}
