#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Frames are text; invalid UTF-8 never reaches the decoder
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // A frame that parses as an object never fails on its payload
    assert!(!matches!(
        chargelink::protocol::decode(text),
        Err(chargelink::protocol::DecodeError::Payload { .. })
    ));

    // Anything that decodes as a command must encode into a decodable frame
    if let Ok(command) = chargelink::protocol::decode_command(text) {
        let frame = chargelink::protocol::encode(&command).unwrap();
        assert!(chargelink::protocol::decode_command(&frame).is_ok());
    }
});
