// crates/oath-protocol/tests/command_assembly_test.rs
use oath_protocol::command::{encode_args, parse_args, MAX_COMMAND_ARGS, MAX_COMMAND_DATA};
use oath_protocol::{AssemblyError, Command, CommandAssembler, ContinueStatus, ErrorCode};

fn chunk(status: ContinueStatus, keep_alive: bool, rest: &[u8]) -> Command {
    Command {
        keep_alive,
        status,
        rest: rest.to_vec(),
    }
}

#[test]
fn complete_command_is_returned_at_once() {
    let mut asm = CommandAssembler::new();
    let data = encode_args(&["otp", "validate", "sam"]);

    let cmd = asm
        .push(chunk(ContinueStatus::Complete, true, &data))
        .expect("assemble")
        .expect("complete");

    assert!(cmd.keep_alive);
    assert_eq!(cmd.args, vec![b"otp".to_vec(), b"validate".to_vec(), b"sam".to_vec()]);
    assert!(!asm.in_progress());
}

#[test]
fn split_command_is_reassembled_across_chunks() {
    let mut asm = CommandAssembler::new();
    let data = encode_args(&["otp", "sam"]);
    let (a, rest) = data.split_at(3);
    let (b, c) = rest.split_at(6);

    assert_eq!(asm.push(chunk(ContinueStatus::Incomplete, true, a)), Ok(None));
    assert!(asm.in_progress());
    assert_eq!(asm.push(chunk(ContinueStatus::Continuation, true, b)), Ok(None));

    let cmd = asm
        .push(chunk(ContinueStatus::Final, false, c))
        .expect("assemble")
        .expect("final");
    assert!(!cmd.keep_alive);
    assert_eq!(cmd.args, vec![b"otp".to_vec(), b"sam".to_vec()]);
    assert!(!asm.in_progress());
}

#[test]
fn continuation_without_start_is_unexpected() {
    let mut asm = CommandAssembler::new();
    for status in [ContinueStatus::Continuation, ContinueStatus::Final] {
        let err = asm.push(chunk(status, true, b"x")).unwrap_err();
        assert_eq!(err, AssemblyError::Unexpected);
        assert_eq!(err.error_code(), ErrorCode::UnexpectedMessage);
    }
}

#[test]
fn new_start_discards_pending_data() {
    let mut asm = CommandAssembler::new();
    asm.push(chunk(ContinueStatus::Incomplete, true, b"garbage"))
        .expect("start");

    let data = encode_args(&["a"]);
    let cmd = asm
        .push(chunk(ContinueStatus::Complete, true, &data))
        .expect("assemble")
        .expect("complete");
    assert_eq!(cmd.args, vec![b"a".to_vec()]);

    let err = asm.push(chunk(ContinueStatus::Final, true, b"")).unwrap_err();
    assert_eq!(err, AssemblyError::Unexpected);
}

#[test]
fn oversized_start_discards_pending_data() {
    let mut asm = CommandAssembler::new();
    let data = encode_args(&["stale"]);
    let (head, tail) = data.split_at(3);

    asm.push(chunk(ContinueStatus::Incomplete, true, head))
        .expect("start");

    let huge = vec![0u8; MAX_COMMAND_DATA + 1];
    let err = asm
        .push(chunk(ContinueStatus::Incomplete, true, &huge))
        .unwrap_err();
    assert_eq!(err, AssemblyError::TooMuchData);
    assert!(!asm.in_progress());

    let err = asm.push(chunk(ContinueStatus::Final, true, tail)).unwrap_err();
    assert_eq!(err, AssemblyError::Unexpected);
}

#[test]
fn reassembly_is_bounded() {
    let mut asm = CommandAssembler::new();
    let half = vec![0u8; MAX_COMMAND_DATA / 2 + 1];

    asm.push(chunk(ContinueStatus::Incomplete, true, &half))
        .expect("start");
    let err = asm
        .push(chunk(ContinueStatus::Continuation, true, &half))
        .unwrap_err();
    assert_eq!(err, AssemblyError::TooMuchData);
    assert_eq!(err.error_code(), ErrorCode::TooMuchData);
    assert!(!asm.in_progress());
}

#[test]
fn argument_block_validation() {
    assert!(matches!(parse_args(&[0, 0]), Err(AssemblyError::Malformed(_))));
    assert!(matches!(
        parse_args(&0u32.to_be_bytes()),
        Err(AssemblyError::Malformed(_))
    ));

    let too_many = (MAX_COMMAND_ARGS as u32 + 1).to_be_bytes();
    let err = parse_args(&too_many).unwrap_err();
    assert_eq!(err, AssemblyError::TooManyArgs(MAX_COMMAND_ARGS + 1));
    assert_eq!(err.error_code(), ErrorCode::TooManyArgs);

    let mut data = encode_args(&["abc"]);
    data.pop();
    assert!(matches!(parse_args(&data), Err(AssemblyError::Malformed(_))));

    let mut data = encode_args(&["abc"]);
    data.push(0);
    let err = parse_args(&data).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::BadCommand);

    assert_eq!(parse_args(&encode_args(&[""])), Ok(vec![Vec::new()]));
}
