use hubwire_peer::MessageStream;

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{peer_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_messages, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut stream = MessageStream::new();
    let mut messages = Vec::new();
    let mut faults = 0usize;

    for packet in &args.packets {
        let bytes = parse_hex(packet)?;
        for result in stream.feed(&bytes) {
            match result {
                Ok(message) => messages.push(message),
                Err(err) => {
                    faults += 1;
                    eprintln!("warning: {}", peer_error("frame skipped", err));
                }
            }
        }
    }
    if stream.buffered() > 0 {
        eprintln!(
            "warning: {} trailing bytes without a delimiter",
            stream.buffered()
        );
    }

    print_messages(&messages, format);
    Ok(if faults == 0 { SUCCESS } else { DATA_INVALID })
}
