use serde::Serialize;

use crate::cmd::{parse_hex, PackArgs};
use crate::exit::{CliError, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct PackOutput {
    payload_len: usize,
    frame_len: usize,
    frame: String,
    packets: Vec<String>,
}

pub fn run(args: PackArgs, format: OutputFormat) -> CliResult<i32> {
    if args.packet_size == Some(0) {
        return Err(CliError::usage("--packet-size must be non-zero"));
    }
    let payload = parse_hex(&args.payload)?;
    let frame = hubwire_frame::pack(&payload);
    let packets: Vec<String> = hubwire_frame::packetize(&frame, args.packet_size)
        .map(hex::encode)
        .collect();
    tracing::debug!(
        payload_len = payload.len(),
        frame_len = frame.len(),
        packets = packets.len(),
        "payload packed"
    );

    let out = PackOutput {
        payload_len: payload.len(),
        frame_len: frame.len(),
        frame: hex::encode(&frame),
        packets,
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["#", "LEN", "PACKET"],
            out.packets
                .iter()
                .enumerate()
                .map(|(index, packet)| {
                    vec![index.to_string(), (packet.len() / 2).to_string(), packet.clone()]
                })
                .collect(),
        ),
        OutputFormat::Pretty => {
            for packet in &out.packets {
                println!("{packet}");
            }
        }
    }
    Ok(SUCCESS)
}
