use hubwire_message::StartFileUpload;
use hubwire_peer::plan_chunks;
use serde::Serialize;

use crate::cmd::{read_file, PlanArgs};
use crate::exit::{message_error, peer_error, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct ChunkOutput {
    index: usize,
    offset: usize,
    len: usize,
    running_crc: String,
}

#[derive(Serialize)]
struct PlanOutput {
    file_name: String,
    slot: u8,
    bytes: usize,
    file_crc: String,
    chunk_size: usize,
    chunks: Vec<ChunkOutput>,
}

pub fn run(args: PlanArgs, format: OutputFormat) -> CliResult<i32> {
    let data = read_file(&args.file)?;
    let start = StartFileUpload::new(args.name.as_str(), args.slot, hubwire_frame::crc(&data))
        .map_err(|err| message_error("plan", err))?;
    let chunks = plan_chunks(&data, args.chunk_size).map_err(|err| peer_error("plan", err))?;

    let out = PlanOutput {
        file_name: start.file_name().to_string(),
        slot: start.slot(),
        bytes: data.len(),
        file_crc: format!("{:08x}", start.crc()),
        chunk_size: args.chunk_size,
        chunks: chunks
            .into_iter()
            .map(|chunk| ChunkOutput {
                index: chunk.index,
                offset: chunk.offset,
                len: chunk.len,
                running_crc: format!("{:08x}", chunk.running_crc),
            })
            .collect(),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            println!(
                "{} -> slot {} ({} bytes, crc {})",
                out.file_name, out.slot, out.bytes, out.file_crc
            );
            print_table(
                &["#", "OFFSET", "LEN", "RUNNING CRC"],
                out.chunks
                    .iter()
                    .map(|chunk| {
                        vec![
                            chunk.index.to_string(),
                            chunk.offset.to_string(),
                            chunk.len.to_string(),
                            chunk.running_crc.clone(),
                        ]
                    })
                    .collect(),
            );
        }
        OutputFormat::Pretty => {
            println!(
                "StartFileUploadRequest name={:?} slot={} crc={}",
                out.file_name, out.slot, out.file_crc
            );
            for chunk in &out.chunks {
                println!(
                    "TransferChunkRequest running_crc={} size={}",
                    chunk.running_crc, chunk.len
                );
            }
        }
    }
    Ok(SUCCESS)
}
