use serde::Serialize;

use crate::cmd::{read_file, CrcArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct CrcOutput {
    file: String,
    bytes: usize,
    seed: u32,
    align: usize,
    crc: String,
}

pub fn run(args: CrcArgs, format: OutputFormat) -> CliResult<i32> {
    let data = read_file(&args.file)?;
    let crc = hubwire_frame::crc_with(&data, args.seed, args.align);

    let out = CrcOutput {
        file: args.file.display().to_string(),
        bytes: data.len(),
        seed: args.seed,
        align: args.align,
        crc: format!("{crc:08x}"),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["FILE", "BYTES", "SEED", "ALIGN", "CRC"],
            vec![vec![
                out.file,
                out.bytes.to_string(),
                format!("{:08x}", out.seed),
                out.align.to_string(),
                out.crc,
            ]],
        ),
        OutputFormat::Pretty => println!("{}  {}", out.crc, out.file),
    }
    Ok(SUCCESS)
}
