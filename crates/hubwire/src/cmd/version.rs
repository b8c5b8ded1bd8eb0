use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("hubwire {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    println!("target: {}", env!("HUBWIRE_BUILD_TARGET"));
    println!(
        "git_hash: {}",
        option_env!("GIT_HASH").unwrap_or("unknown")
    );
    println!(
        "features: peer={}, async={}, cli=true",
        cfg!(feature = "peer"),
        cfg!(feature = "async")
    );
    println!(
        "protocol: {} message types, {} device record layouts",
        hubwire_message::MessageType::ALL.len(),
        hubwire_message::RECORD_LAYOUTS.len()
    );

    Ok(SUCCESS)
}
