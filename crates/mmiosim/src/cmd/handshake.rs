use std::time::Instant;

use mmiosim_peer::MmioClient;

use crate::cmd::ClientArgs;
use crate::exit::{peer_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_handshake, OutputFormat};

pub fn run(args: ClientArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.client_config()?;
    let mut client = MmioClient::connect_with_config(&args.addr, &config)
        .map_err(|err| peer_error("connect failed", err))?;

    let start = Instant::now();
    let ok = client
        .handshake()
        .map_err(|err| peer_error("handshake failed", err))?;
    let latency = start.elapsed();

    print_handshake(&args.addr, ok, latency, format);
    Ok(if ok { SUCCESS } else { FAILURE })
}
