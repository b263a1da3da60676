use std::fs;

use mmiosim_peer::MmioClient;

use crate::cmd::{parse_hex, WriteArgs};
use crate::exit::{io_error, peer_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_write, OutputFormat};

pub fn run(args: WriteArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let config = args.client.client_config()?;
    let mut client = MmioClient::connect_with_config(&args.client.addr, &config)
        .map_err(|err| peer_error("connect failed", err))?;

    let acknowledged = client
        .write_data(&payload)
        .map_err(|err| peer_error("write failed", err))?;

    print_write(&args.client.addr, payload.len(), acknowledged, format);
    // A rejected write means the payload does not fit the device region.
    Ok(if acknowledged { SUCCESS } else { DATA_INVALID })
}

fn resolve_payload(args: &WriteArgs) -> CliResult<Vec<u8>> {
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}
