use std::fs;

use mmiosim_peer::MmioClient;

use crate::cmd::ReadArgs;
use crate::exit::{io_error, peer_error, CliResult, SUCCESS};
use crate::output::{print_read, OutputFormat};

pub fn run(args: ReadArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.client.client_config()?;
    let mut client = MmioClient::connect_with_config(&args.client.addr, &config)
        .map_err(|err| peer_error("connect failed", err))?;

    let data = client
        .read_data(args.length)
        .map_err(|err| peer_error("read failed", err))?;

    match &args.out {
        Some(path) => {
            fs::write(path, &data)
                .map_err(|err| io_error(&format!("failed writing {}", path.display()), err))?;
            eprintln!("saved {} bytes to {}", data.len(), path.display());
        }
        None => print_read(&args.client.addr, &data, format),
    }
    Ok(SUCCESS)
}
