use mmiosim_peer::{MmioServer, ServerConfig, ShutdownHandle};
use tracing::info;

use crate::cmd::{parse_duration, ServeArgs};
use crate::exit::{peer_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_listening, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let read_timeout = parse_duration(&args.read_timeout)?;
    let config = ServerConfig {
        listen: args.listen,
        region_capacity: args.region_size,
        read_timeout: Some(read_timeout),
        max_connections: args.max_connections,
        ..ServerConfig::default()
    };

    let server = MmioServer::bind_with_config(config).map_err(|err| peer_error("bind failed", err))?;
    install_ctrlc_handler(server.shutdown_handle())?;

    print_listening(server.local_addr(), server.region().capacity(), format);

    server
        .serve()
        .map_err(|err| peer_error("serve failed", err))?;
    info!("shutdown complete");
    Ok(SUCCESS)
}

fn install_ctrlc_handler(handle: ShutdownHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        handle.shutdown();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
