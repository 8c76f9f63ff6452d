use tracing::info;

use crate::cmd::{command_error, ClearArgs};
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: ClearArgs) -> CliResult<i32> {
    let session = args.connect.open();
    session
        .device()
        .init_channels()
        .map_err(|err| command_error(&session, "clear failed", err))?;
    info!("channels cleared");
    Ok(SUCCESS)
}
