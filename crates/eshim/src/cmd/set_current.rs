use tracing::info;

use crate::cmd::{command_error, SetCurrentArgs};
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: SetCurrentArgs) -> CliResult<i32> {
    let session = args.connect.open();
    session
        .device()
        .set_channel_current(args.channel, args.current)
        .map_err(|err| command_error(&session, "set-current failed", err))?;
    info!(channel = args.channel, current = args.current, "channel current set");
    Ok(SUCCESS)
}
