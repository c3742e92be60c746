use stsbus_servo::ServoBus;

use crate::cmd::IdArgs;
use crate::exit::{servo_error, CliError, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat, Record};

pub fn run(bus: &ServoBus, args: IdArgs, format: OutputFormat) -> CliResult<i32> {
    let status = bus
        .ping(args.id)
        .map_err(|err| servo_error("ping failed", err))?
        .ok_or_else(|| CliError::no_reply(args.id))?;

    print_record(&Record::new(args.id, "ping").status(status), format);
    Ok(SUCCESS)
}
