use stsbus_servo::{Register, ServoBus};

use crate::cmd::IdArgs;
use crate::exit::{servo_error, CliError, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat, Record};

pub fn position(bus: &ServoBus, args: IdArgs, format: OutputFormat) -> CliResult<i32> {
    read(bus, args.id, Register::CurrentPosition, "read-pos", format)
}

pub fn load(bus: &ServoBus, args: IdArgs, format: OutputFormat) -> CliResult<i32> {
    read(bus, args.id, Register::CurrentLoad, "read-load", format)
}

fn read(
    bus: &ServoBus,
    id: u8,
    register: Register,
    verb: &'static str,
    format: OutputFormat,
) -> CliResult<i32> {
    let value = bus
        .read_register(id, register, bus.config().reply_timeout)
        .map_err(|err| servo_error(&format!("{verb} failed"), err))?
        .ok_or_else(|| CliError::no_reply(id))?;

    print_record(&Record::new(id, verb).value(Some(value)), format);
    Ok(SUCCESS)
}
