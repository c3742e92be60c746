use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use stsbus_servo::ServoBus;
use tracing::{info, warn};

use crate::cmd::SweepArgs;
use crate::exit::{servo_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_record, print_record_table, OutputFormat, Record};

pub fn run(bus: &ServoBus, args: SweepArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut position = args.start % args.limit;
    let mut steps = 0usize;
    let mut rows = Vec::new();

    while running.load(Ordering::SeqCst) && args.count.map_or(true, |count| steps < count) {
        bus.move_to(args.id, position)
            .map_err(|err| servo_error("move failed", err))?;
        thread::sleep(args.settle);
        let value = bus
            .read_position(args.id)
            .map_err(|err| servo_error("read-pos failed", err))?;
        if value.is_none() {
            warn!(id = args.id, target = position, "no position reply");
        }

        let record = Record::new(args.id, "sweep").target(position).value(value);
        if format == OutputFormat::Table {
            rows.push(record);
        } else {
            print_record(&record, format);
        }

        position = next_position(position, args.step, args.limit);
        steps += 1;
        thread::sleep(args.interval);
    }

    if format == OutputFormat::Table {
        print_record_table(&rows);
    }
    info!(steps, "sweep finished");
    Ok(SUCCESS)
}

fn next_position(position: u16, step: u16, limit: u16) -> u16 {
    ((u32::from(position) + u32::from(step)) % u32::from(limit)) as u16
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_wrap_at_limit() {
        assert_eq!(next_position(0, 100, 3900), 100);
        assert_eq!(next_position(3800, 100, 3900), 0);
        assert_eq!(next_position(3850, 100, 3900), 50);
    }

    #[test]
    fn large_steps_do_not_overflow() {
        assert_eq!(next_position(u16::MAX - 1, u16::MAX, u16::MAX), u16::MAX - 1);
    }
}
