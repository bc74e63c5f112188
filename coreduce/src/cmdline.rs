//! Line protocol of the `coreduce` binary. One command per line:
//!
//! ```text
//! r1 <event_time_ms> <value>   record on the first input
//! r2 <event_time_ms> <value>   record on the second input
//! w1 <watermark_ms>            watermark on the first input
//! w2 <watermark_ms>            watermark on the second input
//! ```
//!
//! Empty lines and lines starting with `#` are ignored.

use chrono::{DateTime, Utc};
use coreduce_core::output::OutputEvent;
use coreduce_core::{CoReduceHandle, Input, Record, Watermark};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Record {
        input: Input,
        event_time: DateTime<Utc>,
        value: i64,
    },
    Watermark {
        input: Input,
        watermark: Watermark,
    },
}

fn parse_i64(arg: Option<&str>, what: &str) -> Result<i64, String> {
    let arg = arg.ok_or_else(|| format!("missing {what}"))?;
    arg.parse()
        .map_err(|e| format!("invalid {what} {arg:?}: {e}"))
}

/// Parses a line, `Ok(None)` for lines without a command.
pub(crate) fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut args = line.split_whitespace();
    let Some(op) = args.next() else {
        return Ok(None);
    };
    if op.starts_with('#') {
        return Ok(None);
    }

    let input = match op {
        "r1" | "w1" => Input::First,
        "r2" | "w2" => Input::Second,
        other => {
            return Err(format!(
                "unknown command {other:?}, expected one of r1, r2, w1, w2"
            ));
        }
    };

    let command = if op.starts_with('r') {
        let millis = parse_i64(args.next(), "event time")?;
        let event_time = DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| format!("event time {millis} is out of range"))?;
        let value = parse_i64(args.next(), "value")?;
        Command::Record {
            input,
            event_time,
            value,
        }
    } else {
        let millis = parse_i64(args.next(), "watermark")?;
        Command::Watermark {
            input,
            watermark: Watermark::from_timestamp_millis(millis),
        }
    };

    if let Some(extra) = args.next() {
        return Err(format!("unexpected argument {extra:?}"));
    }
    Ok(Some(command))
}

/// Hands the command to the matching input of the operator.
pub(crate) async fn deliver(
    command: Command,
    handle: &CoReduceHandle<i64, i64>,
) -> coreduce_core::Result<()> {
    match command {
        Command::Record {
            input: Input::First,
            event_time,
            value,
        } => handle.input1().send_record(Record::new(value, event_time)).await,
        Command::Record {
            input: Input::Second,
            event_time,
            value,
        } => handle.input2().send_record(Record::new(value, event_time)).await,
        Command::Watermark {
            input: Input::First,
            watermark,
        } => handle.input1().send_watermark(watermark).await,
        Command::Watermark {
            input: Input::Second,
            watermark,
        } => handle.input2().send_watermark(watermark).await,
    }
}

pub(crate) fn render(event: &OutputEvent<String>) -> String {
    match event {
        OutputEvent::Record(record) => format!(
            "record event_time={} {}",
            record.event_time.timestamp_millis(),
            record.value
        ),
        OutputEvent::Watermark(watermark) => format!("watermark {watermark}"),
    }
}
