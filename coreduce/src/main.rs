use std::env;
use std::error::Error;
use std::io::Write;

use coreduce_core::config::CoReduceConfig;
use coreduce_core::output::ChannelOutput;
use coreduce_core::{CoReduceHandle, CoStreamReduce, FnCoReduce};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod cmdline;
mod setup_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_tracing::register();

    if let Err(e) = run().await {
        error!("{e:?}");
        return Err(e);
    }
    info!("Exiting...");

    Ok(())
}

/// Runs a co-reduce over stdin and stdout, see [pump].
async fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();
    let print_metrics = args.contains(&"--metrics".to_string());

    let config = CoReduceConfig::load(env::vars())?;
    info!(?config, "Starting co-reduce");

    let cln_token = CancellationToken::new();
    let shutdown_token = cln_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, shutting down");
            shutdown_token.cancel();
        }
    });

    pump(
        BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
        &config,
        cln_token,
    )
    .await?;

    if print_metrics {
        print!("{}", coreduce_core::metrics::metrics_text()?);
    }

    Ok(())
}

/// Reads commands from `reader` and feeds them to a co-reduce that sums the first input and keeps
/// the maximum of the second input. Everything the operator emits is written to `writer`, also
/// when the operator stops on an error.
async fn pump<R, W>(
    reader: R,
    mut writer: W,
    config: &CoReduceConfig,
    cln_token: CancellationToken,
) -> Result<W, Box<dyn Error>>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send + 'static,
{
    let operator = CoStreamReduce::new(FnCoReduce::new(
        |acc: &i64, v: i64| {
            acc.checked_add(v).ok_or_else(|| {
                coreduce_core::Error::UserDefined(format!("sum overflowed adding {v} to {acc}"))
            })
        },
        |acc: &i64, v: i64| Ok((*acc).max(v)),
        |acc: &i64| Ok(format!("sum={acc}")),
        |acc: &i64| Ok(format!("max={acc}")),
    ));

    let (output, mut output_rx) = ChannelOutput::channel();
    let handle = CoReduceHandle::spawn(operator, output, config, cln_token.clone());

    let printer = tokio::spawn(async move {
        while let Some(event) = output_rx.recv().await {
            writeln!(writer, "{}", cmdline::render(&event))?;
        }
        writer.flush()?;
        Ok::<_, std::io::Error>(writer)
    });

    let mut lines = LinesStream::new(reader.lines());
    loop {
        let line = tokio::select! {
            _ = cln_token.cancelled() => break,
            line = lines.next() => match line {
                Some(line) => line?,
                None => break,
            },
        };

        let command = match cmdline::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                warn!(%line, "Skipping line: {e}");
                continue;
            }
        };

        // the operator only stops early on error, join below reports it
        if let Err(e) = cmdline::deliver(command, &handle).await {
            warn!(?e, "Co-reduce stopped, no longer reading input");
            break;
        }
    }

    // the printer ends once the task drops its output, drain it before reporting the result
    let result = handle.join().await;
    let writer = printer.await??;
    result?;

    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> CoReduceConfig {
        CoReduceConfig {
            name: name.to_string(),
            input_buffer_size: 10,
        }
    }

    #[tokio::test]
    async fn test_pump_prints_outputs() {
        let input = "r1 10 3\nw1 5\n# comment\nr2 11 7\nw2 8\nr1 12 5\n";
        let out = pump(
            input.as_bytes(),
            Vec::new(),
            &config("pump-outputs"),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let out = String::from_utf8(out).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines.contains(&"record event_time=10 sum=3"));
        assert!(lines.contains(&"record event_time=11 max=7"));
        assert!(lines.contains(&"record event_time=12 sum=8"));
        assert!(lines.contains(&"watermark 5"));
    }

    #[tokio::test]
    async fn test_pump_drains_outputs_before_error() {
        // the output written to the shared buffer must be complete when pump returns the error
        struct Shared(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);
        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buffer = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let input = format!("r1 0 {}\nr2 1 4\nr1 2 1\n", i64::MAX);
        let result = pump(
            input.as_bytes(),
            Shared(std::sync::Arc::clone(&buffer)),
            &config("pump-error"),
            CancellationToken::new(),
        )
        .await;

        let err = result.err().expect("sum overflow must fail");
        assert!(err.to_string().contains("sum overflowed"));
        let out = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(out.contains(&format!("record event_time=0 sum={}", i64::MAX)));
    }
}
