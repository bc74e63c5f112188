//! Downstream side of the operator. The operator pushes every mapped record and every advanced
//! combined watermark into an [Output]. Outputs never apply back-pressure on the operator.

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::message::{Record, Watermark};

/// Sink for the records and watermarks produced by an operator.
pub trait Output<OUT> {
    /// Forward a record downstream.
    fn collect(&mut self, record: Record<OUT>) -> Result<()>;

    /// Forward a watermark downstream.
    fn emit_watermark(&mut self, watermark: Watermark) -> Result<()>;
}

/// Everything an operator can emit, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent<OUT> {
    Record(Record<OUT>),
    Watermark(Watermark),
}

/// Buffers the events in memory.
impl<OUT> Output<OUT> for Vec<OutputEvent<OUT>> {
    fn collect(&mut self, record: Record<OUT>) -> Result<()> {
        self.push(OutputEvent::Record(record));
        Ok(())
    }

    fn emit_watermark(&mut self, watermark: Watermark) -> Result<()> {
        self.push(OutputEvent::Watermark(watermark));
        Ok(())
    }
}

/// Forwards the events to an unbounded channel so the operator never has to wait on the
/// downstream.
#[derive(Debug, Clone)]
pub struct ChannelOutput<OUT> {
    tx: mpsc::UnboundedSender<OutputEvent<OUT>>,
}

impl<OUT> ChannelOutput<OUT> {
    pub fn new(tx: mpsc::UnboundedSender<OutputEvent<OUT>>) -> Self {
        Self { tx }
    }

    /// Creates the output together with the receiving half for the downstream.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutputEvent<OUT>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: OutputEvent<OUT>) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| Error::Sink("downstream receiver dropped".to_string()))
    }
}

impl<OUT> Output<OUT> for ChannelOutput<OUT> {
    fn collect(&mut self, record: Record<OUT>) -> Result<()> {
        self.send(OutputEvent::Record(record))
    }

    fn emit_watermark(&mut self, watermark: Watermark) -> Result<()> {
        self.send(OutputEvent::Watermark(watermark))
    }
}
